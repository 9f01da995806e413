//! Creates and owns the fields shared between processes.
//!
//! Every process's requests are registered first. Requests for the same name
//! coming from different processes must agree on the full identifier. Once
//! all requests are known, [`FieldManager::allocate`] creates exactly one
//! field per name, padded so that every requester's pack size divides the
//! allocated extent of the last dimension.

use crate::errors::{AtmError, AtmResult};
use crate::field::{Field, FieldIdentifier, FieldRequest, FieldRequestRegistry, Real};
use num::integer::lcm;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct FieldSpec {
    identifier: FieldIdentifier,
    pack_size: usize,
    groups: Vec<String>,
    requested_by: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FieldManager {
    specs: BTreeMap<String, FieldSpec>,
    fields: BTreeMap<String, Field<Real>>,
    allocated: bool,
}

impl FieldManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one request made by `process`.
    pub fn register_request(&mut self, process: &str, request: &FieldRequest) -> AtmResult<()> {
        if self.allocated {
            return Err(AtmError::InvalidLifecycle {
                process: process.to_string(),
                operation: format!("register field '{}' for", request.name()),
                state: "after field allocation".to_string(),
            });
        }
        if request.pack_size == 0 {
            return Err(AtmError::InvalidLayout(format!(
                "field '{}' requested by '{}' with a pack size of 0",
                request.name(),
                process
            )));
        }

        match self.specs.get_mut(request.name()) {
            Some(spec) => {
                if let Some(reason) = spec.identifier.mismatch(&request.identifier) {
                    return Err(AtmError::IncompatibleField {
                        field: request.name().to_string(),
                        process: process.to_string(),
                        reason: format!(
                            "{} (first requested by '{}')",
                            reason, spec.requested_by[0]
                        ),
                    });
                }
                spec.pack_size = lcm(spec.pack_size, request.pack_size);
                for group in &request.groups {
                    if !spec.groups.contains(group) {
                        spec.groups.push(group.clone());
                    }
                }
                spec.requested_by.push(process.to_string());
            }
            None => {
                self.specs.insert(
                    request.name().to_string(),
                    FieldSpec {
                        identifier: request.identifier.clone(),
                        pack_size: request.pack_size,
                        groups: request.groups.clone(),
                        requested_by: vec![process.to_string()],
                    },
                );
            }
        }
        Ok(())
    }

    /// Register every request of a process.
    pub fn register_requests(&mut self, registry: &FieldRequestRegistry) -> AtmResult<()> {
        for request in registry.iter() {
            self.register_request(registry.process_name(), request)?;
        }
        Ok(())
    }

    /// Create one field per registered name.
    pub fn allocate(&mut self) -> AtmResult<()> {
        if self.allocated {
            return Ok(());
        }
        for (name, spec) in &self.specs {
            let field = Field::new(spec.identifier.clone(), spec.pack_size)?;
            for group in &spec.groups {
                field.add_to_group(group);
            }
            log::debug!(
                "Allocated field {} with pack size {} for [{}]",
                spec.identifier,
                spec.pack_size,
                spec.requested_by.join(", ")
            );
            self.fields.insert(name.clone(), field);
        }
        self.allocated = true;
        log::info!("Allocated {} fields", self.fields.len());
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get_field(&self, name: &str) -> AtmResult<&Field<Real>> {
        self.fields.get(name).ok_or_else(|| AtmError::FieldNotFound {
            field: name.to_string(),
            context: format!(
                "the field manager (available: [{}])",
                self.field_names().join(", ")
            ),
        })
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field<Real>> {
        self.fields.values()
    }

    /// Fields that belong to `group`, in name order.
    pub fn get_group(&self, group: &str) -> Vec<&Field<Real>> {
        self.fields
            .values()
            .filter(|f| f.tracking().groups().iter().any(|g| g == group))
            .collect()
    }

    /// Processes that requested `name`, in registration order.
    pub fn requested_by(&self, name: &str) -> Option<&[String]> {
        self.specs.get(name).map(|s| s.requested_by.as_slice())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
