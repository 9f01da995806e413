use super::identifier::FieldIdentifier;
use super::layout::FieldLayout;
use crate::errors::{AtmError, AtmResult};
use crate::units::Units;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a process accesses a requested field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Read-only input
    Required,
    /// Write-only output
    Computed,
    /// Read-write input-output
    Updated,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Required => write!(f, "Required"),
            RequestKind::Computed => write!(f, "Computed"),
            RequestKind::Updated => write!(f, "Updated"),
        }
    }
}

/// A process's request for a field instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRequest {
    pub identifier: FieldIdentifier,
    pub kind: RequestKind,
    /// Vectorization width the process wants the storage padded to
    pub pack_size: usize,
    /// Named groups (e.g. "tracers") the field belongs to
    pub groups: Vec<String>,
}

impl FieldRequest {
    pub fn new(identifier: FieldIdentifier, kind: RequestKind) -> Self {
        Self {
            identifier,
            kind,
            pack_size: 1,
            groups: vec![],
        }
    }

    pub fn name(&self) -> &str {
        self.identifier.name()
    }

    pub fn with_pack_size(&mut self, pack_size: usize) -> &mut Self {
        self.pack_size = pack_size;
        self
    }

    pub fn in_group(&mut self, group: impl Into<String>) -> &mut Self {
        let group = group.into();
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }
}

/// The set of field requests issued by a single process.
///
/// Requests may only be added while the process is setting its grids. Once
/// [`finalize`](FieldRequestRegistry::finalize) is called the set is frozen
/// and exposed to the binding layer.
///
/// A field name may appear at most once per process: a field that is both
/// read and written is requested as [`RequestKind::Updated`], never as a
/// pair of Required and Computed requests.
#[derive(Debug, Clone)]
pub struct FieldRequestRegistry {
    process: String,
    requests: Vec<FieldRequest>,
    finalized: bool,
}

impl FieldRequestRegistry {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            requests: vec![],
            finalized: false,
        }
    }

    /// Append a request.
    ///
    /// Returns the stored request so group and pack size can be chained.
    pub fn add_field(
        &mut self,
        kind: RequestKind,
        name: &str,
        layout: &FieldLayout,
        units: &Units,
        grid_name: &str,
    ) -> AtmResult<&mut FieldRequest> {
        if self.finalized {
            return Err(AtmError::InvalidLifecycle {
                process: self.process.clone(),
                operation: format!("add {kind} field '{name}' to"),
                state: "with finalized field requests".to_string(),
            });
        }
        if self.find(name).is_some() {
            return Err(AtmError::DuplicateRequest {
                field: name.to_string(),
                process: self.process.clone(),
            });
        }

        let identifier = FieldIdentifier::new(name, layout.clone(), units.clone(), grid_name);
        let index = self.requests.len();
        self.requests.push(FieldRequest::new(identifier, kind));
        Ok(&mut self.requests[index])
    }

    pub fn add_required(
        &mut self,
        name: &str,
        layout: &FieldLayout,
        units: &Units,
        grid_name: &str,
    ) -> AtmResult<&mut FieldRequest> {
        self.add_field(RequestKind::Required, name, layout, units, grid_name)
    }

    pub fn add_computed(
        &mut self,
        name: &str,
        layout: &FieldLayout,
        units: &Units,
        grid_name: &str,
    ) -> AtmResult<&mut FieldRequest> {
        self.add_field(RequestKind::Computed, name, layout, units, grid_name)
    }

    pub fn add_updated(
        &mut self,
        name: &str,
        layout: &FieldLayout,
        units: &Units,
        grid_name: &str,
    ) -> AtmResult<&mut FieldRequest> {
        self.add_field(RequestKind::Updated, name, layout, units, grid_name)
    }

    /// Freeze the request set.
    pub fn finalize(&mut self) {
        self.finalized = true;
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn process_name(&self) -> &str {
        &self.process
    }

    pub fn find(&self, name: &str) -> Option<&FieldRequest> {
        self.requests.iter().find(|r| r.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldRequest> {
        self.requests.iter()
    }

    pub fn of_kind(&self, kind: RequestKind) -> Vec<&FieldRequest> {
        self.requests.iter().filter(|r| r.kind == kind).collect()
    }

    pub fn get_required_field_requests(&self) -> Vec<&FieldRequest> {
        self.of_kind(RequestKind::Required)
    }

    pub fn get_computed_field_requests(&self) -> Vec<&FieldRequest> {
        self.of_kind(RequestKind::Computed)
    }

    pub fn get_updated_field_requests(&self) -> Vec<&FieldRequest> {
        self.of_kind(RequestKind::Updated)
    }

    /// True if a request of `kind` with exactly this identifier exists.
    pub fn has_field(&self, kind: RequestKind, identifier: &FieldIdentifier) -> bool {
        self.requests
            .iter()
            .any(|r| r.kind == kind && &r.identifier == identifier)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::layout::tags::{COL, LEV};

    fn layout() -> FieldLayout {
        FieldLayout::new(&[COL, LEV], &[3, 1]).unwrap()
    }

    #[test]
    fn test_requests_are_split_by_kind() {
        let nondim = Units::nondimensional();
        let mut registry = FieldRequestRegistry::new("cld_fraction");
        registry
            .add_required("qi", &layout(), &nondim, "Physics")
            .unwrap()
            .in_group("tracers")
            .with_pack_size(16);
        registry
            .add_required("cldfrac_liq", &layout(), &nondim, "Physics")
            .unwrap();
        registry
            .add_computed("cldfrac_tot", &layout(), &nondim, "Physics")
            .unwrap();
        registry.finalize();

        let required: Vec<&str> = registry
            .get_required_field_requests()
            .iter()
            .map(|r| r.name())
            .collect();
        assert_eq!(required, ["qi", "cldfrac_liq"]);
        assert_eq!(registry.get_computed_field_requests().len(), 1);
        assert!(registry.get_updated_field_requests().is_empty());

        let qi = registry.find("qi").unwrap();
        assert_eq!(qi.pack_size, 16);
        assert_eq!(qi.groups, ["tracers"]);
        assert!(registry.has_field(RequestKind::Required, &qi.identifier));
        assert!(!registry.has_field(RequestKind::Computed, &qi.identifier));
    }

    #[test]
    fn test_duplicate_names_are_rejected_across_kinds() {
        let mut registry = FieldRequestRegistry::new("p3");
        registry
            .add_required("T_mid", &layout(), &Units::K, "Physics")
            .unwrap();
        let err = registry
            .add_computed("T_mid", &layout(), &Units::K, "Physics")
            .unwrap_err();
        assert!(matches!(err, AtmError::DuplicateRequest { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_no_requests_after_finalize() {
        let mut registry = FieldRequestRegistry::new("p3");
        registry.finalize();
        let err = registry
            .add_updated("qv", &layout(), &Units::nondimensional(), "Physics")
            .unwrap_err();
        assert!(matches!(err, AtmError::InvalidLifecycle { .. }));
    }
}
