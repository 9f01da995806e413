use crate::errors::{AtmError, AtmResult};
use crate::field::{ConstField, Field, FieldReadGuard, FieldWriteGuard, Real};
use std::collections::BTreeMap;

/// The fields bound to one process.
///
/// Inputs are the Required and Updated fields, held as read-only handles.
/// Outputs are the Computed and Updated fields. An Updated field appears in
/// both maps and aliases the same storage, so kernels should read and write
/// it through a single [`view_out`](ProcessFields::view_out) guard; holding a
/// read guard and a write guard of the same field at once blocks.
#[derive(Debug, Default)]
pub struct ProcessFields {
    process: String,
    inputs: BTreeMap<String, ConstField<Real>>,
    outputs: BTreeMap<String, Field<Real>>,
}

impl ProcessFields {
    pub fn new(process: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub(crate) fn insert_input(&mut self, field: ConstField<Real>) {
        self.inputs.insert(field.name().to_string(), field);
    }

    pub(crate) fn insert_output(&mut self, field: Field<Real>) {
        self.outputs.insert(field.name().to_string(), field);
    }

    pub fn process_name(&self) -> &str {
        &self.process
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    pub fn input_names(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Field<Real>> {
        self.outputs.values()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
            + self
                .outputs
                .keys()
                .filter(|k| !self.inputs.contains_key(*k))
                .count()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// Read-only handle to an input field.
    pub fn get_field_in(&self, name: &str) -> AtmResult<&ConstField<Real>> {
        match self.inputs.get(name) {
            Some(field) => Ok(field),
            None if self.outputs.contains_key(name) => Err(AtmError::AccessViolation {
                field: name.to_string(),
                reason: format!(
                    "process '{}' computes this field and may not read it as an input",
                    self.process
                ),
            }),
            None => Err(self.not_found(name)),
        }
    }

    /// Read-write handle to an output field.
    pub fn get_field_out(&self, name: &str) -> AtmResult<&Field<Real>> {
        match self.outputs.get(name) {
            Some(field) => Ok(field),
            None if self.inputs.contains_key(name) => Err(AtmError::AccessViolation {
                field: name.to_string(),
                reason: format!(
                    "process '{}' only requires this field and may not write it",
                    self.process
                ),
            }),
            None => Err(self.not_found(name)),
        }
    }

    pub fn view_in(&self, name: &str) -> AtmResult<FieldReadGuard<'_, Real>> {
        Ok(self.get_field_in(name)?.get_view())
    }

    pub fn view_out(&self, name: &str) -> AtmResult<FieldWriteGuard<'_, Real>> {
        self.get_field_out(name)?.get_view_mut(&self.process)
    }

    fn not_found(&self, name: &str) -> AtmError {
        AtmError::FieldNotFound {
            field: name.to_string(),
            context: format!("the fields bound to process '{}'", self.process),
        }
    }
}
