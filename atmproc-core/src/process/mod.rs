//! The atmosphere process contract.
//!
//! A process is one physics parameterization. It declares the fields it
//! reads and writes, receives shared handles to them from a driver, and then
//! steps forward in time. Concrete processes implement [`AtmosphereProcess`],
//! a set of hooks. The lifecycle itself, the order in which hooks may be
//! called and the bookkeeping around them, lives in [`ManagedProcess`]:
//!
//! ```text
//! Constructed -> GridsSet -> FieldsBound -> Initialized -> Running -> Finalized
//! ```
//!
//! Concrete processes therefore never check their own state, and a driver
//! can not call a hook out of order.

mod fields;
mod managed;

pub use fields::ProcessFields;
pub use managed::ManagedProcess;

use crate::buffer::ScratchBuffer;
use crate::errors::{AtmError, AtmResult};
use crate::field::{ConstField, Field, FieldRequestRegistry, FieldValue, Real};
use crate::grid::GridsManager;
use crate::property_check::{PropertyCheck, PropertyCheckList};
use crate::time::TimeStamp;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Whether a simulation starts from initial conditions or a restart file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunType {
    Initial,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProcessState {
    Constructed,
    GridsSet,
    FieldsBound,
    Initialized,
    Running,
    Finalized,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Constructed => "Constructed",
            ProcessState::GridsSet => "GridsSet",
            ProcessState::FieldsBound => "FieldsBound",
            ProcessState::Initialized => "Initialized",
            ProcessState::Running => "Running",
            ProcessState::Finalized => "Finalized",
        };
        write!(f, "{name}")
    }
}

/// What a process may touch while initializing.
pub struct InitializeContext<'a> {
    pub fields: &'a ProcessFields,
    pub checks: &'a mut PropertyCheckList,
    pub t0: TimeStamp,
    pub run_type: RunType,
}

impl InitializeContext<'_> {
    /// Attach a post-condition check to one of the process's output fields.
    pub fn add_postcondition_check(
        &mut self,
        field_name: &str,
        check: impl PropertyCheck + 'static,
    ) -> AtmResult<()> {
        let field = self.fields.get_field_out(field_name)?;
        self.checks.add_postcondition_check(field.get_const(), check);
        Ok(())
    }
}

/// Hooks implemented by each physics parameterization.
///
/// Hooks with a default implementation are optional.
pub trait AtmosphereProcess: Debug + Send {
    /// Unique name of the process instance, used as its provider/customer id.
    fn name(&self) -> &str;

    /// Select grids, record local dimensions and declare field requests.
    ///
    /// Must not perform numerical work. Configuration is validated here.
    fn set_grids(
        &mut self,
        grids_manager: &dyn GridsManager,
        requests: &mut FieldRequestRegistry,
    ) -> AtmResult<()>;

    /// Called once per Required field after the framework has validated it.
    fn set_required_field_impl(&mut self, _field: &ConstField<Real>) -> AtmResult<()> {
        Ok(())
    }

    /// Called once per Computed field after the framework has validated it.
    fn set_computed_field_impl(&mut self, _field: &Field<Real>) -> AtmResult<()> {
        Ok(())
    }

    fn set_updated_field_impl(&mut self, field: &Field<Real>) -> AtmResult<()> {
        self.set_computed_field_impl(field)
    }

    /// Scratch memory needed by [`run_impl`](AtmosphereProcess::run_impl).
    ///
    /// A pure function of the dimensions known after `set_grids`.
    fn requested_buffer_size_in_bytes(&self) -> usize {
        0
    }

    /// Take ownership of the scratch buffer and carve it into work arrays.
    fn init_buffers(&mut self, _buffer: ScratchBuffer) -> AtmResult<()> {
        Ok(())
    }

    fn initialize_impl(&mut self, ctx: InitializeContext<'_>) -> AtmResult<()>;

    /// Advance the bound fields by `dt` seconds.
    ///
    /// Every Computed and Updated field is written exactly once.
    fn run_impl(&mut self, fields: &ProcessFields, dt: f64) -> AtmResult<()>;

    /// Release resources other than fields.
    fn finalize_impl(&mut self) -> AtmResult<()> {
        Ok(())
    }
}

/// Reject a field whose storage is padded.
///
/// For processes whose kernels index storage by logical extents only.
pub fn require_unpadded<T: FieldValue>(process: &str, field: &ConstField<T>) -> AtmResult<()> {
    if field.is_padded() {
        return Err(AtmError::IncompatibleField {
            field: field.name().to_string(),
            process: process.to_string(),
            reason: format!(
                "storage is padded to pack size {} ({} allocated for {} logical elements) but the process requires unpadded fields",
                field.pack_size(),
                field.allocation().alloc_size(),
                field.layout().size()
            ),
        });
    }
    Ok(())
}
