//! The atmosphere driver sequences a set of processes over shared fields.
//!
//! Building a driver performs the whole setup phase:
//!
//! 1. every process sets its grids and declares its field requests,
//! 2. the field manager creates one field per requested name,
//! 3. every field that is read must have a writer, either a process that
//!    computes it or an external source (initial conditions or a declared
//!    external input), otherwise the build fails with
//!    [`AtmError::UnresolvedDependency`](crate::errors::AtmError::UnresolvedDependency),
//! 4. processes are ordered so that, for every field, the process computing it
//!    runs first, then the processes updating it, then its readers,
//! 5. fields are bound and scratch buffers handed out.
//!
//! A built driver is then initialized, stepped with [`AtmosphereDriver::run`]
//! and finalized.

mod builder;
mod config;
mod ordering;
mod runtime;

pub use builder::DriverBuilder;
pub use config::{
    CheckConfig, DriverConfig, GridConfig, ProcessConfig, ProcessConstructor, ProcessFactory,
};
pub use runtime::AtmosphereDriver;

use serde::{Deserialize, Serialize};

/// Provider name for fields filled from the initial condition set.
pub const INITIAL_CONDITIONS_PROVIDER: &str = "initial_conditions";

/// Provider name for fields set by the host model through the driver.
pub const EXTERNAL_PROVIDER: &str = "external";

/// What the driver does when a postcondition check fails during `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckFailurePolicy {
    /// Stop the step and return the violation.
    #[default]
    Abort,
    /// Log the violation and carry on with the next process.
    Warn,
}
