use thiserror::Error;

/// Error type for the atmosphere process framework.
///
/// Setup-time errors abort process construction and field binding,
/// run-time errors abort the current step and are surfaced to the driver,
/// and the remaining variants flag framework misuse (bad wiring).
#[derive(Error, Debug)]
pub enum AtmError {
    #[error("Invalid field layout: {0}")]
    InvalidLayout(String),
    #[error("Unresolved dependency: field '{field}' required by process '{process}' has no provider")]
    UnresolvedDependency { field: String, process: String },
    #[error("Incompatible field '{field}' for process '{process}': {reason}")]
    IncompatibleField {
        field: String,
        process: String,
        reason: String,
    },
    #[error("Access violation on field '{field}': {reason}")]
    AccessViolation { field: String, reason: String },
    #[error("Non-monotonic time stamp for field '{field}': current time is {current}, requested {requested}")]
    NonMonotonicTime {
        field: String,
        current: String,
        requested: String,
    },
    #[error("Invalid timestep for process '{process}': dt = {dt}, the timestep must be positive")]
    InvalidTimestep { process: String, dt: f64 },
    #[error("Postcondition violation in process '{process}' for field '{field}': check '{check}' failed. {details}")]
    PostconditionViolation {
        process: String,
        field: String,
        check: String,
        details: String,
    },
    #[error("Cannot {operation} process '{process}' in state {state}")]
    InvalidLifecycle {
        process: String,
        operation: String,
        state: String,
    },
    #[error("Field '{field}' was requested more than once by process '{process}'")]
    DuplicateRequest { field: String, process: String },
    #[error("Scratch buffer for process '{process}' is too small: requested {requested} bytes, provided {provided} bytes")]
    BufferTooSmall {
        process: String,
        requested: usize,
        provided: usize,
    },
    #[error("Cyclic dependency between processes: {0}")]
    CyclicDependency(String),
    #[error("Field '{field}' not found in {context}")]
    FieldNotFound { field: String, context: String },
    #[error("Grid '{0}' is not registered with the grids manager")]
    GridNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid time stamp '{0}', expected YYYY-MM-DD-SSSSS")]
    InvalidTimeStamp(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to parse {0}")]
    Parse(String),
}

impl AtmError {
    /// Errors raised while constructing processes or binding fields.
    ///
    /// No process may run once one of these has been raised during setup.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            AtmError::InvalidLayout(_)
                | AtmError::UnresolvedDependency { .. }
                | AtmError::IncompatibleField { .. }
                | AtmError::DuplicateRequest { .. }
                | AtmError::CyclicDependency(_)
                | AtmError::InvalidConfiguration(_)
                | AtmError::GridNotFound(_)
        )
    }

    /// Errors that abort a single step and are handed to the driver's policy.
    pub fn is_runtime_error(&self) -> bool {
        matches!(
            self,
            AtmError::InvalidTimestep { .. } | AtmError::PostconditionViolation { .. }
        )
    }

    /// Errors that indicate wrong use of the framework rather than bad data.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            AtmError::AccessViolation { .. }
                | AtmError::NonMonotonicTime { .. }
                | AtmError::InvalidLifecycle { .. }
                | AtmError::BufferTooSmall { .. }
        )
    }
}

/// Convenience type for `Result<T, AtmError>`.
pub type AtmResult<T> = Result<T, AtmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let err = AtmError::InvalidTimestep {
            process: "p3".to_string(),
            dt: 0.0,
        };
        assert!(err.is_runtime_error());
        assert!(!err.is_setup_error());

        let err = AtmError::UnresolvedDependency {
            field: "qi".to_string(),
            process: "cld_fraction".to_string(),
        };
        assert!(err.is_setup_error());

        let err = AtmError::AccessViolation {
            field: "T_mid".to_string(),
            reason: "not a provider".to_string(),
        };
        assert!(err.is_programming_error());
    }

    #[test]
    fn messages_name_the_field_and_process() {
        let err = AtmError::PostconditionViolation {
            process: "cld_fraction".to_string(),
            field: "cldfrac_tot".to_string(),
            check: "within interval [0, 1]".to_string(),
            details: "value 1.5 at (0, 0)".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("cld_fraction"));
        assert!(msg.contains("cldfrac_tot"));
        assert!(msg.contains("[0, 1]"));
    }
}
