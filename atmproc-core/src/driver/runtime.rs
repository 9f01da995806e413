use super::ordering::ProcessGraph;
use super::{CheckFailurePolicy, EXTERNAL_PROVIDER, INITIAL_CONDITIONS_PROVIDER};
use crate::errors::{AtmError, AtmResult};
use crate::field::{Field, Real};
use crate::field_manager::FieldManager;
use crate::grid::GridsManager;
use crate::io::InitialConditions;
use crate::process::{ManagedProcess, RunType};
use crate::time::TimeStamp;
use petgraph::dot::Dot;
use std::fmt;
use std::sync::Arc;

/// A set of processes bound to shared fields, in execution order.
///
/// Built by [`DriverBuilder`](super::DriverBuilder).
pub struct AtmosphereDriver {
    grids_manager: Arc<dyn GridsManager>,
    processes: Vec<ManagedProcess>,
    field_manager: FieldManager,
    graph: ProcessGraph,
    external_fields: Vec<String>,
    initial_conditions: Option<InitialConditions>,
    check_failure_policy: CheckFailurePolicy,
    time_stamp: Option<TimeStamp>,
    num_steps: usize,
    tolerated_violations: Vec<AtmError>,
    aborted: bool,
    finalized: bool,
}

impl AtmosphereDriver {
    pub(crate) fn new(
        grids_manager: Arc<dyn GridsManager>,
        processes: Vec<ManagedProcess>,
        field_manager: FieldManager,
        graph: ProcessGraph,
        external_fields: Vec<String>,
        initial_conditions: Option<InitialConditions>,
        check_failure_policy: CheckFailurePolicy,
    ) -> Self {
        Self {
            grids_manager,
            processes,
            field_manager,
            graph,
            external_fields,
            initial_conditions,
            check_failure_policy,
            time_stamp: None,
            num_steps: 0,
            tolerated_violations: vec![],
            aborted: false,
            finalized: false,
        }
    }

    fn lifecycle_error(&self, operation: &str, state: &str) -> AtmError {
        AtmError::InvalidLifecycle {
            process: "atmosphere driver".to_string(),
            operation: operation.to_string(),
            state: state.to_string(),
        }
    }

    /// Fill fields from the initial conditions and initialize every process.
    ///
    /// Externally sourced fields are stamped with `t0`.
    pub fn initialize(&mut self, t0: TimeStamp, run_type: RunType) -> AtmResult<()> {
        if self.time_stamp.is_some() || self.finalized {
            return Err(self.lifecycle_error("initialize", "after initialization"));
        }

        if let Some(ic) = &self.initial_conditions {
            let ic_fields: Vec<&Field<Real>> = self
                .field_manager
                .fields()
                .filter(|f| f.is_provider(INITIAL_CONDITIONS_PROVIDER))
                .collect();
            let report = ic.apply(ic_fields, INITIAL_CONDITIONS_PROVIDER)?;
            log::info!(
                "Initial conditions provided [{}]",
                report.present.join(", ")
            );
        }
        for name in &self.external_fields {
            self.field_manager.get_field(name)?.update_time_stamp(t0)?;
        }

        for process in &mut self.processes {
            process.initialize(t0, run_type)?;
        }
        self.time_stamp = Some(t0);
        Ok(())
    }

    /// Copy values for an external input field, in row-major logical order.
    pub fn set_external_input(&self, name: &str, values: &[Real]) -> AtmResult<()> {
        let field = self.field_manager.get_field(name)?;
        if !field.is_provider(EXTERNAL_PROVIDER) {
            return Err(AtmError::AccessViolation {
                field: name.to_string(),
                reason: "the field is not declared as an external input".to_string(),
            });
        }
        field.copy_from_logical(values, EXTERNAL_PROVIDER)?;
        if let Some(t) = self.time_stamp {
            field.update_time_stamp(t)?;
        }
        Ok(())
    }

    /// Run every process once, in order.
    ///
    /// Postcondition violations either abort the step or, under
    /// [`CheckFailurePolicy::Warn`], are logged and kept in
    /// [`tolerated_violations`](AtmosphereDriver::tolerated_violations).
    ///
    /// Processes that ran before an aborting error have already advanced
    /// their clocks, so after an abort the driver refuses further steps.
    pub fn run(&mut self, dt: f64) -> AtmResult<()> {
        let Some(t) = self.time_stamp else {
            return Err(self.lifecycle_error("run", "before initialization"));
        };
        if self.finalized {
            return Err(self.lifecycle_error("run", "Finalized"));
        }
        if self.aborted {
            return Err(
                self.lifecycle_error("run", &format!("after the step starting at {t} aborted"))
            );
        }
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(AtmError::InvalidTimestep {
                process: "atmosphere driver".to_string(),
                dt,
            });
        }

        for process in &mut self.processes {
            match process.run(dt) {
                Ok(()) => {}
                Err(err @ AtmError::PostconditionViolation { .. })
                    if self.check_failure_policy == CheckFailurePolicy::Warn =>
                {
                    log::warn!("{err}");
                    self.tolerated_violations.push(err);
                }
                Err(err) => {
                    log::error!("Step starting at {t} failed: {err}");
                    self.aborted = true;
                    return Err(err);
                }
            }
        }

        self.time_stamp = Some(t + dt);
        self.num_steps += 1;
        Ok(())
    }

    pub fn finalize(&mut self) -> AtmResult<()> {
        if self.finalized {
            return Ok(());
        }
        for process in &mut self.processes {
            process.finalize()?;
        }
        self.finalized = true;
        log::info!("Atmosphere driver finalized after {} steps", self.num_steps);
        Ok(())
    }

    pub fn grids_manager(&self) -> &dyn GridsManager {
        self.grids_manager.as_ref()
    }

    pub fn field_manager(&self) -> &FieldManager {
        &self.field_manager
    }

    pub fn get_field(&self, name: &str) -> AtmResult<&Field<Real>> {
        self.field_manager.get_field(name)
    }

    /// Names of the processes in execution order.
    pub fn process_names(&self) -> Vec<&str> {
        self.processes.iter().map(|p| p.name()).collect()
    }

    pub fn get_process(&self, name: &str) -> Option<&ManagedProcess> {
        self.processes.iter().find(|p| p.name() == name)
    }

    /// Fields not written by any process.
    pub fn external_fields(&self) -> &[String] {
        &self.external_fields
    }

    pub fn time_stamp(&self) -> Option<TimeStamp> {
        self.time_stamp
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn check_failure_policy(&self) -> CheckFailurePolicy {
        self.check_failure_policy
    }

    pub fn tolerated_violations(&self) -> &[AtmError] {
        &self.tolerated_violations
    }

    /// Whether a step failed under [`CheckFailurePolicy::Abort`].
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The process dependency graph in graphviz format.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &ProcessGraph> {
        Dot::with_config(&self.graph, &[])
    }
}

impl fmt::Debug for AtmosphereDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtmosphereDriver")
            .field("processes", &self.process_names())
            .field("num_fields", &self.field_manager.len())
            .field("time_stamp", &self.time_stamp)
            .field("num_steps", &self.num_steps)
            .finish()
    }
}
