use super::ordering::{build_graph, execution_order, field_users};
use super::runtime::AtmosphereDriver;
use super::{CheckFailurePolicy, EXTERNAL_PROVIDER, INITIAL_CONDITIONS_PROVIDER};
use crate::buffer::BufferManager;
use crate::errors::{AtmError, AtmResult};
use crate::field::{FieldRequestRegistry, RequestKind};
use crate::field_manager::FieldManager;
use crate::grid::GridsManager;
use crate::io::InitialConditions;
use crate::process::{AtmosphereProcess, ManagedProcess};
use crate::property_check::PropertyCheck;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Assemble an [`AtmosphereDriver`] from processes and a grids manager.
///
/// ```ignore
/// let driver = DriverBuilder::new()
///     .with_grids_manager(Arc::new(grids))
///     .with_process(CldFraction::new(Comm::serial(), params))
///     .with_initial_conditions(ic)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct DriverBuilder {
    grids_manager: Option<Arc<dyn GridsManager>>,
    processes: Vec<ManagedProcess>,
    external_inputs: BTreeSet<String>,
    initial_conditions: Option<InitialConditions>,
    check_failure_policy: CheckFailurePolicy,
    extra_checks: Vec<(String, String, Box<dyn PropertyCheck>)>,
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self {
            grids_manager: None,
            processes: vec![],
            external_inputs: BTreeSet::new(),
            initial_conditions: None,
            check_failure_policy: CheckFailurePolicy::default(),
            extra_checks: vec![],
        }
    }

    pub fn with_grids_manager(&mut self, grids_manager: Arc<dyn GridsManager>) -> &mut Self {
        self.grids_manager = Some(grids_manager);
        self
    }

    /// Add a process. Declaration order breaks ties in the execution order.
    pub fn with_process(&mut self, process: impl AtmosphereProcess + 'static) -> &mut Self {
        self.with_boxed_process(Box::new(process))
    }

    pub fn with_boxed_process(&mut self, process: Box<dyn AtmosphereProcess>) -> &mut Self {
        self.processes.push(ManagedProcess::from_boxed(process));
        self
    }

    /// Declare a field the host model sets through
    /// [`AtmosphereDriver::set_external_input`].
    pub fn with_external_input(&mut self, name: impl Into<String>) -> &mut Self {
        self.external_inputs.insert(name.into());
        self
    }

    pub fn with_initial_conditions(&mut self, ic: InitialConditions) -> &mut Self {
        self.initial_conditions = Some(ic);
        self
    }

    pub fn with_check_failure_policy(&mut self, policy: CheckFailurePolicy) -> &mut Self {
        self.check_failure_policy = policy;
        self
    }

    /// Attach an extra postcondition check to a field computed by `process`.
    pub fn with_postcondition_check(
        &mut self,
        process: &str,
        field: &str,
        check: Box<dyn PropertyCheck>,
    ) -> &mut Self {
        self.extra_checks
            .push((process.to_string(), field.to_string(), check));
        self
    }

    /// Run the setup phase and produce a driver ready to be initialized.
    ///
    /// The builder's processes and checks are moved into the driver.
    pub fn build(&mut self) -> AtmResult<AtmosphereDriver> {
        let grids_manager = self.grids_manager.clone().ok_or_else(|| {
            AtmError::InvalidConfiguration("no grids manager was provided".to_string())
        })?;
        let mut processes = std::mem::take(&mut self.processes);

        let mut seen = BTreeSet::new();
        for process in &processes {
            if !seen.insert(process.name().to_string()) {
                return Err(AtmError::InvalidConfiguration(format!(
                    "more than one process is named '{}'",
                    process.name()
                )));
            }
            if [EXTERNAL_PROVIDER, INITIAL_CONDITIONS_PROVIDER].contains(&process.name()) {
                return Err(AtmError::InvalidConfiguration(format!(
                    "'{}' is reserved for external field sources",
                    process.name()
                )));
            }
        }

        for process in &mut processes {
            process.set_grids(grids_manager.as_ref())?;
        }

        let registries: Vec<&FieldRequestRegistry> =
            processes.iter().map(|p| p.requests()).collect();
        let mut field_manager = FieldManager::new();
        for registry in &registries {
            field_manager.register_requests(registry)?;
        }
        field_manager.allocate()?;

        let users = field_users(&registries);
        let names: Vec<&str> = processes.iter().map(|p| p.name()).collect();
        let graph = build_graph(&names, &users)?;
        let order = execution_order(&graph)?;

        // Every field that is read needs a writer
        let mut external_fields = vec![];
        for (name, users) in &users {
            if !users.needs_external_source() {
                continue;
            }
            let field = field_manager.get_field(name)?;
            let from_ic = self
                .initial_conditions
                .as_ref()
                .is_some_and(|ic| ic.has_var(name));
            if from_ic {
                field.add_provider(INITIAL_CONDITIONS_PROVIDER);
            } else if self.external_inputs.contains(name) {
                field.add_provider(EXTERNAL_PROVIDER);
            } else {
                let reader = users
                    .updated_by
                    .iter()
                    .chain(users.required_by.iter())
                    .map(|i| names[*i])
                    .next()
                    .unwrap_or("unknown");
                return Err(AtmError::UnresolvedDependency {
                    field: name.clone(),
                    process: reader.to_string(),
                });
            }
            external_fields.push(name.clone());
        }

        for name in &self.external_inputs {
            if !field_manager.has_field(name) {
                log::warn!("External input '{name}' is not requested by any process");
            }
        }

        let mut ordered: Vec<Option<ManagedProcess>> = processes.into_iter().map(Some).collect();
        let mut processes: Vec<ManagedProcess> = order
            .iter()
            .filter_map(|i| ordered[*i].take())
            .collect();
        log::info!(
            "Process execution order: [{}]",
            processes
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        // Writers are bound first so every Required field has its provider
        for kinds in [
            &[RequestKind::Computed, RequestKind::Updated][..],
            &[RequestKind::Required][..],
        ] {
            for process in &mut processes {
                let field_names: Vec<String> = process
                    .requests()
                    .iter()
                    .filter(|r| kinds.contains(&r.kind))
                    .map(|r| r.name().to_string())
                    .collect();
                for name in field_names {
                    process.set_field(field_manager.get_field(&name)?)?;
                }
            }
        }

        for (process_name, field, check) in std::mem::take(&mut self.extra_checks) {
            let process = processes
                .iter_mut()
                .find(|p| p.name() == process_name)
                .ok_or_else(|| {
                    AtmError::InvalidConfiguration(format!(
                        "postcondition check on '{field}' names unknown process '{process_name}'"
                    ))
                })?;
            if !process.fields().has_output(&field) {
                return Err(AtmError::FieldNotFound {
                    field,
                    context: format!("the outputs of process '{process_name}'"),
                });
            }
            process.add_postcondition_check(&field, check)?;
        }

        let mut buffers = BufferManager::new();
        for process in &processes {
            buffers.request_bytes(process.name(), process.requested_buffer_size_in_bytes()?)?;
        }
        buffers.allocate();
        for process in &mut processes {
            let buffer = buffers.take_buffer(process.name())?;
            process.init_buffers(buffer)?;
        }

        Ok(AtmosphereDriver::new(
            grids_manager,
            processes,
            field_manager,
            graph,
            external_fields,
            self.initial_conditions.take(),
            self.check_failure_policy,
        ))
    }
}
