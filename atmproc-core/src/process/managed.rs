use super::{AtmosphereProcess, InitializeContext, ProcessFields, ProcessState, RunType};
use crate::buffer::ScratchBuffer;
use crate::errors::{AtmError, AtmResult};
use crate::field::{
    ConstField, Field, FieldIdentifier, FieldRequest, FieldRequestRegistry, Real, RequestKind,
};
use crate::grid::GridsManager;
use crate::property_check::{PropertyCheck, PropertyCheckList};
use crate::time::TimeStamp;
use std::fmt;

/// A process together with its lifecycle state.
///
/// Every public method checks that it is called in a state where it is
/// legal, validates its arguments and only then forwards to the process's
/// hook. The generic parameter lets tests keep the concrete process type;
/// drivers hold `ManagedProcess<dyn AtmosphereProcess>`.
pub struct ManagedProcess<P: AtmosphereProcess + ?Sized = dyn AtmosphereProcess> {
    name: String,
    state: ProcessState,
    requests: FieldRequestRegistry,
    fields: ProcessFields,
    checks: PropertyCheckList,
    pending_checks: Vec<(String, Box<dyn PropertyCheck>)>,
    buffers_initialized: bool,
    time_stamp: Option<TimeStamp>,
    num_steps: usize,
    process: Box<P>,
}

impl<P: AtmosphereProcess> ManagedProcess<P> {
    pub fn new(process: P) -> Self {
        Self::from_boxed(Box::new(process))
    }

    /// Erase the concrete process type.
    pub fn into_dyn(self) -> ManagedProcess
    where
        P: 'static,
    {
        ManagedProcess {
            name: self.name,
            state: self.state,
            requests: self.requests,
            fields: self.fields,
            checks: self.checks,
            pending_checks: self.pending_checks,
            buffers_initialized: self.buffers_initialized,
            time_stamp: self.time_stamp,
            num_steps: self.num_steps,
            process: self.process,
        }
    }
}

impl<P: AtmosphereProcess + ?Sized> ManagedProcess<P> {
    pub fn from_boxed(process: Box<P>) -> Self {
        let name = process.name().to_string();
        Self {
            requests: FieldRequestRegistry::new(name.clone()),
            fields: ProcessFields::new(name.clone()),
            name,
            state: ProcessState::Constructed,
            checks: PropertyCheckList::new(),
            pending_checks: vec![],
            buffers_initialized: false,
            time_stamp: None,
            num_steps: 0,
            process,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn requests(&self) -> &FieldRequestRegistry {
        &self.requests
    }

    pub fn fields(&self) -> &ProcessFields {
        &self.fields
    }

    pub fn checks(&self) -> &PropertyCheckList {
        &self.checks
    }

    /// Time at the end of the last completed step.
    pub fn time_stamp(&self) -> Option<TimeStamp> {
        self.time_stamp
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn buffers_initialized(&self) -> bool {
        self.buffers_initialized
    }

    fn lifecycle_error(&self, operation: &str) -> AtmError {
        let mut state = self.state.to_string();
        if self.state == ProcessState::FieldsBound && !self.buffers_initialized {
            state.push_str(" (scratch buffers not initialized)");
        }
        AtmError::InvalidLifecycle {
            process: self.name.clone(),
            operation: operation.to_string(),
            state,
        }
    }

    /// Let the process pick its grids and declare its field requests.
    ///
    /// May only be called once.
    pub fn set_grids(&mut self, grids_manager: &dyn GridsManager) -> AtmResult<()> {
        if self.state != ProcessState::Constructed {
            return Err(self.lifecycle_error("set grids of"));
        }
        self.process.set_grids(grids_manager, &mut self.requests)?;
        self.requests.finalize();
        self.state = ProcessState::GridsSet;
        log::info!(
            "Process '{}' requested {} fields",
            self.name,
            self.requests.len()
        );
        self.update_bound_state();
        Ok(())
    }

    fn find_request(&self, name: &str, expected: &[RequestKind]) -> AtmResult<&FieldRequest> {
        let request = self
            .requests
            .find(name)
            .ok_or_else(|| AtmError::FieldNotFound {
                field: name.to_string(),
                context: format!("the field requests of process '{}'", self.name),
            })?;
        if !expected.contains(&request.kind) {
            return Err(AtmError::IncompatibleField {
                field: name.to_string(),
                process: self.name.clone(),
                reason: format!("the field was requested as {}", request.kind),
            });
        }
        Ok(request)
    }

    /// Check identifier and allocation of a field against the request.
    fn validate_binding(
        &self,
        request: &FieldRequest,
        identifier: &FieldIdentifier,
        last_dim_alloc: usize,
    ) -> AtmResult<()> {
        if let Some(reason) = request.identifier.mismatch(identifier) {
            return Err(AtmError::IncompatibleField {
                field: identifier.name().to_string(),
                process: self.name.clone(),
                reason,
            });
        }
        if last_dim_alloc % request.pack_size != 0 {
            return Err(AtmError::IncompatibleField {
                field: identifier.name().to_string(),
                process: self.name.clone(),
                reason: format!(
                    "allocated extent {} of the last dimension is not a multiple of the requested pack size {}",
                    last_dim_alloc, request.pack_size
                ),
            });
        }
        Ok(())
    }

    fn ensure_binding_open(&self, name: &str) -> AtmResult<()> {
        if self.state != ProcessState::GridsSet {
            return Err(self.lifecycle_error(&format!("bind field '{name}' to")));
        }
        if self.fields.has_input(name) || self.fields.has_output(name) {
            return Err(AtmError::IncompatibleField {
                field: name.to_string(),
                process: self.name.clone(),
                reason: "the field is already bound".to_string(),
            });
        }
        Ok(())
    }

    /// Bind a Required field.
    ///
    /// The field must already have a provider other than this process. The
    /// process is registered as a customer.
    pub fn set_required_field(&mut self, field: ConstField<Real>) -> AtmResult<()> {
        self.ensure_binding_open(field.name())?;
        let request = self.find_request(field.name(), &[RequestKind::Required])?;
        self.validate_binding(
            request,
            field.identifier(),
            field.allocation().last_dim_alloc(),
        )?;
        {
            let tracking = field.tracking();
            if tracking.providers().is_empty() {
                return Err(AtmError::UnresolvedDependency {
                    field: field.name().to_string(),
                    process: self.name.clone(),
                });
            }
            if tracking.is_provider(&self.name) {
                return Err(AtmError::IncompatibleField {
                    field: field.name().to_string(),
                    process: self.name.clone(),
                    reason: "a process may not provide a field it requires, request it as Updated"
                        .to_string(),
                });
            }
        }
        self.process.set_required_field_impl(&field)?;
        field.add_customer(&self.name);
        log::debug!("Process '{}' reads '{}'", self.name, field.identifier());
        self.fields.insert_input(field);
        self.update_bound_state();
        Ok(())
    }

    /// Bind a Computed field. The process is registered as its provider.
    pub fn set_computed_field(&mut self, field: Field<Real>) -> AtmResult<()> {
        self.ensure_binding_open(field.name())?;
        let request = self.find_request(field.name(), &[RequestKind::Computed])?;
        self.validate_binding(
            request,
            field.identifier(),
            field.allocation().last_dim_alloc(),
        )?;
        self.process.set_computed_field_impl(&field)?;
        field.add_provider(&self.name);
        log::debug!("Process '{}' computes '{}'", self.name, field.identifier());
        self.fields.insert_output(field);
        self.update_bound_state();
        Ok(())
    }

    /// Bind an Updated field. The process becomes provider and customer.
    pub fn set_updated_field(&mut self, field: Field<Real>) -> AtmResult<()> {
        self.ensure_binding_open(field.name())?;
        let request = self.find_request(field.name(), &[RequestKind::Updated])?;
        self.validate_binding(
            request,
            field.identifier(),
            field.allocation().last_dim_alloc(),
        )?;
        self.process.set_updated_field_impl(&field)?;
        field.add_provider(&self.name);
        field.add_customer(&self.name);
        log::debug!("Process '{}' updates '{}'", self.name, field.identifier());
        self.fields.insert_input(field.get_const());
        self.fields.insert_output(field);
        self.update_bound_state();
        Ok(())
    }

    /// Bind a field according to the kind it was requested as.
    pub fn set_field(&mut self, field: &Field<Real>) -> AtmResult<()> {
        let kind = self
            .find_request(
                field.name(),
                &[
                    RequestKind::Required,
                    RequestKind::Computed,
                    RequestKind::Updated,
                ],
            )?
            .kind;
        match kind {
            RequestKind::Required => self.set_required_field(field.get_const()),
            RequestKind::Computed => self.set_computed_field(field.clone()),
            RequestKind::Updated => self.set_updated_field(field.clone()),
        }
    }

    fn update_bound_state(&mut self) {
        if self.state != ProcessState::GridsSet {
            return;
        }
        let all_bound = self
            .requests
            .iter()
            .all(|r| self.fields.has_input(r.name()) || self.fields.has_output(r.name()));
        if all_bound {
            self.state = ProcessState::FieldsBound;
            log::debug!("All fields of process '{}' are bound", self.name);
        }
    }

    /// Names of requested fields that are not bound yet.
    pub fn unbound_fields(&self) -> Vec<&str> {
        self.requests
            .iter()
            .filter(|r| !self.fields.has_input(r.name()) && !self.fields.has_output(r.name()))
            .map(|r| r.name())
            .collect()
    }

    pub fn requested_buffer_size_in_bytes(&self) -> AtmResult<usize> {
        if self.state < ProcessState::GridsSet {
            return Err(self.lifecycle_error("query the scratch size of"));
        }
        Ok(self.process.requested_buffer_size_in_bytes())
    }

    /// Hand the process its scratch buffer.
    pub fn init_buffers(&mut self, buffer: ScratchBuffer) -> AtmResult<()> {
        if self.state != ProcessState::FieldsBound || self.buffers_initialized {
            return Err(self.lifecycle_error("initialize the buffers of"));
        }
        let requested = self.process.requested_buffer_size_in_bytes();
        if buffer.size_in_bytes() < requested {
            return Err(AtmError::BufferTooSmall {
                process: self.name.clone(),
                requested,
                provided: buffer.size_in_bytes(),
            });
        }
        self.process.init_buffers(buffer)?;
        self.buffers_initialized = true;
        log::debug!(
            "Process '{}' received {} bytes of scratch memory",
            self.name,
            requested
        );
        Ok(())
    }

    /// Queue a check on one of the process's output fields.
    ///
    /// Checks added before `initialize` run after the process's own checks.
    pub fn add_postcondition_check(
        &mut self,
        field_name: &str,
        check: Box<dyn PropertyCheck>,
    ) -> AtmResult<()> {
        match self.state {
            ProcessState::Initialized | ProcessState::Running => {
                let field = self.fields.get_field_out(field_name)?;
                self.checks.add_boxed(field.get_const(), check);
            }
            ProcessState::Finalized => {
                return Err(self.lifecycle_error("add a check to"));
            }
            _ => self.pending_checks.push((field_name.to_string(), check)),
        }
        Ok(())
    }

    pub fn initialize(&mut self, t0: TimeStamp, run_type: RunType) -> AtmResult<()> {
        if self.state != ProcessState::FieldsBound || !self.buffers_initialized {
            return Err(self.lifecycle_error("initialize"));
        }
        self.process.initialize_impl(InitializeContext {
            fields: &self.fields,
            checks: &mut self.checks,
            t0,
            run_type,
        })?;
        for (field_name, check) in std::mem::take(&mut self.pending_checks) {
            let field = self.fields.get_field_out(&field_name)?;
            self.checks.add_boxed(field.get_const(), check);
        }
        self.time_stamp = Some(t0);
        self.state = ProcessState::Initialized;
        log::info!(
            "Initialized process '{}' at {} with {} postcondition checks",
            self.name,
            t0,
            self.checks.len()
        );
        Ok(())
    }

    /// Step the process forward by `dt` seconds.
    ///
    /// The outputs are written and time stamped before the postcondition
    /// checks run, so a [`AtmError::PostconditionViolation`] leaves the
    /// process ready for the next step and the caller decides whether to
    /// continue.
    pub fn run(&mut self, dt: f64) -> AtmResult<()> {
        let t = match (self.state, self.time_stamp) {
            (ProcessState::Initialized | ProcessState::Running, Some(t)) => t,
            _ => return Err(self.lifecycle_error("run")),
        };
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(AtmError::InvalidTimestep {
                process: self.name.clone(),
                dt,
            });
        }
        self.state = ProcessState::Running;
        log::debug!("Running process '{}' from {} with dt={}", self.name, t, dt);

        self.process.run_impl(&self.fields, dt)?;

        let t_end = t + dt;
        for field in self.fields.outputs() {
            field.update_time_stamp(t_end)?;
        }
        self.time_stamp = Some(t_end);
        self.num_steps += 1;

        self.checks.run_all(&self.name)
    }

    /// Release the process's resources. Calling this more than once is a no-op.
    pub fn finalize(&mut self) -> AtmResult<()> {
        if self.state == ProcessState::Finalized {
            return Ok(());
        }
        self.process.finalize_impl()?;
        self.state = ProcessState::Finalized;
        log::info!(
            "Finalized process '{}' after {} steps",
            self.name,
            self.num_steps
        );
        Ok(())
    }
}

impl<P: AtmosphereProcess + ?Sized> fmt::Debug for ManagedProcess<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("num_steps", &self.num_steps)
            .field("process", &self.process)
            .finish()
    }
}
