//! Drive a single process through its lifecycle.
//!
//! The harness plays the role of the driver for one process: it creates a
//! field for every request, provides the process's inputs and moves it
//! through `initialize -> run(dt)*`. Only the lifecycle operations of
//! [`ManagedProcess`] are used, so the process sees exactly what it would
//! see under an [`AtmosphereDriver`](atmproc_core::driver::AtmosphereDriver).
//!
//! ```ignore
//! let mut harness = ProcessHarness::new(CldFraction::new(comm, params), grids)?;
//! harness.create_fields()?;
//! harness.set_fields()?;
//! harness.initialize("2000-01-01-00000")?;
//! let missing = harness.read_ic("ic.toml")?;
//! harness.run(1800.0)?;
//! let tot = harness.get_arr("cldfrac_tot")?;
//! ```

use atmproc_core::buffer::BufferManager;
use atmproc_core::errors::{AtmError, AtmResult};
use atmproc_core::field::{Field, Real, RequestKind};
use atmproc_core::grid::GridsManager;
use atmproc_core::io::InitialConditions;
use atmproc_core::process::{AtmosphereProcess, ManagedProcess, RunType};
use atmproc_core::time::TimeStamp;
use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Provider name the harness uses for the inputs it writes
pub const HARNESS_PROVIDER: &str = "harness";

#[derive(Debug)]
pub struct ProcessHarness {
    grids_manager: Arc<dyn GridsManager>,
    process: ManagedProcess,
    fields: BTreeMap<String, Field<Real>>,
    time_stamp: Option<TimeStamp>,
}

impl ProcessHarness {
    /// Wrap a process and set its grids.
    pub fn new(
        process: impl AtmosphereProcess + 'static,
        grids_manager: Arc<dyn GridsManager>,
    ) -> AtmResult<Self> {
        Self::from_boxed(Box::new(process), grids_manager)
    }

    pub fn from_boxed(
        process: Box<dyn AtmosphereProcess>,
        grids_manager: Arc<dyn GridsManager>,
    ) -> AtmResult<Self> {
        let mut process = ManagedProcess::from_boxed(process);
        process.set_grids(grids_manager.as_ref())?;
        Ok(Self {
            grids_manager,
            process,
            fields: BTreeMap::new(),
            time_stamp: None,
        })
    }

    /// Create one field per request, with the pack size the process asked for.
    pub fn create_fields(&mut self) -> AtmResult<()> {
        self.create_fields_impl(None)
    }

    /// Create one field per request, all padded to `pack_size`.
    pub fn create_fields_with_pack_size(&mut self, pack_size: usize) -> AtmResult<()> {
        self.create_fields_impl(Some(pack_size))
    }

    fn create_fields_impl(&mut self, pack_size: Option<usize>) -> AtmResult<()> {
        let mut fields = BTreeMap::new();
        for request in self.process.requests().iter() {
            let field = Field::new(
                request.identifier.clone(),
                pack_size.unwrap_or(request.pack_size),
            )?;
            for group in &request.groups {
                field.add_to_group(group);
            }
            if request.kind != RequestKind::Computed {
                field.add_provider(HARNESS_PROVIDER);
            }
            fields.insert(request.name().to_string(), field);
        }
        log::debug!(
            "Harness created {} fields for process '{}'",
            fields.len(),
            self.process.name()
        );
        self.fields = fields;
        Ok(())
    }

    /// Bind every created field to the process.
    pub fn set_fields(&mut self) -> AtmResult<()> {
        if self.fields.is_empty() && !self.process.requests().is_empty() {
            return Err(AtmError::InvalidLifecycle {
                process: self.process.name().to_string(),
                operation: "set fields of".to_string(),
                state: "before create_fields".to_string(),
            });
        }
        for field in self.fields.values() {
            self.process.set_field(field)?;
        }
        Ok(())
    }

    /// Allocate the scratch buffer and initialize the process at `t0`.
    ///
    /// Fields written by the harness are stamped with `t0`.
    pub fn initialize(&mut self, t0: &str) -> AtmResult<()> {
        let t0: TimeStamp = t0.parse()?;

        let mut buffers = BufferManager::new();
        let name = self.process.name().to_string();
        buffers.request_bytes(&name, self.process.requested_buffer_size_in_bytes()?)?;
        buffers.allocate();
        self.process.init_buffers(buffers.take_buffer(&name)?)?;

        for field in self.input_fields() {
            field.update_time_stamp(t0)?;
        }
        self.process.initialize(t0, RunType::Initial)?;
        self.time_stamp = Some(t0);
        Ok(())
    }

    /// Fill the process's inputs from an initial condition file.
    ///
    /// Returns the names of inputs the file has no values for.
    pub fn read_ic(&self, path: impl AsRef<Path>) -> AtmResult<Vec<String>> {
        let ic = InitialConditions::from_file(path)?;
        let report = ic.apply(self.input_fields(), HARNESS_PROVIDER)?;
        Ok(report.missing)
    }

    /// Advance the process by `dt` seconds.
    pub fn run(&mut self, dt: f64) -> AtmResult<()> {
        self.process.run(dt)?;
        self.time_stamp = self.process.time_stamp();
        Ok(())
    }

    pub fn finalize(&mut self) -> AtmResult<()> {
        self.process.finalize()
    }

    /// Copy of a field's logical values.
    pub fn get_arr(&self, name: &str) -> AtmResult<ArrayD<Real>> {
        Ok(self.get_field(name)?.get_view().to_owned_array())
    }

    /// Set an input field from logical values in row-major order.
    pub fn set_arr(&self, name: &str, values: &[Real]) -> AtmResult<()> {
        self.get_field(name)?
            .copy_from_logical(values, HARNESS_PROVIDER)
    }

    pub fn get_field(&self, name: &str) -> AtmResult<&Field<Real>> {
        self.fields.get(name).ok_or_else(|| AtmError::FieldNotFound {
            field: name.to_string(),
            context: format!(
                "the fields of process '{}' (available: [{}])",
                self.process.name(),
                self.field_names().join(", ")
            ),
        })
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn process(&self) -> &ManagedProcess {
        &self.process
    }

    pub fn grids_manager(&self) -> &dyn GridsManager {
        self.grids_manager.as_ref()
    }

    pub fn time_stamp(&self) -> Option<TimeStamp> {
        self.time_stamp
    }

    /// Fields the harness provides: Required and Updated.
    fn input_fields(&self) -> impl Iterator<Item = &Field<Real>> {
        self.fields
            .values()
            .filter(|f| f.is_provider(HARNESS_PROVIDER))
    }
}
