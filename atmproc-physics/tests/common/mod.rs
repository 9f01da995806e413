//! Drive a single process outside of a driver.
#![allow(dead_code)]

use atmproc_core::buffer::ScratchBuffer;
use atmproc_core::errors::AtmResult;
use atmproc_core::field::{Field, Real, RequestKind};
use atmproc_core::grid::LibraryGridsManager;
use atmproc_core::process::{AtmosphereProcess, ManagedProcess, RunType};
use atmproc_core::time::TimeStamp;
use atmproc_physics::PHYSICS_GRID;
use std::collections::BTreeMap;

/// Provider name used to fill a process's inputs
pub const TEST_INPUTS: &str = "test_inputs";

pub struct Standalone<P: AtmosphereProcess> {
    pub process: ManagedProcess<P>,
    pub fields: BTreeMap<String, Field<Real>>,
}

impl<P: AtmosphereProcess> Standalone<P> {
    /// Set the grids and create one field per request.
    ///
    /// `pack_size` overrides the pack size the process requested.
    pub fn new(process: P, ncols: usize, nlevs: usize, pack_size: Option<usize>) -> Self {
        let grids = LibraryGridsManager::with_point_grid(PHYSICS_GRID, ncols, nlevs).unwrap();
        let mut process = ManagedProcess::new(process);
        process.set_grids(&grids).unwrap();

        let mut fields = BTreeMap::new();
        for request in process.requests().iter() {
            let field = Field::new(
                request.identifier.clone(),
                pack_size.unwrap_or(request.pack_size),
            )
            .unwrap();
            if request.kind != RequestKind::Computed {
                field.add_provider(TEST_INPUTS);
            }
            fields.insert(request.name().to_string(), field);
        }
        Self { process, fields }
    }

    pub fn bind(&mut self) -> AtmResult<()> {
        for field in self.fields.values() {
            self.process.set_field(field)?;
        }
        Ok(())
    }

    /// Bind, hand out a scratch buffer of the requested size and initialize.
    pub fn start(&mut self) -> AtmResult<()> {
        self.bind()?;
        let bytes = self.process.requested_buffer_size_in_bytes()?;
        self.process.init_buffers(ScratchBuffer::with_bytes(bytes))?;
        self.process
            .initialize(t0(), RunType::Initial)
    }

    pub fn set(&self, name: &str, values: &[Real]) {
        self.fields[name].copy_from_logical(values, TEST_INPUTS).unwrap();
    }

    pub fn fill(&self, name: &str, value: Real) {
        let size = self.fields[name].layout().size();
        self.set(name, &vec![value; size]);
    }

    pub fn get(&self, name: &str) -> Vec<Real> {
        self.fields[name].get_view().to_vec()
    }
}

pub fn t0() -> TimeStamp {
    "2000-01-01-00000".parse().unwrap()
}
