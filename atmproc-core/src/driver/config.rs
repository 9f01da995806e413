//! TOML description of a driver.
//!
//! ```toml
//! check_failure_policy = "warn"
//! external_inputs = ["cos_zenith"]
//! initial_conditions = "ic.toml"
//!
//! [grid]
//! name = "Physics"
//! num_columns = 4
//! num_levels = 72
//!
//! [[processes]]
//! type = "p3"
//! [processes.parameters]
//! autoconversion_rate = 1e-3
//!
//! [[checks]]
//! process = "p3"
//! field = "T_mid"
//! check = { type = "FieldNaNCheck" }
//! ```

use super::{CheckFailurePolicy, DriverBuilder};
use crate::comm::Comm;
use crate::errors::{AtmError, AtmResult};
use crate::grid::LibraryGridsManager;
use crate::io::InitialConditions;
use crate::parameters::ParameterList;
use crate::process::AtmosphereProcess;
use crate::property_check::PropertyCheck;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_grid_name() -> String {
    "Physics".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_name")]
    pub name: String,
    pub num_columns: usize,
    pub num_levels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Key into the [`ProcessFactory`].
    #[serde(rename = "type")]
    pub process_type: String,
    #[serde(default)]
    pub parameters: ParameterList,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckConfig {
    pub process: String,
    pub field: String,
    pub check: Box<dyn PropertyCheck>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverConfig {
    pub grid: GridConfig,
    #[serde(default)]
    pub check_failure_policy: CheckFailurePolicy,
    #[serde(default)]
    pub external_inputs: Vec<String>,
    /// Resolved relative to the configuration file when read with
    /// [`DriverConfig::from_file`].
    #[serde(default)]
    pub initial_conditions: Option<PathBuf>,
    #[serde(default)]
    pub processes: Vec<ProcessConfig>,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

impl DriverConfig {
    pub fn from_toml_str(content: &str) -> AtmResult<Self> {
        toml::from_str(content).map_err(|e| AtmError::Parse(format!("driver configuration: {e}")))
    }

    pub fn from_file(path: impl AsRef<Path>) -> AtmResult<Self> {
        let path = path.as_ref();
        let mut config = Self::from_toml_str(&fs::read_to_string(path)?)?;
        if let Some(ic) = config.initial_conditions.take() {
            config.initial_conditions = Some(match path.parent() {
                Some(dir) if ic.is_relative() => dir.join(ic),
                _ => ic,
            });
        }
        Ok(config)
    }
}

/// Creates a process from its communicator and parameters.
pub type ProcessConstructor = fn(Comm, ParameterList) -> AtmResult<Box<dyn AtmosphereProcess>>;

/// Registry of process types that can be named in a [`DriverConfig`].
#[derive(Debug, Default, Clone)]
pub struct ProcessFactory {
    constructors: BTreeMap<String, ProcessConstructor>,
}

impl ProcessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, process_type: &str, constructor: ProcessConstructor) -> &mut Self {
        self.constructors
            .insert(process_type.to_string(), constructor);
        self
    }

    pub fn is_registered(&self, process_type: &str) -> bool {
        self.constructors.contains_key(process_type)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn create(
        &self,
        process_type: &str,
        comm: Comm,
        params: ParameterList,
    ) -> AtmResult<Box<dyn AtmosphereProcess>> {
        let constructor = self.constructors.get(process_type).ok_or_else(|| {
            AtmError::InvalidConfiguration(format!(
                "unknown process type '{}' (registered: [{}])",
                process_type,
                self.registered_types().join(", ")
            ))
        })?;
        constructor(comm, params)
    }
}

impl DriverBuilder {
    /// A builder populated from a configuration.
    pub fn from_config(
        config: DriverConfig,
        factory: &ProcessFactory,
        comm: Comm,
    ) -> AtmResult<Self> {
        let grids = LibraryGridsManager::with_point_grid(
            &config.grid.name,
            config.grid.num_columns,
            config.grid.num_levels,
        )?;

        let mut builder = DriverBuilder::new();
        builder
            .with_grids_manager(Arc::new(grids))
            .with_check_failure_policy(config.check_failure_policy);
        for process in config.processes {
            builder.with_boxed_process(factory.create(
                &process.process_type,
                comm,
                process.parameters,
            )?);
        }
        for name in config.external_inputs {
            builder.with_external_input(name);
        }
        if let Some(path) = config.initial_conditions {
            builder.with_initial_conditions(InitialConditions::from_file(path)?);
        }
        for check in config.checks {
            builder.with_postcondition_check(&check.process, &check.field, check.check);
        }
        Ok(builder)
    }
}
