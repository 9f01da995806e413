//! Bulk cloud microphysics.
//!
//! Updates temperature and the water species (vapour, cloud liquid, cloud
//! ice) and diagnoses the surface rain and the hydrometeor effective radii
//! used by radiation. See [`kernel`] for the processes represented.

pub mod kernel;

pub use kernel::{p3_main, P3State, P3Workspace};

use crate::views::with_rank;
use crate::PHYSICS_GRID;
use atmproc_core::buffer::ScratchBuffer;
use atmproc_core::comm::Comm;
use atmproc_core::errors::{AtmError, AtmResult};
use atmproc_core::field::tags::{COL, LEV};
use atmproc_core::field::{FieldLayout, FieldRequestRegistry, Real};
use atmproc_core::grid::GridsManager;
use atmproc_core::parameters::ParameterList;
use atmproc_core::process::{AtmosphereProcess, InitializeContext, ProcessFields, RunType};
use atmproc_core::property_check::{FieldLowerBoundCheck, FieldWithinIntervalCheck};
use atmproc_core::units::Units;
use ndarray::{Ix1, Ix2};
use serde::{Deserialize, Serialize};

pub const PROCESS_NAME: &str = "p3";

/// Work arrays per column, each one value per level
const WORKSPACE_ARRAYS: usize = 2;

const MIXING_RATIOS: [&str; 3] = ["qv", "qc", "qi"];

/// Parameters of the microphysics scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P3Parameters {
    /// Cloud liquid above which autoconversion to rain starts
    /// unit: kg / kg
    pub autoconversion_threshold: Real,
    /// Fraction of the cloud liquid excess converted to rain per second
    /// unit: 1 / s
    pub autoconversion_rate: Real,
    /// Relaxation timescale of the saturation adjustment
    /// unit: s
    pub condensation_timescale: Real,
    /// Cloud liquid starts freezing, and cloud ice melts, at this temperature
    /// unit: K
    pub freezing_temperature: Real,
    /// All cloud liquid freezes at or below this temperature
    /// unit: K
    pub max_total_ice_temperature: Real,
}

impl Default for P3Parameters {
    fn default() -> Self {
        Self {
            autoconversion_threshold: 5e-4,
            autoconversion_rate: 1e-3,
            condensation_timescale: 60.0,
            freezing_temperature: 273.15,
            max_total_ice_temperature: 233.15,
        }
    }
}

impl P3Parameters {
    pub fn from_parameter_list(params: &ParameterList) -> AtmResult<Self> {
        let defaults = Self::default();
        let parameters = Self {
            autoconversion_threshold: params
                .get_real_or("autoconversion_threshold", defaults.autoconversion_threshold)?,
            autoconversion_rate: params
                .get_real_or("autoconversion_rate", defaults.autoconversion_rate)?,
            condensation_timescale: params
                .get_real_or("condensation_timescale", defaults.condensation_timescale)?,
            freezing_temperature: params
                .get_real_or("freezing_temperature", defaults.freezing_temperature)?,
            max_total_ice_temperature: params.get_real_or(
                "max_total_ice_temperature",
                defaults.max_total_ice_temperature,
            )?,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    fn validate(&self) -> AtmResult<()> {
        let invalid = |reason: String| {
            Err(AtmError::InvalidConfiguration(format!(
                "{PROCESS_NAME}: {reason}"
            )))
        };

        if !(self.autoconversion_threshold >= 0.0) {
            return invalid(format!(
                "autoconversion_threshold must be non-negative, got {}",
                self.autoconversion_threshold
            ));
        }
        if !(self.autoconversion_rate >= 0.0) {
            return invalid(format!(
                "autoconversion_rate must be non-negative, got {}",
                self.autoconversion_rate
            ));
        }
        if !(self.condensation_timescale > 0.0) {
            return invalid(format!(
                "condensation_timescale must be positive, got {}",
                self.condensation_timescale
            ));
        }
        if !(self.max_total_ice_temperature > 0.0
            && self.max_total_ice_temperature < self.freezing_temperature)
        {
            return invalid(format!(
                "max_total_ice_temperature ({} K) must be positive and below freezing_temperature ({} K)",
                self.max_total_ice_temperature, self.freezing_temperature
            ));
        }
        Ok(())
    }
}

/// Predicted-particle-properties style microphysics
///
/// Required: `p_mid`, `pseudo_density`.
/// Updated: `T_mid`, `qv`, `qc`, `qi`.
/// Computed: `precip_liq_surf_mass`, `eff_radius_qc`, `eff_radius_qi`.
#[derive(Debug)]
pub struct P3Microphysics {
    comm: Comm,
    params: ParameterList,
    parameters: P3Parameters,
    num_cols: usize,
    num_levs: usize,
    workspace: Option<ScratchBuffer>,
    iteration: usize,
}

impl P3Microphysics {
    pub fn new(comm: Comm, params: ParameterList) -> Self {
        Self {
            comm,
            params,
            parameters: P3Parameters::default(),
            num_cols: 0,
            num_levs: 0,
            workspace: None,
            iteration: 0,
        }
    }

    pub fn create(comm: Comm, params: ParameterList) -> AtmResult<Box<dyn AtmosphereProcess>> {
        Ok(Box::new(Self::new(comm, params)))
    }

    pub fn parameters(&self) -> &P3Parameters {
        &self.parameters
    }

    /// Number of completed steps
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    fn workspace_len(&self) -> usize {
        self.num_cols * self.num_levs
    }
}

impl AtmosphereProcess for P3Microphysics {
    fn name(&self) -> &str {
        PROCESS_NAME
    }

    fn set_grids(
        &mut self,
        grids_manager: &dyn GridsManager,
        requests: &mut FieldRequestRegistry,
    ) -> AtmResult<()> {
        self.parameters = P3Parameters::from_parameter_list(&self.params)?;

        let grid = grids_manager.get_grid(PHYSICS_GRID)?;
        self.num_cols = grid.get_num_local_dofs();
        self.num_levs = grid.get_num_vertical_levels();
        let grid_name = grid.name();

        let scalar2d = FieldLayout::new(&[COL], &[self.num_cols])?;
        let scalar3d = FieldLayout::new(&[COL, LEV], &[self.num_cols, self.num_levs])?;
        let q_units = (Units::KG / Units::KG).with_label("kg/kg");
        let kg_per_m2 = (Units::KG / (Units::M * Units::M)).with_label("kg/m2");

        requests.add_required("p_mid", &scalar3d, &Units::PA, grid_name)?;
        requests.add_required("pseudo_density", &scalar3d, &Units::PA, grid_name)?;
        requests.add_updated("T_mid", &scalar3d, &Units::K, grid_name)?;
        for name in MIXING_RATIOS {
            requests
                .add_updated(name, &scalar3d, &q_units, grid_name)?
                .in_group("tracers");
        }
        requests.add_computed("precip_liq_surf_mass", &scalar2d, &kg_per_m2, grid_name)?;
        requests.add_computed("eff_radius_qc", &scalar3d, &Units::micron(), grid_name)?;
        requests.add_computed("eff_radius_qi", &scalar3d, &Units::micron(), grid_name)?;
        Ok(())
    }

    fn requested_buffer_size_in_bytes(&self) -> usize {
        WORKSPACE_ARRAYS * self.workspace_len() * std::mem::size_of::<Real>()
    }

    fn init_buffers(&mut self, buffer: ScratchBuffer) -> AtmResult<()> {
        self.workspace = Some(buffer);
        Ok(())
    }

    fn initialize_impl(&mut self, mut ctx: InitializeContext<'_>) -> AtmResult<()> {
        ctx.add_postcondition_check("T_mid", FieldWithinIntervalCheck::new(100.0, 500.0, true)?)?;
        for name in MIXING_RATIOS {
            ctx.add_postcondition_check(name, FieldLowerBoundCheck::new(0.0))?;
        }
        ctx.add_postcondition_check("precip_liq_surf_mass", FieldLowerBoundCheck::new(0.0))?;
        for name in ["eff_radius_qc", "eff_radius_qi"] {
            ctx.add_postcondition_check(name, FieldWithinIntervalCheck::new(0.0, 100.0, true)?)?;
        }

        if ctx.run_type == RunType::Restart {
            log::info!(
                "{PROCESS_NAME}: restarting at {} on rank {}",
                ctx.t0,
                self.comm.rank()
            );
        }
        self.iteration = 0;
        Ok(())
    }

    fn run_impl(&mut self, fields: &ProcessFields, dt: f64) -> AtmResult<()> {
        let p_mid = fields.view_in("p_mid")?;
        let pseudo_density = fields.view_in("pseudo_density")?;
        let mut t_mid = fields.view_out("T_mid")?;
        let mut qv = fields.view_out("qv")?;
        let mut qc = fields.view_out("qc")?;
        let mut qi = fields.view_out("qi")?;
        let mut precip = fields.view_out("precip_liq_surf_mass")?;
        let mut rel = fields.view_out("eff_radius_qc")?;
        let mut rei = fields.view_out("eff_radius_qi")?;

        let state = P3State {
            p_mid: with_rank::<_, Ix2>(PROCESS_NAME, "p_mid", p_mid.view())?,
            pseudo_density: with_rank::<_, Ix2>(
                PROCESS_NAME,
                "pseudo_density",
                pseudo_density.view(),
            )?,
            t_mid: with_rank::<_, Ix2>(PROCESS_NAME, "T_mid", t_mid.view_mut())?,
            qv: with_rank::<_, Ix2>(PROCESS_NAME, "qv", qv.view_mut())?,
            qc: with_rank::<_, Ix2>(PROCESS_NAME, "qc", qc.view_mut())?,
            qi: with_rank::<_, Ix2>(PROCESS_NAME, "qi", qi.view_mut())?,
            precip_liq_surf_mass: with_rank::<_, Ix1>(
                PROCESS_NAME,
                "precip_liq_surf_mass",
                precip.view_mut(),
            )?,
            eff_radius_qc: with_rank::<_, Ix2>(PROCESS_NAME, "eff_radius_qc", rel.view_mut())?,
            eff_radius_qi: with_rank::<_, Ix2>(PROCESS_NAME, "eff_radius_qi", rei.view_mut())?,
        };

        let n = self.workspace_len();
        let requested = self.requested_buffer_size_in_bytes();
        let buffer = self.workspace.as_mut().ok_or_else(|| AtmError::InvalidLifecycle {
            process: PROCESS_NAME.to_string(),
            operation: "run".to_string(),
            state: "without a scratch buffer".to_string(),
        })?;
        let provided = buffer.size_in_bytes();
        let [qsat, condensation_rate]: [&mut [Real]; WORKSPACE_ARRAYS] = buffer
            .partition(&[n; WORKSPACE_ARRAYS])
            .and_then(|arrays| arrays.try_into().ok())
            .ok_or_else(|| AtmError::BufferTooSmall {
                process: PROCESS_NAME.to_string(),
                requested,
                provided,
            })?;

        p3_main(
            &self.parameters,
            dt,
            state,
            P3Workspace {
                qsat,
                condensation_rate,
            },
        );

        self.iteration += 1;
        log::debug!("{PROCESS_NAME}: completed iteration {}", self.iteration);
        Ok(())
    }

    fn finalize_impl(&mut self) -> AtmResult<()> {
        self.workspace = None;
        Ok(())
    }
}
