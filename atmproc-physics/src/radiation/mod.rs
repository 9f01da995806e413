//! Radiative fluxes from a gray two-stream scheme.
//!
//! The process owns a gas optics table built from the configured list of
//! active gases when it is initialized and released when it is finalized.
//! Kernels index field storage by logical extents only, so padded fields are
//! rejected at binding time.

mod gas_optics;
pub mod kernel;

pub use gas_optics::{known_gases, GasOptics};
pub use kernel::{gray_two_stream, RadiationInputs, RadiationOutputs};

use crate::views::with_rank;
use crate::PHYSICS_GRID;
use atmproc_core::comm::Comm;
use atmproc_core::errors::{AtmError, AtmResult};
use atmproc_core::field::tags::{COL, ILEV, LEV, NGAS, SWBND};
use atmproc_core::field::{ConstField, Field, FieldLayout, FieldRequestRegistry, Real};
use atmproc_core::grid::GridsManager;
use atmproc_core::parameters::ParameterList;
use atmproc_core::process::{
    require_unpadded, AtmosphereProcess, InitializeContext, ProcessFields,
};
use atmproc_core::property_check::FieldLowerBoundCheck;
use atmproc_core::units::Units;
use ndarray::{Ix1, Ix2, Ix3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const PROCESS_NAME: &str = "rrtmgp";

const FLUXES: [&str; 5] = [
    "SW_flux_dn",
    "SW_flux_up",
    "SW_flux_dn_dir",
    "LW_flux_up",
    "LW_flux_dn",
];

/// Parameters of the radiation scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RrtmgpParameters {
    /// Gases in the order of the `gas_vmr` field's gas dimension
    pub active_gases: Vec<String>,
    /// Number of shortwave bands of the surface albedo fields
    pub num_sw_bands: usize,
    /// Solar irradiance at the top of the atmosphere
    /// unit: W / m^2
    pub solar_constant: Real,
}

impl Default for RrtmgpParameters {
    fn default() -> Self {
        Self {
            active_gases: ["h2o", "co2", "o3", "n2o", "co", "ch4", "o2", "n2"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            num_sw_bands: 14,
            solar_constant: 1360.9,
        }
    }
}

impl RrtmgpParameters {
    pub fn from_parameter_list(params: &ParameterList) -> AtmResult<Self> {
        let defaults = Self::default();
        let num_sw_bands = params.get_int_or("num_sw_bands", defaults.num_sw_bands as i64)?;
        if num_sw_bands < 1 {
            return Err(AtmError::InvalidConfiguration(format!(
                "{PROCESS_NAME}: num_sw_bands must be at least 1, got {num_sw_bands}"
            )));
        }
        let parameters = Self {
            active_gases: params.get_string_array_or("active_gases", defaults.active_gases)?,
            num_sw_bands: num_sw_bands as usize,
            solar_constant: params.get_real_or("solar_constant", defaults.solar_constant)?,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    fn validate(&self) -> AtmResult<()> {
        if self.active_gases.is_empty() {
            return Err(AtmError::InvalidConfiguration(format!(
                "{PROCESS_NAME}: active_gases must name at least one gas"
            )));
        }
        let mut seen = BTreeSet::new();
        for gas in &self.active_gases {
            if !seen.insert(gas.as_str()) {
                return Err(AtmError::InvalidConfiguration(format!(
                    "{PROCESS_NAME}: gas '{gas}' appears more than once in active_gases"
                )));
            }
            if !known_gases().any(|known| known == gas) {
                return Err(AtmError::InvalidConfiguration(format!(
                    "{PROCESS_NAME}: unknown gas '{gas}' in active_gases (known: [{}])",
                    known_gases().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        if !(self.solar_constant > 0.0 && self.solar_constant.is_finite()) {
            return Err(AtmError::InvalidConfiguration(format!(
                "{PROCESS_NAME}: solar_constant must be positive, got {}",
                self.solar_constant
            )));
        }
        Ok(())
    }
}

/// Radiation process
///
/// Required: `p_mid`, `p_int`, `T_mid`, `T_int`, `gas_vmr`,
/// `surf_alb_direct`, `surf_alb_diffuse`, `cos_zenith`, `lwp`, `iwp`,
/// `eff_radius_qc`, `eff_radius_qi`.
/// Computed: shortwave and longwave fluxes on interfaces.
#[derive(Debug)]
pub struct Rrtmgp {
    comm: Comm,
    params: ParameterList,
    parameters: RrtmgpParameters,
    num_cols: usize,
    num_levs: usize,
    gas_optics: Option<GasOptics>,
}

impl Rrtmgp {
    pub fn new(comm: Comm, params: ParameterList) -> Self {
        Self {
            comm,
            params,
            parameters: RrtmgpParameters::default(),
            num_cols: 0,
            num_levs: 0,
            gas_optics: None,
        }
    }

    pub fn create(comm: Comm, params: ParameterList) -> AtmResult<Box<dyn AtmosphereProcess>> {
        Ok(Box::new(Self::new(comm, params)))
    }

    pub fn parameters(&self) -> &RrtmgpParameters {
        &self.parameters
    }

    /// Active gas names, available between initialize and finalize
    pub fn gas_names(&self) -> Option<&[String]> {
        self.gas_optics.as_ref().map(GasOptics::names)
    }
}

impl AtmosphereProcess for Rrtmgp {
    fn name(&self) -> &str {
        PROCESS_NAME
    }

    fn set_grids(
        &mut self,
        grids_manager: &dyn GridsManager,
        requests: &mut FieldRequestRegistry,
    ) -> AtmResult<()> {
        self.parameters = RrtmgpParameters::from_parameter_list(&self.params)?;

        let grid = grids_manager.get_grid(PHYSICS_GRID)?;
        self.num_cols = grid.get_num_local_dofs();
        self.num_levs = grid.get_num_vertical_levels();
        let (ncol, nlay) = (self.num_cols, self.num_levs);
        let grid_name = grid.name();

        let scalar2d = FieldLayout::new(&[COL], &[ncol])?;
        let scalar3d_mid = FieldLayout::new(&[COL, LEV], &[ncol, nlay])?;
        let scalar3d_int = FieldLayout::new(&[COL, ILEV], &[ncol, nlay + 1])?;
        let scalar3d_swband = FieldLayout::new(&[COL, SWBND], &[ncol, self.parameters.num_sw_bands])?;
        let gas_layout = FieldLayout::new(
            &[COL, LEV, NGAS],
            &[ncol, nlay, self.parameters.active_gases.len()],
        )?;

        let nondim = Units::nondimensional();
        let vmr = (Units::MOL / Units::MOL).with_label("mol/mol");
        let water_path = (Units::KG / (Units::M * Units::M)).with_label("kg/m2");
        let flux = (Units::W / (Units::M * Units::M)).with_label("W/m2");

        requests.add_required("p_mid", &scalar3d_mid, &Units::PA, grid_name)?;
        requests.add_required("p_int", &scalar3d_int, &Units::PA, grid_name)?;
        requests.add_required("T_mid", &scalar3d_mid, &Units::K, grid_name)?;
        requests.add_required("T_int", &scalar3d_int, &Units::K, grid_name)?;
        requests.add_required("gas_vmr", &gas_layout, &vmr, grid_name)?;
        requests.add_required("surf_alb_direct", &scalar3d_swband, &nondim, grid_name)?;
        requests.add_required("surf_alb_diffuse", &scalar3d_swband, &nondim, grid_name)?;
        requests.add_required("cos_zenith", &scalar2d, &nondim, grid_name)?;
        requests.add_required("lwp", &scalar3d_mid, &water_path, grid_name)?;
        requests.add_required("iwp", &scalar3d_mid, &water_path, grid_name)?;
        requests.add_required("eff_radius_qc", &scalar3d_mid, &Units::micron(), grid_name)?;
        requests.add_required("eff_radius_qi", &scalar3d_mid, &Units::micron(), grid_name)?;
        for name in FLUXES {
            requests.add_computed(name, &scalar3d_int, &flux, grid_name)?;
        }
        Ok(())
    }

    fn set_required_field_impl(&mut self, field: &ConstField<Real>) -> AtmResult<()> {
        require_unpadded(PROCESS_NAME, field)
    }

    fn set_computed_field_impl(&mut self, field: &Field<Real>) -> AtmResult<()> {
        require_unpadded(PROCESS_NAME, &field.get_const())
    }

    fn initialize_impl(&mut self, mut ctx: InitializeContext<'_>) -> AtmResult<()> {
        for name in FLUXES {
            ctx.add_postcondition_check(name, FieldLowerBoundCheck::new(0.0))?;
        }
        let gas_optics = GasOptics::new(&self.parameters.active_gases)?;
        if self.comm.am_i_root() {
            log::info!(
                "{PROCESS_NAME}: {} active gases [{}], {} shortwave bands",
                gas_optics.len(),
                gas_optics.names().join(", "),
                self.parameters.num_sw_bands
            );
        }
        self.gas_optics = Some(gas_optics);
        Ok(())
    }

    fn run_impl(&mut self, fields: &ProcessFields, _dt: f64) -> AtmResult<()> {
        let gas_optics = self.gas_optics.as_ref().ok_or_else(|| AtmError::InvalidLifecycle {
            process: PROCESS_NAME.to_string(),
            operation: "run".to_string(),
            state: "without a gas optics table".to_string(),
        })?;

        let p_int = fields.view_in("p_int")?;
        let t_mid = fields.view_in("T_mid")?;
        let t_int = fields.view_in("T_int")?;
        let gas_vmr = fields.view_in("gas_vmr")?;
        let surf_alb_direct = fields.view_in("surf_alb_direct")?;
        let surf_alb_diffuse = fields.view_in("surf_alb_diffuse")?;
        let cos_zenith = fields.view_in("cos_zenith")?;
        let lwp = fields.view_in("lwp")?;
        let iwp = fields.view_in("iwp")?;
        let rel = fields.view_in("eff_radius_qc")?;
        let rei = fields.view_in("eff_radius_qi")?;

        let inputs = RadiationInputs {
            p_int: with_rank::<_, Ix2>(PROCESS_NAME, "p_int", p_int.view())?,
            t_mid: with_rank::<_, Ix2>(PROCESS_NAME, "T_mid", t_mid.view())?,
            t_int: with_rank::<_, Ix2>(PROCESS_NAME, "T_int", t_int.view())?,
            gas_vmr: with_rank::<_, Ix3>(PROCESS_NAME, "gas_vmr", gas_vmr.view())?,
            surf_alb_direct: with_rank::<_, Ix2>(
                PROCESS_NAME,
                "surf_alb_direct",
                surf_alb_direct.view(),
            )?,
            surf_alb_diffuse: with_rank::<_, Ix2>(
                PROCESS_NAME,
                "surf_alb_diffuse",
                surf_alb_diffuse.view(),
            )?,
            cos_zenith: with_rank::<_, Ix1>(PROCESS_NAME, "cos_zenith", cos_zenith.view())?,
            lwp: with_rank::<_, Ix2>(PROCESS_NAME, "lwp", lwp.view())?,
            iwp: with_rank::<_, Ix2>(PROCESS_NAME, "iwp", iwp.view())?,
            eff_radius_qc: with_rank::<_, Ix2>(PROCESS_NAME, "eff_radius_qc", rel.view())?,
            eff_radius_qi: with_rank::<_, Ix2>(PROCESS_NAME, "eff_radius_qi", rei.view())?,
        };

        let mut sw_dn = fields.view_out("SW_flux_dn")?;
        let mut sw_up = fields.view_out("SW_flux_up")?;
        let mut sw_dn_dir = fields.view_out("SW_flux_dn_dir")?;
        let mut lw_up = fields.view_out("LW_flux_up")?;
        let mut lw_dn = fields.view_out("LW_flux_dn")?;
        let outputs = RadiationOutputs {
            sw_flux_dn: with_rank::<_, Ix2>(PROCESS_NAME, "SW_flux_dn", sw_dn.view_mut())?,
            sw_flux_up: with_rank::<_, Ix2>(PROCESS_NAME, "SW_flux_up", sw_up.view_mut())?,
            sw_flux_dn_dir: with_rank::<_, Ix2>(
                PROCESS_NAME,
                "SW_flux_dn_dir",
                sw_dn_dir.view_mut(),
            )?,
            lw_flux_up: with_rank::<_, Ix2>(PROCESS_NAME, "LW_flux_up", lw_up.view_mut())?,
            lw_flux_dn: with_rank::<_, Ix2>(PROCESS_NAME, "LW_flux_dn", lw_dn.view_mut())?,
        };

        gray_two_stream(gas_optics, self.parameters.solar_constant, &inputs, outputs);
        Ok(())
    }

    fn finalize_impl(&mut self) -> AtmResult<()> {
        self.gas_optics = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let parameters = RrtmgpParameters::from_parameter_list(&ParameterList::new()).unwrap();
        assert_eq!(parameters.active_gases.len(), 8);
        assert_eq!(parameters.num_sw_bands, 14);
    }

    #[test]
    fn test_invalid_gas_lists() {
        for gases in [vec![], vec!["h2o", "h2o"], vec!["h2o", "xenon"]] {
            let params = ParameterList::new().with("active_gases", gases);
            let err = RrtmgpParameters::from_parameter_list(&params).unwrap_err();
            assert!(matches!(err, AtmError::InvalidConfiguration(_)), "{err}");
        }
    }

    #[test]
    fn test_invalid_band_count() {
        let params = ParameterList::new().with("num_sw_bands", 0_i64);
        assert!(RrtmgpParameters::from_parameter_list(&params).is_err());
    }

    #[test]
    fn test_gas_layout_follows_configuration() {
        let grids = atmproc_core::grid::LibraryGridsManager::with_point_grid(PHYSICS_GRID, 2, 5)
            .unwrap();
        let params = ParameterList::new()
            .with("active_gases", vec!["h2o", "co2", "o3"])
            .with("num_sw_bands", 4_i64);
        let mut process = Rrtmgp::new(Comm::serial(), params);
        let mut requests = FieldRequestRegistry::new(PROCESS_NAME);
        process.set_grids(&grids, &mut requests).unwrap();

        let gas = requests.find("gas_vmr").unwrap();
        assert_eq!(gas.identifier.layout().extents(), &[2, 5, 3]);
        let albedo = requests.find("surf_alb_direct").unwrap();
        assert_eq!(albedo.identifier.layout().extents(), &[2, 4]);
        let flux = requests.find("LW_flux_up").unwrap();
        assert_eq!(flux.identifier.layout().extents(), &[2, 6]);
        assert_eq!(requests.get_computed_field_requests().len(), 5);
        assert!(process.gas_names().is_none());
    }
}
