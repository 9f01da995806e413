//! Diagnostic cloud fraction.
//!
//! Combines the liquid cloud fraction computed elsewhere with an ice cloud
//! fraction diagnosed from the ice mixing ratio. Two versions of each output
//! are produced: one used by the rest of the physics, and one with a higher
//! ice threshold intended for comparison with observations.

mod kernel;

pub use kernel::{cloud_fraction, ice_cloud_fraction};

use crate::PHYSICS_GRID;
use atmproc_core::comm::Comm;
use atmproc_core::errors::{AtmError, AtmResult};
use atmproc_core::field::tags::{COL, LEV};
use atmproc_core::field::{FieldLayout, FieldRequestRegistry, Real};
use atmproc_core::grid::GridsManager;
use atmproc_core::parameters::ParameterList;
use atmproc_core::process::{AtmosphereProcess, InitializeContext, ProcessFields};
use atmproc_core::property_check::FieldWithinIntervalCheck;
use atmproc_core::units::Units;
use serde::{Deserialize, Serialize};

pub const PROCESS_NAME: &str = "cld_fraction";

/// Vectorization width of the cloud fraction fields.
pub const PACK_SIZE: usize = 16;

const CLOUD_FRACTION_OUTPUTS: [&str; 4] = [
    "cldfrac_ice",
    "cldfrac_tot",
    "cldfrac_ice_for_output",
    "cldfrac_tot_for_output",
];

/// Parameters of the cloud fraction diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CldFractionParameters {
    /// Ice mixing ratio above which a cell counts as ice cloud
    /// unit: kg / kg
    pub ice_cloud_threshold: Real,
    /// Ice threshold of the `_for_output` fields
    /// unit: kg / kg
    pub ice_cloud_for_analysis_threshold: Real,
}

impl Default for CldFractionParameters {
    fn default() -> Self {
        Self {
            ice_cloud_threshold: 1e-12,
            ice_cloud_for_analysis_threshold: 1e-5,
        }
    }
}

impl CldFractionParameters {
    pub fn from_parameter_list(params: &ParameterList) -> AtmResult<Self> {
        let defaults = Self::default();
        let parameters = Self {
            ice_cloud_threshold: params
                .get_real_or("ice_cloud_threshold", defaults.ice_cloud_threshold)?,
            ice_cloud_for_analysis_threshold: params.get_real_or(
                "ice_cloud_for_analysis_threshold",
                defaults.ice_cloud_for_analysis_threshold,
            )?,
        };
        parameters.validate()?;
        Ok(parameters)
    }

    fn validate(&self) -> AtmResult<()> {
        for (name, value) in [
            ("ice_cloud_threshold", self.ice_cloud_threshold),
            (
                "ice_cloud_for_analysis_threshold",
                self.ice_cloud_for_analysis_threshold,
            ),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(AtmError::InvalidConfiguration(format!(
                    "{PROCESS_NAME}: '{name}' must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Cloud fraction process
///
/// Required: `qi` (tracers group), `cldfrac_liq`.
/// Computed: `cldfrac_ice`, `cldfrac_tot` and their `_for_output` variants,
/// each checked to lie in `[0, 1]`.
#[derive(Debug)]
pub struct CldFraction {
    comm: Comm,
    params: ParameterList,
    parameters: CldFractionParameters,
    num_cols: usize,
    num_levs: usize,
}

impl CldFraction {
    pub fn new(comm: Comm, params: ParameterList) -> Self {
        Self {
            comm,
            params,
            parameters: CldFractionParameters::default(),
            num_cols: 0,
            num_levs: 0,
        }
    }

    /// Constructor registered with the process factory.
    pub fn create(comm: Comm, params: ParameterList) -> AtmResult<Box<dyn AtmosphereProcess>> {
        Ok(Box::new(Self::new(comm, params)))
    }

    /// Parameters in effect, valid once the grids have been set.
    pub fn parameters(&self) -> &CldFractionParameters {
        &self.parameters
    }

    pub fn comm(&self) -> Comm {
        self.comm
    }
}

impl AtmosphereProcess for CldFraction {
    fn name(&self) -> &str {
        PROCESS_NAME
    }

    fn set_grids(
        &mut self,
        grids_manager: &dyn GridsManager,
        requests: &mut FieldRequestRegistry,
    ) -> AtmResult<()> {
        self.parameters = CldFractionParameters::from_parameter_list(&self.params)?;

        let grid = grids_manager.get_grid(PHYSICS_GRID)?;
        self.num_cols = grid.get_num_local_dofs();
        self.num_levs = grid.get_num_vertical_levels();

        let scalar3d = FieldLayout::new(&[COL, LEV], &[self.num_cols, self.num_levs])?;
        let q_units = (Units::KG / Units::KG).with_label("kg/kg");
        let nondim = Units::nondimensional();
        let grid_name = grid.name();

        requests
            .add_required("qi", &scalar3d, &q_units, grid_name)?
            .in_group("tracers")
            .with_pack_size(PACK_SIZE);
        requests
            .add_required("cldfrac_liq", &scalar3d, &nondim, grid_name)?
            .with_pack_size(PACK_SIZE);
        for name in CLOUD_FRACTION_OUTPUTS {
            requests
                .add_computed(name, &scalar3d, &nondim, grid_name)?
                .with_pack_size(PACK_SIZE);
        }

        log::debug!(
            "{PROCESS_NAME}: {} columns x {} levels on rank {} of {}",
            self.num_cols,
            self.num_levs,
            self.comm.rank(),
            self.comm.size()
        );
        Ok(())
    }

    fn initialize_impl(&mut self, mut ctx: InitializeContext<'_>) -> AtmResult<()> {
        for name in CLOUD_FRACTION_OUTPUTS {
            ctx.add_postcondition_check(name, FieldWithinIntervalCheck::new(0.0, 1.0, true)?)?;
        }
        Ok(())
    }

    fn run_impl(&mut self, fields: &ProcessFields, _dt: f64) -> AtmResult<()> {
        let qi = fields.view_in("qi")?;
        let liq = fields.view_in("cldfrac_liq")?;

        for (ice_name, tot_name, threshold) in [
            (
                "cldfrac_ice",
                "cldfrac_tot",
                self.parameters.ice_cloud_threshold,
            ),
            (
                "cldfrac_ice_for_output",
                "cldfrac_tot_for_output",
                self.parameters.ice_cloud_for_analysis_threshold,
            ),
        ] {
            let mut ice = fields.view_out(ice_name)?;
            let mut tot = fields.view_out(tot_name)?;
            cloud_fraction(
                qi.view(),
                liq.view(),
                threshold,
                ice.view_mut(),
                tot.view_mut(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let parameters = CldFractionParameters::from_parameter_list(&ParameterList::new()).unwrap();
        assert_eq!(parameters, CldFractionParameters::default());
    }

    #[test]
    fn test_parameters_from_list() {
        let params = ParameterList::new()
            .with("ice_cloud_threshold", 1e-8)
            .with("ice_cloud_for_analysis_threshold", 0_i64);
        let parameters = CldFractionParameters::from_parameter_list(&params).unwrap();
        assert_eq!(parameters.ice_cloud_threshold, 1e-8);
        assert_eq!(parameters.ice_cloud_for_analysis_threshold, 0.0);
    }

    #[test]
    fn test_negative_threshold_is_rejected() {
        let params = ParameterList::new().with("ice_cloud_threshold", -1.0);
        let err = CldFractionParameters::from_parameter_list(&params).unwrap_err();
        assert!(matches!(err, AtmError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("ice_cloud_threshold"));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let params = ParameterList::new().with("ice_cloud_threshold", "small");
        assert!(CldFractionParameters::from_parameter_list(&params).is_err());
    }
}
