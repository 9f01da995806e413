//! Gray two-stream radiative transfer, one column at a time.
//!
//! Interfaces are ordered from the top of the atmosphere (index 0) down to
//! the surface (index `nlay`). Shortwave and longwave are each treated as a
//! single gray band: band resolved surface albedos are averaged. Clouds
//! scatter in the shortwave and absorb in the longwave; gases only absorb.
//! Each layer is traversed once in each direction, so every flux is a sum of
//! non-negative terms.

use super::gas_optics::GasOptics;
use crate::constants::{DIFFUSIVITY, RHO_ICE, RHO_WATER, STEBOL};
use atmproc_core::field::Real;
use ndarray::{ArrayView1, ArrayView2, ArrayView3, ArrayViewMut1, ArrayViewMut2, Axis, Zip};

/// Asymmetry parameter of cloud particles
const CLOUD_ASYMMETRY: Real = 0.85;
/// Longwave mass absorption coefficients of cloud liquid and ice
/// unit: m^2 / kg
const LW_ABSORPTION_LIQUID: Real = 130.0;
const LW_ABSORPTION_ICE: Real = 65.0;
/// Smallest effective radius used in cloud optics
/// unit: micron
const MIN_EFF_RADIUS: Real = 1.0;

/// Column inputs, as views of the bound fields.
pub struct RadiationInputs<'a> {
    pub p_int: ArrayView2<'a, Real>,
    pub t_mid: ArrayView2<'a, Real>,
    pub t_int: ArrayView2<'a, Real>,
    pub gas_vmr: ArrayView3<'a, Real>,
    pub surf_alb_direct: ArrayView2<'a, Real>,
    pub surf_alb_diffuse: ArrayView2<'a, Real>,
    pub cos_zenith: ArrayView1<'a, Real>,
    pub lwp: ArrayView2<'a, Real>,
    pub iwp: ArrayView2<'a, Real>,
    pub eff_radius_qc: ArrayView2<'a, Real>,
    pub eff_radius_qi: ArrayView2<'a, Real>,
}

/// Fluxes on interfaces
/// unit: W / m^2
pub struct RadiationOutputs<'a> {
    pub sw_flux_dn: ArrayViewMut2<'a, Real>,
    pub sw_flux_up: ArrayViewMut2<'a, Real>,
    pub sw_flux_dn_dir: ArrayViewMut2<'a, Real>,
    pub lw_flux_up: ArrayViewMut2<'a, Real>,
    pub lw_flux_dn: ArrayViewMut2<'a, Real>,
}

/// Shortwave cloud optical depth of a layer.
///
/// Water paths in kg/m^2, effective radii in micron.
pub fn cloud_sw_optical_depth(lwp: Real, iwp: Real, rel: Real, rei: Real) -> Real {
    let rel = rel.max(MIN_EFF_RADIUS) * 1e-6;
    let rei = rei.max(MIN_EFF_RADIUS) * 1e-6;
    1.5 * (lwp.max(0.0) / (RHO_WATER * rel) + iwp.max(0.0) / (RHO_ICE * rei))
}

/// Longwave cloud optical depth of a layer.
pub fn cloud_lw_optical_depth(lwp: Real, iwp: Real) -> Real {
    LW_ABSORPTION_LIQUID * lwp.max(0.0) + LW_ABSORPTION_ICE * iwp.max(0.0)
}

/// Fraction of incident diffuse radiation a scattering layer reflects.
pub fn layer_reflectance(tau_cloud: Real) -> Real {
    let scaled = (1.0 - CLOUD_ASYMMETRY) * tau_cloud;
    scaled / (2.0 + scaled)
}

/// Compute all fluxes, in parallel over columns.
pub fn gray_two_stream(
    gas_optics: &GasOptics,
    solar_constant: Real,
    inputs: &RadiationInputs<'_>,
    mut outputs: RadiationOutputs<'_>,
) {
    Zip::indexed(outputs.sw_flux_dn.rows_mut())
        .and(outputs.sw_flux_up.rows_mut())
        .and(outputs.sw_flux_dn_dir.rows_mut())
        .and(outputs.lw_flux_up.rows_mut())
        .and(outputs.lw_flux_dn.rows_mut())
        .par_for_each(|icol, sw_dn, sw_up, sw_dn_dir, lw_up, lw_dn| {
            let column = ColumnOptics::new(gas_optics, inputs, icol);
            column.shortwave(
                solar_constant * inputs.cos_zenith[icol],
                inputs.cos_zenith[icol],
                mean(inputs.surf_alb_direct.row(icol)),
                mean(inputs.surf_alb_diffuse.row(icol)),
                sw_dn,
                sw_up,
                sw_dn_dir,
            );
            column.longwave(
                inputs.t_mid.row(icol),
                inputs.t_int[[icol, inputs.t_int.ncols() - 1]],
                lw_up,
                lw_dn,
            );
        });
}

fn mean(values: ArrayView1<'_, Real>) -> Real {
    values.mean().unwrap_or(0.0)
}

/// Layer optical properties of one column.
struct ColumnOptics {
    tau_gas_sw: Vec<Real>,
    tau_gas_lw: Vec<Real>,
    tau_cloud_sw: Vec<Real>,
    tau_cloud_lw: Vec<Real>,
}

impl ColumnOptics {
    fn new(gas_optics: &GasOptics, inputs: &RadiationInputs<'_>, icol: usize) -> Self {
        let nlay = inputs.t_mid.ncols();
        let mut optics = Self {
            tau_gas_sw: Vec::with_capacity(nlay),
            tau_gas_lw: Vec::with_capacity(nlay),
            tau_cloud_sw: Vec::with_capacity(nlay),
            tau_cloud_lw: Vec::with_capacity(nlay),
        };
        let gas_vmr = inputs.gas_vmr.index_axis(Axis(0), icol);
        for k in 0..nlay {
            let dp = (inputs.p_int[[icol, k + 1]] - inputs.p_int[[icol, k]]).abs();
            let (sw, lw) = gas_optics.optical_depth(gas_vmr.row(k), dp);
            let lwp = inputs.lwp[[icol, k]];
            let iwp = inputs.iwp[[icol, k]];
            optics.tau_gas_sw.push(sw);
            optics.tau_gas_lw.push(lw);
            optics.tau_cloud_sw.push(cloud_sw_optical_depth(
                lwp,
                iwp,
                inputs.eff_radius_qc[[icol, k]],
                inputs.eff_radius_qi[[icol, k]],
            ));
            optics.tau_cloud_lw.push(cloud_lw_optical_depth(lwp, iwp));
        }
        optics
    }

    fn nlay(&self) -> usize {
        self.tau_gas_sw.len()
    }

    #[allow(clippy::too_many_arguments)]
    fn shortwave(
        &self,
        toa_flux: Real,
        mu0: Real,
        albedo_direct: Real,
        albedo_diffuse: Real,
        mut dn: ArrayViewMut1<'_, Real>,
        mut up: ArrayViewMut1<'_, Real>,
        mut dn_dir: ArrayViewMut1<'_, Real>,
    ) {
        if mu0 <= 0.0 || toa_flux <= 0.0 {
            dn.fill(0.0);
            up.fill(0.0);
            dn_dir.fill(0.0);
            return;
        }
        let nlay = self.nlay();
        let mut reflected = vec![0.0; nlay];
        let mut diffuse_transmission = vec![0.0; nlay];

        dn[0] = toa_flux;
        dn_dir[0] = toa_flux;
        for k in 0..nlay {
            let r = layer_reflectance(self.tau_cloud_sw[k]);
            let slant_gas = (-self.tau_gas_sw[k] / mu0).exp();
            let diffuse_gas = (-DIFFUSIVITY * self.tau_gas_sw[k]).exp();
            let scattered = 1.0 - (-self.tau_cloud_sw[k] / mu0).exp();

            let direct = dn_dir[k];
            let diffuse = dn[k] - dn_dir[k];
            dn_dir[k + 1] = direct * slant_gas * (1.0 - scattered);
            let diffuse_below =
                direct * slant_gas * scattered * (1.0 - r) + diffuse * diffuse_gas * (1.0 - r);
            dn[k + 1] = dn_dir[k + 1] + diffuse_below;

            reflected[k] = direct * slant_gas * scattered * r + diffuse * diffuse_gas * r;
            diffuse_transmission[k] = diffuse_gas * (1.0 - r);
        }

        up[nlay] = albedo_direct * dn_dir[nlay] + albedo_diffuse * (dn[nlay] - dn_dir[nlay]);
        for k in (0..nlay).rev() {
            up[k] = up[k + 1] * diffuse_transmission[k] + reflected[k];
        }
    }

    fn longwave(
        &self,
        t_mid: ArrayView1<'_, Real>,
        t_surface: Real,
        mut up: ArrayViewMut1<'_, Real>,
        mut dn: ArrayViewMut1<'_, Real>,
    ) {
        let nlay = self.nlay();
        let layers: Vec<(Real, Real)> = (0..nlay)
            .map(|k| {
                let tau = self.tau_gas_lw[k] + self.tau_cloud_lw[k];
                let transmission = (-DIFFUSIVITY * tau).exp();
                (transmission, (1.0 - transmission) * STEBOL * t_mid[k].powi(4))
            })
            .collect();

        dn[0] = 0.0;
        for (k, (transmission, emission)) in layers.iter().enumerate() {
            dn[k + 1] = dn[k] * transmission + emission;
        }
        up[nlay] = STEBOL * t_surface.powi(4);
        for (k, (transmission, emission)) in layers.iter().enumerate().rev() {
            up[k] = up[k + 1] * transmission + emission;
        }
    }
}
