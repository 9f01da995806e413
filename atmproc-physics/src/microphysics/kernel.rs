//! Single-moment bulk microphysics on one column at a time.
//!
//! Each level goes through, in order: a relaxed saturation adjustment
//! between vapour and cloud liquid, freezing of cloud liquid (or melting of
//! cloud ice above the freezing temperature), and autoconversion of cloud
//! liquid to rain, which falls out of the column within the step. Latent heat
//! released or absorbed by each conversion is applied to the temperature.

use super::P3Parameters;
use crate::constants::{
    CP_DRY_AIR, EPSILON, GRAVITY, LATENT_HEAT_FUSION, LATENT_HEAT_VAPORIZATION, RHO_ICE,
    RHO_WATER, R_DRY_AIR, R_VAPOR, T_MELT,
};
use atmproc_core::field::Real;
use ndarray::{ArrayView1, ArrayView2, ArrayViewMut0, ArrayViewMut1, ArrayViewMut2, Axis};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Cloud droplet number concentration
/// unit: 1 / m^3
const CLOUD_DROPLET_NUMBER: Real = 1e8;
/// Cloud ice number concentration
/// unit: 1 / m^3
const CLOUD_ICE_NUMBER: Real = 1e5;
/// Mixing ratio below which a cell counts as free of condensate
const Q_SMALL: Real = 1e-14;

/// Effective radius bounds and clear-sky values
/// unit: micron
pub const EFF_RADIUS_QC_BOUNDS: (Real, Real) = (2.5, 50.0);
pub const EFF_RADIUS_QI_BOUNDS: (Real, Real) = (5.0, 100.0);
pub const EFF_RADIUS_QC_DEFAULT: Real = 10.0;
pub const EFF_RADIUS_QI_DEFAULT: Real = 25.0;

/// Saturation vapour pressure over liquid water (Tetens)
///
/// unit: Pa
pub fn saturation_vapor_pressure(t: Real) -> Real {
    610.78 * (17.27 * (t - T_MELT) / (t - 35.86)).exp()
}

/// Saturation mixing ratio over liquid water
///
/// The vapour pressure is capped at half the total pressure so the result
/// stays finite in very warm, low pressure cells.
///
/// unit: kg / kg
pub fn saturation_mixing_ratio(t: Real, p: Real) -> Real {
    let es = saturation_vapor_pressure(t).min(0.5 * p);
    EPSILON * es / (p - es)
}

/// Fraction of the cloud liquid that freezes within one step.
pub fn freezing_fraction(t: Real, parameters: &P3Parameters) -> Real {
    if t >= parameters.freezing_temperature {
        0.0
    } else if t <= parameters.max_total_ice_temperature {
        1.0
    } else {
        (parameters.freezing_temperature - t)
            / (parameters.freezing_temperature - parameters.max_total_ice_temperature)
    }
}

/// Effective radius of a monodisperse population of spheres
///
/// unit: micron
fn effective_radius(q: Real, rho_air: Real, rho: Real, number: Real) -> Real {
    (3.0 * q * rho_air / (4.0 * PI * rho * number)).cbrt() * 1e6
}

/// State of all columns, as views of the bound fields.
pub struct P3State<'a> {
    pub p_mid: ArrayView2<'a, Real>,
    pub pseudo_density: ArrayView2<'a, Real>,
    pub t_mid: ArrayViewMut2<'a, Real>,
    pub qv: ArrayViewMut2<'a, Real>,
    pub qc: ArrayViewMut2<'a, Real>,
    pub qi: ArrayViewMut2<'a, Real>,
    pub precip_liq_surf_mass: ArrayViewMut1<'a, Real>,
    pub eff_radius_qc: ArrayViewMut2<'a, Real>,
    pub eff_radius_qi: ArrayViewMut2<'a, Real>,
}

/// Per-column work arrays carved out of the scratch buffer.
pub struct P3Workspace<'a> {
    /// Saturation mixing ratio before adjustment
    pub qsat: &'a mut [Real],
    /// Condensation rate, negative for evaporation
    pub condensation_rate: &'a mut [Real],
}

struct Column<'a> {
    p_mid: ArrayView1<'a, Real>,
    pseudo_density: ArrayView1<'a, Real>,
    t_mid: ArrayViewMut1<'a, Real>,
    qv: ArrayViewMut1<'a, Real>,
    qc: ArrayViewMut1<'a, Real>,
    qi: ArrayViewMut1<'a, Real>,
    precip_liq_surf_mass: ArrayViewMut0<'a, Real>,
    eff_radius_qc: ArrayViewMut1<'a, Real>,
    eff_radius_qi: ArrayViewMut1<'a, Real>,
    qsat: &'a mut [Real],
    condensation_rate: &'a mut [Real],
}

/// Advance every column by `dt`, in parallel over columns.
///
/// The workspace arrays must hold `num_levels` values per column.
pub fn p3_main(parameters: &P3Parameters, dt: Real, state: P3State<'_>, workspace: P3Workspace<'_>) {
    let num_levels = state.p_mid.ncols().max(1);
    let P3State {
        p_mid,
        pseudo_density,
        mut t_mid,
        mut qv,
        mut qc,
        mut qi,
        mut precip_liq_surf_mass,
        mut eff_radius_qc,
        mut eff_radius_qi,
    } = state;

    (
        p_mid.axis_iter(Axis(0)),
        pseudo_density.axis_iter(Axis(0)),
        t_mid.axis_iter_mut(Axis(0)),
        qv.axis_iter_mut(Axis(0)),
        qc.axis_iter_mut(Axis(0)),
        qi.axis_iter_mut(Axis(0)),
        precip_liq_surf_mass.axis_iter_mut(Axis(0)),
        eff_radius_qc.axis_iter_mut(Axis(0)),
        eff_radius_qi.axis_iter_mut(Axis(0)),
        workspace.qsat.par_chunks_mut(num_levels),
        workspace.condensation_rate.par_chunks_mut(num_levels),
    )
        .into_par_iter()
        .for_each(
            |(p_mid, pseudo_density, t_mid, qv, qc, qi, precip, rel, rei, qsat, cond)| {
                p3_column(
                    parameters,
                    dt,
                    Column {
                        p_mid,
                        pseudo_density,
                        t_mid,
                        qv,
                        qc,
                        qi,
                        precip_liq_surf_mass: precip,
                        eff_radius_qc: rel,
                        eff_radius_qi: rei,
                        qsat,
                        condensation_rate: cond,
                    },
                )
            },
        );
}

fn p3_column(parameters: &P3Parameters, dt: Real, mut col: Column<'_>) {
    let relaxation = (dt / parameters.condensation_timescale).min(1.0);
    let mut surface_rain = 0.0;

    for k in 0..col.p_mid.len() {
        let p = col.p_mid[k];
        let mut t = col.t_mid[k];
        let mut qv = col.qv[k];
        let mut qc = col.qc[k];
        let mut qi = col.qi[k];

        // Saturation adjustment, linearized around the current temperature
        let qsat = saturation_mixing_ratio(t, p);
        let gamma = 1.0
            + LATENT_HEAT_VAPORIZATION * LATENT_HEAT_VAPORIZATION * qsat
                / (CP_DRY_AIR * R_VAPOR * t * t);
        let condensed = (relaxation * (qv - qsat) / gamma).max(-qc);
        qv -= condensed;
        qc += condensed;
        t += LATENT_HEAT_VAPORIZATION / CP_DRY_AIR * condensed;
        col.qsat[k] = qsat;
        col.condensation_rate[k] = condensed / dt;

        if t > parameters.freezing_temperature {
            let melted = qi.min((t - parameters.freezing_temperature) * CP_DRY_AIR / LATENT_HEAT_FUSION);
            qi -= melted;
            qc += melted;
            t -= LATENT_HEAT_FUSION / CP_DRY_AIR * melted;
        } else {
            let frozen = freezing_fraction(t, parameters) * qc;
            qc -= frozen;
            qi += frozen;
            t += LATENT_HEAT_FUSION / CP_DRY_AIR * frozen;
        }

        let excess = qc - parameters.autoconversion_threshold;
        if excess > 0.0 {
            let rain = excess.min(parameters.autoconversion_rate * dt * excess);
            qc -= rain;
            surface_rain += rain * col.pseudo_density[k] / GRAVITY;
        }

        let rho_air = p / (R_DRY_AIR * t);
        col.eff_radius_qc[k] = if qc > Q_SMALL {
            effective_radius(qc, rho_air, RHO_WATER, CLOUD_DROPLET_NUMBER)
                .clamp(EFF_RADIUS_QC_BOUNDS.0, EFF_RADIUS_QC_BOUNDS.1)
        } else {
            EFF_RADIUS_QC_DEFAULT
        };
        col.eff_radius_qi[k] = if qi > Q_SMALL {
            effective_radius(qi, rho_air, RHO_ICE, CLOUD_ICE_NUMBER)
                .clamp(EFF_RADIUS_QI_BOUNDS.0, EFF_RADIUS_QI_BOUNDS.1)
        } else {
            EFF_RADIUS_QI_DEFAULT
        };

        col.t_mid[k] = t;
        col.qv[k] = qv;
        col.qc[k] = qc;
        col.qi[k] = qi;
    }

    col.precip_liq_surf_mass.fill(surface_rain);
}
