//! Physical constants shared by the physics kernels.
use atmproc_core::field::Real;

/// Gravitational acceleration
/// unit: m / s^2
pub const GRAVITY: Real = 9.80616;

/// Specific heat of dry air at constant pressure
/// unit: J / kg / K
pub const CP_DRY_AIR: Real = 1004.64;

/// Latent heat of vaporization
/// unit: J / kg
pub const LATENT_HEAT_VAPORIZATION: Real = 2.501e6;

/// Latent heat of fusion
/// unit: J / kg
pub const LATENT_HEAT_FUSION: Real = 3.337e5;

/// Ratio of the molecular weights of water vapour and dry air
pub const EPSILON: Real = 0.622;

/// Freezing point of water
/// unit: K
pub const T_MELT: Real = 273.15;

/// Density of liquid water
/// unit: kg / m^3
pub const RHO_WATER: Real = 1000.0;

/// Density of ice
/// unit: kg / m^3
pub const RHO_ICE: Real = 917.0;

/// Stefan-Boltzmann constant
/// unit: W / m^2 / K^4
pub const STEBOL: Real = 5.670374419e-8;

/// Diffusivity factor of the two-stream approximation
pub const DIFFUSIVITY: Real = 1.66;

/// Gas constant of dry air
/// unit: J / kg / K
pub const R_DRY_AIR: Real = 287.042;

/// Gas constant of water vapour
/// unit: J / kg / K
pub const R_VAPOR: Real = 461.505;
