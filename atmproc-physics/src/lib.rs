//! Atmosphere physics parameterizations built on `atmproc-core`.
//!
//! Each process is split in two: a type implementing
//! [`AtmosphereProcess`](atmproc_core::process::AtmosphereProcess), which
//! declares fields and validates configuration, and a plain kernel operating
//! on `ndarray` views that can be tested on its own.

pub mod cld_fraction;
pub mod constants;
pub mod microphysics;
pub mod radiation;
mod views;

pub use cld_fraction::CldFraction;
pub use microphysics::P3Microphysics;
pub use radiation::Rrtmgp;

use atmproc_core::driver::ProcessFactory;

/// Name of the grid every process in this crate runs on.
pub const PHYSICS_GRID: &str = "Physics";

/// Register the process types of this crate under their configuration names.
pub fn register_physics(factory: &mut ProcessFactory) -> &mut ProcessFactory {
    factory
        .register(cld_fraction::PROCESS_NAME, CldFraction::create)
        .register(microphysics::PROCESS_NAME, P3Microphysics::create)
        .register(radiation::PROCESS_NAME, Rrtmgp::create)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_physics() {
        let mut factory = ProcessFactory::new();
        register_physics(&mut factory);
        assert_eq!(
            factory.registered_types(),
            vec!["cld_fraction", "p3", "rrtmgp"]
        );
    }
}
