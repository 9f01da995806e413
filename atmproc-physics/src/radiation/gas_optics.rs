use crate::constants::GRAVITY;
use atmproc_core::errors::{AtmError, AtmResult};
use atmproc_core::field::Real;
use ndarray::ArrayView1;

/// Gray absorption coefficients per unit volume mixing ratio
///
/// (name, shortwave, longwave), unit: m^2 / kg of air
const GAS_ABSORPTION: [(&str, Real, Real); 8] = [
    ("h2o", 2e-3, 3e-2),
    ("co2", 1e-3, 0.25),
    ("o3", 300.0, 50.0),
    ("n2o", 0.0, 10.0),
    ("co", 0.0, 1.0),
    ("ch4", 0.5, 5.0),
    ("o2", 1e-5, 0.0),
    ("n2", 0.0, 0.0),
];

/// Gases the optics table knows about.
pub fn known_gases() -> impl Iterator<Item = &'static str> {
    GAS_ABSORPTION.iter().map(|(name, _, _)| *name)
}

/// Absorption table for the active gases, in the order of the `gas_vmr`
/// field's gas dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct GasOptics {
    names: Vec<String>,
    sw_absorption: Vec<Real>,
    lw_absorption: Vec<Real>,
}

impl GasOptics {
    pub fn new(active_gases: &[String]) -> AtmResult<Self> {
        let mut sw_absorption = Vec::with_capacity(active_gases.len());
        let mut lw_absorption = Vec::with_capacity(active_gases.len());
        for gas in active_gases {
            let (_, sw, lw) = GAS_ABSORPTION
                .iter()
                .find(|(name, _, _)| name == gas)
                .ok_or_else(|| {
                    AtmError::InvalidConfiguration(format!(
                        "unknown radiatively active gas '{}' (known: [{}])",
                        gas,
                        known_gases().collect::<Vec<_>>().join(", ")
                    ))
                })?;
            sw_absorption.push(*sw);
            lw_absorption.push(*lw);
        }
        Ok(Self {
            names: active_gases.to_vec(),
            sw_absorption,
            lw_absorption,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Shortwave and longwave gas optical depth of one layer.
    ///
    /// `vmr` holds one volume mixing ratio per active gas and `dp` is the
    /// pressure thickness of the layer in Pa.
    pub fn optical_depth(&self, vmr: ArrayView1<'_, Real>, dp: Real) -> (Real, Real) {
        let air_mass = dp / GRAVITY;
        vmr.iter()
            .zip(self.sw_absorption.iter().zip(&self.lw_absorption))
            .fold((0.0, 0.0), |(sw, lw), (&q, (&k_sw, &k_lw))| {
                (sw + k_sw * q * air_mass, lw + k_lw * q * air_mass)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use ndarray::array;

    fn gases(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_gas() {
        let err = GasOptics::new(&gases(&["h2o", "cfc11"])).unwrap_err();
        assert!(err.to_string().contains("cfc11"));
    }

    #[test]
    fn test_optical_depth() {
        let optics = GasOptics::new(&gases(&["n2", "co2"])).unwrap();
        assert_eq!(optics.len(), 2);

        let (sw, lw) = optics.optical_depth(array![0.78, 4e-4].view(), 10000.0);
        let air_mass = 10000.0 / GRAVITY;
        assert!(is_close!(sw, 1e-3 * 4e-4 * air_mass));
        assert!(is_close!(lw, 0.25 * 4e-4 * air_mass));
    }
}
