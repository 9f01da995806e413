//! Physical units attached to fields.
//!
//! Units are carried for display and validation only and never affect how a
//! field is stored. A unit is a [`Dimension`] plus a scale factor relative to
//! the SI base units, with an optional display string. Mixing ratios, for
//! instance, are technically non-dimensional but are conventionally shown as
//! `kg/kg`:
//!
//! ```
//! use atmproc_core::units::Units;
//!
//! let q = (Units::KG / Units::KG).with_label("kg/kg");
//! assert_eq!(q, Units::nondimensional());
//! assert_eq!(q.to_string(), "kg/kg");
//! ```
//!
//! Equality compares dimension and scale, the display string is ignored.

pub mod dimension;

pub use dimension::Dimension;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Units {
    dimension: Dimension,
    scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

impl Units {
    pub const KG: Units = Units::base(Dimension::MASS);
    pub const M: Units = Units::base(Dimension::LENGTH);
    pub const S: Units = Units::base(Dimension::TIME);
    pub const K: Units = Units::base(Dimension::TEMPERATURE);
    pub const MOL: Units = Units::base(Dimension::AMOUNT);
    pub const PA: Units = Units::base(Dimension::PRESSURE);
    pub const W: Units = Units::base(Dimension::POWER);

    const fn base(dimension: Dimension) -> Self {
        Self {
            dimension,
            scale: 1.0,
            label: None,
        }
    }

    pub fn new(dimension: Dimension, scale: f64) -> Self {
        Self {
            dimension,
            scale,
            label: None,
        }
    }

    pub const fn nondimensional() -> Self {
        Self::base(Dimension::dimensionless())
    }

    /// Micrometres, used for hydrometeor effective radii.
    pub fn micron() -> Self {
        Self::new(Dimension::LENGTH, 1e-6).with_label("micron")
    }

    /// Set the string used when displaying these units.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_nondimensional(&self) -> bool {
        self.dimension.is_dimensionless() && self.scale == 1.0
    }
}

impl PartialEq for Units {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.scale == other.scale
    }
}

impl Mul for Units {
    type Output = Units;

    fn mul(self, rhs: Units) -> Units {
        Units::new(self.dimension * rhs.dimension, self.scale * rhs.scale)
    }
}

impl Div for Units {
    type Output = Units;

    fn div(self, rhs: Units) -> Units {
        Units::new(self.dimension / rhs.dimension, self.scale / rhs.scale)
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            return write!(f, "{label}");
        }
        if self.dimension.is_dimensionless() {
            return match self.scale {
                s if s == 1.0 => write!(f, "1"),
                s => write!(f, "{s}"),
            };
        }

        let mut parts = Vec::new();
        if self.scale != 1.0 {
            parts.push(format!("{}", self.scale));
        }
        for (exp, symbol) in self.dimension.base_units() {
            match exp {
                0 => {}
                1 => parts.push(symbol.to_string()),
                _ => parts.push(format!("{symbol}^{exp}")),
            }
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_does_not_affect_equality() {
        let q = (Units::KG / Units::KG).with_label("kg/kg");
        assert_eq!(q, Units::nondimensional());
        assert!(q.is_nondimensional());
    }

    #[test]
    fn test_derived_units() {
        let wm2 = Units::W / (Units::M * Units::M);
        assert_eq!(wm2.dimension(), Dimension::RADIATIVE_FLUX);
        assert_eq!(wm2.to_string(), "kg s^-3");

        let pa = Units::KG / (Units::M * Units::S * Units::S);
        assert_eq!(pa, Units::PA);
    }

    #[test]
    fn test_scaled_units_differ() {
        assert_ne!(Units::micron(), Units::M);
        assert_eq!(Units::micron().to_string(), "micron");
        assert_eq!(Units::new(Dimension::LENGTH, 1e-6).to_string(), "0.000001 m");
    }
}
