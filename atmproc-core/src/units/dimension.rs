//! Physical dimensions of field quantities.
//!
//! Dimensions are integer exponents of the SI base quantities that show up
//! in atmosphere physics: mass, length, time, temperature and amount of
//! substance.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul};

/// Represents the physical dimension of a quantity.
///
/// For example:
/// - Pressure has dimensions M·L⁻¹·T⁻² (mass = 1, length = -1, time = -2)
/// - Radiative flux (W/m²) has dimensions M·T⁻³
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Dimension {
    /// Mass exponent (M)
    pub mass: i8,
    /// Length exponent (L)
    pub length: i8,
    /// Time exponent (T)
    pub time: i8,
    /// Temperature exponent (Θ)
    pub temperature: i8,
    /// Amount of substance exponent (N)
    pub amount: i8,
}

impl Dimension {
    /// All exponents zero.
    #[must_use]
    pub const fn dimensionless() -> Self {
        Self::new(0, 0, 0, 0, 0)
    }

    #[must_use]
    pub const fn new(mass: i8, length: i8, time: i8, temperature: i8, amount: i8) -> Self {
        Self {
            mass,
            length,
            time,
            temperature,
            amount,
        }
    }

    pub const MASS: Self = Self::new(1, 0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(0, 1, 0, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 1, 0);
    pub const AMOUNT: Self = Self::new(0, 0, 0, 0, 1);

    /// Pressure dimension (M·L⁻¹·T⁻²).
    pub const PRESSURE: Self = Self::new(1, -1, -2, 0, 0);

    /// Power dimension (M·L²·T⁻³).
    pub const POWER: Self = Self::new(1, 2, -3, 0, 0);

    /// Radiative flux dimension (M·T⁻³), equivalent to W/m².
    pub const RADIATIVE_FLUX: Self = Self::new(1, 0, -3, 0, 0);

    #[must_use]
    pub const fn is_dimensionless(&self) -> bool {
        self.mass == 0
            && self.length == 0
            && self.time == 0
            && self.temperature == 0
            && self.amount == 0
    }

    /// Raises this dimension to an integer power.
    #[must_use]
    pub const fn pow(&self, exp: i8) -> Self {
        Self::new(
            self.mass * exp,
            self.length * exp,
            self.time * exp,
            self.temperature * exp,
            self.amount * exp,
        )
    }

    /// Exponents paired with the SI base unit symbol they apply to.
    pub(crate) fn base_units(&self) -> [(i8, &'static str); 5] {
        [
            (self.mass, "kg"),
            (self.length, "m"),
            (self.time, "s"),
            (self.temperature, "K"),
            (self.amount, "mol"),
        ]
    }
}

impl Mul for Dimension {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::new(
            self.mass + rhs.mass,
            self.length + rhs.length,
            self.time + rhs.time,
            self.temperature + rhs.temperature,
            self.amount + rhs.amount,
        )
    }
}

impl Div for Dimension {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        Self::new(
            self.mass - rhs.mass,
            self.length - rhs.length,
            self.time - rhs.time,
            self.temperature - rhs.temperature,
            self.amount - rhs.amount,
        )
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }

        let symbols = [
            (self.mass, "M"),
            (self.length, "L"),
            (self.time, "T"),
            (self.temperature, "Θ"),
            (self.amount, "N"),
        ];
        let parts: Vec<String> = symbols
            .iter()
            .filter(|(exp, _)| *exp != 0)
            .map(|(exp, sym)| match exp {
                1 => sym.to_string(),
                _ => format!("{sym}^{exp}"),
            })
            .collect();

        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_from_base_dimensions() {
        // Pa = N / m^2 = kg m s^-2 / m^2
        let force = Dimension::MASS * Dimension::LENGTH / Dimension::TIME.pow(2);
        assert_eq!(force / Dimension::LENGTH.pow(2), Dimension::PRESSURE);
    }

    #[test]
    fn test_radiative_flux() {
        let flux = Dimension::POWER / Dimension::LENGTH.pow(2);
        assert_eq!(flux, Dimension::RADIATIVE_FLUX);
    }

    #[test]
    fn test_mixing_ratio_is_dimensionless() {
        let q = Dimension::MASS / Dimension::MASS;
        assert!(q.is_dimensionless());
        assert_eq!(format!("{}", q), "dimensionless");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Dimension::MASS), "M");
        assert_eq!(format!("{}", Dimension::PRESSURE), "M L^-1 T^-2");
    }
}
