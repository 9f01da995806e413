use super::layout::FieldLayout;
use crate::units::Units;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name, layout, units and grid of a field.
///
/// Two identifiers are equal iff all four components match. Identifiers are
/// the key used when binding fields to the processes that requested them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldIdentifier {
    name: String,
    layout: FieldLayout,
    units: Units,
    grid_name: String,
}

impl FieldIdentifier {
    pub fn new(
        name: impl Into<String>,
        layout: FieldLayout,
        units: Units,
        grid_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            layout,
            units,
            grid_name: grid_name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn units(&self) -> &Units {
        &self.units
    }

    pub fn grid_name(&self) -> &str {
        &self.grid_name
    }

    /// Describe how `other` differs from this identifier, if it does.
    pub fn mismatch(&self, other: &FieldIdentifier) -> Option<String> {
        if self.name != other.name {
            Some(format!("name '{}' differs from '{}'", other.name, self.name))
        } else if self.layout != other.layout {
            Some(format!("layout {} differs from {}", other.layout, self.layout))
        } else if self.units != other.units {
            Some(format!("units [{}] differ from [{}]", other.units, self.units))
        } else if self.grid_name != other.grid_name {
            Some(format!(
                "grid '{}' differs from '{}'",
                other.grid_name, self.grid_name
            ))
        } else {
            None
        }
    }
}

impl fmt::Display for FieldIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {} [{}]",
            self.name, self.grid_name, self.layout, self.units
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::layout::tags::{COL, LEV};

    fn layout() -> FieldLayout {
        FieldLayout::new(&[COL, LEV], &[3, 1]).unwrap()
    }

    #[test]
    fn test_equality_requires_all_components() {
        let q = Units::nondimensional().with_label("kg/kg");
        let a = FieldIdentifier::new("qi", layout(), q.clone(), "Physics");
        let b = FieldIdentifier::new("qi", layout(), Units::nondimensional(), "Physics");
        assert_eq!(a, b);
        assert!(a.mismatch(&b).is_none());

        let other_grid = FieldIdentifier::new("qi", layout(), q.clone(), "Dynamics");
        assert_ne!(a, other_grid);
        assert!(a.mismatch(&other_grid).unwrap().contains("grid"));

        let other_units = FieldIdentifier::new("qi", layout(), Units::K, "Physics");
        assert_ne!(a, other_units);
        assert!(a.mismatch(&other_units).unwrap().contains("units"));
    }

    #[test]
    fn test_display() {
        let id = FieldIdentifier::new("T_mid", layout(), Units::K, "Physics");
        assert_eq!(id.to_string(), "T_mid[Physics] <COL,LEV>(3,1) [K]");
    }
}
