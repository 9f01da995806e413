//! Initial condition reader.
//!
//! Initial conditions are a set of named variables with named dimensions,
//! stored as TOML:
//!
//! ```toml
//! [variables.qi]
//! dims = ["ncol", "lev"]
//! shape = [3, 1]
//! data = [0.0, 0.0, 0.002]
//! ```
//!
//! Dimension names are the [`FieldTag::io_name`](crate::field::FieldTag::io_name)
//! of each tag of the target field's layout. Data is in row-major order.

use crate::errors::{AtmError, AtmResult};
use crate::field::{Field, FieldLayout, Real};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcVariable {
    pub dims: Vec<String>,
    pub shape: Vec<usize>,
    pub data: Vec<Real>,
}

impl IcVariable {
    pub fn new(dims: Vec<String>, shape: Vec<usize>, data: Vec<Real>) -> AtmResult<Self> {
        let var = Self { dims, shape, data };
        var.validate("<new>")?;
        Ok(var)
    }

    /// A variable shaped like `layout`.
    pub fn from_layout(layout: &FieldLayout, data: Vec<Real>) -> AtmResult<Self> {
        Self::new(
            layout
                .tags()
                .iter()
                .map(|t| t.io_name().to_string())
                .collect(),
            layout.extents().to_vec(),
            data,
        )
    }

    fn validate(&self, name: &str) -> AtmResult<()> {
        if self.dims.len() != self.shape.len() {
            return Err(AtmError::Parse(format!(
                "initial condition '{name}': {} dimension names for a rank {} shape",
                self.dims.len(),
                self.shape.len()
            )));
        }
        let size: usize = self.shape.iter().product();
        if size != self.data.len() {
            return Err(AtmError::Parse(format!(
                "initial condition '{name}': shape {:?} needs {} values, found {}",
                self.shape,
                size,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Describe how this variable fails to fit `layout`, if it does.
    fn layout_mismatch(&self, layout: &FieldLayout) -> Option<String> {
        let dims: Vec<&str> = layout.tags().iter().map(|t| t.io_name()).collect();
        if self.dims != dims {
            Some(format!(
                "file dimensions ({}) do not match field dimensions ({})",
                self.dims.join(","),
                dims.join(",")
            ))
        } else if self.shape != layout.extents() {
            Some(format!(
                "file shape {:?} does not match field shape {:?}",
                self.shape,
                layout.extents()
            ))
        } else {
            None
        }
    }
}

/// Which fields were found in an initial condition set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IcReport {
    pub present: Vec<String>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    #[serde(default)]
    variables: BTreeMap<String, IcVariable>,
}

impl InitialConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> AtmResult<Self> {
        let ic: InitialConditions = toml::from_str(content)
            .map_err(|e| AtmError::Parse(format!("initial conditions: {e}")))?;
        for (name, var) in &ic.variables {
            var.validate(name)?;
        }
        Ok(ic)
    }

    pub fn from_file(path: impl AsRef<Path>) -> AtmResult<Self> {
        let path = path.as_ref();
        log::info!("Reading initial conditions from {}", path.display());
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn to_toml_string(&self) -> AtmResult<String> {
        toml::to_string(self).map_err(|e| AtmError::Parse(format!("initial conditions: {e}")))
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> AtmResult<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, var: IcVariable) -> AtmResult<()> {
        let name = name.into();
        var.validate(&name)?;
        self.variables.insert(name, var);
        Ok(())
    }

    pub fn has_var(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&IcVariable> {
        self.variables.get(name)
    }

    pub fn var_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Partition `names` into those present in the file and those missing.
    pub fn check_fields<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> IcReport {
        let mut report = IcReport::default();
        for name in names {
            match self.has_var(name) {
                true => report.present.push(name.to_string()),
                false => report.missing.push(name.to_string()),
            }
        }
        report
    }

    /// Fill every field that has a variable in the set, writing as `writer`.
    ///
    /// `writer` must be a provider of each present field. Missing fields are
    /// left untouched and listed in the report.
    pub fn apply<'a>(
        &self,
        fields: impl IntoIterator<Item = &'a Field<Real>>,
        writer: &str,
    ) -> AtmResult<IcReport> {
        let mut report = IcReport::default();
        for field in fields {
            let Some(var) = self.variables.get(field.name()) else {
                report.missing.push(field.name().to_string());
                continue;
            };
            if let Some(reason) = var.layout_mismatch(field.layout()) {
                return Err(AtmError::IncompatibleField {
                    field: field.name().to_string(),
                    process: writer.to_string(),
                    reason,
                });
            }
            field.copy_from_logical(&var.data, writer)?;
            report.present.push(field.name().to_string());
        }
        if !report.missing.is_empty() {
            log::warn!(
                "Initial conditions have no values for [{}]",
                report.missing.join(", ")
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tags::{COL, LEV};
    use crate::field::FieldIdentifier;
    use crate::units::Units;

    const IC: &str = r#"
[variables.qi]
dims = ["ncol", "lev"]
shape = [3, 1]
data = [0.0, 0.0, 0.002]

[variables.cldfrac_liq]
dims = ["ncol", "lev"]
shape = [3, 1]
data = [0.0, 0.5, 0.9]
"#;

    fn field(name: &str, ncol: usize) -> Field {
        let layout = FieldLayout::new(&[COL, LEV], &[ncol, 1]).unwrap();
        let f = Field::new(
            FieldIdentifier::new(name, layout, Units::nondimensional(), "Physics"),
            4,
        )
        .unwrap();
        f.add_provider("initial_conditions");
        f
    }

    #[test]
    fn test_apply_reports_present_and_missing() {
        let ic = InitialConditions::from_toml_str(IC).unwrap();
        let qi = field("qi", 3);
        let liq = field("cldfrac_liq", 3);
        let t = field("T_mid", 3);

        let report = ic.apply([&qi, &liq, &t], "initial_conditions").unwrap();
        assert_eq!(report.present, ["qi", "cldfrac_liq"]);
        assert_eq!(report.missing, ["T_mid"]);
        assert_eq!(qi.get_view().to_vec(), [0.0, 0.0, 0.002]);
        assert_eq!(liq.get_view().to_vec(), [0.0, 0.5, 0.9]);
    }

    #[test]
    fn test_shape_mismatch() {
        let ic = InitialConditions::from_toml_str(IC).unwrap();
        let err = ic
            .apply([&field("qi", 4)], "initial_conditions")
            .unwrap_err();
        assert!(matches!(err, AtmError::IncompatibleField { .. }));
        assert!(err.to_string().contains("shape"));
    }

    #[test]
    fn test_inconsistent_variable_is_rejected() {
        let bad = r#"
[variables.qi]
dims = ["ncol", "lev"]
shape = [3, 1]
data = [0.0, 0.0]
"#;
        assert!(matches!(
            InitialConditions::from_toml_str(bad),
            Err(AtmError::Parse(_))
        ));
        assert!(IcVariable::new(vec!["ncol".to_string()], vec![2, 1], vec![0.0; 2]).is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ic.toml");

        let qi = field("qi", 3);
        let mut ic = InitialConditions::new();
        ic.insert(
            "qi",
            IcVariable::from_layout(qi.layout(), vec![1e-3, 2e-3, 3e-3]).unwrap(),
        )
        .unwrap();
        ic.write_file(&path).unwrap();

        let read = InitialConditions::from_file(&path).unwrap();
        assert_eq!(read, ic);
        assert_eq!(
            read.check_fields(["qi", "qv"]),
            IcReport {
                present: vec!["qi".to_string()],
                missing: vec!["qv".to_string()],
            }
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            InitialConditions::from_file("/nonexistent/ic.toml"),
            Err(AtmError::Io(_))
        ));
    }
}
