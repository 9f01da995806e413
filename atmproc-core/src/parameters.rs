//! Flat key/value configuration handed to a process at construction.
//!
//! Processes convert a [`ParameterList`] into a typed configuration struct
//! once, while setting their grids, so that a bad value fails setup rather
//! than a later time step.

use crate::errors::{AtmError, AtmResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    StringArray(Vec<String>),
    RealArray(Vec<f64>),
}

impl ParameterValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Bool(_) => "bool",
            ParameterValue::Integer(_) => "integer",
            ParameterValue::Real(_) => "real",
            ParameterValue::String(_) => "string",
            ParameterValue::StringArray(_) => "string array",
            ParameterValue::RealArray(_) => "real array",
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Real(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<Vec<f64>> for ParameterValue {
    fn from(value: Vec<f64>) -> Self {
        ParameterValue::RealArray(value)
    }
}

impl From<Vec<&str>> for ParameterValue {
    fn from(value: Vec<&str>) -> Self {
        ParameterValue::StringArray(value.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for ParameterValue {
    fn from(value: Vec<String>) -> Self {
        ParameterValue::StringArray(value)
    }
}

/// Ordered set of named parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterList {
    values: BTreeMap<String, ParameterValue>,
}

macro_rules! typed_getter {
    ($get:ident, $get_or:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $get(&self, key: &str) -> AtmResult<$ty> {
            match self.values.get(key) {
                Some(ParameterValue::$variant(v)) => Ok(v.clone()),
                Some(other) => Err(self.wrong_type(key, $expected, other)),
                None => Err(AtmError::InvalidConfiguration(format!(
                    "missing parameter '{key}'"
                ))),
            }
        }

        pub fn $get_or(&self, key: &str, default: $ty) -> AtmResult<$ty> {
            match self.values.contains_key(key) {
                true => self.$get(key),
                false => Ok(default),
            }
        }
    };
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> AtmResult<Self> {
        toml::from_str(content).map_err(|e| AtmError::Parse(format!("parameter list: {e}")))
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Builder style variant of [`set`](ParameterList::set).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.values.get(key)
    }

    pub fn is_parameter(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn wrong_type(&self, key: &str, expected: &str, found: &ParameterValue) -> AtmError {
        AtmError::InvalidConfiguration(format!(
            "parameter '{key}' should be a {expected}, found a {}",
            found.type_name()
        ))
    }

    typed_getter!(get_bool, get_bool_or, Bool, bool, "bool");
    typed_getter!(get_int, get_int_or, Integer, i64, "integer");
    typed_getter!(get_string, get_string_or, String, String, "string");
    typed_getter!(
        get_string_array,
        get_string_array_or,
        StringArray,
        Vec<String>,
        "string array"
    );

    /// Real valued parameter. Integers are accepted and widened.
    pub fn get_real(&self, key: &str) -> AtmResult<f64> {
        match self.values.get(key) {
            Some(ParameterValue::Real(v)) => Ok(*v),
            Some(ParameterValue::Integer(v)) => Ok(*v as f64),
            Some(other) => Err(self.wrong_type(key, "real", other)),
            None => Err(AtmError::InvalidConfiguration(format!(
                "missing parameter '{key}'"
            ))),
        }
    }

    pub fn get_real_or(&self, key: &str, default: f64) -> AtmResult<f64> {
        match self.values.contains_key(key) {
            true => self.get_real(key),
            false => Ok(default),
        }
    }

    pub fn get_real_array(&self, key: &str) -> AtmResult<Vec<f64>> {
        match self.values.get(key) {
            Some(ParameterValue::RealArray(v)) => Ok(v.clone()),
            Some(other) => Err(self.wrong_type(key, "real array", other)),
            None => Err(AtmError::InvalidConfiguration(format!(
                "missing parameter '{key}'"
            ))),
        }
    }

    pub fn get_real_array_or(&self, key: &str, default: Vec<f64>) -> AtmResult<Vec<f64>> {
        match self.values.contains_key(key) {
            true => self.get_real_array(key),
            false => Ok(default),
        }
    }
}

impl<K: Into<String>, V: Into<ParameterValue>> FromIterator<(K, V)> for ParameterList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = ParameterList::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let params = ParameterList::new()
            .with("ice_cloud_threshold", 1e-12)
            .with("num_sw_bands", 14_i64)
            .with("active_gases", vec!["h2o", "co2"])
            .with("do_aerosol_rad", false);

        assert_eq!(params.get_real("ice_cloud_threshold").unwrap(), 1e-12);
        assert_eq!(params.get_int("num_sw_bands").unwrap(), 14);
        // Integers widen to reals
        assert_eq!(params.get_real("num_sw_bands").unwrap(), 14.0);
        assert_eq!(
            params.get_string_array("active_gases").unwrap(),
            vec!["h2o", "co2"]
        );
        assert!(!params.get_bool("do_aerosol_rad").unwrap());
        assert_eq!(params.get_real_or("solar_constant", 1361.0).unwrap(), 1361.0);
    }

    #[test]
    fn test_errors() {
        let params = ParameterList::new().with("num_sw_bands", "fourteen");
        let err = params.get_int("num_sw_bands").unwrap_err();
        assert!(matches!(err, AtmError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("num_sw_bands"));
        // A present key with the wrong type is not replaced by the default
        assert!(params.get_int_or("num_sw_bands", 14).is_err());
        assert!(params.get_real("missing").is_err());
    }

    #[test]
    fn test_from_toml() {
        let params = ParameterList::from_toml_str(
            r#"
            active_gases = ["h2o", "co2", "o3"]
            solar_constant = 1361.0
            num_sw_bands = 14
            "#,
        )
        .unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.get_string_array("active_gases").unwrap().len(), 3);
        assert_eq!(params.get_int("num_sw_bands").unwrap(), 14);
        assert_eq!(
            params.keys().collect::<Vec<_>>(),
            ["active_gases", "num_sw_bands", "solar_constant"]
        );
    }
}
