//! Post-condition checks on process outputs.
//!
//! A property check inspects a field without modifying it and either passes
//! or fails with a description of the offending value. Checks are attached
//! to fields computed by a process and evaluated, in registration order,
//! after every successful `run` of that process.
//!
//! Checks are serialisable trait objects so that extra checks can be listed
//! in a driver configuration file:
//!
//! ```
//! use atmproc_core::property_check::{FieldWithinIntervalCheck, PropertyCheck};
//!
//! let check: Box<dyn PropertyCheck> = Box::new(FieldWithinIntervalCheck::new(0.0, 1.0, true).unwrap());
//! let toml = toml::to_string(&check).unwrap();
//! let restored: Box<dyn PropertyCheck> = toml::from_str(&toml).unwrap();
//! assert_eq!(restored.name(), "within interval [0, 1]");
//! ```

use crate::errors::{AtmError, AtmResult};
use crate::field::{ConstField, Real};
use ndarray::Dimension;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a single property check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckResult {
    Pass,
    Fail(String),
}

impl CheckResult {
    pub fn passed(&self) -> bool {
        matches!(self, CheckResult::Pass)
    }
}

#[typetag::serde(tag = "type")]
pub trait PropertyCheck: fmt::Debug + Send + Sync {
    /// Short description of the property, used in error messages.
    fn name(&self) -> String;

    fn check(&self, field: &ConstField<Real>) -> CheckResult;
}

/// Find the first logical element violating `is_valid`.
///
/// Returns the value and its multi-index.
fn first_violation(
    field: &ConstField<Real>,
    is_valid: impl Fn(Real) -> bool,
) -> Option<(Real, Vec<usize>)> {
    let guard = field.get_view();
    let view = guard.view();
    view.indexed_iter()
        .find(|(_, v)| !is_valid(**v))
        .map(|(idx, v)| (*v, idx.slice().to_vec()))
}

fn min_max(field: &ConstField<Real>) -> (Real, Real) {
    let guard = field.get_view();
    let view = guard.view();
    view.iter()
        .filter(|v| !v.is_nan())
        .fold((Real::INFINITY, Real::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

fn describe_failure(field: &ConstField<Real>, value: Real, index: &[usize], bound: &str) -> String {
    let (lo, hi) = min_max(field);
    format!(
        "value {value} at index {index:?} is outside {bound} (field minimum {lo}, maximum {hi})"
    )
}

/// Checks that every element lies within an interval.
///
/// With `inclusive` the interval is closed, otherwise open. NaN never
/// satisfies the check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldWithinIntervalCheck {
    lower: Real,
    upper: Real,
    inclusive: bool,
}

impl FieldWithinIntervalCheck {
    pub fn new(lower: Real, upper: Real, inclusive: bool) -> AtmResult<Self> {
        if !(lower <= upper) {
            return Err(AtmError::InvalidConfiguration(format!(
                "interval check needs lower <= upper, got [{lower}, {upper}]"
            )));
        }
        Ok(Self {
            lower,
            upper,
            inclusive,
        })
    }

    pub fn contains(&self, v: Real) -> bool {
        match self.inclusive {
            true => self.lower <= v && v <= self.upper,
            false => self.lower < v && v < self.upper,
        }
    }

    fn bound(&self) -> String {
        match self.inclusive {
            true => format!("[{}, {}]", self.lower, self.upper),
            false => format!("({}, {})", self.lower, self.upper),
        }
    }
}

#[typetag::serde]
impl PropertyCheck for FieldWithinIntervalCheck {
    fn name(&self) -> String {
        format!("within interval {}", self.bound())
    }

    fn check(&self, field: &ConstField<Real>) -> CheckResult {
        match first_violation(field, |v| self.contains(v)) {
            None => CheckResult::Pass,
            Some((value, index)) => {
                CheckResult::Fail(describe_failure(field, value, &index, &self.bound()))
            }
        }
    }
}

/// Checks that every element is at least `lower_bound`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLowerBoundCheck {
    lower_bound: Real,
}

impl FieldLowerBoundCheck {
    pub fn new(lower_bound: Real) -> Self {
        Self { lower_bound }
    }
}

#[typetag::serde]
impl PropertyCheck for FieldLowerBoundCheck {
    fn name(&self) -> String {
        format!("lower bound {}", self.lower_bound)
    }

    fn check(&self, field: &ConstField<Real>) -> CheckResult {
        match first_violation(field, |v| v >= self.lower_bound) {
            None => CheckResult::Pass,
            Some((value, index)) => CheckResult::Fail(describe_failure(
                field,
                value,
                &index,
                &format!("[{}, inf)", self.lower_bound),
            )),
        }
    }
}

/// Checks that no element is NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldNaNCheck {}

#[typetag::serde]
impl PropertyCheck for FieldNaNCheck {
    fn name(&self) -> String {
        "no NaN values".to_string()
    }

    fn check(&self, field: &ConstField<Real>) -> CheckResult {
        match first_violation(field, |v| !v.is_nan()) {
            None => CheckResult::Pass,
            Some((_, index)) => CheckResult::Fail(format!("NaN found at index {index:?}")),
        }
    }
}

/// A check bound to the field it inspects.
#[derive(Debug)]
pub struct AttachedCheck {
    field: ConstField<Real>,
    check: Box<dyn PropertyCheck>,
}

impl AttachedCheck {
    pub fn field(&self) -> &ConstField<Real> {
        &self.field
    }

    pub fn check(&self) -> &dyn PropertyCheck {
        self.check.as_ref()
    }
}

/// Ordered list of post-condition checks owned by one process.
#[derive(Debug, Default)]
pub struct PropertyCheckList {
    checks: Vec<AttachedCheck>,
}

impl PropertyCheckList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `check` to `field`.
    pub fn add_postcondition_check(
        &mut self,
        field: ConstField<Real>,
        check: impl PropertyCheck + 'static,
    ) {
        self.add_boxed(field, Box::new(check));
    }

    pub fn add_boxed(&mut self, field: ConstField<Real>, check: Box<dyn PropertyCheck>) {
        self.checks.push(AttachedCheck { field, check });
    }

    /// Run every check in registration order, stopping at the first failure.
    pub fn run_all(&self, process: &str) -> AtmResult<()> {
        for attached in &self.checks {
            if let CheckResult::Fail(details) = attached.check.check(&attached.field) {
                return Err(AtmError::PostconditionViolation {
                    process: process.to_string(),
                    field: attached.field.name().to_string(),
                    check: attached.check.name(),
                    details,
                });
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachedCheck> {
        self.checks.iter()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tags::{COL, LEV};
    use crate::field::{Field, FieldIdentifier, FieldLayout};
    use crate::units::Units;

    fn field_with(values: &[Real]) -> Field {
        let layout = FieldLayout::new(&[COL, LEV], &[values.len(), 1]).unwrap();
        let id = FieldIdentifier::new("cldfrac_tot", layout, Units::nondimensional(), "Physics");
        let f = Field::new(id, 4).unwrap();
        f.add_provider("test");
        f.copy_from_logical(values, "test").unwrap();
        f
    }

    #[test]
    fn test_interval_inclusive_and_exclusive() {
        let f = field_with(&[0.0, 0.5, 1.0]).get_const();
        let closed = FieldWithinIntervalCheck::new(0.0, 1.0, true).unwrap();
        let open = FieldWithinIntervalCheck::new(0.0, 1.0, false).unwrap();
        assert!(closed.check(&f).passed());
        assert!(!open.check(&f).passed());
        assert_eq!(open.name(), "within interval (0, 1)");
    }

    #[test]
    fn test_failure_reports_location_and_value() {
        let f = field_with(&[0.2, 1.5, 0.1]).get_const();
        let check = FieldWithinIntervalCheck::new(0.0, 1.0, true).unwrap();
        match check.check(&f) {
            CheckResult::Fail(msg) => {
                assert!(msg.contains("1.5"), "{msg}");
                assert!(msg.contains("[1, 0]"), "{msg}");
            }
            CheckResult::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn test_padding_is_not_checked() {
        // Padding is zero, which would fail a lower bound of 200
        let f = field_with(&[250.0, 300.0, 280.0]);
        assert!(f.is_padded());
        let check = FieldLowerBoundCheck::new(200.0);
        assert!(check.check(&f.get_const()).passed());
    }

    #[test]
    fn test_nan_fails_interval_and_nan_checks() {
        let f = field_with(&[0.2, Real::NAN, 0.1]).get_const();
        let interval = FieldWithinIntervalCheck::new(0.0, 1.0, true).unwrap();
        assert!(!interval.check(&f).passed());
        assert!(!FieldNaNCheck::default().check(&f).passed());
    }

    #[test]
    fn test_invalid_interval() {
        assert!(matches!(
            FieldWithinIntervalCheck::new(1.0, 0.0, true),
            Err(AtmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_list_reports_first_failure_in_order() {
        let good = field_with(&[0.0, 0.5, 1.0]);
        let bad = field_with(&[-1.0, 0.5, 2.0]);
        let mut checks = PropertyCheckList::new();
        checks.add_postcondition_check(
            good.get_const(),
            FieldWithinIntervalCheck::new(0.0, 1.0, true).unwrap(),
        );
        checks.add_postcondition_check(bad.get_const(), FieldLowerBoundCheck::new(0.0));
        checks.add_postcondition_check(
            bad.get_const(),
            FieldWithinIntervalCheck::new(0.0, 1.0, true).unwrap(),
        );

        let err = checks.run_all("cld_fraction").unwrap_err();
        match err {
            AtmError::PostconditionViolation {
                process, check, ..
            } => {
                assert_eq!(process, "cld_fraction");
                assert_eq!(check, "lower bound 0");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_checks_serialise_with_type_tag() {
        let check: Box<dyn PropertyCheck> = Box::new(FieldLowerBoundCheck::new(0.0));
        let json = serde_json::to_string(&check).unwrap();
        assert_eq!(json, r#"{"type":"FieldLowerBoundCheck","lower_bound":0.0}"#);

        let restored: Box<dyn PropertyCheck> = serde_json::from_str(
            r#"{"type":"FieldWithinIntervalCheck","lower":0.0,"upper":1.0,"inclusive":false}"#,
        )
        .unwrap();
        assert_eq!(restored.name(), "within interval (0, 1)");
    }
}
