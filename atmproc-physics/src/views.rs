//! Fixed-rank access to field views.
use atmproc_core::errors::{AtmError, AtmResult};
use ndarray::{ArrayBase, Dimension, IxDyn, RawData};

/// Convert a dynamic-rank view into the rank a kernel expects.
pub(crate) fn with_rank<S, D>(
    process: &str,
    field: &str,
    view: ArrayBase<S, IxDyn>,
) -> AtmResult<ArrayBase<S, D>>
where
    S: RawData,
    D: Dimension,
{
    let ndim = view.ndim();
    view.into_dimensionality::<D>()
        .map_err(|_| AtmError::IncompatibleField {
            field: field.to_string(),
            process: process.to_string(),
            reason: format!(
                "expected a rank {} field, found rank {}",
                D::NDIM.unwrap_or(0),
                ndim
            ),
        })
}
