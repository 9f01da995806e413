use atmproc_core::field::Real;
use ndarray::{ArrayView, ArrayViewMut, Dimension, Zip};

/// Ice cloud fraction diagnosed from the ice mixing ratio.
///
/// A cell is fully ice-cloudy as soon as `qi` exceeds the threshold.
pub fn ice_cloud_fraction(qi: Real, threshold: Real) -> Real {
    if qi > threshold {
        1.0
    } else {
        0.0
    }
}

/// Fill `ice` and `tot` from the ice mixing ratio and liquid cloud fraction.
///
/// The total cloud fraction assumes maximum overlap of the liquid and ice
/// clouds within a cell, i.e. `max(liq, ice)`.
pub fn cloud_fraction<D: Dimension>(
    qi: ArrayView<'_, Real, D>,
    liq: ArrayView<'_, Real, D>,
    ice_threshold: Real,
    ice: ArrayViewMut<'_, Real, D>,
    tot: ArrayViewMut<'_, Real, D>,
) {
    Zip::from(ice)
        .and(tot)
        .and(qi)
        .and(liq)
        .par_for_each(|ice, tot, &qi, &liq| {
            *ice = ice_cloud_fraction(qi, ice_threshold);
            *tot = liq.max(*ice);
        });
}
