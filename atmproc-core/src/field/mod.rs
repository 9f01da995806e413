//! Fields: named, shared, multidimensional arrays with tracking metadata.
//!
//! A [`Field`] aliases one contiguous allocation. Cloning a field clones the
//! handle, never the data, so the process that writes a field (its provider)
//! and every process that reads it (its customers) see the same storage.
//!
//! Two handle types encode who may write:
//! - [`Field`] is the full handle held by the field manager and handed to
//!   providers. Writing through it still requires naming a registered
//!   provider, otherwise [`AtmError::AccessViolation`] is raised.
//! - [`ConstField`] is the read-only handle handed to customers. It has no
//!   write methods at all.
//!
//! Storage may be padded: the fastest varying dimension is rounded up to a
//! multiple of the field's pack size, so vectorized kernels can operate on
//! whole packs. Views come in padded and logical (unpadded) flavours, both
//! aliasing the same memory.

mod identifier;
mod layout;
mod request;
mod tracking;

pub use identifier::FieldIdentifier;
pub use layout::{tags, FieldLayout, FieldTag};
pub use request::{FieldRequest, FieldRequestRegistry, RequestKind};
pub use tracking::FieldTracking;

use crate::errors::{AtmError, AtmResult};
use crate::time::TimeStamp;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Axis, IxDyn, Slice};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Floating point type used for physical fields.
pub type Real = f64;

/// Element types that can be stored in a field.
pub trait FieldValue: Copy + Default + Send + Sync + fmt::Debug + 'static {}

impl<T: Copy + Default + Send + Sync + fmt::Debug + 'static> FieldValue for T {}

/// How a field's storage is laid out in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationProperties {
    pack_size: usize,
    last_dim_alloc: usize,
    alloc_size: usize,
}

impl AllocationProperties {
    fn new(layout: &FieldLayout, pack_size: usize) -> AtmResult<Self> {
        if pack_size == 0 {
            return Err(AtmError::InvalidLayout(
                "pack size must be at least 1".to_string(),
            ));
        }
        let last = layout.last_extent();
        let last_dim_alloc = last.div_ceil(pack_size) * pack_size;
        let alloc_size = layout.size() / last * last_dim_alloc;
        Ok(Self {
            pack_size,
            last_dim_alloc,
            alloc_size,
        })
    }

    pub fn pack_size(&self) -> usize {
        self.pack_size
    }

    /// Allocated extent of the fastest varying dimension.
    pub fn last_dim_alloc(&self) -> usize {
        self.last_dim_alloc
    }

    /// Total number of allocated elements, padding included.
    pub fn alloc_size(&self) -> usize {
        self.alloc_size
    }
}

#[derive(Debug)]
struct FieldHeader {
    identifier: FieldIdentifier,
    alloc: AllocationProperties,
    tracking: RwLock<FieldTracking>,
}

/// Read-write handle to a field.
#[derive(Clone)]
pub struct Field<T: FieldValue = Real> {
    header: Arc<FieldHeader>,
    data: Arc<RwLock<Vec<T>>>,
}

impl<T: FieldValue> Field<T> {
    /// Allocate a zero-initialised field.
    ///
    /// The fastest varying dimension is padded up to a multiple of `pack_size`.
    pub fn new(identifier: FieldIdentifier, pack_size: usize) -> AtmResult<Self> {
        let alloc = AllocationProperties::new(identifier.layout(), pack_size)?;
        Ok(Self {
            data: Arc::new(RwLock::new(vec![T::default(); alloc.alloc_size()])),
            header: Arc::new(FieldHeader {
                identifier,
                alloc,
                tracking: RwLock::new(FieldTracking::default()),
            }),
        })
    }

    pub fn identifier(&self) -> &FieldIdentifier {
        &self.header.identifier
    }

    pub fn name(&self) -> &str {
        self.header.identifier.name()
    }

    pub fn layout(&self) -> &FieldLayout {
        self.header.identifier.layout()
    }

    pub fn allocation(&self) -> &AllocationProperties {
        &self.header.alloc
    }

    pub fn pack_size(&self) -> usize {
        self.header.alloc.pack_size()
    }

    /// True iff the allocation is larger than the logical layout.
    pub fn is_padded(&self) -> bool {
        self.header.alloc.alloc_size() > self.layout().size()
    }

    /// A read-only handle to the same storage.
    pub fn get_const(&self) -> ConstField<T> {
        ConstField {
            inner: self.clone(),
        }
    }

    /// True if both handles alias the same storage.
    pub fn is_aliasing(&self, other: &Field<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn tracking(&self) -> RwLockReadGuard<'_, FieldTracking> {
        self.header
            .tracking
            .read()
            .expect("Field tracking lock poisoned")
    }

    fn tracking_mut(&self) -> RwLockWriteGuard<'_, FieldTracking> {
        self.header
            .tracking
            .write()
            .expect("Field tracking lock poisoned")
    }

    pub fn time_stamp(&self) -> Option<TimeStamp> {
        self.tracking().time_stamp()
    }

    /// Record that the field holds values valid at `t`.
    pub fn update_time_stamp(&self, t: TimeStamp) -> AtmResult<()> {
        self.tracking_mut().update_time_stamp(self.name(), t)
    }

    pub fn add_provider(&self, name: &str) {
        self.tracking_mut().add_provider(name);
    }

    pub fn add_customer(&self, name: &str) {
        self.tracking_mut().add_customer(name);
    }

    pub fn add_to_group(&self, group: &str) {
        self.tracking_mut().add_to_group(group);
    }

    pub fn is_provider(&self, name: &str) -> bool {
        self.tracking().is_provider(name)
    }

    /// Read-only view of the field.
    pub fn get_view(&self) -> FieldReadGuard<'_, T> {
        FieldReadGuard {
            header: &self.header,
            data: self.data.read().expect("Field data lock poisoned"),
        }
    }

    /// Writable view of the field on behalf of `provider`.
    ///
    /// Fails with [`AtmError::AccessViolation`] unless `provider` has been
    /// registered as a provider of this field.
    pub fn get_view_mut(&self, provider: &str) -> AtmResult<FieldWriteGuard<'_, T>> {
        if !self.is_provider(provider) {
            return Err(AtmError::AccessViolation {
                field: self.name().to_string(),
                reason: format!(
                    "'{}' requested write access but is not a provider (providers: [{}])",
                    provider,
                    self.tracking().providers().join(", ")
                ),
            });
        }
        Ok(FieldWriteGuard {
            header: &self.header,
            data: self.data.write().expect("Field data lock poisoned"),
        })
    }

    /// Set every logical and padding element to `value`.
    pub fn fill(&self, value: T, provider: &str) -> AtmResult<()> {
        let mut view = self.get_view_mut(provider)?;
        view.as_padded_slice_mut().fill(value);
        Ok(())
    }

    /// Copy logical values, given in row-major order, into the field.
    pub fn copy_from_logical(&self, values: &[T], provider: &str) -> AtmResult<()> {
        let size = self.layout().size();
        if values.len() != size {
            return Err(AtmError::IncompatibleField {
                field: self.name().to_string(),
                process: provider.to_string(),
                reason: format!("expected {} values, got {}", size, values.len()),
            });
        }
        let mut view = self.get_view_mut(provider)?;
        for (dst, src) in view.view_mut().iter_mut().zip(values) {
            *dst = *src;
        }
        Ok(())
    }
}

impl<T: FieldValue> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("identifier", &self.header.identifier.to_string())
            .field("pack_size", &self.header.alloc.pack_size())
            .field("tracking", &*self.tracking())
            .finish()
    }
}

/// Read-only handle to a field.
#[derive(Clone)]
pub struct ConstField<T: FieldValue = Real> {
    inner: Field<T>,
}

impl<T: FieldValue> ConstField<T> {
    pub fn identifier(&self) -> &FieldIdentifier {
        self.inner.identifier()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn layout(&self) -> &FieldLayout {
        self.inner.layout()
    }

    pub fn allocation(&self) -> &AllocationProperties {
        self.inner.allocation()
    }

    pub fn pack_size(&self) -> usize {
        self.inner.pack_size()
    }

    pub fn is_padded(&self) -> bool {
        self.inner.is_padded()
    }

    pub fn time_stamp(&self) -> Option<TimeStamp> {
        self.inner.time_stamp()
    }

    pub fn tracking(&self) -> RwLockReadGuard<'_, FieldTracking> {
        self.inner.tracking()
    }

    pub fn add_customer(&self, name: &str) {
        self.inner.add_customer(name);
    }

    pub fn is_aliasing(&self, other: &Field<T>) -> bool {
        self.inner.is_aliasing(other)
    }

    pub fn get_view(&self) -> FieldReadGuard<'_, T> {
        self.inner.get_view()
    }
}

impl<T: FieldValue> fmt::Debug for ConstField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConstField").field(&self.inner).finish()
    }
}

fn padded_shape(header: &FieldHeader) -> Vec<usize> {
    let mut shape = header.identifier.layout().extents().to_vec();
    if let Some(last) = shape.last_mut() {
        *last = header.alloc.last_dim_alloc();
    }
    shape
}

/// Shared borrow of a field's storage.
///
/// Holding the guard blocks writers of the same field.
pub struct FieldReadGuard<'a, T: FieldValue> {
    header: &'a FieldHeader,
    data: RwLockReadGuard<'a, Vec<T>>,
}

impl<T: FieldValue> FieldReadGuard<'_, T> {
    /// View over the logical elements only.
    pub fn view(&self) -> ArrayViewD<'_, T> {
        let mut view = self.padded_view();
        let layout = self.header.identifier.layout();
        if layout.rank() > 0 {
            view.slice_axis_inplace(
                Axis(layout.rank() - 1),
                Slice::from(0..layout.last_extent()),
            );
        }
        view
    }

    /// View including the padding of the fastest varying dimension.
    pub fn padded_view(&self) -> ArrayViewD<'_, T> {
        ArrayViewD::from_shape(IxDyn(&padded_shape(self.header)), &self.data[..])
            .expect("field allocation matches its padded layout")
    }

    /// Raw storage, padding included, in row-major order.
    pub fn as_padded_slice(&self) -> &[T] {
        &self.data[..]
    }

    /// Owned copy of the logical elements.
    pub fn to_owned_array(&self) -> ArrayD<T> {
        self.view().to_owned()
    }

    /// Logical elements in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        self.view().iter().copied().collect()
    }
}

impl<T: FieldValue> fmt::Debug for FieldReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldReadGuard")
            .field("field", &self.header.identifier.name())
            .field("alloc_size", &self.data.len())
            .finish()
    }
}

/// Exclusive borrow of a field's storage, held by one of its providers.
pub struct FieldWriteGuard<'a, T: FieldValue> {
    header: &'a FieldHeader,
    data: RwLockWriteGuard<'a, Vec<T>>,
}

impl<T: FieldValue> fmt::Debug for FieldWriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldWriteGuard")
            .field("field", &self.header.identifier.name())
            .field("alloc_size", &self.data.len())
            .finish()
    }
}

impl<T: FieldValue> FieldWriteGuard<'_, T> {
    /// Read-only view over the logical elements.
    pub fn view(&self) -> ArrayViewD<'_, T> {
        let mut view =
            ArrayViewD::from_shape(IxDyn(&padded_shape(self.header)), &self.data[..])
                .expect("field allocation matches its padded layout");
        let layout = self.header.identifier.layout();
        if layout.rank() > 0 {
            view.slice_axis_inplace(
                Axis(layout.rank() - 1),
                Slice::from(0..layout.last_extent()),
            );
        }
        view
    }

    /// Writable view over the logical elements.
    pub fn view_mut(&mut self) -> ArrayViewMutD<'_, T> {
        let layout = self.header.identifier.layout();
        let rank = layout.rank();
        let last = layout.last_extent();
        let mut view = self.padded_view_mut();
        if rank > 0 {
            view.slice_axis_inplace(Axis(rank - 1), Slice::from(0..last));
        }
        view
    }

    /// Writable view including padding.
    pub fn padded_view_mut(&mut self) -> ArrayViewMutD<'_, T> {
        let shape = padded_shape(self.header);
        ArrayViewMutD::from_shape(IxDyn(&shape), &mut self.data[..])
            .expect("field allocation matches its padded layout")
    }

    pub fn as_padded_slice(&self) -> &[T] {
        &self.data[..]
    }

    /// Raw storage, padding included, in row-major order.
    pub fn as_padded_slice_mut(&mut self) -> &mut [T] {
        &mut self.data[..]
    }
}

#[cfg(test)]
mod tests {
    use super::tags::{COL, LEV};
    use super::*;
    use crate::units::Units;

    fn make_field(ncol: usize, nlev: usize, pack_size: usize) -> Field {
        let layout = FieldLayout::new(&[COL, LEV], &[ncol, nlev]).unwrap();
        let id = FieldIdentifier::new("T_mid", layout, Units::K, "Physics");
        Field::new(id, pack_size).unwrap()
    }

    #[test]
    fn test_padding() {
        let f = make_field(3, 5, 4);
        assert!(f.is_padded());
        assert_eq!(f.allocation().last_dim_alloc(), 8);
        assert_eq!(f.allocation().alloc_size(), 24);

        let f = make_field(3, 8, 4);
        assert!(!f.is_padded());

        let f = make_field(3, 5, 1);
        assert!(!f.is_padded());
        assert_eq!(f.allocation().alloc_size(), 15);
    }

    #[test]
    fn test_zero_pack_size_is_rejected() {
        let layout = FieldLayout::new(&[COL], &[3]).unwrap();
        let id = FieldIdentifier::new("ps", layout, Units::PA, "Physics");
        assert!(matches!(
            Field::<Real>::new(id, 0),
            Err(AtmError::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_views_alias_storage() {
        let f = make_field(2, 3, 4);
        f.add_provider("p3");
        let customer = f.get_const();

        {
            let mut view = f.get_view_mut("p3").unwrap();
            view.view_mut()[[1, 2]] = 250.0;
        }

        let view = customer.get_view();
        assert_eq!(view.view().shape(), &[2, 3]);
        assert_eq!(view.padded_view().shape(), &[2, 4]);
        assert_eq!(view.view()[[1, 2]], 250.0);
        // Row-major with a padded row stride of 4
        assert_eq!(view.as_padded_slice()[4 + 2], 250.0);
        assert_eq!(view.to_vec(), vec![0.0, 0.0, 0.0, 0.0, 0.0, 250.0]);
    }

    #[test]
    fn test_write_requires_provider() {
        let f = make_field(2, 3, 1);
        let err = f.get_view_mut("cld_fraction").unwrap_err();
        assert!(matches!(err, AtmError::AccessViolation { .. }));
        assert!(err.to_string().contains("T_mid"));

        f.add_provider("cld_fraction");
        assert!(f.get_view_mut("cld_fraction").is_ok());
    }

    #[test]
    fn test_guards_name_their_field() {
        let f = make_field(2, 3, 4);
        f.add_provider("p3");
        assert_eq!(
            format!("{:?}", f.get_view()),
            "FieldReadGuard { field: \"T_mid\", alloc_size: 8 }"
        );
        let guard = f.get_view_mut("p3").unwrap();
        assert!(format!("{guard:?}").starts_with("FieldWriteGuard { field: \"T_mid\""));
    }

    #[test]
    fn test_copy_from_logical_skips_padding() {
        let f = make_field(2, 3, 4);
        f.add_provider("ic");
        f.copy_from_logical(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], "ic")
            .unwrap();
        let view = f.get_view();
        assert_eq!(
            view.as_padded_slice(),
            &[1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]
        );

        assert!(matches!(
            f.copy_from_logical(&[1.0], "ic"),
            Err(AtmError::IncompatibleField { .. })
        ));
    }

    #[test]
    fn test_time_stamp_through_handles() {
        let f = make_field(1, 1, 1);
        let t0: TimeStamp = "2000-01-01-00000".parse().unwrap();
        f.update_time_stamp(t0 + 60.0).unwrap();
        assert_eq!(f.get_const().time_stamp(), Some(t0 + 60.0));
        assert!(matches!(
            f.update_time_stamp(t0),
            Err(AtmError::NonMonotonicTime { .. })
        ));
    }
}
