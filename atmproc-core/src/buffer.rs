//! Process-private scratch memory.
//!
//! The driver asks every process how many bytes of workspace it needs and
//! hands each process its own [`ScratchBuffer`] of that size before
//! `initialize`. Buffers are never shared between
//! processes so no locking is involved.

use crate::errors::{AtmError, AtmResult};
use crate::field::Real;
use std::collections::BTreeMap;
use std::mem::size_of;

/// Number of `Real` elements needed to hold `bytes`.
pub fn reals_for_bytes(bytes: usize) -> usize {
    bytes.div_ceil(size_of::<Real>())
}

/// Sizes and hands out scratch buffers.
#[derive(Debug, Default)]
pub struct BufferManager {
    requests: BTreeMap<String, usize>,
    allocated: bool,
}

impl BufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the scratch size `process` needs.
    pub fn request_bytes(&mut self, process: &str, bytes: usize) -> AtmResult<()> {
        if self.allocated {
            return Err(AtmError::InvalidLifecycle {
                process: "buffer manager".to_string(),
                operation: format!("request scratch memory for '{process}' from"),
                state: "Allocated".to_string(),
            });
        }
        self.requests.insert(process.to_string(), bytes);
        Ok(())
    }

    /// Bytes requested by `process`, if it made a request.
    pub fn requested_bytes(&self, process: &str) -> Option<usize> {
        self.requests.get(process).copied()
    }

    /// Sum of all requests.
    pub fn total_bytes(&self) -> usize {
        self.requests.values().sum()
    }

    /// Freeze the sizes. Further requests are rejected.
    pub fn allocate(&mut self) {
        log::debug!(
            "Allocating {} bytes of scratch memory for {} processes",
            self.total_bytes(),
            self.requests.len()
        );
        self.allocated = true;
    }

    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// A fresh zeroed buffer of the size `process` requested.
    pub fn take_buffer(&self, process: &str) -> AtmResult<ScratchBuffer> {
        if !self.allocated {
            return Err(AtmError::InvalidLifecycle {
                process: "buffer manager".to_string(),
                operation: "hand out scratch memory from".to_string(),
                state: "Unallocated".to_string(),
            });
        }
        let bytes = self.requested_bytes(process).ok_or_else(|| {
            AtmError::InvalidConfiguration(format!(
                "process '{process}' never requested scratch memory"
            ))
        })?;
        Ok(ScratchBuffer::with_bytes(bytes))
    }
}

/// A block of scratch memory owned by one process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScratchBuffer {
    data: Vec<Real>,
}

impl ScratchBuffer {
    /// Zeroed buffer holding at least `bytes` bytes.
    pub fn with_bytes(bytes: usize) -> Self {
        Self {
            data: vec![0.0; reals_for_bytes(bytes)],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.data.len() * size_of::<Real>()
    }

    pub fn as_slice(&self) -> &[Real] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Real] {
        &mut self.data
    }

    /// Split the front of the buffer into consecutive work arrays.
    ///
    /// Returns `None` if `sizes` need more elements than the buffer holds.
    pub fn partition(&mut self, sizes: &[usize]) -> Option<Vec<&mut [Real]>> {
        if sizes.iter().sum::<usize>() > self.data.len() {
            return None;
        }
        let mut rest: &mut [Real] = &mut self.data;
        let mut parts = Vec::with_capacity(sizes.len());
        for &n in sizes {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(n);
            parts.push(head);
            rest = tail;
        }
        Some(parts)
    }
}
