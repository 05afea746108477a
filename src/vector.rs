//! Dense vector with dual-space storage
//!
//! Follows the same synchronization discipline as the sparse matrix types:
//! per-space buffers, per-object freshness flags, explicit `sync` before
//! reading a stale space.

use crate::error::{Result, SolverError};
use crate::memory::{DualStore, Freshness, MemorySpace};
use crate::Real;

/// A dense vector valid in up to two memory spaces at once
#[derive(Debug, Clone, Default)]
pub struct Vector {
    size: usize,
    data: DualStore<Real>,
    flags: Freshness,
}

impl Vector {
    /// Create a vector of the given size with no storage allocated
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: DualStore::new(),
            flags: Freshness::default(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocate (zeroed) storage in the given memory space
    pub fn allocate(&mut self, space: MemorySpace) {
        self.data.allocate(self.size, space);
    }

    pub fn is_allocated(&self, space: MemorySpace) -> bool {
        self.data.is_allocated(space)
    }

    pub fn is_updated(&self, space: MemorySpace) -> bool {
        self.flags.is_updated(space)
    }

    /// Set every element to `value` in the given space and mark it updated
    pub fn set_const(&mut self, value: Real, space: MemorySpace) -> Result<()> {
        self.allocate(space);
        for v in self.data.slice_mut(space)? {
            *v = value;
        }
        self.flags.set_updated(space);
        Ok(())
    }

    /// Copy data from a slice into the given space and mark it updated
    pub fn copy_from_slice(&mut self, src: &[Real], space: MemorySpace) -> Result<()> {
        if src.len() != self.size {
            return Err(SolverError::DimensionMismatch {
                expected: self.size,
                actual: src.len(),
            });
        }
        self.data.fill_from(src, space)?;
        self.flags.set_updated(space);
        Ok(())
    }

    /// Copy data from another vector's `from` space into this one's `to` space
    pub fn copy_data_from(
        &mut self,
        other: &Vector,
        from: MemorySpace,
        to: MemorySpace,
    ) -> Result<()> {
        if other.size != self.size {
            return Err(SolverError::DimensionMismatch {
                expected: self.size,
                actual: other.size,
            });
        }
        let src = other.data.slice(from)?.to_vec();
        self.data.fill_from(&src, to)?;
        self.flags.set_updated(to);
        Ok(())
    }

    /// Mark the given space as holding the authoritative copy
    pub fn set_updated(&mut self, space: MemorySpace) {
        self.flags.set_updated(space);
    }

    /// Make `space` fresh, copying from the authoritative space if needed
    pub fn sync(&mut self, space: MemorySpace) -> Result<()> {
        if self.flags.is_updated(space) {
            return Ok(());
        }
        let fresh = self.flags.fresh_space().ok_or(SolverError::StaleData)?;
        self.data.copy_between(fresh, space)?;
        self.flags.set_synced();
        Ok(())
    }

    /// Read-only view of the data in `space`; the space must be fresh
    pub fn data(&self, space: MemorySpace) -> Result<&[Real]> {
        if !self.flags.is_updated(space) {
            return Err(SolverError::StaleData);
        }
        self.data.slice(space)
    }

    /// Mutable view of the data in `space`; marks the space updated
    ///
    /// The flag is only touched once the view exists: a failed request must
    /// not invalidate the fresh copy in the other space.
    pub fn data_mut(&mut self, space: MemorySpace) -> Result<&mut [Real]> {
        let data = self.data.slice_mut(space)?;
        self.flags.set_updated(space);
        Ok(data)
    }
}
