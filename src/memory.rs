//! Host/device memory spaces and dual-space storage
//!
//! A matrix or vector may hold a copy of its data in both memory spaces at
//! once. Whichever space was written most recently is authoritative; reads in
//! the other space must synchronize first. The device space is modeled as a
//! separate cache-line-aligned allocation that only the device kernel set
//! touches, so stale-copy bugs surface in tests the same way they would with
//! a real accelerator.

use aligned_vec::AVec;

use crate::error::{Result, SolverError};

/// Alignment for device-space buffers, in bytes
pub(crate) const DEVICE_ALIGN: usize = 64;

/// Memory space selector passed explicitly to every dispatched operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySpace {
    /// Host CPU memory
    Host,
    /// Accelerator device memory
    Device,
}

/// A logical array with at most one buffer per memory space
///
/// `DualStore` tracks allocation only; freshness flags live on the owning
/// matrix or vector, because the original model keeps one flag pair per
/// object covering all of its arrays.
#[derive(Debug, Clone, Default)]
pub(crate) struct DualStore<T> {
    host: Option<Vec<T>>,
    device: Option<AVec<T>>,
}

impl<T: Copy + Default> DualStore<T> {
    pub fn new() -> Self {
        Self {
            host: None,
            device: None,
        }
    }

    /// Allocate a zeroed buffer of `len` elements in `space`
    ///
    /// Allocating an already-allocated space is a no-op; sizes are fixed at
    /// first allocation.
    pub fn allocate(&mut self, len: usize, space: MemorySpace) {
        match space {
            MemorySpace::Host => {
                if self.host.is_none() {
                    self.host = Some(vec![T::default(); len]);
                }
            }
            MemorySpace::Device => {
                if self.device.is_none() {
                    self.device = Some(AVec::from_iter(
                        DEVICE_ALIGN,
                        (0..len).map(|_| T::default()),
                    ));
                }
            }
        }
    }

    pub fn is_allocated(&self, space: MemorySpace) -> bool {
        match space {
            MemorySpace::Host => self.host.is_some(),
            MemorySpace::Device => self.device.is_some(),
        }
    }

    pub fn slice(&self, space: MemorySpace) -> Result<&[T]> {
        match space {
            MemorySpace::Host => self.host.as_deref(),
            MemorySpace::Device => self.device.as_deref(),
        }
        .ok_or(SolverError::UnallocatedSpace(space))
    }

    pub fn slice_mut(&mut self, space: MemorySpace) -> Result<&mut [T]> {
        match space {
            MemorySpace::Host => self.host.as_deref_mut(),
            MemorySpace::Device => self.device.as_deref_mut(),
        }
        .ok_or(SolverError::UnallocatedSpace(space))
    }

    /// Copy the contents of `from` into `to`, allocating `to` if needed
    pub fn copy_between(&mut self, from: MemorySpace, to: MemorySpace) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let src: Vec<T> = self.slice(from)?.to_vec();
        self.allocate(src.len(), to);
        self.slice_mut(to)?.copy_from_slice(&src);
        Ok(())
    }

    /// Overwrite the buffer in `space` from a host slice, allocating if needed
    pub fn fill_from(&mut self, data: &[T], space: MemorySpace) -> Result<()> {
        self.allocate(data.len(), space);
        let dst = self.slice_mut(space)?;
        if dst.len() != data.len() {
            return Err(SolverError::DimensionMismatch {
                expected: dst.len(),
                actual: data.len(),
            });
        }
        dst.copy_from_slice(data);
        Ok(())
    }
}

/// Per-object freshness flags for the two memory spaces
///
/// Invariant: while the object holds valid data, at least one flag is set.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Freshness {
    host: bool,
    device: bool,
}

impl Freshness {
    pub fn is_updated(&self, space: MemorySpace) -> bool {
        match space {
            MemorySpace::Host => self.host,
            MemorySpace::Device => self.device,
        }
    }

    /// Mark `space` as the authoritative copy and the other space stale
    pub fn set_updated(&mut self, space: MemorySpace) {
        match space {
            MemorySpace::Host => {
                self.host = true;
                self.device = false;
            }
            MemorySpace::Device => {
                self.device = true;
                self.host = false;
            }
        }
    }

    /// Mark both spaces fresh after a synchronizing copy
    pub fn set_synced(&mut self) {
        self.host = true;
        self.device = true;
    }

    /// The space holding the authoritative copy, if any
    pub fn fresh_space(&self) -> Option<MemorySpace> {
        if self.host {
            Some(MemorySpace::Host)
        } else if self.device {
            Some(MemorySpace::Device)
        } else {
            None
        }
    }
}

impl MemorySpace {
    /// The other memory space
    pub fn other(&self) -> MemorySpace {
        match self {
            MemorySpace::Host => MemorySpace::Device,
            MemorySpace::Device => MemorySpace::Host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_fill() {
        let mut store: DualStore<f64> = DualStore::new();
        store.allocate(4, MemorySpace::Host);
        assert!(store.is_allocated(MemorySpace::Host));
        assert!(!store.is_allocated(MemorySpace::Device));

        store.slice_mut(MemorySpace::Host).unwrap()[2] = 3.5;
        assert_eq!(store.slice(MemorySpace::Host).unwrap()[2], 3.5);
    }

    #[test]
    fn test_copy_between_spaces() {
        let mut store: DualStore<usize> = DualStore::new();
        store.fill_from(&[1, 2, 3], MemorySpace::Host).unwrap();
        store
            .copy_between(MemorySpace::Host, MemorySpace::Device)
            .unwrap();
        assert_eq!(store.slice(MemorySpace::Device).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_unallocated_read_fails() {
        let store: DualStore<f64> = DualStore::new();
        assert!(store.slice(MemorySpace::Device).is_err());
    }

    #[test]
    fn test_freshness_flip() {
        let mut flags = Freshness::default();
        assert!(flags.fresh_space().is_none());

        flags.set_updated(MemorySpace::Host);
        assert!(flags.is_updated(MemorySpace::Host));
        assert!(!flags.is_updated(MemorySpace::Device));

        flags.set_synced();
        assert!(flags.is_updated(MemorySpace::Device));

        flags.set_updated(MemorySpace::Device);
        assert!(!flags.is_updated(MemorySpace::Host));
        assert_eq!(flags.fresh_space(), Some(MemorySpace::Device));
    }
}
