//! Compressed Sparse Row (CSR) matrix format
//!
//! The CSR format stores a sparse matrix using three arrays:
//! - row_ptr: size n_rows + 1, indices into col_idx and values where each row starts
//! - col_idx: size nnz, column indices of non-zero elements
//! - values: size nnz, the non-zero values
//!
//! Each array has a buffer per memory space; one `Freshness` flag pair covers
//! the whole matrix, because index and value arrays are always written
//! together by the kernels.

use std::fmt;

use crate::error::{Result, SolverError};
use crate::memory::{DualStore, Freshness, MemorySpace};
use crate::Real;

/// A sparse matrix in Compressed Sparse Row format with dual-space storage
#[derive(Clone, Default)]
pub struct Csr {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    nnz: usize,
    row_ptr: DualStore<usize>,
    col_idx: DualStore<usize>,
    values: DualStore<Real>,
    flags: Freshness,
}

impl Csr {
    /// Create a CSR matrix shell with fixed dimensions and nonzero count
    ///
    /// No storage is allocated; call [`Csr::allocate`] per memory space.
    /// `nnz` is immutable afterwards.
    pub fn new(n_rows: usize, n_cols: usize, nnz: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            nnz,
            row_ptr: DualStore::new(),
            col_idx: DualStore::new(),
            values: DualStore::new(),
            flags: Freshness::default(),
        }
    }

    /// Create a host-resident CSR matrix from ready-made arrays
    ///
    /// Fails if the input arrays are inconsistent:
    /// - `row_ptr.len()` must be `n_rows + 1`
    /// - `col_idx.len()` must equal `values.len()`
    /// - `row_ptr[n_rows]` must equal `col_idx.len()`
    /// - every column index must be below `n_cols`
    pub fn from_host(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<Real>,
    ) -> Result<Self> {
        if row_ptr.len() != n_rows + 1 {
            return Err(SolverError::DimensionMismatch {
                expected: n_rows + 1,
                actual: row_ptr.len(),
            });
        }
        if col_idx.len() != values.len() || row_ptr[n_rows] != col_idx.len() {
            return Err(SolverError::NnzMismatch {
                expected: row_ptr[n_rows],
                actual: col_idx.len(),
            });
        }
        if let Some(&col) = col_idx.iter().find(|&&c| c >= n_cols) {
            return Err(SolverError::DimensionMismatch {
                expected: n_cols,
                actual: col,
            });
        }

        let nnz = col_idx.len();
        let mut m = Csr::new(n_rows, n_cols, nnz);
        m.row_ptr.fill_from(&row_ptr, MemorySpace::Host)?;
        m.col_idx.fill_from(&col_idx, MemorySpace::Host)?;
        m.values.fill_from(&values, MemorySpace::Host)?;
        m.flags.set_updated(MemorySpace::Host);
        Ok(m)
    }

    /// Number of stored (structurally nonzero) entries
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Allocate zeroed index/value storage in the given memory space
    pub fn allocate(&mut self, space: MemorySpace) {
        self.row_ptr.allocate(self.n_rows + 1, space);
        self.col_idx.allocate(self.nnz, space);
        self.values.allocate(self.nnz, space);
    }

    pub fn is_allocated(&self, space: MemorySpace) -> bool {
        self.row_ptr.is_allocated(space)
    }

    pub fn is_updated(&self, space: MemorySpace) -> bool {
        self.flags.is_updated(space)
    }

    /// Mark the given space as holding the authoritative copy
    pub fn set_updated(&mut self, space: MemorySpace) {
        self.flags.set_updated(space);
    }

    /// Make `space` fresh, copying all three arrays from the fresh space
    pub fn sync(&mut self, space: MemorySpace) -> Result<()> {
        if self.flags.is_updated(space) {
            return Ok(());
        }
        let fresh = self.flags.fresh_space().ok_or(SolverError::StaleData)?;
        self.row_ptr.copy_between(fresh, space)?;
        self.col_idx.copy_between(fresh, space)?;
        self.values.copy_between(fresh, space)?;
        self.flags.set_synced();
        Ok(())
    }

    /// Row pointers in `space`; the space must hold a fresh copy
    pub fn row_ptr(&self, space: MemorySpace) -> Result<&[usize]> {
        self.check_fresh(space)?;
        self.row_ptr.slice(space)
    }

    /// Column indices in `space`; the space must hold a fresh copy
    pub fn col_idx(&self, space: MemorySpace) -> Result<&[usize]> {
        self.check_fresh(space)?;
        self.col_idx.slice(space)
    }

    /// Values in `space`; the space must hold a fresh copy
    pub fn values(&self, space: MemorySpace) -> Result<&[Real]> {
        self.check_fresh(space)?;
        self.values.slice(space)
    }

    /// Overwrite values in place without touching the sparsity pattern
    ///
    /// The index arrays in `space` must already be populated; the space is
    /// marked updated.
    pub fn reset_values(&mut self, values: &[Real], space: MemorySpace) -> Result<()> {
        if values.len() != self.nnz {
            return Err(SolverError::NnzMismatch {
                expected: self.nnz,
                actual: values.len(),
            });
        }
        self.values.slice_mut(space)?.copy_from_slice(values);
        self.flags.set_updated(space);
        Ok(())
    }

    /// Mutable access to the values in `space`; marks the space updated
    ///
    /// The flag is only touched once the slice exists: a failed request must
    /// not invalidate the fresh copy in the other space.
    pub fn values_mut(&mut self, space: MemorySpace) -> Result<&mut [Real]> {
        let values = self.values.slice_mut(space)?;
        self.flags.set_updated(space);
        Ok(values)
    }

    /// Mutable access to all arrays for kernels that fill the matrix
    ///
    /// Does not require the space to be fresh; the caller marks the space
    /// updated once the matrix content is complete.
    pub(crate) fn arrays_mut(
        &mut self,
        space: MemorySpace,
    ) -> Result<(&mut [usize], &mut [usize], &mut [Real])> {
        let row_ptr = self.row_ptr.slice_mut(space)?;
        let col_idx = self.col_idx.slice_mut(space)?;
        let values = self.values.slice_mut(space)?;
        Ok((row_ptr, col_idx, values))
    }

    /// Iterator over the (col, value) pairs of row `i` in the host space
    pub fn row_iter(&self, i: usize) -> Result<impl Iterator<Item = (usize, Real)> + '_> {
        let row_ptr = self.row_ptr(MemorySpace::Host)?;
        let col_idx = self.col_idx(MemorySpace::Host)?;
        let values = self.values(MemorySpace::Host)?;
        let start = row_ptr[i];
        let end = row_ptr[i + 1];
        Ok(col_idx[start..end]
            .iter()
            .zip(&values[start..end])
            .map(|(&c, &v)| (c, v)))
    }

    fn check_fresh(&self, space: MemorySpace) -> Result<()> {
        if self.flags.is_updated(space) {
            Ok(())
        } else {
            Err(SolverError::StaleData)
        }
    }
}

impl fmt::Debug for Csr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Csr {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.nnz)?;
        if let (Ok(row_ptr), Ok(col_idx), Ok(values)) = (
            self.row_ptr(MemorySpace::Host),
            self.col_idx(MemorySpace::Host),
            self.values(MemorySpace::Host),
        ) {
            let max_rows_to_print = 5.min(self.n_rows);
            for i in 0..max_rows_to_print {
                write!(f, "  row {}: ", i)?;
                for j in row_ptr[i]..row_ptr[i + 1].min(row_ptr[i] + 5) {
                    write!(f, "({}, {:?}) ", col_idx[j], values[j])?;
                }
                writeln!(f)?;
            }
            if self.n_rows > max_rows_to_print {
                writeln!(f, "  ... ({} more rows)", self.n_rows - max_rows_to_print)?;
            }
        }
        write!(f, "}}")
    }
}
