//! Compressed Sparse Column (CSC) matrix format
//!
//! Mirror image of the CSR type: col_ptr of size n_cols + 1, row_idx and
//! values of size nnz, with the same dual-space storage discipline.

use std::fmt;

use crate::error::{Result, SolverError};
use crate::memory::{DualStore, Freshness, MemorySpace};
use crate::Real;

/// A sparse matrix in Compressed Sparse Column format with dual-space storage
#[derive(Clone, Default)]
pub struct Csc {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    nnz: usize,
    col_ptr: DualStore<usize>,
    row_idx: DualStore<usize>,
    values: DualStore<Real>,
    flags: Freshness,
}

impl Csc {
    /// Create a CSC matrix shell with fixed dimensions and nonzero count
    pub fn new(n_rows: usize, n_cols: usize, nnz: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            nnz,
            col_ptr: DualStore::new(),
            row_idx: DualStore::new(),
            values: DualStore::new(),
            flags: Freshness::default(),
        }
    }

    /// Create a host-resident CSC matrix from ready-made arrays
    pub fn from_host(
        n_rows: usize,
        n_cols: usize,
        col_ptr: Vec<usize>,
        row_idx: Vec<usize>,
        values: Vec<Real>,
    ) -> Result<Self> {
        if col_ptr.len() != n_cols + 1 {
            return Err(SolverError::DimensionMismatch {
                expected: n_cols + 1,
                actual: col_ptr.len(),
            });
        }
        if row_idx.len() != values.len() || col_ptr[n_cols] != row_idx.len() {
            return Err(SolverError::NnzMismatch {
                expected: col_ptr[n_cols],
                actual: row_idx.len(),
            });
        }
        if let Some(&row) = row_idx.iter().find(|&&r| r >= n_rows) {
            return Err(SolverError::DimensionMismatch {
                expected: n_rows,
                actual: row,
            });
        }

        let nnz = row_idx.len();
        let mut m = Csc::new(n_rows, n_cols, nnz);
        m.col_ptr.fill_from(&col_ptr, MemorySpace::Host)?;
        m.row_idx.fill_from(&row_idx, MemorySpace::Host)?;
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
        self.col_ptr.allocate(self.n_cols + 1, space);
        self.row_idx.allocate(self.nnz, space);
        self.values.allocate(self.nnz, space);
    }

    pub fn is_allocated(&self, space: MemorySpace) -> bool {
        self.col_ptr.is_allocated(space)
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
        self.col_ptr.copy_between(fresh, space)?;
        self.row_idx.copy_between(fresh, space)?;
        self.values.copy_between(fresh, space)?;
        self.flags.set_synced();
        Ok(())
    }

    /// Column pointers in `space`; the space must hold a fresh copy
    pub fn col_ptr(&self, space: MemorySpace) -> Result<&[usize]> {
        self.check_fresh(space)?;
        self.col_ptr.slice(space)
    }

    /// Row indices in `space`; the space must hold a fresh copy
    pub fn row_idx(&self, space: MemorySpace) -> Result<&[usize]> {
        self.check_fresh(space)?;
        self.row_idx.slice(space)
    }

    /// Values in `space`; the space must hold a fresh copy
    pub fn values(&self, space: MemorySpace) -> Result<&[Real]> {
        self.check_fresh(space)?;
        self.values.slice(space)
    }

    /// Overwrite values in place without touching the sparsity pattern
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

    /// Mutable access to all arrays for kernels that fill the matrix
    pub(crate) fn arrays_mut(
        &mut self,
        space: MemorySpace,
    ) -> Result<(&mut [usize], &mut [usize], &mut [Real])> {
        let col_ptr = self.col_ptr.slice_mut(space)?;
        let row_idx = self.row_idx.slice_mut(space)?;
        let values = self.values.slice_mut(space)?;
        Ok((col_ptr, row_idx, values))
    }

    /// Iterator over the (row, value) pairs of column `j` in the host space
    pub fn col_iter(&self, j: usize) -> Result<impl Iterator<Item = (usize, Real)> + '_> {
        let col_ptr = self.col_ptr(MemorySpace::Host)?;
        let row_idx = self.row_idx(MemorySpace::Host)?;
        let values = self.values(MemorySpace::Host)?;
        let start = col_ptr[j];
        let end = col_ptr[j + 1];
        Ok(row_idx[start..end]
            .iter()
            .zip(&values[start..end])
            .map(|(&r, &v)| (r, v)))
    }

    fn check_fresh(&self, space: MemorySpace) -> Result<()> {
        if self.flags.is_updated(space) {
            Ok(())
        } else {
            Err(SolverError::StaleData)
        }
    }
}

impl fmt::Debug for Csc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Csc {{")?;
        writeln!(f, "  dimensions: {} × {}", self.n_rows, self.n_cols)?;
        writeln!(f, "  nnz: {}", self.nnz)?;
        write!(f, "}}")
    }
}
