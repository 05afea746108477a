//! Coordinate (COO) matrix format
//!
//! Plain (row, col, value) triples. The solvers and the handler work on
//! compressed formats; COO exists as the assembly-side entry format and can
//! be compressed into CSR on the host.

use crate::error::{Result, SolverError};
use crate::matrix::Csr;
use crate::memory::{DualStore, Freshness, MemorySpace};
use crate::Real;

/// A sparse matrix as coordinate triples with dual-space storage
#[derive(Debug, Clone, Default)]
pub struct Coo {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    nnz: usize,
    row_idx: DualStore<usize>,
    col_idx: DualStore<usize>,
    values: DualStore<Real>,
    flags: Freshness,
}

impl Coo {
    pub fn new(n_rows: usize, n_cols: usize, nnz: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            nnz,
            row_idx: DualStore::new(),
            col_idx: DualStore::new(),
            values: DualStore::new(),
            flags: Freshness::default(),
        }
    }

    /// Create a host-resident COO matrix from ready-made triples
    pub fn from_host(
        n_rows: usize,
        n_cols: usize,
        row_idx: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<Real>,
    ) -> Result<Self> {
        if row_idx.len() != col_idx.len() || col_idx.len() != values.len() {
            return Err(SolverError::NnzMismatch {
                expected: row_idx.len(),
                actual: values.len(),
            });
        }
        if row_idx.iter().any(|&r| r >= n_rows) || col_idx.iter().any(|&c| c >= n_cols) {
            return Err(SolverError::DimensionMismatch {
                expected: n_rows,
                actual: n_cols,
            });
        }
        let nnz = values.len();
        let mut m = Coo::new(n_rows, n_cols, nnz);
        m.row_idx.fill_from(&row_idx, MemorySpace::Host)?;
        m.col_idx.fill_from(&col_idx, MemorySpace::Host)?;
        m.values.fill_from(&values, MemorySpace::Host)?;
        m.flags.set_updated(MemorySpace::Host);
        Ok(m)
    }

    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn row_idx(&self, space: MemorySpace) -> Result<&[usize]> {
        self.check_fresh(space)?;
        self.row_idx.slice(space)
    }

    pub fn col_idx(&self, space: MemorySpace) -> Result<&[usize]> {
        self.check_fresh(space)?;
        self.col_idx.slice(space)
    }

    pub fn values(&self, space: MemorySpace) -> Result<&[Real]> {
        self.check_fresh(space)?;
        self.values.slice(space)
    }

    pub fn set_updated(&mut self, space: MemorySpace) {
        self.flags.set_updated(space);
    }

    /// Compress the triples into a host-resident CSR matrix
    ///
    /// Counting sort over rows; duplicate entries are kept, not summed.
    pub fn to_csr(&self) -> Result<Csr> {
        let row_idx = self.row_idx(MemorySpace::Host)?;
        let col_idx = self.col_idx(MemorySpace::Host)?;
        let values = self.values(MemorySpace::Host)?;

        let mut row_ptr = vec![0usize; self.n_rows + 1];
        for &r in row_idx {
            row_ptr[r + 1] += 1;
        }
        for i in 0..self.n_rows {
            row_ptr[i + 1] += row_ptr[i];
        }

        let mut out_cols = vec![0usize; self.nnz];
        let mut out_vals = vec![0.0; self.nnz];
        let mut cursor = row_ptr.clone();
        for k in 0..self.nnz {
            let dest = cursor[row_idx[k]];
            out_cols[dest] = col_idx[k];
            out_vals[dest] = values[k];
            cursor[row_idx[k]] += 1;
        }

        Csr::from_host(self.n_rows, self.n_cols, row_ptr, out_cols, out_vals)
    }

    fn check_fresh(&self, space: MemorySpace) -> Result<()> {
        if self.flags.is_updated(space) {
            Ok(())
        } else {
            Err(SolverError::StaleData)
        }
    }
}
