//! Host kernel set for matrix operations

use crate::error::{Result, SolverError};
use crate::matrix::{convert_csc_to_csr, csr_to_csc, Csc, Csr};
use crate::memory::MemorySpace;
use crate::vector::Vector;
use crate::Real;

const SPACE: MemorySpace = MemorySpace::Host;

/// CPU implementations of the dispatched matrix operations
///
/// The host kernels read and write host-space buffers directly; the
/// `values_changed` flag is accepted for interface symmetry but has no
/// effect here since nothing is cached.
#[derive(Debug, Default)]
pub(crate) struct CpuKernels {
    values_changed: bool,
}

impl CpuKernels {
    pub fn new() -> Self {
        Self {
            values_changed: true,
        }
    }

    pub fn set_values_changed(&mut self, changed: bool) {
        self.values_changed = changed;
    }

    /// result = alpha * A * x + beta * result
    pub fn matvec(
        &mut self,
        a: &Csr,
        x: &Vector,
        result: &mut Vector,
        alpha: Real,
        beta: Real,
    ) -> Result<()> {
        if x.size() != a.n_cols || result.size() != a.n_rows {
            return Err(SolverError::DimensionMismatch {
                expected: a.n_cols,
                actual: x.size(),
            });
        }
        let row_ptr = a.row_ptr(SPACE)?;
        let col_idx = a.col_idx(SPACE)?;
        let values = a.values(SPACE)?;
        let xs = x.data(SPACE)?.to_vec();

        if !result.is_updated(SPACE) {
            return Err(SolverError::StaleData);
        }
        let out = result.data_mut(SPACE)?;
        for i in 0..a.n_rows {
            let mut sum = 0.0;
            for jj in row_ptr[i]..row_ptr[i + 1] {
                sum += values[jj] * xs[col_idx[jj]];
            }
            out[i] = alpha * sum + beta * out[i];
        }
        Ok(())
    }

    /// Maximum absolute row sum
    pub fn matrix_inf_norm(&self, a: &Csr) -> Result<Real> {
        let row_ptr = a.row_ptr(SPACE)?;
        let values = a.values(SPACE)?;

        let mut norm: Real = 0.0;
        for i in 0..a.n_rows {
            let row_sum: Real = values[row_ptr[i]..row_ptr[i + 1]]
                .iter()
                .map(|v| v.abs())
                .sum();
            norm = norm.max(row_sum);
        }
        Ok(norm)
    }

    pub fn csc2csr(&self, a_csc: &Csc, a_csr: &mut Csr) -> Result<()> {
        convert_csc_to_csr(a_csc, a_csr, SPACE)
    }

    /// Transpose via the CSC/CSR duality
    ///
    /// The transpose of A in CSR has exactly the arrays of A in CSC, so the
    /// shared conversion fills `at` directly: its row pointers are A's column
    /// pointers and its column indices are A's row indices.
    pub fn transpose(&self, a: &Csr, at: &mut Csr) -> Result<()> {
        if at.n_rows != a.n_cols || at.n_cols != a.n_rows {
            return Err(SolverError::DimensionMismatch {
                expected: a.n_cols,
                actual: at.n_rows,
            });
        }
        if at.nnz() != a.nnz() {
            return Err(SolverError::NnzMismatch {
                expected: a.nnz(),
                actual: at.nnz(),
            });
        }
        at.allocate(SPACE);

        let row_ptr = a.row_ptr(SPACE)?;
        let col_idx = a.col_idx(SPACE)?;
        let values = a.values(SPACE)?;
        {
            let (at_row_ptr, at_col_idx, at_values) = at.arrays_mut(SPACE)?;
            csr_to_csc(
                a.n_rows, a.n_cols, row_ptr, col_idx, values, at_row_ptr, at_col_idx,
                at_values,
            );
        }
        at.set_updated(SPACE);
        Ok(())
    }

    /// Add a scalar to every stored value in place
    pub fn add_const(&self, a: &mut Csr, value: Real) -> Result<()> {
        for v in a.values_mut(SPACE)? {
            *v += value;
        }
        Ok(())
    }
}
