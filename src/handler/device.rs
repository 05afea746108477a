//! Device kernel set for matrix operations
//!
//! The device space is a separate aligned allocation; these kernels only
//! touch device-space buffers and run their row loops on the rayon pool,
//! standing in for accelerator kernels. Calls are synchronous: when a kernel
//! returns, its results are visible in the device space.

use rayon::prelude::*;

use crate::error::{Result, SolverError};
use crate::matrix::{convert_csc_to_csr, csr_to_csc, Csc, Csr};
use crate::memory::MemorySpace;
use crate::vector::Vector;
use crate::Real;

const SPACE: MemorySpace = MemorySpace::Device;

/// Configuration for the device kernel set
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Number of worker threads the kernels may occupy
    pub n_threads: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get(),
        }
    }
}

/// Cached sparse-matrix descriptor, the analog of a vendor handle
///
/// Holds a copy of the sparsity pattern taken when the descriptor was built.
/// While `values_changed` is false the kernels keep using this pattern and
/// only read fresh numeric values, so a pattern change without raising the
/// flag leaves the descriptor stale just like a real device backend.
#[derive(Debug)]
struct MatDescriptor {
    n_rows: usize,
    nnz: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

/// Device implementations of the dispatched matrix operations
#[derive(Debug)]
pub(crate) struct DeviceKernels {
    config: DeviceConfig,
    values_changed: bool,
    descriptor: Option<MatDescriptor>,
}

impl DeviceKernels {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            values_changed: true,
            descriptor: None,
        }
    }

    pub fn set_values_changed(&mut self, changed: bool) {
        self.values_changed = changed;
    }

    fn descriptor(&mut self, a: &Csr) -> Result<&MatDescriptor> {
        let rebuild = self.values_changed
            || match &self.descriptor {
                Some(d) => d.n_rows != a.n_rows || d.nnz != a.nnz(),
                None => true,
            };
        if rebuild {
            log::debug!(
                "rebuilding device matrix descriptor ({} rows, {} nnz)",
                a.n_rows,
                a.nnz()
            );
            self.descriptor = Some(MatDescriptor {
                n_rows: a.n_rows,
                nnz: a.nnz(),
                row_ptr: a.row_ptr(SPACE)?.to_vec(),
                col_idx: a.col_idx(SPACE)?.to_vec(),
            });
            self.values_changed = false;
        }
        Ok(self.descriptor.as_ref().unwrap())
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
        let values = a.values(SPACE)?.to_vec();
        let xs = x.data(SPACE)?.to_vec();
        let chunk = usize::max(1, a.n_rows / usize::max(1, self.config.n_threads));
        let descr = self.descriptor(a)?;

        if !result.is_updated(SPACE) {
            return Err(SolverError::StaleData);
        }
        let out = result.data_mut(SPACE)?;
        out.par_iter_mut()
            .with_min_len(chunk)
            .enumerate()
            .for_each(|(i, y)| {
                let mut sum = 0.0;
                for jj in descr.row_ptr[i]..descr.row_ptr[i + 1] {
                    sum += values[jj] * xs[descr.col_idx[jj]];
                }
                *y = alpha * sum + beta * *y;
            });
        Ok(())
    }

    /// Maximum absolute row sum
    pub fn matrix_inf_norm(&self, a: &Csr) -> Result<Real> {
        let row_ptr = a.row_ptr(SPACE)?;
        let values = a.values(SPACE)?;

        let norm = (0..a.n_rows)
            .into_par_iter()
            .map(|i| {
                values[row_ptr[i]..row_ptr[i + 1]]
                    .iter()
                    .map(|v| v.abs())
                    .sum::<Real>()
            })
            .reduce(|| 0.0, Real::max);
        Ok(norm)
    }

    /// Same conversion contract as the host path, on device buffers
    pub fn csc2csr(&self, a_csc: &Csc, a_csr: &mut Csr) -> Result<()> {
        convert_csc_to_csr(a_csc, a_csr, SPACE)
    }

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

    pub fn add_const(&self, a: &mut Csr, value: Real) -> Result<()> {
        a.values_mut(SPACE)?.par_iter_mut().for_each(|v| *v += value);
        Ok(())
    }
}
