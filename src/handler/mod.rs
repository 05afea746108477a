//! Matrix operation dispatch between the host and device kernel sets
//!
//! `MatrixHandler` is the single entry point for structural and numeric
//! matrix operations. Every call takes an explicit [`MemorySpace`] selector,
//! so callers can mix host and device operations on matrices that hold
//! synchronized copies in both spaces.

pub(crate) mod cpu;
pub(crate) mod device;

pub use device::DeviceConfig;

use crate::error::{Result, SolverError};
use crate::matrix::{Csc, Csr, SparseMatrix};
use crate::memory::MemorySpace;
use crate::vector::Vector;
use crate::Real;

use cpu::CpuKernels;
use device::DeviceKernels;

/// Dispatches matrix operations to the CPU or device kernel set
///
/// The kernel sets are chosen once at construction; each operation selects
/// between them by its memory-space argument. Operations on a space the
/// handler was not built for fail with
/// [`SolverError::UnsupportedMemorySpace`].
pub struct MatrixHandler {
    cpu: CpuKernels,
    device: Option<DeviceKernels>,
}

impl MatrixHandler {
    /// Create a handler with only the CPU kernel set enabled
    pub fn new() -> Self {
        Self {
            cpu: CpuKernels::new(),
            device: None,
        }
    }

    /// Create a handler with both the CPU and device kernel sets
    ///
    /// The CPU set is always instantiated; it is cheap and needs no
    /// workspace.
    pub fn with_device(config: DeviceConfig) -> Self {
        Self {
            cpu: CpuKernels::new(),
            device: Some(DeviceKernels::new(config)),
        }
    }

    pub fn is_device_enabled(&self) -> bool {
        self.device.is_some()
    }

    fn device_mut(&mut self) -> Result<&mut DeviceKernels> {
        self.device
            .as_mut()
            .ok_or(SolverError::UnsupportedMemorySpace(MemorySpace::Device))
    }

    fn device(&self) -> Result<&DeviceKernels> {
        self.device
            .as_ref()
            .ok_or(SolverError::UnsupportedMemorySpace(MemorySpace::Device))
    }

    /// Flag that the matrix values have changed in the given space
    ///
    /// When set, the next `matvec` on the device rebuilds its cached matrix
    /// descriptor instead of reusing it; when the flag is false the device
    /// backend only refreshes numeric values. Has no effect on the CPU path.
    pub fn set_values_changed(&mut self, changed: bool, space: MemorySpace) -> Result<()> {
        match space {
            MemorySpace::Host => {
                self.cpu.set_values_changed(changed);
                Ok(())
            }
            MemorySpace::Device => {
                self.device_mut()?.set_values_changed(changed);
                Ok(())
            }
        }
    }

    /// Matrix-vector product: result = alpha * A * x + beta * result
    ///
    /// `A` must be CSR; `x` and `result` must be allocated and populated in
    /// `space`.
    pub fn matvec(
        &mut self,
        a: &SparseMatrix,
        x: &Vector,
        result: &mut Vector,
        alpha: Real,
        beta: Real,
        space: MemorySpace,
    ) -> Result<()> {
        let a = a.as_csr()?;
        match space {
            MemorySpace::Host => self.cpu.matvec(a, x, result, alpha, beta),
            MemorySpace::Device => self.device_mut()?.matvec(a, x, result, alpha, beta),
        }
    }

    /// Matrix infinity norm: maximum absolute row sum
    pub fn matrix_inf_norm(&self, a: &SparseMatrix, space: MemorySpace) -> Result<Real> {
        let a = a.as_csr()?;
        match space {
            MemorySpace::Host => self.cpu.matrix_inf_norm(a),
            MemorySpace::Device => self.device()?.matrix_inf_norm(a),
        }
    }

    /// Convert a populated CSC matrix into a pre-allocated CSR matrix
    ///
    /// `a_csc` must be filled in `space`; `a_csr` must have the same
    /// dimensions and nonzero count.
    pub fn csc2csr(&self, a_csc: &Csc, a_csr: &mut Csr, space: MemorySpace) -> Result<()> {
        match space {
            MemorySpace::Host => self.cpu.csc2csr(a_csc, a_csr),
            MemorySpace::Device => self.device()?.csc2csr(a_csc, a_csr),
        }
    }

    /// Transpose `a` into the pre-allocated `at`
    ///
    /// Uses the CSC/CSR duality: the transpose in CSR shares its arrays with
    /// the source matrix read as CSC.
    pub fn transpose(&self, a: &SparseMatrix, at: &mut Csr, space: MemorySpace) -> Result<()> {
        let a = a.as_csr()?;
        match space {
            MemorySpace::Host => self.cpu.transpose(a, at),
            MemorySpace::Device => self.device()?.transpose(a, at),
        }
    }

    /// Add a scalar to every stored value of `a` in place
    ///
    /// The sparsity pattern is unchanged; implicit zeros stay zero.
    pub fn add_const(&self, a: &mut SparseMatrix, value: Real, space: MemorySpace) -> Result<()> {
        let a = match a {
            SparseMatrix::Csr(m) => m,
            other => {
                return Err(SolverError::UnsupportedFormat {
                    expected: crate::matrix::SparseFormat::Csr,
                    actual: other.format(),
                })
            }
        };
        match space {
            MemorySpace::Host => self.cpu.add_const(a, value),
            MemorySpace::Device => self.device()?.add_const(a, value),
        }
    }
}

impl Default for MatrixHandler {
    fn default() -> Self {
        Self::new()
    }
}
