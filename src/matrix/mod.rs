// Sparse matrix data structures and format conversion

pub mod conversion;
pub mod coo;
pub mod csc;
pub mod csr;

pub use conversion::{convert_csc_to_csr, convert_csr_to_csc, csc_to_csr, csr_to_csc};
pub use coo::Coo;
pub use csc::Csc;
pub use csr::Csr;

/// Sparse storage format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseFormat {
    /// Coordinate format (row, col, value triples)
    Coo,
    /// Compressed sparse row
    Csr,
    /// Compressed sparse column
    Csc,
}

/// A sparse matrix in one of the supported storage formats
///
/// The variants share the dual-space storage discipline: each matrix can hold
/// synchronized copies of its arrays on the host and on the device, with the
/// most recently written space authoritative.
#[derive(Debug, Clone)]
pub enum SparseMatrix {
    Coo(Coo),
    Csr(Csr),
    Csc(Csc),
}

impl SparseMatrix {
    pub fn format(&self) -> SparseFormat {
        match self {
            SparseMatrix::Coo(_) => SparseFormat::Coo,
            SparseMatrix::Csr(_) => SparseFormat::Csr,
            SparseMatrix::Csc(_) => SparseFormat::Csc,
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            SparseMatrix::Coo(m) => m.n_rows,
            SparseMatrix::Csr(m) => m.n_rows,
            SparseMatrix::Csc(m) => m.n_rows,
        }
    }

    pub fn num_cols(&self) -> usize {
        match self {
            SparseMatrix::Coo(m) => m.n_cols,
            SparseMatrix::Csr(m) => m.n_cols,
            SparseMatrix::Csc(m) => m.n_cols,
        }
    }

    pub fn nnz(&self) -> usize {
        match self {
            SparseMatrix::Coo(m) => m.nnz(),
            SparseMatrix::Csr(m) => m.nnz(),
            SparseMatrix::Csc(m) => m.nnz(),
        }
    }

    /// Borrow the CSR payload, failing with a format error otherwise
    pub fn as_csr(&self) -> crate::error::Result<&Csr> {
        match self {
            SparseMatrix::Csr(m) => Ok(m),
            other => Err(crate::error::SolverError::UnsupportedFormat {
                expected: SparseFormat::Csr,
                actual: other.format(),
            }),
        }
    }

    /// Borrow the CSC payload, failing with a format error otherwise
    pub fn as_csc(&self) -> crate::error::Result<&Csc> {
        match self {
            SparseMatrix::Csc(m) => Ok(m),
            other => Err(crate::error::SolverError::UnsupportedFormat {
                expected: SparseFormat::Csc,
                actual: other.format(),
            }),
        }
    }
}

impl From<Coo> for SparseMatrix {
    fn from(m: Coo) -> Self {
        SparseMatrix::Coo(m)
    }
}

impl From<Csr> for SparseMatrix {
    fn from(m: Csr) -> Self {
        SparseMatrix::Csr(m)
    }
}

impl From<Csc> for SparseMatrix {
    fn from(m: Csc) -> Self {
        SparseMatrix::Csc(m)
    }
}
