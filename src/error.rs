//! Error types for sparsolve

use thiserror::Error;

use crate::matrix::SparseFormat;
use crate::memory::MemorySpace;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("operation not supported in {0:?} memory space")]
    UnsupportedMemorySpace(MemorySpace),

    #[error("operation requires {expected:?} matrix, got {actual:?}")]
    UnsupportedFormat {
        expected: SparseFormat,
        actual: SparseFormat,
    },

    #[error("dimension mismatch: expected {expected} rows/cols, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("nonzero count mismatch: expected {expected}, got {actual}")]
    NnzMismatch { expected: usize, actual: usize },

    #[error("data not allocated in {0:?} memory space")]
    UnallocatedSpace(MemorySpace),

    #[error("no fresh copy of the data in any memory space")]
    StaleData,

    #[error("{op} called in state {state:?}")]
    InvalidState {
        op: &'static str,
        state: crate::solver::SolverState,
    },

    #[error("matrix is singular at column {0}")]
    SingularMatrix(usize),

    #[error("sparsity pattern changed since the last analysis")]
    PatternChanged,

    #[error("unknown parameter `{0}` for this backend")]
    UnknownParameter(String),

    #[error("cannot parse `{value}` as a value for parameter `{name}`")]
    ParamParse { name: String, value: String },

    #[error("engine sequence finished with {errors} failed step(s)")]
    EngineFailure { errors: u32 },

    #[error("setup requires pre-computed factors and orderings for this backend")]
    MissingSeed,

    #[error("{0} is not implemented by this backend")]
    NotImplemented(&'static str),

    #[error("diagnostic output failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SolverError>;
