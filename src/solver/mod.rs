//! Direct sparse solver backends
//!
//! All backends share one lifecycle: [`DirectSolver::setup`] binds a system
//! matrix, [`DirectSolver::analyze`] computes a symbolic factorization,
//! [`DirectSolver::factorize`] computes the numeric factors and
//! [`DirectSolver::refactorize`] recomputes them for new values on the same
//! sparsity pattern. Calls made out of order fail with
//! [`SolverError::InvalidState`](crate::error::SolverError::InvalidState)
//! rather than producing garbage.
//!
//! Three backends are provided:
//! - [`HostLu`]: full LU with threshold partial pivoting on the host,
//! - [`DeviceRefactor`]: fixed-pattern numeric refactorization in device
//!   memory, seeded with factors from a prior host factorization,
//! - [`DeviceIlu0`]: zero-fill incomplete LU in device memory.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use crate::error::{Result, SolverError};
use crate::matrix::{Csc, Csr, SparseMatrix};
use crate::vector::Vector;
use crate::Real;

mod host_lu;
mod ilu0;
pub mod params;
mod refactor;

pub use host_lu::HostLu;
pub use ilu0::DeviceIlu0;
pub use params::ParamValue;
pub use refactor::DeviceRefactor;

/// System matrix shared between the caller and a bound solver
pub type SharedCsr = Rc<RefCell<Csr>>;

/// Lifecycle phase of a solver instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    /// No system matrix bound yet
    Uninitialized,
    /// Matrix bound, no factorization performed
    Bound,
    /// Symbolic analysis done, numeric factors not yet valid
    SymbolicReady,
    /// Numeric factors valid for the current values
    NumericReady,
    /// Numeric factors recomputed at least once on the fixed pattern
    RefactorReady,
    /// A factorization step failed; factors must not be used
    Failed,
}

impl SolverState {
    /// True when numeric factors are valid and solves are allowed
    pub fn is_solvable(self) -> bool {
        matches!(self, SolverState::NumericReady | SolverState::RefactorReady)
    }
}

/// Pre-computed factors and orderings used to seed a refactorization backend
///
/// `l` and `u` may be supplied in CSR or CSC form; CSC factors are converted
/// internally. `p` maps pivot position to original row, `q` maps pivot
/// position to original column.
pub struct Seed {
    pub l: SparseMatrix,
    pub u: SparseMatrix,
    pub p: Vec<usize>,
    pub q: Vec<usize>,
}

/// Common interface of the direct solver backends
///
/// Operations a backend does not support return
/// [`SolverError::NotImplemented`] from the default implementations.
pub trait DirectSolver {
    /// Bind the system matrix, optionally seeding the backend with factors
    /// from a previous factorization.
    fn setup(&mut self, a: SharedCsr, seed: Option<Seed>) -> Result<()>;

    /// Current lifecycle phase
    fn state(&self) -> SolverState;

    /// Symbolic analysis of the bound matrix
    fn analyze(&mut self) -> Result<()> {
        Err(SolverError::NotImplemented("analyze"))
    }

    /// Numeric factorization with pivoting
    fn factorize(&mut self) -> Result<()> {
        Err(SolverError::NotImplemented("factorize"))
    }

    /// Numeric re-factorization on the unchanged sparsity pattern
    fn refactorize(&mut self) -> Result<()> {
        Err(SolverError::NotImplemented("refactorize"))
    }

    /// Solve in place, overwriting `rhs` with the solution
    fn solve_in_place(&mut self, rhs: &mut Vector) -> Result<()> {
        let _ = rhs;
        Err(SolverError::NotImplemented("solve_in_place"))
    }

    /// Solve into `x`, leaving `rhs` untouched
    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<()>;

    /// Lower triangular factor in CSC form
    fn l_factor(&mut self) -> Result<&Csc> {
        Err(SolverError::NotImplemented("l_factor"))
    }

    /// Upper triangular factor in CSC form
    fn u_factor(&mut self) -> Result<&Csc> {
        Err(SolverError::NotImplemented("u_factor"))
    }

    /// Row ordering: entry `k` is the original row at pivot position `k`
    fn p_ordering(&self) -> Result<Vec<usize>> {
        Err(SolverError::NotImplemented("p_ordering"))
    }

    /// Column ordering: entry `k` is the original column at pivot position `k`
    fn q_ordering(&self) -> Result<Vec<usize>> {
        Err(SolverError::NotImplemented("q_ordering"))
    }

    /// Set a named parameter from its textual form, applying it immediately
    fn set_param(&mut self, name: &str, value: &str) -> Result<()>;

    /// Current value of a real parameter, or NaN with a logged error
    fn param_real(&self, name: &str) -> Real {
        params::unknown_real(name)
    }

    /// Current value of an integer parameter, or -1 with a logged error
    fn param_int(&self, name: &str) -> i64 {
        params::unknown_int(name)
    }

    /// Current value of a boolean parameter, or false with a logged error
    fn param_bool(&self, name: &str) -> bool {
        params::unknown_bool(name)
    }

    /// Current value of a string parameter, or "" with a logged error
    fn param_string(&self, name: &str) -> String {
        params::unknown_string(name)
    }

    /// Write `name = value` for a known parameter to a diagnostic stream
    fn print_param(&self, name: &str, out: &mut dyn Write) -> Result<()>;
}

/// Count a failed engine step as 1, logging the cause
///
/// The device backends run their setup as a sequence of engine steps and
/// report the total failure count as one
/// [`SolverError::EngineFailure`](crate::error::SolverError::EngineFailure).
pub(crate) fn engine_step(result: Result<()>, what: &str) -> u32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            log::warn!("engine setup step `{what}` failed: {e}");
            1
        }
    }
}

/// Write one `name = value` line for [`DirectSolver::print_param`]
pub(crate) fn write_param(out: &mut dyn Write, name: &str, value: &ParamValue) -> Result<()> {
    match value {
        ParamValue::Real(v) => writeln!(out, "{name} = {v}")?,
        ParamValue::Int(v) => writeln!(out, "{name} = {v}")?,
        ParamValue::Bool(v) => writeln!(out, "{name} = {v}")?,
        ParamValue::Str(v) => writeln!(out, "{name} = {v}")?,
    }
    Ok(())
}
