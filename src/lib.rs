//! # sparsolve: sparse matrices and direct sparse solvers
//!
//! sparsolve provides the plumbing layer of a sparse linear algebra stack:
//! matrix containers in COO, CSR and CSC formats with explicit host/device
//! memory management, a handler dispatching basic matrix kernels to either
//! space, and a family of direct solvers sharing one lifecycle.
//!
//! ## Components
//!
//! 1. **Matrix formats**: [`matrix::Coo`], [`matrix::Csr`] and
//!    [`matrix::Csc`], each keeping one buffer per [`memory::MemorySpace`]
//!    with freshness flags; data moves between spaces only on explicit
//!    [`sync`](matrix::Csr::sync) calls.
//!
//! 2. **Matrix handler**: [`handler::MatrixHandler`] runs matrix-vector
//!    products, norms, format conversion, transposition and scalar shifts on
//!    the host or, when enabled, on the device backend.
//!
//! 3. **Direct solvers**: [`solver::HostLu`] (full LU with threshold
//!    pivoting), [`solver::DeviceRefactor`] (fixed-pattern numeric
//!    refactorization seeded from a prior factorization) and
//!    [`solver::DeviceIlu0`] (zero-fill incomplete LU), all behind the
//!    [`solver::DirectSolver`] trait with a uniform named-parameter surface.
//!
//! ## Usage
//!
//! Factor once, then re-solve as the values evolve on a fixed pattern:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use sparsolve::matrix::Csr;
//! use sparsolve::memory::MemorySpace;
//! use sparsolve::solver::{DirectSolver, HostLu};
//! use sparsolve::vector::Vector;
//!
//! let a = Csr::from_host(
//!     2,
//!     2,
//!     vec![0, 1, 2],
//!     vec![0, 1],
//!     vec![2.0, 4.0],
//! )
//! .unwrap();
//! let a = Rc::new(RefCell::new(a));
//!
//! let mut solver = HostLu::new();
//! solver.setup(a.clone(), None).unwrap();
//! solver.analyze().unwrap();
//! solver.factorize().unwrap();
//!
//! let mut b = Vector::new(2);
//! b.copy_from_slice(&[2.0, 4.0], MemorySpace::Host).unwrap();
//! let mut x = Vector::new(2);
//! solver.solve(&b, &mut x).unwrap();
//! assert_eq!(x.data(MemorySpace::Host).unwrap(), &[1.0, 1.0]);
//!
//! // change values, keep the pattern, refactorize cheaply
//! a.borrow_mut()
//!     .reset_values(&[4.0, 8.0], MemorySpace::Host)
//!     .unwrap();
//! solver.refactorize().unwrap();
//! solver.solve(&b, &mut x).unwrap();
//! assert_eq!(x.data(MemorySpace::Host).unwrap(), &[0.5, 0.5]);
//! ```

pub mod error;
pub mod handler;
pub mod interop;
pub mod matrix;
pub mod memory;
pub mod solver;
pub mod vector;

/// Scalar type used throughout the crate
pub type Real = f64;

pub use error::{Result, SolverError};
pub use handler::MatrixHandler;
pub use matrix::{Coo, Csc, Csr, SparseFormat, SparseMatrix};
pub use memory::MemorySpace;
pub use solver::{DeviceIlu0, DeviceRefactor, DirectSolver, HostLu, Seed, SolverState};
pub use vector::Vector;
