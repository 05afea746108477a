//! Fixed-pattern numeric refactorization in device memory
//!
//! This backend never computes its own pivoting. [`DeviceRefactor::setup`]
//! takes a [`Seed`] holding L, U, P and Q from a prior full factorization
//! (typically [`HostLu`](crate::solver::HostLu)) and loads them into an
//! engine held in device memory. After the bound matrix's values change on
//! the unchanged sparsity pattern, [`DeviceRefactor::refactorize`] re-runs
//! the elimination restricted to the seeded fill pattern, and solves run
//! entirely in the device space through an engine-owned work buffer.
//!
//! Setup is a sequence of engine steps; each step's failure is logged and
//! counted, and a nonzero count is reported as a single
//! [`SolverError::EngineFailure`]. Calling `setup` again drops the previous
//! engine before building the new one.

use std::io::Write;

use aligned_vec::AVec;

use crate::error::{Result, SolverError};
use crate::matrix::{convert_csc_to_csr, Csr, SparseMatrix};
use crate::memory::{MemorySpace, DEVICE_ALIGN};
use crate::solver::params::{self, ParamRegistry, ParamValue};
use crate::solver::{engine_step as step, write_param, DirectSolver, Seed, SharedCsr, SolverState};
use crate::vector::Vector;
use crate::Real;

#[derive(Debug, Clone, Copy)]
enum RefactorParam {
    ZeroPivot,
    PivotBoost,
}

/// Device-resident factorization engine
///
/// L and U are stored row-wise in pivot coordinates with columns ascending
/// within each row; `diag_idx[i]` indexes the diagonal of U row `i` in
/// `u_val`. `a_row_ptr`/`a_col_idx` fingerprint the bound matrix pattern the
/// engine was seeded for.
struct Engine {
    n: usize,
    p: Vec<usize>,
    q: Vec<usize>,
    qinv: Vec<usize>,
    l_ptr: Vec<usize>,
    l_col: Vec<usize>,
    l_val: AVec<Real>,
    u_ptr: Vec<usize>,
    u_col: Vec<usize>,
    u_val: AVec<Real>,
    diag_idx: Vec<usize>,
    work: AVec<Real>,
    a_row_ptr: Vec<usize>,
    a_col_idx: Vec<usize>,
}

/// Direct solver wrapping the device refactorization engine
pub struct DeviceRefactor {
    a: Option<SharedCsr>,
    state: SolverState,
    registry: ParamRegistry<RefactorParam>,
    zero_pivot: Real,
    pivot_boost: Real,
    engine: Option<Engine>,
}

impl DeviceRefactor {
    pub fn new() -> Self {
        let mut registry = ParamRegistry::new();
        registry.register("zero_pivot", RefactorParam::ZeroPivot);
        registry.register("pivot_boost", RefactorParam::PivotBoost);
        Self {
            a: None,
            state: SolverState::Uninitialized,
            registry,
            zero_pivot: 0.0,
            pivot_boost: 0.0,
            engine: None,
        }
    }

    fn engine(&self, op: &'static str) -> Result<&Engine> {
        self.engine.as_ref().ok_or(SolverError::InvalidState {
            op,
            state: self.state,
        })
    }

    /// Apply the factors to a permuted copy of `b`, writing the solution
    /// through the engine work buffer into `out`.
    fn apply_factors(engine: &mut Engine, b: &[Real], out: &mut [Real]) {
        let n = engine.n;
        for i in 0..n {
            engine.work[i] = b[engine.p[i]];
        }
        // forward substitution with unit lower triangle
        for i in 0..n {
            let mut ti = engine.work[i];
            for idx in engine.l_ptr[i]..engine.l_ptr[i + 1] {
                let k = engine.l_col[idx];
                if k < i {
                    ti -= engine.l_val[idx] * engine.work[k];
                }
            }
            engine.work[i] = ti;
        }
        // back substitution
        for i in (0..n).rev() {
            let mut ti = engine.work[i];
            for idx in engine.u_ptr[i]..engine.u_ptr[i + 1] {
                let j = engine.u_col[idx];
                if j > i {
                    ti -= engine.u_val[idx] * engine.work[j];
                }
            }
            engine.work[i] = ti / engine.u_val[engine.diag_idx[i]];
        }
        for i in 0..n {
            out[engine.q[i]] = engine.work[i];
        }
    }
}

impl Default for DeviceRefactor {
    fn default() -> Self {
        Self::new()
    }
}

/// A seed factor as device-resident row-wise arrays
///
/// CSC input goes through the shared conversion; CSR input is taken as is.
fn seed_to_rows(factor: SparseMatrix, n: usize) -> Result<(Vec<usize>, Vec<usize>, Vec<Real>)> {
    let mut csr = match factor {
        SparseMatrix::Csr(mut m) => {
            m.sync(MemorySpace::Host)?;
            m
        }
        SparseMatrix::Csc(mut m) => {
            m.sync(MemorySpace::Host)?;
            let mut csr = Csr::new(m.n_rows, m.n_cols, m.nnz());
            convert_csc_to_csr(&m, &mut csr, MemorySpace::Host)?;
            csr
        }
        SparseMatrix::Coo(_) => {
            return Err(SolverError::UnsupportedFormat {
                expected: crate::matrix::SparseFormat::Csc,
                actual: crate::matrix::SparseFormat::Coo,
            })
        }
    };
    if csr.n_rows != n || csr.n_cols != n {
        return Err(SolverError::DimensionMismatch {
            expected: n,
            actual: csr.n_rows,
        });
    }
    csr.sync(MemorySpace::Host)?;
    Ok((
        csr.row_ptr(MemorySpace::Host)?.to_vec(),
        csr.col_idx(MemorySpace::Host)?.to_vec(),
        csr.values(MemorySpace::Host)?.to_vec(),
    ))
}

/// Validate a permutation vector of length `n`
fn check_perm(perm: &[usize], n: usize) -> Result<()> {
    if perm.len() != n {
        return Err(SolverError::DimensionMismatch {
            expected: n,
            actual: perm.len(),
        });
    }
    let mut seen = vec![false; n];
    for &i in perm {
        if i >= n || seen[i] {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                actual: i,
            });
        }
        seen[i] = true;
    }
    Ok(())
}

impl DirectSolver for DeviceRefactor {
    fn setup(&mut self, a: SharedCsr, seed: Option<Seed>) -> Result<()> {
        // a failed or repeated setup must not leave factors from a previous
        // system behind
        self.engine = None;
        self.a = None;
        self.state = SolverState::Uninitialized;

        let seed = seed.ok_or(SolverError::MissingSeed)?;
        let n;
        {
            let mut m = a.borrow_mut();
            if m.n_rows != m.n_cols {
                return Err(SolverError::DimensionMismatch {
                    expected: m.n_rows,
                    actual: m.n_cols,
                });
            }
            n = m.n_rows;
            m.sync(MemorySpace::Device)?;
        }

        let mut error_sum = 0u32;
        error_sum += step(check_perm(&seed.p, n), "row ordering");
        error_sum += step(check_perm(&seed.q, n), "column ordering");

        let mut l_rows = None;
        error_sum += step(
            seed_to_rows(seed.l, n).map(|rows| l_rows = Some(rows)),
            "lower factor load",
        );
        let mut u_rows = None;
        error_sum += step(
            seed_to_rows(seed.u, n).map(|rows| u_rows = Some(rows)),
            "upper factor load",
        );

        let mut diag_idx = vec![0usize; n];
        if let Some((u_ptr, u_col, _)) = &u_rows {
            // the diagonal must be the first entry of every U row
            let missing = (0..n).find(|&i| {
                u_ptr[i] == u_ptr[i + 1] || u_col[u_ptr[i]] != i
            });
            if let Some(i) = missing {
                error_sum += step(Err(SolverError::SingularMatrix(i)), "diagonal scan");
            } else {
                for i in 0..n {
                    diag_idx[i] = u_ptr[i];
                }
            }
        }

        if error_sum > 0 {
            self.state = SolverState::Failed;
            return Err(SolverError::EngineFailure { errors: error_sum });
        }

        // error_sum is zero, so both factors loaded
        let (l_ptr, l_col, l_val) = l_rows.ok_or(SolverError::MissingSeed)?;
        let (u_ptr, u_col, u_val) = u_rows.ok_or(SolverError::MissingSeed)?;

        let mut qinv = vec![0usize; n];
        for (pos, &c) in seed.q.iter().enumerate() {
            qinv[c] = pos;
        }

        let (a_row_ptr, a_col_idx) = {
            let m = a.borrow();
            (
                m.row_ptr(MemorySpace::Device)?.to_vec(),
                m.col_idx(MemorySpace::Device)?.to_vec(),
            )
        };

        self.engine = Some(Engine {
            n,
            p: seed.p,
            q: seed.q,
            qinv,
            l_ptr,
            l_col,
            l_val: AVec::from_iter(DEVICE_ALIGN, l_val.into_iter()),
            u_ptr,
            u_col,
            u_val: AVec::from_iter(DEVICE_ALIGN, u_val.into_iter()),
            diag_idx,
            work: AVec::from_iter(DEVICE_ALIGN, std::iter::repeat(0.0).take(n)),
            a_row_ptr,
            a_col_idx,
        });
        self.a = Some(a);
        self.state = SolverState::NumericReady;
        Ok(())
    }

    fn state(&self) -> SolverState {
        self.state
    }

    fn refactorize(&mut self) -> Result<()> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "refactorize",
                state: self.state,
            });
        }
        let a = self
            .a
            .as_ref()
            .ok_or(SolverError::InvalidState {
                op: "refactorize",
                state: self.state,
            })?
            .clone();
        let mut a = a.borrow_mut();
        a.sync(MemorySpace::Device)?;

        let engine = self.engine.as_mut().ok_or(SolverError::InvalidState {
            op: "refactorize",
            state: self.state,
        })?;
        if engine.a_row_ptr != a.row_ptr(MemorySpace::Device)?
            || engine.a_col_idx != a.col_idx(MemorySpace::Device)?
        {
            return Err(SolverError::PatternChanged);
        }
        let vals = a.values(MemorySpace::Device)?;
        let n = engine.n;

        // dense working row in permuted coordinates; only positions inside
        // the seeded row pattern participate, everything else is dropped
        let mut w = vec![0.0; n];
        let mut mark = vec![0usize; n];
        for i in 0..n {
            let stamp = i + 1;
            for idx in engine.l_ptr[i]..engine.l_ptr[i + 1] {
                mark[engine.l_col[idx]] = stamp;
            }
            for idx in engine.u_ptr[i]..engine.u_ptr[i + 1] {
                mark[engine.u_col[idx]] = stamp;
            }
            let row = engine.p[i];
            for idx in engine.a_row_ptr[row]..engine.a_row_ptr[row + 1] {
                let j = engine.qinv[engine.a_col_idx[idx]];
                if mark[j] == stamp {
                    w[j] = vals[idx];
                }
            }

            for idx in engine.l_ptr[i]..engine.l_ptr[i + 1] {
                let k = engine.l_col[idx];
                if k >= i {
                    engine.l_val[idx] = 1.0;
                    continue;
                }
                let l_ik = w[k] / engine.u_val[engine.diag_idx[k]];
                engine.l_val[idx] = l_ik;
                if l_ik != 0.0 {
                    for jdx in engine.u_ptr[k]..engine.u_ptr[k + 1] {
                        let j = engine.u_col[jdx];
                        if j > k && mark[j] == stamp {
                            w[j] -= l_ik * engine.u_val[jdx];
                        }
                    }
                }
            }

            for idx in engine.u_ptr[i]..engine.u_ptr[i + 1] {
                engine.u_val[idx] = w[engine.u_col[idx]];
            }
            let d = engine.diag_idx[i];
            if engine.u_val[d].abs() <= self.zero_pivot {
                if self.pivot_boost > 0.0 {
                    let boosted = if engine.u_val[d] >= 0.0 {
                        self.pivot_boost
                    } else {
                        -self.pivot_boost
                    };
                    log::warn!("boosting near-zero pivot in row {i}");
                    engine.u_val[d] = boosted;
                } else if engine.u_val[d] == 0.0 {
                    self.state = SolverState::Failed;
                    return Err(SolverError::SingularMatrix(i));
                }
            }

            for idx in engine.l_ptr[i]..engine.l_ptr[i + 1] {
                w[engine.l_col[idx]] = 0.0;
            }
            for idx in engine.u_ptr[i]..engine.u_ptr[i + 1] {
                w[engine.u_col[idx]] = 0.0;
            }
        }

        self.state = SolverState::RefactorReady;
        Ok(())
    }

    fn solve_in_place(&mut self, rhs: &mut Vector) -> Result<()> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "solve_in_place",
                state: self.state,
            });
        }
        let engine = self.engine.as_mut().ok_or(SolverError::InvalidState {
            op: "solve_in_place",
            state: self.state,
        })?;
        if rhs.size() != engine.n {
            return Err(SolverError::DimensionMismatch {
                expected: engine.n,
                actual: rhs.size(),
            });
        }
        rhs.sync(MemorySpace::Device)?;
        let b = rhs.data(MemorySpace::Device)?.to_vec();
        let out = rhs.data_mut(MemorySpace::Device)?;
        Self::apply_factors(engine, &b, out);
        Ok(())
    }

    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<()> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "solve",
                state: self.state,
            });
        }
        let engine = self.engine.as_mut().ok_or(SolverError::InvalidState {
            op: "solve",
            state: self.state,
        })?;
        if rhs.size() != engine.n || x.size() != engine.n {
            return Err(SolverError::DimensionMismatch {
                expected: engine.n,
                actual: rhs.size().max(x.size()),
            });
        }
        let b = rhs.data(MemorySpace::Device)?.to_vec();
        x.allocate(MemorySpace::Device);
        let out = x.data_mut(MemorySpace::Device)?;
        Self::apply_factors(engine, &b, out);
        Ok(())
    }

    fn p_ordering(&self) -> Result<Vec<usize>> {
        Ok(self.engine("p_ordering")?.p.clone())
    }

    fn q_ordering(&self) -> Result<Vec<usize>> {
        Ok(self.engine("q_ordering")?.q.clone())
    }

    fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        match self.registry.id(name)? {
            RefactorParam::ZeroPivot => self.zero_pivot = params::parse_real(name, value)?,
            RefactorParam::PivotBoost => self.pivot_boost = params::parse_real(name, value)?,
        }
        Ok(())
    }

    fn param_real(&self, name: &str) -> Real {
        match self.registry.id(name) {
            Ok(RefactorParam::ZeroPivot) => self.zero_pivot,
            Ok(RefactorParam::PivotBoost) => self.pivot_boost,
            Err(_) => params::unknown_real(name),
        }
    }

    fn print_param(&self, name: &str, out: &mut dyn Write) -> Result<()> {
        let value = match self.registry.id(name)? {
            RefactorParam::ZeroPivot => ParamValue::Real(self.zero_pivot),
            RefactorParam::PivotBoost => ParamValue::Real(self.pivot_boost),
        };
        write_param(out, name, &value)
    }
}
