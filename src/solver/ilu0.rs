//! Zero-fill incomplete LU factorization in device memory
//!
//! ILU(0) keeps the factorization confined to the sparsity pattern of the
//! bound matrix: the engine owns a device copy of the value array and
//! factorizes it in place, row by row, leaving the strictly-lower part
//! holding L (unit diagonal implied) and the rest holding U.
//! [`DeviceIlu0::setup`] runs the analysis and the first factorization;
//! [`DeviceIlu0::refactorize`] re-copies the bound matrix's device values
//! and repeats only the numeric sweep.
//!
//! The preconditioner-grade factors make this backend approximate for
//! general matrices; solves apply one L then one U triangular sweep through
//! an engine-owned scratch vector.
//!
//! This backend exposes no tunable parameters: every parameter lookup fails
//! with an unknown-parameter error or sentinel.

use std::io::Write;

use aligned_vec::AVec;

use crate::error::{Result, SolverError};
use crate::matrix::Csc;
use crate::memory::{MemorySpace, DEVICE_ALIGN};
use crate::solver::params::ParamRegistry;
use crate::solver::{engine_step as step, DirectSolver, Seed, SharedCsr, SolverState};
use crate::Real;
use crate::vector::Vector;

#[derive(Debug, Clone, Copy)]
enum Ilu0Param {}

/// Analysis output plus the engine-owned factor values
///
/// `order` permutes entry positions so that each row's segment is sorted by
/// ascending column, which the elimination sweep requires; the bound
/// matrix's own arrays are never reordered.
struct Ilu0Engine {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    order: Vec<usize>,
    diag_idx: Vec<usize>,
    ilu_vals: AVec<Real>,
    aux: AVec<Real>,
}

impl Ilu0Engine {
    /// Value index of entry (i, j), if it is in the pattern
    fn find(&self, i: usize, j: usize) -> Option<usize> {
        let seg = &self.order[self.row_ptr[i]..self.row_ptr[i + 1]];
        seg.binary_search_by_key(&j, |&idx| self.col_idx[idx])
            .ok()
            .map(|pos| seg[pos])
    }

    /// Structural analysis: sort each row by column and locate the diagonals
    fn analyze(
        n: usize,
        row_ptr: &[usize],
        col_idx: &[usize],
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let mut order: Vec<usize> = (0..col_idx.len()).collect();
        for i in 0..n {
            order[row_ptr[i]..row_ptr[i + 1]].sort_unstable_by_key(|&idx| col_idx[idx]);
        }
        let mut diag_idx = Vec::with_capacity(n);
        for i in 0..n {
            let seg = &order[row_ptr[i]..row_ptr[i + 1]];
            let diag = seg
                .binary_search_by_key(&i, |&idx| col_idx[idx])
                .ok()
                .map(|pos| seg[pos])
                .ok_or(SolverError::SingularMatrix(i))?;
            diag_idx.push(diag);
        }
        Ok((order, diag_idx))
    }

    /// In-place numeric sweep over the fixed pattern
    fn factor(&mut self) -> Result<()> {
        for i in 0..self.n {
            for pos in self.row_ptr[i]..self.row_ptr[i + 1] {
                let idx_ik = self.order[pos];
                let k = self.col_idx[idx_ik];
                if k >= i {
                    break;
                }
                let l_ik = self.ilu_vals[idx_ik] / self.ilu_vals[self.diag_idx[k]];
                self.ilu_vals[idx_ik] = l_ik;
                if l_ik == 0.0 {
                    continue;
                }
                // subtract l_ik times the U part of row k, dropping fill
                for kpos in self.row_ptr[k]..self.row_ptr[k + 1] {
                    let idx_kj = self.order[kpos];
                    let j = self.col_idx[idx_kj];
                    if j <= k {
                        continue;
                    }
                    if let Some(idx_ij) = self.find(i, j) {
                        self.ilu_vals[idx_ij] -= l_ik * self.ilu_vals[idx_kj];
                    }
                }
            }
            if self.ilu_vals[self.diag_idx[i]] == 0.0 {
                return Err(SolverError::SingularMatrix(i));
            }
        }
        Ok(())
    }

    /// Unit-lower sweep into `aux`, then upper sweep into `out`
    fn apply(&mut self, b: &[Real], out: &mut [Real]) {
        for i in 0..self.n {
            let mut t = b[i];
            for pos in self.row_ptr[i]..self.row_ptr[i + 1] {
                let idx = self.order[pos];
                let j = self.col_idx[idx];
                if j >= i {
                    break;
                }
                t -= self.ilu_vals[idx] * self.aux[j];
            }
            self.aux[i] = t;
        }
        for i in (0..self.n).rev() {
            let mut t = self.aux[i];
            for pos in self.row_ptr[i]..self.row_ptr[i + 1] {
                let idx = self.order[pos];
                let j = self.col_idx[idx];
                if j > i {
                    t -= self.ilu_vals[idx] * out[j];
                }
            }
            out[i] = t / self.ilu_vals[self.diag_idx[i]];
        }
    }
}

/// Direct solver applying an incomplete LU factorization on the device
pub struct DeviceIlu0 {
    a: Option<SharedCsr>,
    state: SolverState,
    registry: ParamRegistry<Ilu0Param>,
    engine: Option<Ilu0Engine>,
    factors: Option<(Csc, Csc)>,
}

impl DeviceIlu0 {
    pub fn new() -> Self {
        Self {
            a: None,
            state: SolverState::Uninitialized,
            registry: ParamRegistry::new(),
            engine: None,
            factors: None,
        }
    }

    /// Rebind a matrix with the same sparsity pattern and refactorize
    ///
    /// Equivalent to a fresh setup when the pattern is unchanged, but skips
    /// the structural analysis.
    pub fn reset(&mut self, a: SharedCsr) -> Result<()> {
        if self.engine.is_none() {
            return Err(SolverError::InvalidState {
                op: "reset",
                state: self.state,
            });
        }
        a.borrow_mut().sync(MemorySpace::Device)?;
        self.a = Some(a);
        self.refactorize()
    }

    fn ready_engine(&mut self, op: &'static str) -> Result<&mut Ilu0Engine> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op,
                state: self.state,
            });
        }
        self.engine.as_mut().ok_or(SolverError::InvalidState {
            op,
            state: self.state,
        })
    }

    /// Split the ILU values into L (unit diagonal) and U CSC views
    fn extract_factors(&mut self) -> Result<()> {
        if self.factors.is_some() {
            return Ok(());
        }
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "l_factor",
                state: self.state,
            });
        }
        let engine = self.engine.as_ref().ok_or(SolverError::InvalidState {
            op: "l_factor",
            state: self.state,
        })?;
        let n = engine.n;

        // column counts of each triangle, then a column-wise scatter
        let mut l_count = vec![0usize; n];
        let mut u_count = vec![0usize; n];
        for i in 0..n {
            for pos in engine.row_ptr[i]..engine.row_ptr[i + 1] {
                let j = engine.col_idx[engine.order[pos]];
                if j < i {
                    l_count[j] += 1;
                } else {
                    u_count[j] += 1;
                }
            }
            l_count[i] += 1; // implied unit diagonal
        }
        let mut l_ptr = vec![0usize; n + 1];
        let mut u_ptr = vec![0usize; n + 1];
        for j in 0..n {
            l_ptr[j + 1] = l_ptr[j] + l_count[j];
            u_ptr[j + 1] = u_ptr[j] + u_count[j];
        }
        let mut l_rows = vec![0usize; l_ptr[n]];
        let mut l_vals = vec![0.0; l_ptr[n]];
        let mut u_rows = vec![0usize; u_ptr[n]];
        let mut u_vals = vec![0.0; u_ptr[n]];
        let mut l_cursor = l_ptr.clone();
        let mut u_cursor = u_ptr.clone();
        for i in 0..n {
            let dl = l_cursor[i];
            l_rows[dl] = i;
            l_vals[dl] = 1.0;
            l_cursor[i] += 1;
            for pos in engine.row_ptr[i]..engine.row_ptr[i + 1] {
                let idx = engine.order[pos];
                let j = engine.col_idx[idx];
                let v = engine.ilu_vals[idx];
                if j < i {
                    let d = l_cursor[j];
                    l_rows[d] = i;
                    l_vals[d] = v;
                    l_cursor[j] += 1;
                } else {
                    let d = u_cursor[j];
                    u_rows[d] = i;
                    u_vals[d] = v;
                    u_cursor[j] += 1;
                }
            }
        }

        self.factors = Some((
            Csc::from_host(n, n, l_ptr, l_rows, l_vals)?,
            Csc::from_host(n, n, u_ptr, u_rows, u_vals)?,
        ));
        Ok(())
    }
}

impl Default for DeviceIlu0 {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectSolver for DeviceIlu0 {
    fn setup(&mut self, a: SharedCsr, seed: Option<Seed>) -> Result<()> {
        if seed.is_some() {
            log::warn!("incomplete LU computes its own factors, ignoring seed");
        }
        self.engine = None;
        self.factors = None;
        self.a = None;
        self.state = SolverState::Uninitialized;

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
        let mut engine = {
            let m = a.borrow();
            let row_ptr = m.row_ptr(MemorySpace::Device)?.to_vec();
            let col_idx = m.col_idx(MemorySpace::Device)?.to_vec();
            let mut analysis = None;
            error_sum += step(
                Ilu0Engine::analyze(n, &row_ptr, &col_idx).map(|out| analysis = Some(out)),
                "structural analysis",
            );
            analysis.map(|(order, diag_idx)| Ilu0Engine {
                n,
                ilu_vals: AVec::from_iter(
                    DEVICE_ALIGN,
                    m.values(MemorySpace::Device)
                        .map(|v| v.to_vec())
                        .unwrap_or_default()
                        .into_iter(),
                ),
                aux: AVec::from_iter(DEVICE_ALIGN, std::iter::repeat(0.0).take(n)),
                row_ptr,
                col_idx,
                order,
                diag_idx,
            })
        };
        if let Some(engine) = engine.as_mut() {
            error_sum += step(engine.factor(), "numeric factorization");
        }
        if error_sum > 0 {
            self.state = SolverState::Failed;
            return Err(SolverError::EngineFailure { errors: error_sum });
        }

        self.engine = engine;
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
        if engine.row_ptr != a.row_ptr(MemorySpace::Device)?
            || engine.col_idx != a.col_idx(MemorySpace::Device)?
        {
            return Err(SolverError::PatternChanged);
        }

        let vals = a.values(MemorySpace::Device)?;
        engine
            .ilu_vals
            .iter_mut()
            .zip(vals)
            .for_each(|(dst, &src)| *dst = src);
        match engine.factor() {
            Ok(()) => {
                self.factors = None;
                self.state = SolverState::RefactorReady;
                Ok(())
            }
            Err(e) => {
                self.state = SolverState::Failed;
                Err(e)
            }
        }
    }

    fn l_factor(&mut self) -> Result<&Csc> {
        self.extract_factors()?;
        self.factors
            .as_ref()
            .map(|(l, _)| l)
            .ok_or(SolverError::InvalidState {
                op: "l_factor",
                state: self.state,
            })
    }

    fn u_factor(&mut self) -> Result<&Csc> {
        self.extract_factors()?;
        self.factors
            .as_ref()
            .map(|(_, u)| u)
            .ok_or(SolverError::InvalidState {
                op: "u_factor",
                state: self.state,
            })
    }

    fn solve_in_place(&mut self, rhs: &mut Vector) -> Result<()> {
        rhs.sync(MemorySpace::Device)?;
        let engine = self.ready_engine("solve_in_place")?;
        if rhs.size() != engine.n {
            return Err(SolverError::DimensionMismatch {
                expected: engine.n,
                actual: rhs.size(),
            });
        }
        let b = rhs.data(MemorySpace::Device)?.to_vec();
        let out = rhs.data_mut(MemorySpace::Device)?;
        engine.apply(&b, out);
        Ok(())
    }

    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<()> {
        let engine = self.ready_engine("solve")?;
        if rhs.size() != engine.n || x.size() != engine.n {
            return Err(SolverError::DimensionMismatch {
                expected: engine.n,
                actual: rhs.size().max(x.size()),
            });
        }
        let b = rhs.data(MemorySpace::Device)?.to_vec();
        x.allocate(MemorySpace::Device);
        let out = x.data_mut(MemorySpace::Device)?;
        engine.apply(&b, out);
        Ok(())
    }

    fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        let _ = value;
        match self.registry.id(name)? {}
    }

    fn print_param(&self, name: &str, _out: &mut dyn Write) -> Result<()> {
        match self.registry.id(name)? {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Csr;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn shared(m: Csr) -> SharedCsr {
        Rc::new(RefCell::new(m))
    }

    /// Lower bidiagonal matrix: ILU(0) is exact, so solves are exact
    fn bidiagonal() -> SharedCsr {
        // [ 2 0 0 ]
        // [ 1 2 0 ]
        // [ 0 1 2 ]
        shared(
            Csr::from_host(
                3,
                3,
                vec![0, 1, 3, 5],
                vec![0, 0, 1, 1, 2],
                vec![2.0, 1.0, 2.0, 1.0, 2.0],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_setup_factorizes_immediately() {
        let mut solver = DeviceIlu0::new();
        solver.setup(bidiagonal(), None).unwrap();
        assert_eq!(solver.state(), SolverState::NumericReady);
    }

    #[test]
    fn test_exact_on_triangular_pattern() {
        let a = bidiagonal();
        let mut solver = DeviceIlu0::new();
        solver.setup(a, None).unwrap();

        // b = A * [1, 1, 1]
        let mut rhs = Vector::new(3);
        rhs.copy_from_slice(&[2.0, 3.0, 3.0], MemorySpace::Host)
            .unwrap();
        rhs.sync(MemorySpace::Device).unwrap();
        let mut x = Vector::new(3);
        solver.solve(&rhs, &mut x).unwrap();
        x.sync(MemorySpace::Host).unwrap();
        for &xi in x.data(MemorySpace::Host).unwrap() {
            assert!((xi - 1.0).abs() < 1e-12, "got {xi}");
        }
    }

    #[test]
    fn test_missing_diagonal_fails_setup() {
        let a = shared(
            Csr::from_host(2, 2, vec![0, 1, 2], vec![1, 0], vec![1.0, 1.0]).unwrap(),
        );
        let mut solver = DeviceIlu0::new();
        assert!(matches!(
            solver.setup(a, None),
            Err(SolverError::EngineFailure { .. })
        ));
        assert_eq!(solver.state(), SolverState::Failed);
    }

    #[test]
    fn test_reset_values_then_refactorize() {
        let a = bidiagonal();
        let mut solver = DeviceIlu0::new();
        solver.setup(a.clone(), None).unwrap();

        a.borrow_mut()
            .reset_values(&[4.0, 2.0, 4.0, 2.0, 4.0], MemorySpace::Host)
            .unwrap();
        solver.refactorize().unwrap();
        assert_eq!(solver.state(), SolverState::RefactorReady);

        let mut rhs = Vector::new(3);
        rhs.copy_from_slice(&[4.0, 6.0, 6.0], MemorySpace::Host)
            .unwrap();
        rhs.sync(MemorySpace::Device).unwrap();
        solver.solve_in_place(&mut rhs).unwrap();
        rhs.sync(MemorySpace::Host).unwrap();
        for &xi in rhs.data(MemorySpace::Host).unwrap() {
            assert!((xi - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reset_binds_new_matrix_with_same_pattern() {
        let mut solver = DeviceIlu0::new();
        solver.setup(bidiagonal(), None).unwrap();

        let doubled = shared(
            Csr::from_host(
                3,
                3,
                vec![0, 1, 3, 5],
                vec![0, 0, 1, 1, 2],
                vec![4.0, 2.0, 4.0, 2.0, 4.0],
            )
            .unwrap(),
        );
        solver.reset(doubled).unwrap();
        assert_eq!(solver.state(), SolverState::RefactorReady);
    }

    #[test]
    fn test_factor_views_split_by_diagonal() {
        let a = bidiagonal();
        let mut solver = DeviceIlu0::new();
        solver.setup(a, None).unwrap();

        // lower triangular input: U is the diagonal, L carries the rest
        let u = solver.u_factor().unwrap();
        assert_eq!(u.nnz(), 3);
        assert_eq!(u.values(MemorySpace::Host).unwrap(), &[2.0, 2.0, 2.0]);
        let l = solver.l_factor().unwrap();
        assert_eq!(l.nnz(), 5);
        // multipliers on the subdiagonal
        assert_eq!(
            l.values(MemorySpace::Host).unwrap(),
            &[1.0, 0.5, 1.0, 0.5, 1.0]
        );
    }

    #[test]
    fn test_no_parameters() {
        let mut solver = DeviceIlu0::new();
        assert!(matches!(
            solver.set_param("zero_pivot", "1e-8"),
            Err(SolverError::UnknownParameter(_))
        ));
        assert!(solver.param_real("zero_pivot").is_nan());
    }
}
