//! Host LU factorization with threshold partial pivoting
//!
//! Left-looking, column-by-column elimination of `P A Q = L U`. Columns are
//! processed in a fill-reducing order `Q` chosen during [`HostLu::analyze`];
//! rows are pivoted numerically during [`HostLu::factorize`], preferring the
//! natural diagonal when it is within `pivot_tol` of the largest candidate.
//! [`HostLu::refactorize`] reuses the recorded pivot order, so it is only
//! valid while the sparsity pattern of the bound matrix is unchanged.

use std::io::Write;

use crate::error::{Result, SolverError};
use crate::matrix::{convert_csr_to_csc, Csc};
use crate::memory::MemorySpace;
use crate::solver::params::{self, ParamRegistry, ParamValue};
use crate::solver::{write_param, DirectSolver, Seed, SharedCsr, SolverState};
use crate::vector::Vector;
use crate::Real;

const UNPIVOTED: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
enum HostLuParam {
    PivotTol,
    Ordering,
    HaltIfSingular,
}

/// Symbolic analysis result: column ordering plus a fingerprint of the
/// pattern it was computed for
struct Symbolic {
    q: Vec<usize>,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

/// Numeric factors in working form
///
/// `l_cols[k]` holds the strictly-sub-pivotal entries of L column `k` as
/// `(original_row, multiplier)` pairs; `u_cols[j]` holds the above-diagonal
/// entries of U column `j` as `(pivot_position, value)` pairs in ascending
/// position order. Diagonals of U are kept separately for the condition
/// estimate.
struct Numeric {
    p: Vec<usize>,
    pinv: Vec<usize>,
    l_cols: Vec<Vec<(usize, Real)>>,
    u_cols: Vec<Vec<(usize, Real)>>,
    u_diag: Vec<Real>,
}

/// Lazily extracted CSC views of the factors
struct Factors {
    l: Csc,
    u: Csc,
}

/// Direct solver performing a full LU factorization in host memory
pub struct HostLu {
    a: Option<SharedCsr>,
    state: SolverState,
    registry: ParamRegistry<HostLuParam>,
    pivot_tol: Real,
    ordering: i64,
    halt_if_singular: bool,
    symbolic: Option<Symbolic>,
    numeric: Option<Numeric>,
    factors: Option<Factors>,
}

impl HostLu {
    pub fn new() -> Self {
        let mut registry = ParamRegistry::new();
        registry.register("pivot_tol", HostLuParam::PivotTol);
        registry.register("ordering", HostLuParam::Ordering);
        registry.register("halt_if_singular", HostLuParam::HaltIfSingular);
        Self {
            a: None,
            state: SolverState::Uninitialized,
            registry,
            pivot_tol: 0.1,
            ordering: 1,
            halt_if_singular: true,
            symbolic: None,
            numeric: None,
            factors: None,
        }
    }

    /// Reciprocal condition estimate `min |u_jj| / max |u_jj|`
    pub fn condition_number(&self) -> Result<Real> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "condition_number",
                state: self.state,
            });
        }
        let numeric = self.numeric.as_ref().ok_or(SolverError::InvalidState {
            op: "condition_number",
            state: self.state,
        })?;
        let mut min = Real::INFINITY;
        let mut max: Real = 0.0;
        for &d in &numeric.u_diag {
            let a = d.abs();
            min = min.min(a);
            max = max.max(a);
        }
        if max == 0.0 {
            Ok(0.0)
        } else {
            Ok(min / max)
        }
    }

    fn bound(&self, op: &'static str) -> Result<&SharedCsr> {
        self.a.as_ref().ok_or(SolverError::InvalidState {
            op,
            state: self.state,
        })
    }

    /// Reject a pattern that differs from the one `analyze` saw
    fn check_pattern(&self, row_ptr: &[usize], col_idx: &[usize]) -> Result<()> {
        let symbolic = self.symbolic.as_ref().ok_or(SolverError::InvalidState {
            op: "factorize",
            state: self.state,
        })?;
        if symbolic.row_ptr != row_ptr || symbolic.col_idx != col_idx {
            return Err(SolverError::PatternChanged);
        }
        Ok(())
    }

    /// Build the CSC of L and U from the working-form factors
    fn extract_factors(&mut self) -> Result<()> {
        if self.factors.is_some() {
            return Ok(());
        }
        let numeric = self.numeric.as_ref().ok_or(SolverError::InvalidState {
            op: "l_factor",
            state: self.state,
        })?;
        let n = numeric.p.len();

        let l_nnz = n + numeric.l_cols.iter().map(Vec::len).sum::<usize>();
        let mut l_ptr = Vec::with_capacity(n + 1);
        let mut l_rows = Vec::with_capacity(l_nnz);
        let mut l_vals = Vec::with_capacity(l_nnz);
        l_ptr.push(0);
        for k in 0..n {
            l_rows.push(k);
            l_vals.push(1.0);
            let mut below: Vec<(usize, Real)> = numeric.l_cols[k]
                .iter()
                .map(|&(r, v)| (numeric.pinv[r], v))
                .collect();
            below.sort_unstable_by_key(|&(pos, _)| pos);
            for (pos, v) in below {
                l_rows.push(pos);
                l_vals.push(v);
            }
            l_ptr.push(l_rows.len());
        }

        let u_nnz = n + numeric.u_cols.iter().map(Vec::len).sum::<usize>();
        let mut u_ptr = Vec::with_capacity(n + 1);
        let mut u_rows = Vec::with_capacity(u_nnz);
        let mut u_vals = Vec::with_capacity(u_nnz);
        u_ptr.push(0);
        for j in 0..n {
            for &(k, v) in &numeric.u_cols[j] {
                u_rows.push(k);
                u_vals.push(v);
            }
            u_rows.push(j);
            u_vals.push(numeric.u_diag[j]);
            u_ptr.push(u_rows.len());
        }

        self.factors = Some(Factors {
            l: Csc::from_host(n, n, l_ptr, l_rows, l_vals)?,
            u: Csc::from_host(n, n, u_ptr, u_rows, u_vals)?,
        });
        Ok(())
    }
}

impl Default for HostLu {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectSolver for HostLu {
    fn setup(&mut self, a: SharedCsr, seed: Option<Seed>) -> Result<()> {
        if seed.is_some() {
            log::warn!("host LU computes its own factors, ignoring seed");
        }
        {
            let m = a.borrow();
            if m.n_rows != m.n_cols {
                return Err(SolverError::DimensionMismatch {
                    expected: m.n_rows,
                    actual: m.n_cols,
                });
            }
        }
        self.a = Some(a);
        self.symbolic = None;
        self.numeric = None;
        self.factors = None;
        self.state = SolverState::Bound;
        Ok(())
    }

    fn state(&self) -> SolverState {
        self.state
    }

    fn analyze(&mut self) -> Result<()> {
        if self.state == SolverState::Uninitialized {
            return Err(SolverError::InvalidState {
                op: "analyze",
                state: self.state,
            });
        }
        let a = self.bound("analyze")?.clone();
        let mut a = a.borrow_mut();
        a.sync(MemorySpace::Host)?;
        let n = a.n_rows;

        let mut csc = Csc::new(n, n, a.nnz());
        convert_csr_to_csc(&a, &mut csc, MemorySpace::Host)?;

        let q = match self.ordering {
            0 => (0..n).collect(),
            1 => {
                // ascending column count keeps the sparsest columns early,
                // which limits fill from the left-looking updates
                let col_ptr = csc.col_ptr(MemorySpace::Host)?;
                let mut q: Vec<usize> = (0..n).collect();
                q.sort_by_key(|&j| col_ptr[j + 1] - col_ptr[j]);
                q
            }
            other => {
                log::warn!("unknown ordering {other}, using the natural order");
                (0..n).collect()
            }
        };

        self.symbolic = Some(Symbolic {
            q,
            row_ptr: a.row_ptr(MemorySpace::Host)?.to_vec(),
            col_idx: a.col_idx(MemorySpace::Host)?.to_vec(),
        });
        self.numeric = None;
        self.factors = None;
        self.state = SolverState::SymbolicReady;
        Ok(())
    }

    fn factorize(&mut self) -> Result<()> {
        if !matches!(
            self.state,
            SolverState::SymbolicReady | SolverState::NumericReady | SolverState::RefactorReady
        ) {
            return Err(SolverError::InvalidState {
                op: "factorize",
                state: self.state,
            });
        }
        let a = self.bound("factorize")?.clone();
        let mut a = a.borrow_mut();
        a.sync(MemorySpace::Host)?;
        self.check_pattern(
            a.row_ptr(MemorySpace::Host)?,
            a.col_idx(MemorySpace::Host)?,
        )?;
        let n = a.n_rows;

        let mut csc = Csc::new(n, n, a.nnz());
        convert_csr_to_csc(&a, &mut csc, MemorySpace::Host)?;

        let symbolic = self.symbolic.as_ref().ok_or(SolverError::InvalidState {
            op: "factorize",
            state: self.state,
        })?;
        let numeric = eliminate(
            n,
            csc.col_ptr(MemorySpace::Host)?,
            csc.row_idx(MemorySpace::Host)?,
            csc.values(MemorySpace::Host)?,
            &symbolic.q,
            self.pivot_tol,
            self.halt_if_singular,
            None,
        );
        match numeric {
            Ok(numeric) => {
                self.numeric = Some(numeric);
                self.factors = None;
                self.state = SolverState::NumericReady;
                Ok(())
            }
            Err(e) => {
                self.numeric = None;
                self.factors = None;
                self.state = SolverState::Failed;
                Err(e)
            }
        }
    }

    fn refactorize(&mut self) -> Result<()> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "refactorize",
                state: self.state,
            });
        }
        let a = self.bound("refactorize")?.clone();
        let mut a = a.borrow_mut();
        a.sync(MemorySpace::Host)?;
        self.check_pattern(
            a.row_ptr(MemorySpace::Host)?,
            a.col_idx(MemorySpace::Host)?,
        )?;
        let n = a.n_rows;

        let mut csc = Csc::new(n, n, a.nnz());
        convert_csr_to_csc(&a, &mut csc, MemorySpace::Host)?;

        let symbolic = self.symbolic.as_ref().ok_or(SolverError::InvalidState {
            op: "refactorize",
            state: self.state,
        })?;
        let p = self
            .numeric
            .as_ref()
            .ok_or(SolverError::InvalidState {
                op: "refactorize",
                state: self.state,
            })?
            .p
            .clone();
        let numeric = eliminate(
            n,
            csc.col_ptr(MemorySpace::Host)?,
            csc.row_idx(MemorySpace::Host)?,
            csc.values(MemorySpace::Host)?,
            &symbolic.q,
            self.pivot_tol,
            self.halt_if_singular,
            Some(&p),
        );
        match numeric {
            Ok(numeric) => {
                self.numeric = Some(numeric);
                self.factors = None;
                self.state = SolverState::RefactorReady;
                Ok(())
            }
            Err(e) => {
                self.numeric = None;
                self.factors = None;
                self.state = SolverState::Failed;
                Err(e)
            }
        }
    }

    fn solve(&mut self, rhs: &Vector, x: &mut Vector) -> Result<()> {
        if !self.state.is_solvable() {
            return Err(SolverError::InvalidState {
                op: "solve",
                state: self.state,
            });
        }
        let numeric = self.numeric.as_ref().ok_or(SolverError::InvalidState {
            op: "solve",
            state: self.state,
        })?;
        let symbolic = self.symbolic.as_ref().ok_or(SolverError::InvalidState {
            op: "solve",
            state: self.state,
        })?;
        let n = numeric.p.len();
        if rhs.size() != n || x.size() != n {
            return Err(SolverError::DimensionMismatch {
                expected: n,
                actual: rhs.size().max(x.size()),
            });
        }
        let b = rhs.data(MemorySpace::Host)?;

        // y = P b
        let mut y = vec![0.0; n];
        for k in 0..n {
            y[k] = b[numeric.p[k]];
        }
        // forward substitution with unit L, column-oriented
        for k in 0..n {
            let yk = y[k];
            if yk != 0.0 {
                for &(r, l) in &numeric.l_cols[k] {
                    y[numeric.pinv[r]] -= l * yk;
                }
            }
        }
        // back substitution, column-oriented
        for j in (0..n).rev() {
            let yj = y[j] / numeric.u_diag[j];
            y[j] = yj;
            if yj != 0.0 {
                for &(k, v) in &numeric.u_cols[j] {
                    y[k] -= v * yj;
                }
            }
        }
        // x = Q y
        x.allocate(MemorySpace::Host);
        let out = x.data_mut(MemorySpace::Host)?;
        for j in 0..n {
            out[symbolic.q[j]] = y[j];
        }
        Ok(())
    }

    fn l_factor(&mut self) -> Result<&Csc> {
        self.extract_factors()?;
        self.factors
            .as_ref()
            .map(|f| &f.l)
            .ok_or(SolverError::InvalidState {
                op: "l_factor",
                state: self.state,
            })
    }

    fn u_factor(&mut self) -> Result<&Csc> {
        self.extract_factors()?;
        self.factors
            .as_ref()
            .map(|f| &f.u)
            .ok_or(SolverError::InvalidState {
                op: "u_factor",
                state: self.state,
            })
    }

    fn p_ordering(&self) -> Result<Vec<usize>> {
        self.numeric
            .as_ref()
            .map(|num| num.p.clone())
            .ok_or(SolverError::InvalidState {
                op: "p_ordering",
                state: self.state,
            })
    }

    fn q_ordering(&self) -> Result<Vec<usize>> {
        self.symbolic
            .as_ref()
            .map(|sym| sym.q.clone())
            .ok_or(SolverError::InvalidState {
                op: "q_ordering",
                state: self.state,
            })
    }

    fn set_param(&mut self, name: &str, value: &str) -> Result<()> {
        match self.registry.id(name)? {
            HostLuParam::PivotTol => self.pivot_tol = params::parse_real(name, value)?,
            HostLuParam::Ordering => self.ordering = params::parse_int(name, value)?,
            HostLuParam::HaltIfSingular => {
                self.halt_if_singular = params::parse_bool(name, value)?
            }
        }
        Ok(())
    }

    fn param_real(&self, name: &str) -> Real {
        match self.registry.id(name) {
            Ok(HostLuParam::PivotTol) => self.pivot_tol,
            _ => params::unknown_real(name),
        }
    }

    fn param_int(&self, name: &str) -> i64 {
        match self.registry.id(name) {
            Ok(HostLuParam::Ordering) => self.ordering,
            _ => params::unknown_int(name),
        }
    }

    fn param_bool(&self, name: &str) -> bool {
        match self.registry.id(name) {
            Ok(HostLuParam::HaltIfSingular) => self.halt_if_singular,
            _ => params::unknown_bool(name),
        }
    }

    fn print_param(&self, name: &str, out: &mut dyn Write) -> Result<()> {
        let value = match self.registry.id(name)? {
            HostLuParam::PivotTol => ParamValue::Real(self.pivot_tol),
            HostLuParam::Ordering => ParamValue::Int(self.ordering),
            HostLuParam::HaltIfSingular => ParamValue::Bool(self.halt_if_singular),
        };
        write_param(out, name, &value)
    }
}

/// Left-looking elimination of the CSC matrix with columns taken in `q` order
///
/// With `forced` set, the recorded pivot rows are reused instead of searching,
/// which is the refactorization path.
#[allow(clippy::too_many_arguments)]
fn eliminate(
    n: usize,
    col_ptr: &[usize],
    row_idx: &[usize],
    vals: &[Real],
    q: &[usize],
    pivot_tol: Real,
    halt_if_singular: bool,
    forced: Option<&[usize]>,
) -> Result<Numeric> {
    let mut p = Vec::with_capacity(n);
    let mut pinv = vec![UNPIVOTED; n];
    let mut l_cols: Vec<Vec<(usize, Real)>> = Vec::with_capacity(n);
    let mut u_cols: Vec<Vec<(usize, Real)>> = Vec::with_capacity(n);
    let mut u_diag = Vec::with_capacity(n);

    // dense working column, cleared per iteration through the touched list
    let mut w = vec![0.0; n];
    let mut touched: Vec<usize> = Vec::new();
    let mut mark = vec![0usize; n];

    // reach computation state, stamped per column like `mark`
    let mut visit = vec![0usize; n];
    let mut dfs: Vec<usize> = Vec::new();
    let mut reach: Vec<usize> = Vec::new();

    for j in 0..n {
        let col = q[j];
        let stamp = j + 1;
        for idx in col_ptr[col]..col_ptr[col + 1] {
            let r = row_idx[idx];
            w[r] = vals[idx];
            mark[r] = stamp;
            touched.push(r);
        }

        // reach of the column pattern over the graph of L: exactly the
        // earlier columns whose pivot row can become nonzero, found without
        // scanning columns that cannot contribute
        reach.clear();
        for idx in col_ptr[col]..col_ptr[col + 1] {
            let k0 = pinv[row_idx[idx]];
            if k0 == UNPIVOTED || visit[k0] == stamp {
                continue;
            }
            visit[k0] = stamp;
            dfs.push(k0);
            while let Some(k) = dfs.pop() {
                reach.push(k);
                for &(r, _) in &l_cols[k] {
                    let kk = pinv[r];
                    if kk != UNPIVOTED && visit[kk] != stamp {
                        visit[kk] = stamp;
                        dfs.push(kk);
                    }
                }
            }
        }
        // ascending pivot position is a valid elimination order because L is
        // strictly lower triangular in pivot coordinates
        reach.sort_unstable();

        let mut ucol = Vec::new();
        for &k in &reach {
            let rk = p[k];
            if mark[rk] != stamp {
                continue;
            }
            let ukj = w[rk];
            if ukj == 0.0 {
                continue;
            }
            ucol.push((k, ukj));
            for &(r, l) in &l_cols[k] {
                if mark[r] != stamp {
                    mark[r] = stamp;
                    w[r] = 0.0;
                    touched.push(r);
                }
                w[r] -= l * ukj;
            }
        }

        let (pivot_row, pivot_val) = match forced {
            Some(order) => {
                let r = order[j];
                let v = if mark[r] == stamp { w[r] } else { 0.0 };
                if v == 0.0 {
                    if halt_if_singular {
                        return Err(SolverError::SingularMatrix(j));
                    }
                    log::warn!("zero pivot at column {j}, substituting epsilon");
                    (r, Real::EPSILON)
                } else {
                    (r, v)
                }
            }
            None => {
                let mut best = UNPIVOTED;
                let mut max_abs: Real = 0.0;
                for &r in &touched {
                    if pinv[r] != UNPIVOTED {
                        continue;
                    }
                    let a = w[r].abs();
                    if a > max_abs {
                        max_abs = a;
                        best = r;
                    }
                }
                if max_abs == 0.0 {
                    if halt_if_singular {
                        return Err(SolverError::SingularMatrix(j));
                    }
                    log::warn!("singular column {j}, substituting epsilon pivot");
                    let r = if pinv[col] == UNPIVOTED {
                        col
                    } else {
                        // any row not yet pivoted keeps the elimination going
                        (0..n)
                            .find(|&r| pinv[r] == UNPIVOTED)
                            .ok_or(SolverError::SingularMatrix(j))?
                    };
                    if mark[r] != stamp {
                        mark[r] = stamp;
                        w[r] = 0.0;
                        touched.push(r);
                    }
                    (r, Real::EPSILON)
                } else if pinv[col] == UNPIVOTED
                    && mark[col] == stamp
                    && w[col].abs() >= pivot_tol * max_abs
                {
                    // diagonal is acceptable under the threshold
                    (col, w[col])
                } else {
                    (best, w[best])
                }
            }
        };

        p.push(pivot_row);
        pinv[pivot_row] = j;
        u_diag.push(pivot_val);

        let mut lcol = Vec::new();
        for &r in &touched {
            if pinv[r] == UNPIVOTED && w[r] != 0.0 {
                lcol.push((r, w[r] / pivot_val));
            }
        }
        l_cols.push(lcol);
        u_cols.push(ucol);

        for &r in &touched {
            w[r] = 0.0;
        }
        touched.clear();
    }

    Ok(Numeric {
        p,
        pinv,
        l_cols,
        u_cols,
        u_diag,
    })
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

    /// 3x3 system with a known solution
    fn small_system() -> SharedCsr {
        // [ 4 1 0 ]
        // [ 1 5 2 ]
        // [ 0 2 6 ]
        shared(
            Csr::from_host(
                3,
                3,
                vec![0, 2, 5, 7],
                vec![0, 1, 0, 1, 2, 1, 2],
                vec![4.0, 1.0, 1.0, 5.0, 2.0, 2.0, 6.0],
            )
            .unwrap(),
        )
    }

    fn rhs_for_ones(a: &SharedCsr) -> Vector {
        let a = a.borrow();
        let n = a.n_rows;
        let mut b = Vector::new(n);
        b.allocate(MemorySpace::Host);
        {
            let data = b.data_mut(MemorySpace::Host).unwrap();
            for i in 0..n {
                data[i] = a.row_iter(i).unwrap().map(|(_, v)| v).sum();
            }
        }
        b
    }

    #[test]
    fn test_lifecycle_ordering_enforced() {
        let mut solver = HostLu::new();
        assert!(matches!(
            solver.analyze(),
            Err(SolverError::InvalidState { .. })
        ));

        solver.setup(small_system(), None).unwrap();
        assert_eq!(solver.state(), SolverState::Bound);
        assert!(matches!(
            solver.factorize(),
            Err(SolverError::InvalidState { .. })
        ));

        solver.analyze().unwrap();
        assert_eq!(solver.state(), SolverState::SymbolicReady);
        solver.factorize().unwrap();
        assert_eq!(solver.state(), SolverState::NumericReady);
    }

    #[test]
    fn test_solve_recovers_ones() {
        let a = small_system();
        let b = rhs_for_ones(&a);
        let mut x = Vector::new(3);

        let mut solver = HostLu::new();
        solver.setup(a, None).unwrap();
        solver.analyze().unwrap();
        solver.factorize().unwrap();
        solver.solve(&b, &mut x).unwrap();

        for &xi in x.data(MemorySpace::Host).unwrap() {
            assert!((xi - 1.0).abs() < 1e-12, "got {xi}");
        }
    }

    #[test]
    fn test_solve_with_chained_fill() {
        // subdiagonal plus a dense last column: eliminating the last column
        // depends on every earlier column through the L pattern alone
        let n = 6;
        let mut row_ptr = vec![0];
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        for i in 0..n {
            if i > 0 {
                col_idx.push(i - 1);
                values.push(1.0);
            }
            col_idx.push(i);
            values.push(10.0);
            if i + 1 < n {
                col_idx.push(n - 1);
                values.push(1.0);
            }
            row_ptr.push(col_idx.len());
        }
        let a = shared(Csr::from_host(n, n, row_ptr, col_idx, values).unwrap());
        let b = rhs_for_ones(&a);
        let mut x = Vector::new(n);

        let mut solver = HostLu::new();
        solver.set_param("ordering", "0").unwrap();
        solver.setup(a, None).unwrap();
        solver.analyze().unwrap();
        solver.factorize().unwrap();
        solver.solve(&b, &mut x).unwrap();
        for &xi in x.data(MemorySpace::Host).unwrap() {
            assert!((xi - 1.0).abs() < 1e-10, "got {xi}");
        }
    }

    #[test]
    fn test_refactorize_after_value_change() {
        let a = small_system();
        let mut solver = HostLu::new();
        solver.setup(a.clone(), None).unwrap();
        solver.analyze().unwrap();
        solver.factorize().unwrap();

        // scale all values by 2; pattern unchanged
        a.borrow_mut()
            .reset_values(
                &[8.0, 2.0, 2.0, 10.0, 4.0, 4.0, 12.0],
                MemorySpace::Host,
            )
            .unwrap();
        solver.refactorize().unwrap();
        assert_eq!(solver.state(), SolverState::RefactorReady);

        let b = rhs_for_ones(&a);
        let mut x = Vector::new(3);
        solver.solve(&b, &mut x).unwrap();
        for &xi in x.data(MemorySpace::Host).unwrap() {
            assert!((xi - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_refactorize_rejects_new_pattern() {
        let a = small_system();
        let mut solver = HostLu::new();
        solver.setup(a.clone(), None).unwrap();
        solver.analyze().unwrap();
        solver.factorize().unwrap();

        // different pattern, same size
        *a.borrow_mut() = Csr::from_host(
            3,
            3,
            vec![0, 1, 2, 3],
            vec![0, 1, 2],
            vec![1.0, 1.0, 1.0],
        )
        .unwrap();
        assert!(matches!(
            solver.refactorize(),
            Err(SolverError::PatternChanged)
        ));
    }

    #[test]
    fn test_singular_matrix_halts() {
        let a = shared(
            Csr::from_host(
                2,
                2,
                vec![0, 1, 2],
                vec![0, 0],
                vec![1.0, 2.0], // column 1 empty
            )
            .unwrap(),
        );
        let mut solver = HostLu::new();
        solver.setup(a, None).unwrap();
        solver.analyze().unwrap();
        assert!(matches!(
            solver.factorize(),
            Err(SolverError::SingularMatrix(_))
        ));
        assert_eq!(solver.state(), SolverState::Failed);
    }

    #[test]
    fn test_singular_matrix_continues_when_asked() {
        let a = shared(
            Csr::from_host(2, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 2.0]).unwrap(),
        );
        let mut solver = HostLu::new();
        solver.set_param("halt_if_singular", "no").unwrap();
        solver.setup(a, None).unwrap();
        solver.analyze().unwrap();
        solver.factorize().unwrap();
        assert!(solver.condition_number().unwrap() < 1e-10);
    }

    #[test]
    fn test_factor_shapes() {
        let a = small_system();
        let mut solver = HostLu::new();
        solver.setup(a, None).unwrap();
        solver.analyze().unwrap();
        solver.factorize().unwrap();

        let l_nnz = solver.l_factor().unwrap().nnz();
        let u_nnz = solver.u_factor().unwrap().nnz();
        let l = solver.l_factor().unwrap();
        assert_eq!(l.n_rows, 3);
        assert!(l_nnz >= 3, "unit diagonal must be present");
        assert!(u_nnz >= 3);

        let p = solver.p_ordering().unwrap();
        let q = solver.q_ordering().unwrap();
        let mut sp = p.clone();
        sp.sort_unstable();
        assert_eq!(sp, vec![0, 1, 2], "P must be a permutation");
        let mut sq = q.clone();
        sq.sort_unstable();
        assert_eq!(sq, vec![0, 1, 2], "Q must be a permutation");
    }

    #[test]
    fn test_params() {
        let mut solver = HostLu::new();
        assert_eq!(solver.param_real("pivot_tol"), 0.1);
        solver.set_param("pivot_tol", "0.5").unwrap();
        assert_eq!(solver.param_real("pivot_tol"), 0.5);
        solver.set_param("ordering", "0").unwrap();
        assert_eq!(solver.param_int("ordering"), 0);
        assert!(solver.set_param("whatever", "0").is_err());
        assert!(solver.set_param("pivot_tol", "loose").is_err());

        let mut buf = Vec::new();
        solver.print_param("ordering", &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "ordering = 0\n");
    }
}
