//! Bounded revised simplex for LP relaxations.
//!
//! Internal form: minimise cᵀx subject to A·x − s = 0, where x are the
//! structural columns and s the row activities. Every column carries its
//! own bounds (a row's sense becomes the bounds of its activity), so a
//! variable bound is never a row. Nonbasic columns rest at a finite bound.
//! The dense basis inverse is updated per pivot and rebuilt from scratch
//! every REFACTOR_EVERY pivots.
//!
//! RULES:
//!   - Costs are fixed at construction; callers only move bounds. Any
//!     dual-feasible basis is therefore a valid warm start for any bounds,
//!     and the dual simplex resumes from wherever the last solve stopped.
//!   - Every choice breaks ties on the lowest index. Identical inputs give
//!     identical pivots.

use super::{Deadline, LpProblem, Sense};

pub(crate) const FEAS_TOL: f64 = 1e-7;
/// Smallest reduced cost worth a primal pivot.
const DUAL_TOL: f64 = 1e-9;
/// Dual infeasibility tolerated in a finished basis.
const OPT_TOL: f64 = 1e-7;
const PIVOT_TOL: f64 = 1e-9;
const RATIO_TIE: f64 = 1e-12;
const SINGULAR_TOL: f64 = 1e-11;
const REFACTOR_EVERY: usize = 64;
const DEGENERATE_RUN_BEFORE_BLAND: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelaxStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Interrupted,
    /// Iteration budget spent without converging.
    Stalled,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Basic,
    AtLower,
    AtUpper,
}

enum DualOutcome {
    Done,
    Infeasible,
    Interrupted,
    Stalled,
}

pub(crate) struct Simplex {
    m: usize,
    n: usize,
    /// Sparse structural columns, (row, coefficient).
    columns: Vec<Vec<(usize, f64)>>,
    /// Minimisation costs; logicals cost nothing.
    cost: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    value: Vec<f64>,
    state: Vec<State>,
    /// Column basic in each row position.
    basis: Vec<usize>,
    /// Row-major m×m inverse of the basis matrix.
    inverse: Vec<f64>,
    since_refactor: usize,
    pub(crate) pivots: usize,
}

impl Simplex {
    pub(crate) fn new(problem: &LpProblem) -> Result<Self, RelaxStatus> {
        let n = problem.variables.len();
        let m = problem.constraints.len();
        let mut columns: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut cost = Vec::with_capacity(n + m);
        let mut lower = Vec::with_capacity(n + m);
        let mut upper = Vec::with_capacity(n + m);

        for var in &problem.variables {
            if !var.lower.is_finite() || var.upper.is_nan() || !var.objective.is_finite() {
                return Err(RelaxStatus::Invalid);
            }
            cost.push(-var.objective);
            lower.push(var.lower);
            upper.push(var.upper);
        }
        for (i, con) in problem.constraints.iter().enumerate() {
            if !con.rhs.is_finite() {
                return Err(RelaxStatus::Invalid);
            }
            for &(j, a) in &con.coefficients {
                if j >= n || !a.is_finite() {
                    return Err(RelaxStatus::Invalid);
                }
                if a == 0.0 {
                    continue;
                }
                match columns[j].last_mut() {
                    Some((row, v)) if *row == i => *v += a,
                    _ => columns[j].push((i, a)),
                }
            }
            let (lo, up) = match con.sense {
                Sense::Le => (f64::NEG_INFINITY, con.rhs),
                Sense::Ge => (con.rhs, f64::INFINITY),
                Sense::Eq => (con.rhs, con.rhs),
            };
            cost.push(0.0);
            lower.push(lo);
            upper.push(up);
        }

        let mut state = Vec::with_capacity(n + m);
        let mut value = Vec::with_capacity(n + m);
        for j in 0..n {
            // Crash: columns that pay to grow start at a finite upper bound,
            // which keeps the slack basis dual feasible whenever possible.
            if cost[j] < 0.0 && upper[j].is_finite() {
                state.push(State::AtUpper);
                value.push(upper[j]);
            } else {
                state.push(State::AtLower);
                value.push(lower[j]);
            }
        }
        state.extend(std::iter::repeat(State::Basic).take(m));
        value.extend(std::iter::repeat(0.0).take(m));

        let mut lp = Self {
            m,
            n,
            columns,
            cost,
            lower,
            upper,
            value,
            state,
            basis: (n..n + m).collect(),
            inverse: Vec::new(),
            since_refactor: 0,
            pivots: 0,
        };
        lp.slack_inverse();
        lp.compute_basics();
        Ok(lp)
    }

    /// Replace the structural bounds. The basis is kept.
    pub(crate) fn set_bounds(&mut self, lower: &[f64], upper: &[f64]) {
        self.lower[..self.n].copy_from_slice(&lower[..self.n]);
        self.upper[..self.n].copy_from_slice(&upper[..self.n]);
    }

    /// Structural values of the last solve, clipped into their bounds.
    pub(crate) fn values(&self) -> Vec<f64> {
        (0..self.n)
            .map(|j| {
                let v = self.value[j].max(self.lower[j]);
                if self.upper[j].is_finite() { v.min(self.upper[j]) } else { v }
            })
            .collect()
    }

    pub(crate) fn solve(&mut self, deadline: &Deadline) -> RelaxStatus {
        for j in 0..self.n {
            if self.lower[j] > self.upper[j] + FEAS_TOL {
                return RelaxStatus::Infeasible;
            }
            if self.lower[j] > self.upper[j] {
                self.upper[j] = self.lower[j];
            }
        }
        self.place_nonbasics();
        self.compute_basics();

        let budget = 50 * (self.n + self.m) + 1_000;
        let mut iterations = 0usize;
        if self.dual_feasible() {
            match self.dual(deadline, &mut iterations, budget) {
                DualOutcome::Done if self.dual_feasible() => return RelaxStatus::Optimal,
                DualOutcome::Done | DualOutcome::Stalled => {}
                DualOutcome::Infeasible => return RelaxStatus::Infeasible,
                DualOutcome::Interrupted => return RelaxStatus::Interrupted,
            }
        }
        self.primal(deadline, &mut iterations, budget)
    }

    // ── Linear algebra ───────────────────────────────────────────────────

    fn slack_inverse(&mut self) {
        let m = self.m;
        self.inverse = vec![0.0; m * m];
        for i in 0..m {
            self.inverse[i * m + i] = -1.0;
        }
        self.since_refactor = 0;
    }

    /// Âⱼ · `row` for an m-vector `row`; logical j is the column −e.
    fn dot_column(&self, j: usize, row: &[f64]) -> f64 {
        if j < self.n {
            self.columns[j].iter().map(|&(i, a)| row[i] * a).sum()
        } else {
            -row[j - self.n]
        }
    }

    /// B⁻¹·Âⱼ.
    fn ftran(&self, j: usize) -> Vec<f64> {
        let m = self.m;
        let mut alpha = vec![0.0; m];
        if j < self.n {
            for &(k, a) in &self.columns[j] {
                for (i, out) in alpha.iter_mut().enumerate() {
                    *out += self.inverse[i * m + k] * a;
                }
            }
        } else {
            let k = j - self.n;
            for (i, out) in alpha.iter_mut().enumerate() {
                *out = -self.inverse[i * m + k];
            }
        }
        alpha
    }

    /// πᵀ = c_Bᵀ·B⁻¹.
    fn duals(&self, basic_cost: &[f64]) -> Vec<f64> {
        let m = self.m;
        let mut pi = vec![0.0; m];
        for (i, &c) in basic_cost.iter().enumerate() {
            if c == 0.0 {
                continue;
            }
            let row = &self.inverse[i * m..(i + 1) * m];
            for (p, &b) in pi.iter_mut().zip(row) {
                *p += c * b;
            }
        }
        pi
    }

    fn basic_costs(&self) -> Vec<f64> {
        self.basis.iter().map(|&j| self.cost[j]).collect()
    }

    /// x_B = −B⁻¹·N·x_N.
    fn compute_basics(&mut self) {
        let m = self.m;
        let mut rhs = vec![0.0; m];
        for j in 0..self.n + m {
            if self.state[j] == State::Basic {
                continue;
            }
            let x = self.value[j];
            if x == 0.0 {
                continue;
            }
            if j < self.n {
                for &(i, a) in &self.columns[j] {
                    rhs[i] -= a * x;
                }
            } else {
                rhs[j - self.n] += x;
            }
        }
        for i in 0..m {
            let row = &self.inverse[i * m..(i + 1) * m];
            let xb: f64 = row.iter().zip(&rhs).map(|(b, r)| b * r).sum();
            self.value[self.basis[i]] = xb;
        }
    }

    /// Swap column `q` into row position `r`. The caller has already
    /// parked the leaving column at its bound.
    fn pivot(&mut self, r: usize, q: usize, alpha: &[f64]) -> bool {
        let m = self.m;
        let p = alpha[r];
        let pivot_row: Vec<f64> = self.inverse[r * m..(r + 1) * m].iter().map(|v| v / p).collect();
        for (i, &f) in alpha.iter().enumerate() {
            if i == r || f == 0.0 {
                continue;
            }
            let row = &mut self.inverse[i * m..(i + 1) * m];
            for (v, pv) in row.iter_mut().zip(&pivot_row) {
                *v -= f * pv;
            }
        }
        self.inverse[r * m..(r + 1) * m].copy_from_slice(&pivot_row);
        self.basis[r] = q;
        self.state[q] = State::Basic;
        self.pivots += 1;
        self.since_refactor += 1;
        if self.since_refactor >= REFACTOR_EVERY {
            return self.refactor();
        }
        true
    }

    /// Rebuild B⁻¹ by Gauss-Jordan elimination. A singular basis falls
    /// back to the all-logical one and reports `false`.
    fn refactor(&mut self) -> bool {
        let m = self.m;
        let mut b = vec![0.0; m * m];
        for (k, &j) in self.basis.iter().enumerate() {
            if j < self.n {
                for &(i, a) in &self.columns[j] {
                    b[i * m + k] = a;
                }
            } else {
                b[(j - self.n) * m + k] = -1.0;
            }
        }
        let mut inv = vec![0.0; m * m];
        for i in 0..m {
            inv[i * m + i] = 1.0;
        }

        for col in 0..m {
            let mut piv = col;
            let mut best = b[col * m + col].abs();
            for i in col + 1..m {
                let v = b[i * m + col].abs();
                if v > best {
                    piv = i;
                    best = v;
                }
            }
            if best < SINGULAR_TOL {
                log::debug!("simplex: singular basis at column {col}, restarting from slacks");
                self.reset_basis();
                return false;
            }
            if piv != col {
                for t in 0..m {
                    b.swap(piv * m + t, col * m + t);
                    inv.swap(piv * m + t, col * m + t);
                }
            }
            let p = b[col * m + col];
            for t in 0..m {
                b[col * m + t] /= p;
                inv[col * m + t] /= p;
            }
            let b_row: Vec<f64> = b[col * m..(col + 1) * m].to_vec();
            let inv_row: Vec<f64> = inv[col * m..(col + 1) * m].to_vec();
            for i in 0..m {
                if i == col {
                    continue;
                }
                let f = b[i * m + col];
                if f == 0.0 {
                    continue;
                }
                for t in col..m {
                    b[i * m + t] -= f * b_row[t];
                }
                for t in 0..m {
                    inv[i * m + t] -= f * inv_row[t];
                }
            }
        }
        self.inverse = inv;
        self.since_refactor = 0;
        self.compute_basics();
        true
    }

    fn reset_basis(&mut self) {
        for j in 0..self.n {
            if self.state[j] == State::Basic {
                let nearer_upper = self.upper[j].is_finite()
                    && self.upper[j] - self.value[j] < self.value[j] - self.lower[j];
                self.state[j] = if nearer_upper { State::AtUpper } else { State::AtLower };
            }
        }
        for i in 0..self.m {
            self.state[self.n + i] = State::Basic;
        }
        self.basis = (self.n..self.n + self.m).collect();
        self.slack_inverse();
        self.place_nonbasics();
        self.compute_basics();
    }

    // ── Bookkeeping ──────────────────────────────────────────────────────

    fn place_nonbasics(&mut self) {
        for j in 0..self.n + self.m {
            match self.state[j] {
                State::Basic => {}
                State::AtLower if self.lower[j].is_finite() => self.value[j] = self.lower[j],
                State::AtUpper if self.upper[j].is_finite() => self.value[j] = self.upper[j],
                State::AtLower => {
                    self.state[j] = State::AtUpper;
                    self.value[j] = self.upper[j];
                }
                State::AtUpper => {
                    self.state[j] = State::AtLower;
                    self.value[j] = self.lower[j];
                }
            }
        }
    }

    fn is_fixed(&self, j: usize) -> bool {
        self.upper[j] - self.lower[j] <= 0.0
    }

    /// Signed bound violation of column j: negative below, positive above.
    fn violation(&self, j: usize) -> f64 {
        let x = self.value[j];
        if x < self.lower[j] - FEAS_TOL {
            x - self.lower[j]
        } else if x > self.upper[j] + FEAS_TOL {
            x - self.upper[j]
        } else {
            0.0
        }
    }

    fn dual_feasible(&self) -> bool {
        let pi = self.duals(&self.basic_costs());
        (0..self.n + self.m).all(|j| {
            if self.is_fixed(j) {
                return true;
            }
            match self.state[j] {
                State::Basic => true,
                State::AtLower => self.cost[j] - self.dot_column(j, &pi) >= -OPT_TOL,
                State::AtUpper => self.cost[j] - self.dot_column(j, &pi) <= OPT_TOL,
            }
        })
    }

    // ── Dual simplex ─────────────────────────────────────────────────────

    fn dual(&mut self, deadline: &Deadline, iterations: &mut usize, budget: usize) -> DualOutcome {
        let m = self.m;
        loop {
            if *iterations >= budget {
                return DualOutcome::Stalled;
            }
            if deadline.expired() {
                return DualOutcome::Interrupted;
            }
            *iterations += 1;

            // Leaving row: the largest bound violation.
            let mut leave: Option<(usize, f64)> = None;
            for i in 0..m {
                let v = self.violation(self.basis[i]).abs();
                if v > leave.map_or(0.0, |(_, best)| best) {
                    leave = Some((i, v));
                }
            }
            let Some((r, _)) = leave else {
                return DualOutcome::Done;
            };
            let p = self.basis[r];
            let below = self.value[p] < self.lower[p];

            // Entering column: dual ratio test along row r of B⁻¹·N.
            let pi = self.duals(&self.basic_costs());
            let rho: Vec<f64> = self.inverse[r * m..(r + 1) * m].to_vec();
            let mut best: Option<(usize, f64, f64)> = None;
            for j in 0..self.n + m {
                let s = self.state[j];
                if s == State::Basic || self.is_fixed(j) {
                    continue;
                }
                let a = self.dot_column(j, &rho);
                if a.abs() <= PIVOT_TOL {
                    continue;
                }
                // x_p moves by −a per unit of x_j.
                let helps = match (below, s) {
                    (true, State::AtLower) | (false, State::AtUpper) => a < 0.0,
                    (true, State::AtUpper) | (false, State::AtLower) => a > 0.0,
                    (_, State::Basic) => false,
                };
                if !helps {
                    continue;
                }
                let d = self.cost[j] - self.dot_column(j, &pi);
                let slack = if s == State::AtLower { d.max(0.0) } else { (-d).max(0.0) };
                let ratio = slack / a.abs();
                let better = match best {
                    None => true,
                    Some((_, br, ba)) => {
                        ratio < br - RATIO_TIE || ((ratio - br).abs() <= RATIO_TIE && a.abs() > ba)
                    }
                };
                if better {
                    best = Some((j, ratio, a.abs()));
                }
            }
            let Some((q, _, _)) = best else {
                return DualOutcome::Infeasible;
            };

            let alpha = self.ftran(q);
            if alpha[r].abs() <= PIVOT_TOL {
                if !self.refactor() {
                    return DualOutcome::Stalled;
                }
                continue;
            }
            let target = if below { self.lower[p] } else { self.upper[p] };
            let delta = (self.value[p] - target) / alpha[r];
            for (i, &a) in alpha.iter().enumerate() {
                let j = self.basis[i];
                self.value[j] -= a * delta;
            }
            self.value[q] += delta;
            self.value[p] = target;
            self.state[p] = if below { State::AtLower } else { State::AtUpper };
            if !self.pivot(r, q, &alpha) {
                return DualOutcome::Stalled;
            }
        }
    }

    // ── Primal simplex ───────────────────────────────────────────────────

    /// Composite primal: minimise the sum of bound violations while any
    /// remain, then the true cost.
    fn primal(&mut self, deadline: &Deadline, iterations: &mut usize, budget: usize) -> RelaxStatus {
        let m = self.m;
        let mut degenerate_run = 0usize;
        loop {
            if *iterations >= budget {
                return RelaxStatus::Stalled;
            }
            if deadline.expired() {
                return RelaxStatus::Interrupted;
            }
            *iterations += 1;

            let phase_one = self.basis.iter().any(|&j| self.violation(j) != 0.0);
            let basic_cost: Vec<f64> = if phase_one {
                self.basis
                    .iter()
                    .map(|&j| {
                        let v = self.violation(j);
                        if v < 0.0 { -1.0 } else if v > 0.0 { 1.0 } else { 0.0 }
                    })
                    .collect()
            } else {
                self.basic_costs()
            };
            let pi = self.duals(&basic_cost);

            let bland = degenerate_run >= DEGENERATE_RUN_BEFORE_BLAND;
            let mut entering: Option<(usize, f64)> = None;
            for j in 0..self.n + m {
                let s = self.state[j];
                if s == State::Basic || self.is_fixed(j) {
                    continue;
                }
                let c = if phase_one { 0.0 } else { self.cost[j] };
                let d = c - self.dot_column(j, &pi);
                let gain = if s == State::AtLower { -d } else { d };
                if gain <= DUAL_TOL {
                    continue;
                }
                if bland {
                    entering = Some((j, gain));
                    break;
                }
                if entering.map_or(true, |(_, g)| gain > g) {
                    entering = Some((j, gain));
                }
            }
            let Some((q, _)) = entering else {
                return if phase_one { RelaxStatus::Infeasible } else { RelaxStatus::Optimal };
            };
            let dir = if self.state[q] == State::AtLower { 1.0 } else { -1.0 };
            let alpha = self.ftran(q);

            // Ratio test; the entering column's own range is the bound flip.
            let mut step = self.upper[q] - self.lower[q];
            let mut leave: Option<(usize, f64, State, f64)> = None;
            for (i, &a) in alpha.iter().enumerate() {
                let rate = -a * dir;
                if rate.abs() <= PIVOT_TOL {
                    continue;
                }
                let j = self.basis[i];
                let (x, lo, up) = (self.value[j], self.lower[j], self.upper[j]);
                let (limit, bound, parked) = if x < lo - FEAS_TOL {
                    if rate < 0.0 {
                        continue;
                    }
                    ((lo - x) / rate, lo, State::AtLower)
                } else if x > up + FEAS_TOL {
                    if rate > 0.0 {
                        continue;
                    }
                    ((x - up) / -rate, up, State::AtUpper)
                } else if rate > 0.0 {
                    if !up.is_finite() {
                        continue;
                    }
                    ((up - x).max(0.0) / rate, up, State::AtUpper)
                } else {
                    if !lo.is_finite() {
                        continue;
                    }
                    ((x - lo).max(0.0) / -rate, lo, State::AtLower)
                };
                let better = limit < step - RATIO_TIE
                    || matches!(leave, Some((_, _, _, best)) if (limit - step).abs() <= RATIO_TIE && rate.abs() > best);
                if better {
                    step = limit;
                    leave = Some((i, bound, parked, rate.abs()));
                }
            }
            if !step.is_finite() {
                return if phase_one { RelaxStatus::Stalled } else { RelaxStatus::Unbounded };
            }
            if step <= RATIO_TIE {
                degenerate_run += 1;
            } else {
                degenerate_run = 0;
            }

            for (i, &a) in alpha.iter().enumerate() {
                let j = self.basis[i];
                self.value[j] -= a * dir * step;
            }
            self.value[q] += dir * step;
            match leave {
                None => {
                    self.state[q] = if dir > 0.0 { State::AtUpper } else { State::AtLower };
                    self.value[q] = if dir > 0.0 { self.upper[q] } else { self.lower[q] };
                }
                Some((r, bound, parked, _)) => {
                    let p = self.basis[r];
                    self.value[p] = bound;
                    self.state[p] = parked;
                    // A failed refactor restarts from the slack basis.
                    self.pivot(r, q, &alpha);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{CancelToken, SolveLimits};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    struct Relaxation {
        status: RelaxStatus,
        values: Vec<f64>,
        objective: f64,
    }

    impl Relaxation {
        fn failed(status: RelaxStatus) -> Self {
            Self { status, values: Vec::new(), objective: f64::NEG_INFINITY }
        }
    }

    /// One-shot relaxation of `problem` under the given structural bounds.
    fn solve_relaxation(
        problem: &LpProblem,
        lower: &[f64],
        upper: &[f64],
        deadline: &Deadline,
    ) -> Relaxation {
        let mut lp = match Simplex::new(problem) {
            Ok(lp) => lp,
            Err(status) => return Relaxation::failed(status),
        };
        if lower.len() != problem.variables.len() || upper.len() != problem.variables.len() {
            return Relaxation::failed(RelaxStatus::Invalid);
        }
        lp.set_bounds(lower, upper);
        match lp.solve(deadline) {
            RelaxStatus::Optimal => {
                let values = lp.values();
                let objective = problem.objective_value(&values);
                Relaxation { status: RelaxStatus::Optimal, values, objective }
            }
            status => Relaxation::failed(status),
        }
    }

    fn deadline() -> Deadline {
        SolveLimits::new(Duration::from_secs(5), 1_000, CancelToken::new()).deadline()
    }

    fn bounds(p: &LpProblem) -> (Vec<f64>, Vec<f64>) {
        (
            p.variables.iter().map(|v| v.lower).collect(),
            p.variables.iter().map(|v| v.upper).collect(),
        )
    }

    #[test]
    fn solves_small_maximisation() {
        // max 3x + 2y  s.t.  x + y <= 4,  x + 3y <= 6,  0 <= x <= 3
        let mut p = LpProblem::new();
        let x = p.add_continuous("x", 0.0, 3.0, 3.0);
        let y = p.add_continuous("y", 0.0, f64::INFINITY, 2.0);
        p.add_constraint("c1", vec![(x, 1.0), (y, 1.0)], Sense::Le, 4.0);
        p.add_constraint("c2", vec![(x, 1.0), (y, 3.0)], Sense::Le, 6.0);
        let (lo, up) = bounds(&p);
        let r = solve_relaxation(&p, &lo, &up, &deadline());
        assert_eq!(r.status, RelaxStatus::Optimal);
        assert!((r.objective - 11.0).abs() < 1e-6, "objective {}", r.objective);
        assert!((r.values[x] - 3.0).abs() < 1e-6);
        assert!((r.values[y] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn equality_and_ge_rows_use_phase_one() {
        // max -x - y  s.t.  x + y = 2,  x >= 0.5
        let mut p = LpProblem::new();
        let x = p.add_continuous("x", 0.0, f64::INFINITY, -1.0);
        let y = p.add_continuous("y", 0.0, f64::INFINITY, -1.0);
        p.add_constraint("sum", vec![(x, 1.0), (y, 1.0)], Sense::Eq, 2.0);
        p.add_constraint("floor", vec![(x, 1.0)], Sense::Ge, 0.5);
        let (lo, up) = bounds(&p);
        let r = solve_relaxation(&p, &lo, &up, &deadline());
        assert_eq!(r.status, RelaxStatus::Optimal);
        assert!((r.objective + 2.0).abs() < 1e-6);
        assert!(r.values[x] >= 0.5 - 1e-6);
    }

    #[test]
    fn detects_infeasibility() {
        let mut p = LpProblem::new();
        let x = p.add_continuous("x", 0.0, 1.0, 1.0);
        p.add_constraint("too_big", vec![(x, 1.0)], Sense::Ge, 2.0);
        let (lo, up) = bounds(&p);
        let r = solve_relaxation(&p, &lo, &up, &deadline());
        assert_eq!(r.status, RelaxStatus::Infeasible);
    }

    #[test]
    fn detects_unboundedness() {
        let mut p = LpProblem::new();
        let x = p.add_continuous("x", 0.0, f64::INFINITY, 1.0);
        let y = p.add_continuous("y", 0.0, f64::INFINITY, 0.0);
        p.add_constraint("diff", vec![(x, 1.0), (y, -1.0)], Sense::Le, 1.0);
        let (lo, up) = bounds(&p);
        let r = solve_relaxation(&p, &lo, &up, &deadline());
        assert_eq!(r.status, RelaxStatus::Unbounded);
    }

    #[test]
    fn fixed_variables_stay_at_their_value() {
        let mut p = LpProblem::new();
        let x = p.add_continuous("x", 0.0, 5.0, 1.0);
        let y = p.add_continuous("y", 0.0, 5.0, 1.0);
        p.add_constraint("cap", vec![(x, 1.0), (y, 1.0)], Sense::Le, 4.0);
        let (mut lo, mut up) = bounds(&p);
        lo[x] = 3.0;
        up[x] = 3.0;
        let r = solve_relaxation(&p, &lo, &up, &deadline());
        assert_eq!(r.status, RelaxStatus::Optimal);
        assert!((r.values[x] - 3.0).abs() < 1e-9);
        assert!((r.values[y] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn bounds_are_honoured_without_rows() {
        // max x + y  s.t.  x - y <= 0  with x ∈ [0, 2], y ∈ [1, 1.5]
        let mut p = LpProblem::new();
        let x = p.add_continuous("x", 0.0, 2.0, 1.0);
        let y = p.add_continuous("y", 1.0, 1.5, 1.0);
        p.add_constraint("order", vec![(x, 1.0), (y, -1.0)], Sense::Le, 0.0);
        let (lo, up) = bounds(&p);
        let r = solve_relaxation(&p, &lo, &up, &deadline());
        assert_eq!(r.status, RelaxStatus::Optimal);
        assert!((r.values[x] - 1.5).abs() < 1e-6);
        assert!((r.values[y] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn tightened_bounds_resume_from_the_previous_basis() {
        // Assignment of two accounts to two reps, re-solved after a fix.
        let mut p = LpProblem::new();
        let x00 = p.add_continuous("x00", 0.0, 1.0, 3.0);
        let x01 = p.add_continuous("x01", 0.0, 1.0, 1.0);
        let x10 = p.add_continuous("x10", 0.0, 1.0, 2.0);
        let x11 = p.add_continuous("x11", 0.0, 1.0, 1.0);
        p.add_constraint("one_0", vec![(x00, 1.0), (x01, 1.0)], Sense::Eq, 1.0);
        p.add_constraint("one_1", vec![(x10, 1.0), (x11, 1.0)], Sense::Eq, 1.0);
        p.add_constraint("cap_0", vec![(x00, 1.0), (x10, 1.0)], Sense::Le, 1.0);

        let mut lp = Simplex::new(&p).expect("valid problem");
        let (mut lo, mut up) = bounds(&p);
        assert_eq!(lp.solve(&deadline()), RelaxStatus::Optimal);
        let first = lp.values();
        assert!((p.objective_value(&first) - 4.0).abs() < 1e-6);

        up[x00] = 0.0;
        lp.set_bounds(&lo, &up);
        assert_eq!(lp.solve(&deadline()), RelaxStatus::Optimal);
        let second = lp.values();
        assert!((second[x10] - 1.0).abs() < 1e-6);
        assert!((second[x01] - 1.0).abs() < 1e-6);
        assert!((p.objective_value(&second) - 3.0).abs() < 1e-6);

        lo[x10] = 1.0;
        lo[x11] = 1.0;
        lp.set_bounds(&lo, &up);
        assert_eq!(lp.solve(&deadline()), RelaxStatus::Infeasible);
    }
}
