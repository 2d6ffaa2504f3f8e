//! Presolve: fold columns tied to one other column by an equality row.
//!
//! A continuous column y that appears only in a row a·y + b·x = c is
//! dropped along with that row and rebuilt afterwards as y = (c − b·x)/a.
//! Its objective moves onto x. The fold is only taken when y stays inside
//! its own bounds for every x inside x's bounds, so the reduced problem
//! has exactly the feasible set and objective of the original.

use super::{Constraint, LpProblem, Sense, VarId, Variable};

const BOUND_TOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
enum Origin {
    Kept(VarId),
    /// `shift + scale · x[of]`, with `of` a kept original column.
    Folded { of: VarId, scale: f64, shift: f64 },
}

#[derive(Debug, Clone)]
pub(crate) struct Presolved {
    pub problem: LpProblem,
    /// Objective of the original minus that of the reduced problem.
    pub offset: f64,
    origin: Vec<Origin>,
    /// Original column of each reduced column.
    kept: Vec<VarId>,
}

impl Presolved {
    pub(crate) fn new(problem: &LpProblem) -> Self {
        let n = problem.variables.len();
        let mut count = vec![0usize; n];
        for con in &problem.constraints {
            for &(j, a) in &con.coefficients {
                if j >= n || !a.is_finite() {
                    // Malformed; leave it for the simplex to reject.
                    return Self::identity(problem);
                }
                if a != 0.0 {
                    count[j] += 1;
                }
            }
        }

        let mut folded: Vec<Option<Origin>> = vec![None; n];
        let mut anchored = vec![false; n];
        let mut dropped = vec![false; problem.constraints.len()];
        let mut objective: Vec<f64> = problem.variables.iter().map(|v| v.objective).collect();
        let mut offset = 0.0;

        for (i, con) in problem.constraints.iter().enumerate() {
            if con.sense != Sense::Eq || con.coefficients.len() != 2 || !con.rhs.is_finite() {
                continue;
            }
            let (j0, a0) = con.coefficients[0];
            let (j1, a1) = con.coefficients[1];
            if j0 == j1 || a0 == 0.0 || a1 == 0.0 {
                continue;
            }
            for (y, ay, x, ax) in [(j0, a0, j1, a1), (j1, a1, j0, a0)] {
                let (vy, vx) = (&problem.variables[y], &problem.variables[x]);
                if vy.integer
                    || count[y] != 1
                    || anchored[y]
                    || folded[y].is_some()
                    || folded[x].is_some()
                    || !vx.lower.is_finite()
                    || !vx.upper.is_finite()
                {
                    continue;
                }
                let scale = -ax / ay;
                let shift = con.rhs / ay;
                let inside = |xv: f64| {
                    let yv = shift + scale * xv;
                    yv >= vy.lower - BOUND_TOL && yv <= vy.upper + BOUND_TOL
                };
                if !inside(vx.lower) || !inside(vx.upper) {
                    continue;
                }
                objective[x] += objective[y] * scale;
                offset += objective[y] * shift;
                folded[y] = Some(Origin::Folded { of: x, scale, shift });
                anchored[x] = true;
                dropped[i] = true;
                break;
            }
        }

        let mut origin = Vec::with_capacity(n);
        let mut kept = Vec::new();
        let mut reduced = LpProblem::new();
        for (j, var) in problem.variables.iter().enumerate() {
            match folded[j] {
                Some(o) => origin.push(o),
                None => {
                    origin.push(Origin::Kept(kept.len()));
                    kept.push(j);
                    reduced.add_variable(Variable { objective: objective[j], ..var.clone() });
                }
            }
        }
        for (i, con) in problem.constraints.iter().enumerate() {
            if dropped[i] {
                continue;
            }
            let coefficients = con
                .coefficients
                .iter()
                .filter_map(|&(j, a)| match origin[j] {
                    Origin::Kept(k) => Some((k, a)),
                    Origin::Folded { .. } => None,
                })
                .collect();
            reduced.constraints.push(Constraint { coefficients, ..con.clone() });
        }

        let presolved = Self { problem: reduced, offset, origin, kept };
        if presolved.folded() > 0 {
            log::debug!(
                "presolve: folded {} columns, {} rows remain",
                presolved.folded(),
                presolved.problem.constraints.len(),
            );
        }
        presolved
    }

    fn identity(problem: &LpProblem) -> Self {
        let n = problem.variables.len();
        Self {
            problem: problem.clone(),
            offset: 0.0,
            origin: (0..n).map(Origin::Kept).collect(),
            kept: (0..n).collect(),
        }
    }

    pub(crate) fn folded(&self) -> usize {
        self.origin.len() - self.kept.len()
    }

    /// Project a full-length point onto the reduced columns.
    pub(crate) fn reduce(&self, full: &[f64]) -> Vec<f64> {
        self.kept.iter().map(|&j| full.get(j).copied().unwrap_or(0.0)).collect()
    }

    /// Rebuild a full-length point from a reduced one.
    pub(crate) fn restore(&self, reduced: &[f64]) -> Vec<f64> {
        let mut full = vec![0.0; self.origin.len()];
        for (j, o) in self.origin.iter().enumerate() {
            if let Origin::Kept(k) = *o {
                full[j] = reduced[k];
            }
        }
        for (j, o) in self.origin.iter().enumerate() {
            if let Origin::Folded { of, scale, shift } = *o {
                full[j] = shift + scale * full[of];
            }
        }
        full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linked_follower_folds_into_its_head() {
        let mut p = LpProblem::new();
        let x = p.add_binary("x", 2.0);
        let y = p.add_continuous("y", 0.0, 1.0, 0.5);
        p.add_constraint("one", vec![(x, 1.0)], Sense::Le, 1.0);
        p.add_constraint("link", vec![(y, 1.0), (x, -1.0)], Sense::Eq, 0.0);

        let pre = Presolved::new(&p);
        assert_eq!(pre.folded(), 1);
        assert_eq!(pre.problem.variables.len(), 1);
        assert_eq!(pre.problem.constraints.len(), 1);
        assert!((pre.problem.variables[0].objective - 2.5).abs() < 1e-12);

        let full = pre.restore(&[1.0]);
        assert_eq!(full, vec![1.0, 1.0]);
        assert!(p.is_feasible(&full, 1e-9));
        assert_eq!(pre.reduce(&full), vec![1.0]);
    }

    #[test]
    fn fold_that_could_leave_bounds_is_skipped() {
        // y = 2x with y ≤ 1 and x ∈ [0, 1] would push y out of range.
        let mut p = LpProblem::new();
        let x = p.add_binary("x", 1.0);
        let y = p.add_continuous("y", 0.0, 1.0, 1.0);
        p.add_constraint("double", vec![(y, 1.0), (x, -2.0)], Sense::Eq, 0.0);

        let pre = Presolved::new(&p);
        assert_eq!(pre.folded(), 0);
        assert_eq!(pre.problem, p);
    }

    #[test]
    fn column_in_several_rows_is_kept() {
        let mut p = LpProblem::new();
        let x = p.add_binary("x", 1.0);
        let y = p.add_continuous("y", 0.0, 1.0, 1.0);
        p.add_constraint("link", vec![(y, 1.0), (x, -1.0)], Sense::Eq, 0.0);
        p.add_constraint("cap", vec![(y, 1.0)], Sense::Le, 1.0);

        let pre = Presolved::new(&p);
        assert_eq!(pre.folded(), 0);
        assert_eq!(pre.problem, p);
    }
}
