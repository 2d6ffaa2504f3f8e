//! Piecewise-linear balance penalty, shared by the relaxed model and the
//! waterfall balance stage.
//!
//! A rep's relative deviation from target on one dimension is spread over
//! segments of growing slope. The slopes are secants of x², so the penalty
//! tracks squared relative deviation and grows smoothly, not in steps.

use crate::solver::{LpProblem, Sense, VarId};

/// (width, slope) of each deviation segment, in relative-deviation units.
/// Breakpoints 0, .05, .10, .20, .40; slope of [a, b] is the secant of x², a + b.
pub const SEGMENTS: [(f64, f64); 5] = [
    (0.05, 0.05),
    (0.05, 0.15),
    (0.10, 0.30),
    (0.20, 0.60),
    (f64::INFINITY, 1.20),
];

/// Steepest slope; no unit of load moves the penalty by more than this.
pub const MAX_SLOPE: f64 = 1.20;

/// Penalty per unit weight of a relative deviation `rel` = load/target − 1.
pub fn deviation_cost(rel: f64) -> f64 {
    let mut left = rel.abs();
    let mut cost = 0.0;
    for (width, slope) in SEGMENTS {
        if left <= 0.0 {
            break;
        }
        let step = left.min(width);
        cost += step * slope;
        left -= step;
    }
    cost
}

/// Add one balance row for a rep and dimension:
///
///   Σ terms − Σ over + Σ under = 1 − base
///
/// `terms` load the rep in target units (value / target), `base` is load
/// already fixed elsewhere in the same units. Every segment variable costs
/// `weight · slope` per unit. Under-target segments stop at a full unit,
/// the largest shortfall a non-negative load can have.
pub fn add_deviation_row(
    problem: &mut LpProblem,
    name: &str,
    mut terms: Vec<(VarId, f64)>,
    base: f64,
    weight: f64,
) {
    let mut under_room = 1.0;
    for (k, &(width, slope)) in SEGMENTS.iter().enumerate() {
        let coef = -weight * slope;
        let over = problem.add_continuous(format!("over_{name}_{k}"), 0.0, width, coef);
        terms.push((over, -1.0));
        let under_width = width.min(under_room);
        under_room -= under_width;
        if under_width > 0.0 {
            let under = problem.add_continuous(format!("under_{name}_{k}"), 0.0, under_width, coef);
            terms.push((under, 1.0));
        }
    }
    problem.add_constraint(format!("dev_{name}"), terms, Sense::Eq, 1.0 - base);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{BranchAndBound, LpSolver, SolveLimits, SolveStatus};

    #[test]
    fn cost_matches_the_square_at_every_breakpoint() {
        for rel in [0.0, 0.05, 0.10, 0.20, 0.40] {
            assert!((deviation_cost(rel) - rel * rel).abs() < 1e-12, "at {rel}");
            assert!((deviation_cost(-rel) - rel * rel).abs() < 1e-12, "at -{rel}");
        }
        // Past the last breakpoint the penalty goes on linearly.
        assert!((deviation_cost(0.5) - (0.16 + 0.1 * MAX_SLOPE)).abs() < 1e-12);
    }

    #[test]
    fn solved_row_prices_the_deviation() {
        // One rep must take a fixed 0.7 of its target: 30% under.
        let mut p = LpProblem::new();
        let load = p.add_continuous("load", 0.7, 0.7, 0.0);
        add_deviation_row(&mut p, "r1_arr", vec![(load, 1.0)], 0.0, 2.0);

        let sol = BranchAndBound::default().solve(&p, &SolveLimits::default());
        assert_eq!(sol.status, SolveStatus::Optimal);
        let objective = sol.objective.unwrap_or_default();
        assert!((objective + 2.0 * deviation_cost(-0.3)).abs() < 1e-9, "objective {objective}");
    }
}
