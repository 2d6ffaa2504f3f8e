//! Depth-first branch-and-bound over the bounded simplex.
//!
//! ORDER OF WORK:
//!   1. Presolve folds equality-tied follower columns away.
//!   2. A caller's start is completed into the first incumbent: its
//!      integer values are fixed and the continuous rest re-solved.
//!   3. The root relaxation is dived once: every integral column is fixed
//!      and the least fractional one rounded, until integral or stuck.
//!   4. Depth-first search, "round up" child first, branching on the most
//!      fractional column (lowest index on ties).
//!
//! RULES:
//!   - One simplex lives for the whole search. A node only moves bounds
//!     and resumes from the previous basis with the dual simplex.
//!   - A node whose parent bound cannot beat the incumbent is dropped
//!     unsolved.
//!   - Stopping at the node limit is deterministic. Stopping at the
//!     deadline is not; runs only repeat exactly when the node limit or
//!     a proof of optimality comes first.

use super::{
    presolve::Presolved,
    simplex::{RelaxStatus, Simplex, FEAS_TOL},
    Deadline, LpProblem, LpSolver, Solution, SolveLimits, SolveStatus,
};
use std::time::Instant;

const INT_TOL: f64 = 1e-6;
const PRUNE_TOL: f64 = 1e-9;
/// Row tolerance an incumbent must meet, relative to the row's scale.
const ACCEPT_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
pub struct BranchAndBound {
    /// Nodes that cannot beat the incumbent by more than this fraction
    /// are pruned. Zero proves strict optimality.
    pub relative_gap: f64,
}

impl BranchAndBound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gap(relative_gap: f64) -> Self {
        Self { relative_gap: relative_gap.max(0.0) }
    }
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self { relative_gap: 1e-4 }
    }
}

struct Node {
    /// (column, lower, upper) tightenings relative to the root.
    fixes: Vec<(usize, f64, f64)>,
    /// Relaxation objective of the parent.
    bound: f64,
}

enum Stop {
    Exhausted,
    NodeLimit,
    Interrupted,
    Failed(String),
}

enum Relaxed {
    Solved(Vec<f64>, f64),
    Infeasible,
    Stop(Stop),
}

struct Search<'a> {
    problem: &'a LpProblem,
    /// Added to every reduced objective to report the original one.
    offset: f64,
    lp: Simplex,
    integers: Vec<usize>,
    root_lower: Vec<f64>,
    root_upper: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    deadline: Deadline,
    gap: f64,
    incumbent: Option<(Vec<f64>, f64)>,
    /// A node was dropped without a proof.
    unproven: bool,
    nodes: usize,
}

impl<'a> Search<'a> {
    fn new(problem: &'a LpProblem, offset: f64, lp: Simplex, deadline: Deadline, gap: f64) -> Self {
        let mut root_lower = Vec::with_capacity(problem.variables.len());
        let mut root_upper = Vec::with_capacity(problem.variables.len());
        for var in &problem.variables {
            if var.integer {
                root_lower.push((var.lower - INT_TOL).ceil());
                root_upper.push((var.upper + INT_TOL).floor());
            } else {
                root_lower.push(var.lower);
                root_upper.push(var.upper);
            }
        }
        let integers = (0..problem.variables.len()).filter(|&j| problem.variables[j].integer).collect();
        Self {
            problem,
            offset,
            lp,
            integers,
            lower: root_lower.clone(),
            upper: root_upper.clone(),
            root_lower,
            root_upper,
            deadline,
            gap,
            incumbent: None,
            unproven: false,
            nodes: 0,
        }
    }

    fn relax(&mut self) -> Relaxed {
        self.lp.set_bounds(&self.lower, &self.upper);
        match self.lp.solve(&self.deadline) {
            RelaxStatus::Optimal => {
                let values = self.lp.values();
                let objective = self.problem.objective_value(&values) + self.offset;
                Relaxed::Solved(values, objective)
            }
            RelaxStatus::Infeasible => Relaxed::Infeasible,
            RelaxStatus::Stalled => {
                self.unproven = true;
                Relaxed::Infeasible
            }
            RelaxStatus::Interrupted => Relaxed::Stop(Stop::Interrupted),
            RelaxStatus::Unbounded => Relaxed::Stop(Stop::Failed("relaxation is unbounded".into())),
            RelaxStatus::Invalid => Relaxed::Stop(Stop::Failed("malformed problem".into())),
        }
    }

    fn set_node(&mut self, fixes: &[(usize, f64, f64)]) {
        self.lower.copy_from_slice(&self.root_lower);
        self.upper.copy_from_slice(&self.root_upper);
        for &(j, lo, up) in fixes {
            self.lower[j] = lo;
            self.upper[j] = up;
        }
    }

    fn beats_incumbent(&self, bound: f64) -> bool {
        match &self.incumbent {
            None => true,
            Some((_, best)) => bound > best + PRUNE_TOL.max(self.gap * best.abs()),
        }
    }

    fn most_fractional(&self, values: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for &j in &self.integers {
            let dist = (values[j] - values[j].round()).abs();
            if dist > INT_TOL && best.map_or(true, |(_, d)| dist > d + PRUNE_TOL) {
                best = Some((j, dist));
            }
        }
        best.map(|(j, _)| j)
    }

    /// Fix every integer column at `point` (rounded) and re-solve the
    /// continuous rest, then keep the result if it beats the incumbent.
    fn complete(&mut self, point: &[f64], source: &str) {
        let mut lower = self.root_lower.clone();
        let mut upper = self.root_upper.clone();
        for &j in &self.integers {
            let v = point[j].round().max(lower[j]).min(upper[j]);
            lower[j] = v;
            upper[j] = v;
        }
        self.lp.set_bounds(&lower, &upper);
        if self.lp.solve(&self.deadline) != RelaxStatus::Optimal {
            return;
        }
        let mut values = self.lp.values();
        for &j in &self.integers {
            values[j] = lower[j];
        }
        if !self.problem.is_feasible(&values, ACCEPT_TOL) {
            log::debug!("b&b: {source} point fails the row check");
            return;
        }
        let objective = self.problem.objective_value(&values) + self.offset;
        let better = self
            .incumbent
            .as_ref()
            .map_or(true, |(_, best)| objective > best + PRUNE_TOL);
        if better {
            log::debug!("b&b: {source} incumbent {objective:.6} at node {}", self.nodes);
            self.incumbent = Some((values, objective));
        }
    }

    /// Fix every integral column, round the least fractional one, re-solve;
    /// repeat until integral, infeasible or no longer promising.
    fn dive(&mut self, fixes: &[(usize, f64, f64)], values: &[f64]) -> Option<Stop> {
        self.set_node(fixes);
        let mut values = values.to_vec();
        loop {
            let mut round: Option<(usize, f64)> = None;
            for i in 0..self.integers.len() {
                let j = self.integers[i];
                let nearest = values[j].round();
                let dist = (values[j] - nearest).abs();
                if dist <= INT_TOL {
                    self.lower[j] = nearest;
                    self.upper[j] = nearest;
                } else if round.map_or(true, |(_, d)| dist < d) {
                    round = Some((j, dist));
                }
            }
            let Some((j, _)) = round else {
                self.complete(&values, "dive");
                return None;
            };
            let nearest = values[j].round();
            self.lower[j] = nearest;
            self.upper[j] = nearest;
            match self.relax() {
                Relaxed::Solved(next, objective) => {
                    if !self.beats_incumbent(objective) {
                        return None;
                    }
                    values = next;
                }
                Relaxed::Infeasible => return None,
                Relaxed::Stop(stop) => return Some(stop),
            }
        }
    }

    fn bounds_at(&self, fixes: &[(usize, f64, f64)], j: usize) -> (f64, f64) {
        fixes
            .iter()
            .rev()
            .find(|&&(k, _, _)| k == j)
            .map_or((self.root_lower[j], self.root_upper[j]), |&(_, lo, up)| (lo, up))
    }

    fn run(&mut self, node_limit: usize) -> Stop {
        let mut stack = vec![Node { fixes: Vec::new(), bound: f64::INFINITY }];
        let mut dived = false;
        loop {
            let Some(node) = stack.pop() else {
                return Stop::Exhausted;
            };
            if !self.beats_incumbent(node.bound) {
                continue;
            }
            if self.deadline.expired() {
                return Stop::Interrupted;
            }
            if self.nodes >= node_limit {
                return Stop::NodeLimit;
            }
            self.nodes += 1;

            self.set_node(&node.fixes);
            let (values, objective) = match self.relax() {
                Relaxed::Solved(values, objective) => (values, objective),
                Relaxed::Infeasible => continue,
                Relaxed::Stop(stop) => return stop,
            };
            if !self.beats_incumbent(objective) {
                continue;
            }

            let Some(j) = self.most_fractional(&values) else {
                self.complete(&values, "node");
                continue;
            };
            if !dived {
                dived = true;
                if let Some(stop) = self.dive(&node.fixes, &values) {
                    return stop;
                }
                if !self.beats_incumbent(objective) {
                    continue;
                }
            }

            let (lo, up) = self.bounds_at(&node.fixes, j);
            let x = values[j];
            let mut down = node.fixes.clone();
            down.push((j, lo, x.floor()));
            let mut up_fixes = node.fixes;
            up_fixes.push((j, x.ceil(), up));
            stack.push(Node { fixes: down, bound: objective });
            stack.push(Node { fixes: up_fixes, bound: objective });
        }
    }
}

impl LpSolver for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch_and_bound"
    }

    fn solve(&self, problem: &LpProblem, limits: &SolveLimits) -> Solution {
        self.search(problem, limits, None)
    }

    fn solve_with_start(&self, problem: &LpProblem, limits: &SolveLimits, start: &[f64]) -> Solution {
        self.search(problem, limits, Some(start))
    }
}

impl BranchAndBound {
    fn search(&self, problem: &LpProblem, limits: &SolveLimits, start: Option<&[f64]>) -> Solution {
        let started = Instant::now();
        let presolved = Presolved::new(problem);
        let lp = match Simplex::new(&presolved.problem) {
            Ok(lp) => lp,
            Err(_) => {
                return Solution {
                    status: SolveStatus::Error,
                    values: None,
                    objective: None,
                    nodes: 0,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    detail: "malformed problem".to_string(),
                }
            }
        };
        let mut search = Search::new(&presolved.problem, presolved.offset, lp, limits.deadline(), self.relative_gap);

        if let Some(start) = start.filter(|s| s.len() == problem.variables.len()) {
            let reduced = presolved.reduce(start);
            search.complete(&reduced, "start");
            if search.incumbent.is_none() {
                log::debug!("b&b: start point rejected");
            }
        }
        let stop = search.run(limits.node_limit);

        let nodes = search.nodes;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let has_incumbent = search.incumbent.is_some();
        let (status, detail) = match stop {
            Stop::Exhausted if search.unproven && has_incumbent => (
                SolveStatus::Feasible,
                "some relaxations stalled; optimality not proven".to_string(),
            ),
            Stop::Exhausted if search.unproven => (
                SolveStatus::Error,
                "relaxations stalled before any incumbent".to_string(),
            ),
            Stop::Exhausted if has_incumbent => (SolveStatus::Optimal, String::new()),
            Stop::Exhausted => (SolveStatus::Infeasible, "no integer-feasible point".to_string()),
            Stop::NodeLimit if has_incumbent => (
                SolveStatus::Feasible,
                format!("node limit {} reached", limits.node_limit),
            ),
            Stop::NodeLimit => (
                SolveStatus::TimedOut,
                format!("node limit {} reached without incumbent", limits.node_limit),
            ),
            Stop::Interrupted if limits.cancel.is_cancelled() => {
                (SolveStatus::TimedOut, "cancelled".to_string())
            }
            Stop::Interrupted => (
                SolveStatus::TimedOut,
                format!("deadline of {:?} reached", limits.timeout),
            ),
            Stop::Failed(why) => (SolveStatus::Error, why),
        };
        log::debug!(
            "b&b: {} after {nodes} nodes, {} pivots in {elapsed_ms}ms ({} vars, {} rows, {} folded)",
            status.label(),
            search.lp.pivots,
            presolved.problem.variables.len(),
            presolved.problem.constraints.len(),
            presolved.folded(),
        );

        let (values, objective) = match search.incumbent {
            Some((reduced, _)) if status != SolveStatus::Error => {
                let full = presolved.restore(&reduced);
                debug_assert!(problem.is_feasible(&full, FEAS_TOL * 100.0));
                let objective = problem.objective_value(&full);
                (Some(full), Some(objective))
            }
            _ => (None, None),
        };
        Solution { status, values, objective, nodes, elapsed_ms, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{CancelToken, Sense};
    use std::time::Duration;

    fn limits() -> SolveLimits {
        SolveLimits::new(Duration::from_secs(10), 10_000, CancelToken::new())
    }

    /// Accounts × reps assignment with a per-rep count cap.
    fn assignment(scores: &[Vec<f64>], cap: f64) -> (LpProblem, Vec<Vec<usize>>) {
        let mut p = LpProblem::new();
        let mut x = Vec::new();
        for (a, row) in scores.iter().enumerate() {
            let vars: Vec<_> = row
                .iter()
                .enumerate()
                .map(|(r, &s)| p.add_binary(format!("x_{a}_{r}"), s))
                .collect();
            p.add_constraint(format!("one_{a}"), vars.iter().map(|&v| (v, 1.0)).collect(), Sense::Eq, 1.0);
            x.push(vars);
        }
        for r in 0..scores.first().map_or(0, Vec::len) {
            p.add_constraint(format!("cap_{r}"), x.iter().map(|v| (v[r], 1.0)).collect(), Sense::Le, cap);
        }
        (p, x)
    }

    #[test]
    fn solves_knapsack() {
        // max 10a + 13b + 7c  s.t.  4a + 6b + 3c <= 9
        let mut p = LpProblem::new();
        let a = p.add_binary("a", 10.0);
        let b = p.add_binary("b", 13.0);
        let c = p.add_binary("c", 7.0);
        p.add_constraint("weight", vec![(a, 4.0), (b, 6.0), (c, 3.0)], Sense::Le, 9.0);

        let sol = BranchAndBound::with_gap(0.0).solve(&p, &limits());
        assert_eq!(sol.status, SolveStatus::Optimal);
        let x = sol.values.expect("values");
        assert_eq!((x[a], x[b], x[c]), (0.0, 1.0, 1.0));
        assert!((sol.objective.unwrap_or_default() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn solves_assignment_with_capacity() {
        // Three accounts, two reps; rep 0 is better for all but holds only one.
        let scores = [[0.9, 0.5], [0.8, 0.6], [0.7, 0.2]];
        let mut p = LpProblem::new();
        let mut x = Vec::new();
        for (a, row) in scores.iter().enumerate() {
            let vars: Vec<_> = row
                .iter()
                .enumerate()
                .map(|(r, &s)| p.add_binary(format!("x_{a}_{r}"), s))
                .collect();
            p.add_constraint(format!("one_{a}"), vars.iter().map(|&v| (v, 1.0)).collect(), Sense::Eq, 1.0);
            x.push(vars);
        }
        p.add_constraint("cap_0", x.iter().map(|v| (v[0], 1.0)).collect(), Sense::Le, 1.0);

        let sol = BranchAndBound::default().solve(&p, &limits());
        assert_eq!(sol.status, SolveStatus::Optimal);
        let v = sol.values.expect("values");
        // Best: account 2 keeps rep 0 (loses most elsewhere).
        assert_eq!(v[x[2][0]], 1.0);
        assert_eq!(v[x[0][1]], 1.0);
        assert_eq!(v[x[1][1]], 1.0);
    }

    #[test]
    fn linked_followers_come_back_after_presolve() {
        let mut p = LpProblem::new();
        let x0 = p.add_binary("x_head_r0", 1.0);
        let x1 = p.add_binary("x_head_r1", 0.5);
        p.add_constraint("one_head", vec![(x0, 1.0), (x1, 1.0)], Sense::Eq, 1.0);
        let y0 = p.add_continuous("y_child_r0", 0.0, 1.0, 0.0);
        let y1 = p.add_continuous("y_child_r1", 0.0, 1.0, 2.0);
        p.add_constraint("link_child_r0", vec![(y0, 1.0), (x0, -1.0)], Sense::Eq, 0.0);
        p.add_constraint("link_child_r1", vec![(y1, 1.0), (x1, -1.0)], Sense::Eq, 0.0);

        let sol = BranchAndBound::default().solve(&p, &limits());
        assert_eq!(sol.status, SolveStatus::Optimal);
        let v = sol.values.expect("values");
        assert_eq!(v, vec![0.0, 1.0, 0.0, 1.0]);
        assert!((sol.objective.unwrap_or_default() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn start_point_is_the_incumbent_when_search_is_cut_short() {
        let scores: Vec<Vec<f64>> = (0..6)
            .map(|a| (0..3).map(|r| ((a * 7 + r * 3) % 5) as f64 / 5.0).collect())
            .collect();
        let (p, x) = assignment(&scores, 2.0);
        let mut start = vec![0.0; p.variables.len()];
        for (a, vars) in x.iter().enumerate() {
            start[vars[a % 3]] = 1.0;
        }
        assert!(p.is_feasible(&start, 1e-9));

        // Zero nodes: nothing but the start can be returned.
        let cut = SolveLimits::new(Duration::from_secs(10), 0, CancelToken::new());
        let sol = BranchAndBound::default().solve_with_start(&p, &cut, &start);
        assert_eq!(sol.status, SolveStatus::Feasible);
        assert_eq!(sol.values.as_deref(), Some(start.as_slice()));

        let full = BranchAndBound::with_gap(0.0).solve_with_start(&p, &limits(), &start);
        assert_eq!(full.status, SolveStatus::Optimal);
        assert!(full.objective.unwrap_or_default() >= p.objective_value(&start) - 1e-9);
    }

    #[test]
    fn infeasible_start_is_ignored() {
        let (p, _) = assignment(&[vec![1.0, 0.5], vec![0.8, 0.4]], 1.0);
        let crowded = vec![1.0, 0.0, 1.0, 0.0];
        let sol = BranchAndBound::with_gap(0.0).solve_with_start(&p, &limits(), &crowded);
        assert_eq!(sol.status, SolveStatus::Optimal);
        let v = sol.values.expect("values");
        assert!(p.is_feasible(&v, 1e-9));
        assert!((sol.objective.unwrap_or_default() - 1.4).abs() < 1e-9);
    }

    #[test]
    fn larger_assignment_finishes_well_inside_the_node_limit() {
        let scores: Vec<Vec<f64>> = (0..60)
            .map(|a| (0..8).map(|r| ((a * 13 + r * 29) % 17) as f64 / 17.0).collect())
            .collect();
        let (p, _) = assignment(&scores, 8.0);
        let sol = BranchAndBound::default().solve(&p, &SolveLimits::new(Duration::from_secs(60), 500, CancelToken::new()));
        assert!(matches!(sol.status, SolveStatus::Optimal | SolveStatus::Feasible), "{:?}", sol.status);
        assert!(sol.nodes <= 500);
        assert!(p.is_feasible(sol.values.as_deref().unwrap_or_default(), 1e-9));
    }

    #[test]
    fn reports_integer_infeasibility() {
        let mut p = LpProblem::new();
        let a = p.add_binary("a", 1.0);
        let b = p.add_binary("b", 1.0);
        p.add_constraint("half", vec![(a, 2.0), (b, 2.0)], Sense::Eq, 1.0);
        let sol = BranchAndBound::default().solve(&p, &limits());
        assert_eq!(sol.status, SolveStatus::Infeasible);
        assert!(sol.values.is_none());
    }

    #[test]
    fn cancelled_token_stops_immediately() {
        let mut p = LpProblem::new();
        let a = p.add_binary("a", 1.0);
        p.add_constraint("cap", vec![(a, 1.0)], Sense::Le, 1.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let sol = BranchAndBound::default().solve(&p, &SolveLimits::new(Duration::from_secs(10), 100, cancel));
        assert_eq!(sol.status, SolveStatus::TimedOut);
        assert_eq!(sol.detail, "cancelled");
        assert!(sol.values.is_none());
    }
}
