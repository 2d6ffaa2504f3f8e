//! LP/MIP solver boundary.
//!
//! The engines emit a standard problem (variables with bounds, objective
//! coefficients, a sparse constraint matrix) and consume a solution vector
//! plus status. Any `LpSolver` can sit behind this boundary; the crate
//! ships `BranchAndBound`, a depth-first MIP search over a bounded
//! revised simplex.
//!
//! RULE: `solve` never panics and never returns `Err`. Every failure mode
//! is a `SolveStatus`, with the best incumbent attached when one exists.

mod branch_bound;
mod presolve;
mod simplex;

pub use branch_bound::BranchAndBound;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type VarId = usize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub lower: f64,
    /// `f64::INFINITY` for unbounded above.
    pub upper: f64,
    pub integer: bool,
    pub objective: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub coefficients: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

/// A maximisation problem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LpProblem {
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
}

impl LpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binary(&mut self, name: impl Into<String>, objective: f64) -> VarId {
        self.add_variable(Variable {
            name: name.into(),
            lower: 0.0,
            upper: 1.0,
            integer: true,
            objective,
        })
    }

    pub fn add_continuous(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: f64,
        objective: f64,
    ) -> VarId {
        self.add_variable(Variable {
            name: name.into(),
            lower,
            upper,
            integer: false,
            objective,
        })
    }

    pub fn add_variable(&mut self, var: Variable) -> VarId {
        self.variables.push(var);
        self.variables.len() - 1
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        coefficients: Vec<(VarId, f64)>,
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(Constraint {
            name: name.into(),
            coefficients,
            sense,
            rhs,
        });
    }

    pub fn num_integer(&self) -> usize {
        self.variables.iter().filter(|v| v.integer).count()
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }

    /// Check a candidate solution against bounds, integrality and rows.
    /// Row slack is measured against `tol` times the row's largest
    /// magnitude (coefficient or right-hand side, at least 1).
    pub fn is_feasible(&self, values: &[f64], tol: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let bounds_ok = self.variables.iter().zip(values).all(|(v, &x)| {
            x >= v.lower - tol
                && x <= v.upper + tol
                && (!v.integer || (x - x.round()).abs() <= tol)
        });
        bounds_ok
            && self.constraints.iter().all(|c| {
                if c.coefficients.iter().any(|&(j, _)| j >= values.len()) {
                    return false;
                }
                let lhs: f64 = c.coefficients.iter().map(|&(j, a)| a * values[j]).sum();
                let scale = c
                    .coefficients
                    .iter()
                    .fold(c.rhs.abs().max(1.0), |m, &(_, a)| m.max(a.abs()));
                let tol = tol * scale;
                match c.sense {
                    Sense::Le => lhs <= c.rhs + tol,
                    Sense::Ge => lhs >= c.rhs - tol,
                    Sense::Eq => (lhs - c.rhs).abs() <= tol,
                }
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    /// Stopped early (node limit) with a feasible incumbent.
    Feasible,
    Infeasible,
    /// Deadline or cancellation; `values` holds the incumbent if any.
    TimedOut,
    Error,
}

impl SolveStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SolveStatus::Optimal    => "optimal",
            SolveStatus::Feasible   => "feasible",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::TimedOut   => "timed_out",
            SolveStatus::Error      => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub status: SolveStatus,
    pub values: Option<Vec<f64>>,
    pub objective: Option<f64>,
    pub nodes: usize,
    pub elapsed_ms: u64,
    pub detail: String,
}

impl Solution {
    pub fn has_values(&self) -> bool {
        self.values.is_some()
    }
}

/// Shared cancellation flag. Clone it into whoever may need to stop a solve.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct SolveLimits {
    pub timeout: Duration,
    pub node_limit: usize,
    pub cancel: CancelToken,
}

impl SolveLimits {
    pub fn new(timeout: Duration, node_limit: usize, cancel: CancelToken) -> Self {
        Self { timeout, node_limit, cancel }
    }

    pub(crate) fn deadline(&self) -> Deadline {
        Deadline {
            at: Instant::now().checked_add(self.timeout),
            cancel: self.cancel.clone(),
        }
    }
}

impl Default for SolveLimits {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 5_000, CancelToken::new())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Deadline {
    /// `None` when the timeout reaches past what `Instant` can hold.
    at: Option<Instant>,
    cancel: CancelToken,
}

impl Deadline {
    pub(crate) fn expired(&self) -> bool {
        self.cancel.is_cancelled() || self.at.is_some_and(|at| Instant::now() >= at)
    }
}

/// The pluggable solver boundary.
pub trait LpSolver: Send + Sync {
    /// Unique stable name for telemetry.
    fn name(&self) -> &'static str;

    /// Maximise `problem` within `limits`.
    fn solve(&self, problem: &LpProblem, limits: &SolveLimits) -> Solution;

    /// `solve`, seeded with a known point. Only the integer entries of
    /// `start` are read; the continuous rest is re-optimised around them.
    /// A start that breaks a row is dropped. Solvers without warm starts
    /// may ignore it.
    fn solve_with_start(&self, problem: &LpProblem, limits: &SolveLimits, start: &[f64]) -> Solution {
        let _ = start;
        self.solve(problem, limits)
    }
}
