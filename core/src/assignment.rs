//! Run output: the assignment set plus its metrics and telemetry.
//!
//! A run's output is produced whole at the end of the run. Consumers never
//! see a partial set; the store replaces a scenario's prior set with it in
//! one transaction.

use crate::{
    config::EngineKind,
    event::RunWarning,
    metrics::RunMetrics,
    scoring::ScoreBreakdown,
    solver::SolveStatus,
    strategy::{AssignmentRule, StageReport},
    types::{AccountId, RepId, RunId, ScenarioId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub account_id: AccountId,
    pub rep_id: RepId,
    pub rule: AssignmentRule,
    pub rationale: String,
    pub scores: ScoreBreakdown,
    pub over_capacity: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTelemetry {
    pub engine: EngineKind,
    pub solver: String,
    pub accounts: usize,
    pub families: usize,
    pub reps: usize,
    pub locked_families: usize,
    pub strategic_families: usize,
    pub variables: usize,
    pub constraints: usize,
    pub stages: Vec<StageReport>,
    pub solver_status: Option<SolveStatus>,
    pub solve_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRun {
    pub run_id: RunId,
    pub scenario_id: ScenarioId,
    pub engine: EngineKind,
    pub generated_at: DateTime<Utc>,
    /// Sorted by account id; one entry per in-scope account.
    pub assignments: Vec<Assignment>,
    pub metrics: RunMetrics,
    pub telemetry: RunTelemetry,
    pub warnings: Vec<RunWarning>,
}

impl AssignmentRun {
    pub fn assignment(&self, account_id: &str) -> Option<&Assignment> {
        self.assignments
            .binary_search_by(|a| a.account_id.as_str().cmp(account_id))
            .ok()
            .map(|i| &self.assignments[i])
    }

    pub fn rep_of(&self, account_id: &str) -> Option<&str> {
        self.assignment(account_id).map(|a| a.rep_id.as_str())
    }

    pub fn warning_count(&self, kind: &str) -> usize {
        self.warnings.iter().filter(|w| w.kind() == kind).count()
    }

    pub fn over_capacity(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(|a| a.over_capacity)
    }
}
