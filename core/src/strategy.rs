//! Assignment strategy trait and the shared run context.
//!
//! RULE: Every engine implements AssignmentStrategy.
//! Engines read the same precomputed scores, thresholds, locks and
//! eligibility from `RunContext`; none of them re-derives a score or a
//! threshold. An engine returns family-level placements only; expanding
//! followers, validation, rationale and metrics happen in engine.rs.

use crate::{
    config::{AssignmentConfig, EngineKind, MAX_TIMEOUT_SECS},
    eligibility::{Eligibility, Pool},
    error::AssignResult,
    event::WarningLog,
    model::Book,
    scoring::ScoreMatrix,
    solver::{CancelToken, LpSolver, SolveLimits, SolveStatus},
    stability::{LockReason, LockSet, StabilityLock},
    thresholds::{BalanceThresholds, Dimension, DimensionVector},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relative slack before a load counts as over a capacity bound.
pub const CAPACITY_TOL: f64 = 1e-6;

// ── Rules and stages ─────────────────────────────────────────────────────────

/// The rule that decided an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentRule {
    Holdover { reason: LockReason },
    Strategic,
    ContinuityGeography,
    Geography,
    Continuity,
    Balance,
    Residual,
    Relaxed,
    FollowsParent,
}

impl AssignmentRule {
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentRule::Holdover { .. }      => "holdover",
            AssignmentRule::Strategic            => "strategic",
            AssignmentRule::ContinuityGeography  => "continuity_geography",
            AssignmentRule::Geography            => "geography",
            AssignmentRule::Continuity           => "continuity",
            AssignmentRule::Balance              => "balance",
            AssignmentRule::Residual             => "residual",
            AssignmentRule::Relaxed              => "relaxed",
            AssignmentRule::FollowsParent        => "follows_parent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Holdover,
    ContinuityGeography,
    Geography,
    Continuity,
    Balance,
    Residual,
    Global,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Holdover            => "p0_holdover",
            Stage::ContinuityGeography => "p1_continuity_geography",
            Stage::Geography           => "p2_geography",
            Stage::Continuity          => "p3_continuity",
            Stage::Balance             => "p4_balance",
            Stage::Residual            => "residual",
            Stage::Global              => "relaxed_global",
        }
    }
}

/// One family placed on one rep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Position in `book.families`.
    pub family: usize,
    pub rep: usize,
    pub rule: AssignmentRule,
    pub over_capacity: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    /// Families still unassigned when the stage started.
    pub candidates: usize,
    pub variables: usize,
    pub constraints: usize,
    pub assigned: usize,
    pub status: Option<SolveStatus>,
    pub elapsed_ms: u64,
}

impl StageReport {
    pub fn new(stage: Stage, candidates: usize) -> Self {
        Self {
            stage,
            candidates,
            variables: 0,
            constraints: 0,
            assigned: 0,
            status: None,
            elapsed_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrategyOutcome {
    pub placements: Vec<Placement>,
    pub stages: Vec<StageReport>,
    /// Status of the main solve (relaxed) or the worst stage solve (waterfall).
    pub solver_status: Option<SolveStatus>,
    pub variables: usize,
    pub constraints: usize,
    pub solve_ms: u64,
}

// ── Run context ──────────────────────────────────────────────────────────────

/// Everything an engine may read. Immutable for the whole run.
pub struct RunContext<'a> {
    pub book: &'a Book,
    pub config: &'a AssignmentConfig,
    pub scores: &'a ScoreMatrix,
    pub locks: &'a LockSet,
    pub eligibility: &'a Eligibility,
    /// Per family position.
    pub values: &'a [DimensionVector],
    pub general: &'a BalanceThresholds,
    pub strategic: Option<&'a BalanceThresholds>,
    pub capacity_dims: Vec<Dimension>,
    pub solver: &'a dyn LpSolver,
    pub cancel: CancelToken,
}

impl<'a> RunContext<'a> {
    pub fn thresholds(&self, pool: Pool) -> &BalanceThresholds {
        match (pool, self.strategic) {
            (Pool::Strategic, Some(t)) => t,
            _ => self.general,
        }
    }

    pub fn rep_thresholds(&self, rep: usize) -> &BalanceThresholds {
        self.thresholds(self.eligibility.rep_pool(self.book, rep))
    }

    /// Max bound of `rep` on `dim`.
    pub fn capacity(&self, rep: usize, dim: Dimension) -> f64 {
        self.rep_thresholds(rep).capacity(dim, &self.config.balance)
    }

    /// True when `load` breaks any capacity bound of `rep`.
    pub fn exceeds_capacity(&self, rep: usize, load: &DimensionVector) -> bool {
        self.capacity_dims.iter().any(|&d| {
            let cap = self.capacity(rep, d);
            load[d] > cap + CAPACITY_TOL * cap.abs().max(1.0)
        })
    }

    pub fn family_score(&self, family: usize, rep: usize) -> f64 {
        self.scores
            .family_weighted(self.book.families[family].members(), rep)
    }

    pub fn lock_for(&self, family: usize) -> Option<&StabilityLock> {
        self.locks.get(self.book.families[family].head)
    }

    pub fn owner_of(&self, family: usize) -> Option<usize> {
        self.book.owner_idx(self.book.families[family].head)
    }

    pub fn solve_limits(&self, timeout_secs: f64) -> SolveLimits {
        let timeout = Duration::try_from_secs_f64(timeout_secs.min(MAX_TIMEOUT_SECS))
            .unwrap_or_else(|_| SolveLimits::default().timeout);
        SolveLimits::new(
            timeout,
            self.config.solver.node_limit,
            self.cancel.clone(),
        )
    }
}

/// The contract every assignment engine fulfills.
pub trait AssignmentStrategy: Send + Sync {
    /// Unique stable name for telemetry.
    fn name(&self) -> &'static str;

    fn kind(&self) -> EngineKind;

    /// Place every in-scope family exactly once.
    fn assign(&self, ctx: &RunContext<'_>, warnings: &mut WarningLog)
        -> AssignResult<StrategyOutcome>;
}
