//! Run warnings: every recovered defect surfaced by an assignment run.
//!
//! RULE: data and configuration defects never abort a run.
//! They are recovered locally and recorded here, so the caller gets a
//! complete assignment set together with the list of what was patched.

use crate::types::{AccountId, RepId};
use serde::{Deserialize, Serialize};

/// Every warning a run can raise.
/// Variants are added over time, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunWarning {
    // ── Data defects ───────────────────────────────
    OrphanedChild {
        account_id: AccountId,
        missing_parent_id: AccountId,
    },
    HierarchyCycle {
        account_id: AccountId,
    },
    UnknownOwner {
        account_id: AccountId,
        owner_id: RepId,
    },
    UnknownRegion {
        region: String,
    },
    UnknownTier {
        tier: String,
    },
    DuplicateRecord {
        id: String,
    },

    // ── Configuration defects ──────────────────────
    BackfillWithoutTarget {
        account_id: AccountId,
        source_rep_id: RepId,
    },
    LockTargetUnavailable {
        account_id: AccountId,
        rep_id: RepId,
    },
    LockConflictsWithStrategic {
        account_id: AccountId,
        rep_id: RepId,
    },
    WeightsRenormalized {
        original_sum: f64,
    },
    AllObjectivesDisabled,
    ConfigValueClamped {
        field: String,
        from: f64,
        to: f64,
    },
    StrategicPoolEmpty {
        strategic_accounts: usize,
    },

    // ── Solve outcomes ─────────────────────────────
    ForcedOverCapacity {
        account_id: AccountId,
        rep_id: RepId,
    },
    StageSolverFailed {
        stage: String,
        status: String,
        detail: String,
    },
    SolverTimedOut {
        elapsed_ms: u64,
        has_incumbent: bool,
    },
    SolverFallback {
        reason: String,
    },
}

impl RunWarning {
    /// Stable string name of the variant, used in logs and the store.
    pub fn kind(&self) -> &'static str {
        match self {
            RunWarning::OrphanedChild { .. }              => "orphaned_child",
            RunWarning::HierarchyCycle { .. }             => "hierarchy_cycle",
            RunWarning::UnknownOwner { .. }               => "unknown_owner",
            RunWarning::UnknownRegion { .. }              => "unknown_region",
            RunWarning::UnknownTier { .. }                => "unknown_tier",
            RunWarning::DuplicateRecord { .. }            => "duplicate_record",
            RunWarning::BackfillWithoutTarget { .. }      => "backfill_without_target",
            RunWarning::LockTargetUnavailable { .. }      => "lock_target_unavailable",
            RunWarning::LockConflictsWithStrategic { .. } => "lock_conflicts_with_strategic",
            RunWarning::WeightsRenormalized { .. }        => "weights_renormalized",
            RunWarning::AllObjectivesDisabled             => "all_objectives_disabled",
            RunWarning::ConfigValueClamped { .. }         => "config_value_clamped",
            RunWarning::StrategicPoolEmpty { .. }         => "strategic_pool_empty",
            RunWarning::ForcedOverCapacity { .. }         => "forced_over_capacity",
            RunWarning::StageSolverFailed { .. }          => "stage_solver_failed",
            RunWarning::SolverTimedOut { .. }             => "solver_timed_out",
            RunWarning::SolverFallback { .. }             => "solver_fallback",
        }
    }
}

/// Append-only warning collector. Logs each warning as it is raised.
#[derive(Debug, Clone, Default)]
pub struct WarningLog {
    items: Vec<RunWarning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: RunWarning) {
        log::warn!("{}: {:?}", warning.kind(), warning);
        self.items.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = RunWarning>) {
        for w in warnings {
            self.push(w);
        }
    }

    /// Raise an `UnknownRegion`/`UnknownTier` style warning only once per value.
    pub fn push_once(&mut self, warning: RunWarning) {
        if !self.items.contains(&warning) {
            self.push(warning);
        }
    }

    pub fn count(&self, kind: &str) -> usize {
        self.items.iter().filter(|w| w.kind() == kind).count()
    }

    pub fn as_slice(&self) -> &[RunWarning] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<RunWarning> {
        self.items
    }
}
