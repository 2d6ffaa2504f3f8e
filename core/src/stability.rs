//! Stability lock evaluator.
//!
//! A lock pins a family to one required owner no matter what the
//! optimizer would prefer. Predicates, each toggled in `StabilityConfig`:
//!   - manual lock flag
//!   - PE-firm affiliation with a designated rep
//!   - backfill migration (departing owner's eligible book moves to target)
//!   - risk severity above the configured floor
//!   - renewal event within the configured window
//!   - owner changed recently (anti-thrashing)
//!
//! A required owner that is a backfill-source is replaced by its target.
//! No target means no lock and a warning; it is a configuration defect.
//! Strategic accounts are NOT handled here; the engines enforce that pool.

use crate::{
    config::{StabilityConfig, MAX_WINDOW_DAYS},
    event::{RunWarning, WarningLog},
    model::{Book, Family},
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a family is locked, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    Manual,
    PeFirm,
    BackfillMigration,
    Risk,
    Renewal,
    RecentOwnerChange,
}

impl LockReason {
    pub fn label(&self) -> &'static str {
        match self {
            LockReason::Manual            => "manual lock",
            LockReason::PeFirm            => "PE firm relationship",
            LockReason::BackfillMigration => "backfill migration",
            LockReason::Risk              => "account at risk",
            LockReason::Renewal           => "renewal in window",
            LockReason::RecentOwnerChange => "recent owner change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityLock {
    /// Family head account index.
    pub account: usize,
    pub required_rep: usize,
    pub reason: LockReason,
    /// Every predicate that matched, in precedence order.
    pub reasons: Vec<LockReason>,
    /// The required owner came from a backfill-source substitution.
    pub via_backfill: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LockSet {
    locks: BTreeMap<usize, StabilityLock>,
}

impl LockSet {
    pub fn get(&self, head: usize) -> Option<&StabilityLock> {
        self.locks.get(&head)
    }

    pub fn is_locked(&self, head: usize) -> bool {
        self.locks.contains_key(&head)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StabilityLock> {
        self.locks.values()
    }

    /// Drop a lock that conflicts with a stronger constraint.
    pub fn release(&mut self, head: usize) -> Option<StabilityLock> {
        self.locks.remove(&head)
    }
}

fn matching_reasons(book: &Book, family: &Family, config: &StabilityConfig) -> Vec<LockReason> {
    let head = &book.accounts[family.head];
    let owner = book.owner_idx(family.head);
    let mut reasons = Vec::new();

    if config.manual_lock && head.manual_lock {
        reasons.push(LockReason::Manual);
    }
    if config.pe_firm_lock {
        if let Some(firm) = &head.pe_firm {
            if config.pe_firm_reps.contains_key(firm) {
                reasons.push(LockReason::PeFirm);
            }
        }
    }
    if config.backfill_migration
        && head.backfill_eligible
        && owner.is_some_and(|o| book.reps[o].is_backfill_source)
    {
        reasons.push(LockReason::BackfillMigration);
    }
    if config.risk_lock {
        let worst = family.members().map(|m| book.accounts[m].risk).max().unwrap_or_default();
        if worst > config.risk_floor {
            reasons.push(LockReason::Risk);
        }
    }
    if config.renewal_lock {
        let window = Duration::days(config.renewal_window_days.clamp(0, MAX_WINDOW_DAYS));
        let window_end = book.as_of.checked_add_signed(window).unwrap_or(NaiveDate::MAX);
        let renewing = family.members().any(|m| {
            book.accounts[m]
                .renewal_date
                .is_some_and(|d| d >= book.as_of && d <= window_end)
        });
        if renewing {
            reasons.push(LockReason::Renewal);
        }
    }
    if config.recent_change_lock {
        if let Some(days) = head.days_since_owner_change {
            if days >= 0 && days < config.recent_change_days {
                reasons.push(LockReason::RecentOwnerChange);
            }
        }
    }
    reasons
}

/// Evaluate every family head against the lock predicates.
pub fn evaluate_locks(
    book: &Book,
    families: &[Family],
    config: &StabilityConfig,
    warnings: &mut WarningLog,
) -> LockSet {
    let mut locks = BTreeMap::new();

    for family in families {
        let reasons = matching_reasons(book, family, config);
        let Some(&reason) = reasons.first() else {
            continue;
        };
        let head = &book.accounts[family.head];

        // PE-firm locks point at the firm's rep; everything else at the owner.
        let wanted_id = if reason == LockReason::PeFirm {
            head.pe_firm.as_ref().and_then(|f| config.pe_firm_reps.get(f)).cloned()
        } else {
            head.owner_id.clone()
        };
        let Some(wanted_id) = wanted_id else {
            log::debug!("stability: {} matches {:?} but has no owner", head.id, reason);
            continue;
        };
        let Some(wanted) = book.rep_idx(&wanted_id) else {
            warnings.push(RunWarning::LockTargetUnavailable {
                account_id: head.id.clone(),
                rep_id: wanted_id,
            });
            continue;
        };

        let Some(required) = book.backfill_target(wanted) else {
            warnings.push(RunWarning::BackfillWithoutTarget {
                account_id: head.id.clone(),
                source_rep_id: wanted_id,
            });
            continue;
        };
        if !book.reps[required].is_assignable() {
            warnings.push(RunWarning::LockTargetUnavailable {
                account_id: head.id.clone(),
                rep_id: book.reps[required].id.clone(),
            });
            continue;
        }

        locks.insert(
            family.head,
            StabilityLock {
                account: family.head,
                required_rep: required,
                reason,
                reasons,
                via_backfill: required != wanted,
            },
        );
    }

    log::info!("stability: {} of {} families locked", locks.len(), families.len());
    LockSet { locks }
}
