//! P0 holdover: locked and strategic families placed before any solve.
//!
//! RULES:
//!   - A locked family goes to its lock's required rep, full stop.
//!   - An unlocked strategic family stays with its owner when the owner is
//!     an eligible strategic rep; otherwise strategic reps take turns in
//!     roster order.
//!   - Holdover never refuses a placement for capacity. A placement that
//!     pushes its rep over a bound is flagged and warned about.

use crate::{
    eligibility::Pool,
    event::{RunWarning, WarningLog},
    snapshot::{CapacitySnapshot, StageDelta},
    strategy::{AssignmentRule, Placement, RunContext, Stage, StageReport},
};

pub fn holdover_stage(
    ctx: &RunContext<'_>,
    snapshot: &CapacitySnapshot,
    warnings: &mut WarningLog,
) -> (StageDelta, StageReport) {
    let pending: Vec<usize> = ctx
        .eligibility
        .in_scope()
        .iter()
        .copied()
        .filter(|&f| !snapshot.is_placed(f))
        .collect();
    let mut report = StageReport::new(Stage::Holdover, pending.len());
    let mut delta = StageDelta::new(Stage::Holdover);
    let mut turn = 0usize;

    for f in pending {
        let decision = if let Some(lock) = ctx.lock_for(f) {
            Some((lock.required_rep, AssignmentRule::Holdover { reason: lock.reason }))
        } else if ctx.eligibility.pool(f) == Pool::Strategic {
            let eligible = ctx.eligibility.eligible(f);
            let rep = match ctx.owner_of(f) {
                Some(owner) if ctx.eligibility.is_eligible(f, owner) => owner,
                _ => {
                    let rep = eligible[turn % eligible.len()];
                    turn += 1;
                    rep
                }
            };
            Some((rep, AssignmentRule::Strategic))
        } else {
            None
        };
        let Some((rep, rule)) = decision else {
            continue;
        };

        let mut load = delta.load_over(snapshot, rep);
        load += &ctx.values[f];
        let over_capacity = ctx.exceeds_capacity(rep, &load);
        if over_capacity {
            warnings.push(RunWarning::ForcedOverCapacity {
                account_id: ctx.book.accounts[ctx.book.families[f].head].id.clone(),
                rep_id: ctx.book.reps[rep].id.clone(),
            });
        }
        delta.push(Placement { family: f, rep, rule, over_capacity }, &ctx.values[f]);
    }

    report.assigned = delta.len();
    (delta, report)
}
