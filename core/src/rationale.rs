//! Per-account rationale text.
//!
//! Waterfall assignments cite the rule that decided them; relaxed
//! assignments cite the score term that contributed most.

use crate::{
    regions::RegionMatch,
    strategy::{AssignmentRule, RunContext},
};

fn dominant_term(ctx: &RunContext<'_>, account: usize, rep: usize) -> (&'static str, f64) {
    let s = ctx.scores.get(account, rep);
    let w = ctx.config.objectives.effective();
    let terms = [
        ("continuity", w.continuity * s.continuity),
        ("geography", w.geography * s.geography),
        ("team alignment", w.team_alignment * s.team_alignment),
    ];
    terms
        .into_iter()
        .fold(("continuity", f64::NEG_INFINITY), |best, t| if t.1 > best.1 { t } else { best })
}

pub fn rationale(
    ctx: &RunContext<'_>,
    account: usize,
    rep: usize,
    rule: AssignmentRule,
    over_capacity: bool,
) -> String {
    let book = ctx.book;
    let acct = &book.accounts[account];
    let rep_id = &book.reps[rep].id;
    let region = ctx.scores.region_match(account, rep);

    let mut text = match rule {
        AssignmentRule::Holdover { reason } => {
            match (ctx.locks.get(account), acct.owner_id.as_deref()) {
                (Some(l), Some(owner)) if l.via_backfill => format!(
                    "Held for {}: moved from departing owner {owner} to backfill {rep_id}",
                    reason.label()
                ),
                _ => format!("Held with {rep_id}: {}", reason.label()),
            }
        }
        AssignmentRule::Strategic => format!("Strategic account kept in the strategic pool with {rep_id}"),
        AssignmentRule::ContinuityGeography => {
            format!("Kept with current owner {rep_id}, same region ({})", acct.region)
        }
        AssignmentRule::Geography => format!("Moved to in-region rep {rep_id} ({})", acct.region),
        AssignmentRule::Continuity => match region {
            RegionMatch::Exact => format!("Kept with current owner {rep_id}"),
            other => format!("Kept with current owner {rep_id} across regions ({})", other.label()),
        },
        AssignmentRule::Balance => format!("Assigned to {rep_id} to balance load"),
        AssignmentRule::Residual => format!("Force-assigned to least-loaded eligible rep {rep_id}"),
        AssignmentRule::Relaxed => {
            let (term, value) = dominant_term(ctx, account, rep);
            format!("Optimizer chose {rep_id}; dominant term {term} ({value:.3})")
        }
        AssignmentRule::FollowsParent => format!(
            "Follows parent {} to {rep_id}",
            acct.parent_id.as_deref().unwrap_or("?")
        ),
    };
    if over_capacity {
        text.push_str("; over capacity");
    }
    text
}
