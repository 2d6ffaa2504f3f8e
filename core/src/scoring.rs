//! Scoring functions, pure (account, candidate rep) → [0, 1].
//!
//! RULE: scoring never fails. Unknown regions, tiers and missing fields
//! resolve to the neutral defaults in `ScoringConfig`. Both engines read
//! the same precomputed `ScoreMatrix`; no engine re-derives a score.

use crate::{
    config::{
        AssignmentConfig, ContinuityParams, EffectiveWeights, GeographyScores, TeamScores,
    },
    model::Book,
    regions::{RegionIndex, RegionMatch, TierTable},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub continuity: f64,
    pub geography: f64,
    pub team_alignment: f64,
    /// Σ weight · term over enabled objectives.
    pub weighted: f64,
}

fn unit(x: f64) -> f64 {
    if x.is_finite() { x.clamp(0.0, 1.0) } else { 0.0 }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 && num.is_finite() { num / den } else { 0.0 }
}

/// Continuity of keeping `account` with `rep`.
///
/// Only the account's current owner earns the tenure/stability/value
/// composite; every other rep gets `base`. A departing (backfill-source)
/// owner scores zero for its own accounts.
pub fn continuity_score(book: &Book, account: usize, rep: usize, params: &ContinuityParams) -> f64 {
    if book.owner_idx(account) != Some(rep) {
        return unit(params.base);
    }
    if book.reps[rep].is_backfill_source {
        return 0.0;
    }
    let acct = &book.accounts[account];
    let days = acct.days_since_owner_change.unwrap_or(0).max(0) as f64;
    let owners = f64::from(acct.owner_count.unwrap_or(1));

    let tenure = ratio(days, params.max_days).min(1.0);
    let stability = if params.max_owners > 0.0 {
        (1.0 - owners / params.max_owners).max(0.0)
    } else {
        0.0
    };
    let value = ratio(acct.balance_arr(), params.value_threshold).clamp(0.0, 1.0);

    unit(
        params.base
            + params.tenure_weight * tenure
            + params.stability_weight * stability
            + params.value_weight * value,
    )
}

pub fn geography_score(class: RegionMatch, scores: &GeographyScores) -> f64 {
    unit(match class {
        RegionMatch::Exact   => scores.exact,
        RegionMatch::Sibling => scores.sibling,
        RegionMatch::Parent  => scores.parent,
        RegionMatch::Global  => scores.global,
        RegionMatch::Unknown => scores.unknown,
    })
}

/// Team-size fit. Reps sized above the account lose an extra penalty.
pub fn team_alignment_score(
    tiers: &TierTable,
    account_tier: Option<&str>,
    rep_tier: Option<&str>,
    scores: &TeamScores,
) -> f64 {
    let ranks = account_tier
        .and_then(|t| tiers.rank(t))
        .zip(rep_tier.and_then(|t| tiers.rank(t)));
    let Some((account_rank, rep_rank)) = ranks else {
        return unit(scores.unknown);
    };
    let base = match account_rank.abs_diff(rep_rank) {
        0 => scores.same,
        1 => scores.one_apart,
        2 => scores.two_apart,
        _ => scores.three_plus,
    };
    let penalty = if rep_rank > account_rank { scores.reach_down_penalty } else { 0.0 };
    unit(base - penalty)
}

/// Scores every account against every rep once per run.
pub struct ScoreMatrix {
    rep_count: usize,
    cells: Vec<ScoreBreakdown>,
    regions: Vec<RegionMatch>,
}

impl ScoreMatrix {
    pub fn build(book: &Book, config: &AssignmentConfig) -> Self {
        let index = RegionIndex::new(&config.regions);
        let weights = config.objectives.effective();
        let rep_count = book.reps.len();
        let mut cells = Vec::with_capacity(book.accounts.len() * rep_count);
        let mut regions = Vec::with_capacity(book.accounts.len() * rep_count);

        for (a, acct) in book.accounts.iter().enumerate() {
            for (r, rep) in book.reps.iter().enumerate() {
                let class = index.classify(&acct.region, &rep.region);
                let continuity = continuity_score(book, a, r, &config.scoring.continuity);
                let geography = geography_score(class, &config.scoring.geography);
                let team_alignment = team_alignment_score(
                    &config.tiers,
                    acct.team_tier.as_deref(),
                    rep.team_tier.as_deref(),
                    &config.scoring.team,
                );
                cells.push(ScoreBreakdown {
                    continuity,
                    geography,
                    team_alignment,
                    weighted: weighted(&weights, continuity, geography, team_alignment),
                });
                regions.push(class);
            }
        }
        log::debug!("scoring: {} cells", cells.len());
        Self { rep_count, cells, regions }
    }

    pub fn get(&self, account: usize, rep: usize) -> &ScoreBreakdown {
        &self.cells[account * self.rep_count + rep]
    }

    pub fn region_match(&self, account: usize, rep: usize) -> RegionMatch {
        self.regions[account * self.rep_count + rep]
    }

    /// Weighted score of a whole family (head plus followers) on one rep.
    pub fn family_weighted(&self, members: impl Iterator<Item = usize>, rep: usize) -> f64 {
        members.map(|a| self.get(a, rep).weighted).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreBreakdown> {
        self.cells.iter()
    }
}

fn weighted(w: &EffectiveWeights, continuity: f64, geography: f64, team: f64) -> f64 {
    unit(w.continuity * continuity + w.geography * geography + w.team_alignment * team)
}
