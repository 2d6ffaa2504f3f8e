//! Run metrics: pure post-processing over a finished assignment set.
//!
//! RULE: metrics read placements, never write them.

use crate::{
    eligibility::Pool,
    regions::RegionMatch,
    strategy::{Placement, RunContext},
    thresholds::{Dimension, DimensionVector},
    types::RepId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepLoad {
    pub rep_id: RepId,
    pub strategic: bool,
    pub families: usize,
    pub accounts: usize,
    pub loads: BTreeMap<Dimension, f64>,
    pub arr_target: f64,
    /// (load − target) / target · 100; zero when the target is zero.
    pub arr_variance_pct: f64,
    pub over_capacity: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographyRates {
    pub exact: f64,
    pub sibling: f64,
    pub parent: f64,
    pub cross_region: f64,
    pub unknown: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierRates {
    pub exact: f64,
    pub mismatched: f64,
    pub unknown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub assigned_accounts: usize,
    pub assigned_families: usize,
    pub rep_loads: Vec<RepLoad>,
    /// Max over min ARR load across general-pool reps. None when a rep is empty.
    pub arr_max_min_ratio: Option<f64>,
    /// Share of owned accounts kept with their current owner.
    pub continuity_rate: f64,
    /// Same, restricted to accounts at or above the continuity value threshold.
    pub high_value_continuity_rate: f64,
    pub moved_accounts: usize,
    pub geography: GeographyRates,
    pub tier: TierRates,
    pub over_capacity_assignments: usize,
}

fn rate(n: usize, d: usize) -> f64 {
    if d == 0 { 0.0 } else { n as f64 / d as f64 }
}

/// `accounts` holds (account index, rep index) for every assigned account.
pub fn compute_metrics(
    ctx: &RunContext<'_>,
    placements: &[Placement],
    accounts: &[(usize, usize)],
) -> RunMetrics {
    let book = ctx.book;

    // ── Loads ────────────────────────────────────────────────────────────
    let mut loads = vec![DimensionVector::default(); book.reps.len()];
    let mut family_counts = vec![0usize; book.reps.len()];
    let mut account_counts = vec![0usize; book.reps.len()];
    for p in placements {
        loads[p.rep] += &ctx.values[p.family];
        family_counts[p.rep] += 1;
    }
    for &(_, r) in accounts {
        account_counts[r] += 1;
    }

    let mut reps: Vec<usize> = ctx
        .eligibility
        .reps(Pool::General)
        .iter()
        .chain(ctx.eligibility.reps(Pool::Strategic))
        .copied()
        .collect();
    reps.sort_unstable();

    let rep_loads: Vec<RepLoad> = reps
        .iter()
        .map(|&r| {
            let thresholds = ctx.rep_thresholds(r);
            let arr = loads[r][Dimension::Arr];
            RepLoad {
                rep_id: book.reps[r].id.clone(),
                strategic: ctx.eligibility.rep_pool(book, r) == Pool::Strategic,
                families: family_counts[r],
                accounts: account_counts[r],
                loads: Dimension::ALL
                    .iter()
                    .filter(|&&d| ctx.config.balance.is_enabled(d))
                    .map(|&d| (d, loads[r][d]))
                    .collect(),
                arr_target: thresholds.get(Dimension::Arr).target,
                arr_variance_pct: thresholds.relative_deviation(Dimension::Arr, arr) * 100.0,
                over_capacity: ctx.exceeds_capacity(r, &loads[r]),
            }
        })
        .collect();

    let general: Vec<f64> = ctx
        .eligibility
        .reps(Pool::General)
        .iter()
        .map(|&r| loads[r][Dimension::Arr])
        .collect();
    let max = general.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = general.iter().copied().fold(f64::INFINITY, f64::min);
    let arr_max_min_ratio = (min > 0.0 && min.is_finite()).then(|| max / min);

    // ── Continuity, geography, tier ─────────────────────────────────────
    let threshold = ctx.config.scoring.continuity.value_threshold;
    let (mut owned, mut kept, mut hv_owned, mut hv_kept) = (0, 0, 0, 0);
    let mut geo: BTreeMap<RegionMatch, usize> = BTreeMap::new();
    let (mut tier_exact, mut tier_mismatch, mut tier_unknown) = (0, 0, 0);

    for &(a, r) in accounts {
        let acct = &book.accounts[a];
        if let Some(owner) = book.owner_idx(a) {
            let high_value = acct.balance_arr() >= threshold;
            owned += 1;
            hv_owned += usize::from(high_value);
            if owner == r {
                kept += 1;
                hv_kept += usize::from(high_value);
            }
        }
        *geo.entry(ctx.scores.region_match(a, r)).or_default() += 1;

        let ranks = acct
            .team_tier
            .as_deref()
            .and_then(|t| ctx.config.tiers.rank(t))
            .zip(book.reps[r].team_tier.as_deref().and_then(|t| ctx.config.tiers.rank(t)));
        match ranks {
            Some((x, y)) if x == y => tier_exact += 1,
            Some(_) => tier_mismatch += 1,
            None => tier_unknown += 1,
        }
    }

    let n = accounts.len();
    let geo_rate = |m: RegionMatch| rate(geo.get(&m).copied().unwrap_or(0), n);

    RunMetrics {
        assigned_accounts: n,
        assigned_families: placements.len(),
        rep_loads,
        arr_max_min_ratio,
        continuity_rate: rate(kept, owned),
        high_value_continuity_rate: rate(hv_kept, hv_owned),
        moved_accounts: owned - kept,
        geography: GeographyRates {
            exact: geo_rate(RegionMatch::Exact),
            sibling: geo_rate(RegionMatch::Sibling),
            parent: geo_rate(RegionMatch::Parent),
            cross_region: geo_rate(RegionMatch::Global),
            unknown: geo_rate(RegionMatch::Unknown),
        },
        tier: TierRates {
            exact: rate(tier_exact, n),
            mismatched: rate(tier_mismatch, n),
            unknown: rate(tier_unknown, n),
        },
        over_capacity_assignments: placements.iter().filter(|p| p.over_capacity).count(),
    }
}
