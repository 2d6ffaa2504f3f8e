//! Synthetic book generator.
//!
//! Builds a plausible scenario from a seed: a rep roster across six leaf
//! regions, accounts with heavy-tailed ARR, parent/child hierarchies with
//! the occasional split child, and a sprinkling of every lock trigger.
//!
//! RULE: same seed and BookSpec → byte-identical ScenarioInput.

use crate::{
    model::{OpportunityKind, RawAccount, RawOpportunity, RawRep, ScenarioInput},
    rng::{RngBank, RngStream, StreamRng},
    types::RepId,
};
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

pub const REGIONS: [&str; 6] = ["East", "Central", "West", "UKI", "DACH", "ANZ"];
pub const TEAM_TIERS: [&str; 4] = ["SMB", "Commercial", "MidMarket", "Enterprise"];
pub const PE_FIRMS: [&str; 2] = ["Summit Capital", "Harbor Partners"];
const RISK_LABELS: [&str; 5] = ["closed", "monitoring", "pre-risk", "at-risk", "confirmed churn"];

#[derive(Debug, Clone)]
pub struct BookSpec {
    pub scenario_id: String,
    pub accounts: usize,
    /// General-pool reps, departing reps included.
    pub reps: usize,
    pub strategic_reps: usize,
    /// Reps marked as backfill sources; each hands its book to a new hire.
    pub departing_reps: usize,
    /// Probability an account is created as a child of an earlier parent.
    pub child_share: f64,
    /// Probability a parent is a strategic account. Ignored without strategic reps.
    pub strategic_share: f64,
    pub as_of: NaiveDate,
}

impl Default for BookSpec {
    fn default() -> Self {
        Self {
            scenario_id: "synthetic".to_string(),
            accounts: 200,
            reps: 10,
            strategic_reps: 1,
            departing_reps: 1,
            child_share: 0.25,
            strategic_share: 0.03,
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
        }
    }
}

struct Roster {
    reps: Vec<RawRep>,
    /// Reps that can own general accounts, departing reps included.
    owners: Vec<RepId>,
    strategic: Vec<RepId>,
}

fn rep_id(n: usize) -> RepId {
    format!("R{n:03}")
}

fn build_roster(spec: &BookSpec, rng: &mut StreamRng) -> Roster {
    let mut reps = Vec::new();
    let mut owners = Vec::new();
    let mut strategic = Vec::new();
    let departing = spec.departing_reps.min(spec.reps.saturating_sub(1));

    for n in 1..=spec.reps {
        let id = rep_id(n);
        let region = REGIONS[(n - 1) % REGIONS.len()];
        let mut rep = RawRep {
            id: id.clone(),
            name: Some(format!("Rep {n}")),
            region: Some(region.to_string()),
            team_tier: rng.pick(&TEAM_TIERS).map(|t| t.to_string()),
            ..RawRep::default()
        };
        // The last general reps are the departing ones.
        if n > spec.reps - departing {
            rep.is_backfill_source = true;
            rep.backfill_target_id = Some(format!("{id}-BF"));
        }
        owners.push(id);
        reps.push(rep);
    }

    for n in 1..=spec.strategic_reps {
        let id = format!("S{n:02}");
        strategic.push(id.clone());
        reps.push(RawRep {
            id,
            name: Some(format!("Strategic {n}")),
            region: Some(REGIONS[(n - 1) % REGIONS.len()].to_string()),
            team_tier: Some("Enterprise".to_string()),
            is_strategic: true,
            ..RawRep::default()
        });
    }

    let sources: Vec<RawRep> = reps.iter().filter(|r| r.is_backfill_source).cloned().collect();
    for source in sources {
        reps.push(RawRep {
            id: format!("{}-BF", source.id),
            name: Some(format!("Backfill for {}", source.id)),
            region: source.region.clone(),
            team_tier: source.team_tier.clone(),
            ..RawRep::default()
        });
    }

    Roster { reps, owners, strategic }
}

fn employees_for(arr: f64, rng: &mut StreamRng) -> u64 {
    let base = (arr / 1_000.0).max(5.0);
    (base * rng.between(0.5, 3.0)) as u64
}

/// Generate a scenario from a seed.
pub fn generate_book(seed: u64, spec: &BookSpec) -> ScenarioInput {
    let bank = RngBank::new(seed);
    let mut rep_rng = bank.stream(RngStream::Reps);
    let mut acct_rng = bank.stream(RngStream::Accounts);
    let mut tree_rng = bank.stream(RngStream::Hierarchy);
    let mut own_rng = bank.stream(RngStream::Ownership);
    let mut flag_rng = bank.stream(RngStream::Flags);
    let mut opp_rng = bank.stream(RngStream::Opportunities);

    let roster = build_roster(spec, &mut rep_rng);
    let mut accounts: Vec<RawAccount> = Vec::with_capacity(spec.accounts);
    let mut parents: Vec<usize> = Vec::new();

    for n in 1..=spec.accounts {
        let id = format!("A{n:05}");
        let is_customer = acct_rng.chance(0.7);
        let arr = if is_customer { acct_rng.pareto(5_000.0, 1.3).min(5_000_000.0).round() } else { 0.0 };
        let pipeline = if is_customer && !acct_rng.chance(0.6) {
            0.0
        } else {
            acct_rng.pareto(10_000.0, 1.6).min(2_000_000.0).round()
        };

        let parent = if !parents.is_empty() && tree_rng.chance(spec.child_share) {
            tree_rng.pick(&parents).copied()
        } else {
            None
        };

        let strategic = parent.is_none()
            && !roster.strategic.is_empty()
            && own_rng.chance(spec.strategic_share);
        let owner = match parent {
            // Children mostly follow the parent's owner; the rest are split.
            Some(p) if !own_rng.chance(0.1) => accounts[p].owner_id.clone(),
            Some(p) if accounts[p].is_strategic => own_rng.pick(&roster.strategic).cloned(),
            _ if strategic => own_rng.pick(&roster.strategic).cloned(),
            _ if own_rng.chance(0.9) => own_rng.pick(&roster.owners).cloned(),
            _ => None,
        };

        let region = if acct_rng.chance(0.03) {
            None
        } else {
            acct_rng.pick(&REGIONS).map(|r| r.to_string())
        };
        let renewal_date = (is_customer && flag_rng.chance(0.3))
            .then(|| spec.as_of + Duration::days(flag_rng.below(365) as i64));
        let risk = flag_rng
            .chance(0.08)
            .then(|| flag_rng.pick(&RISK_LABELS).map(|r| r.to_string()))
            .flatten();
        let pe_firm = (parent.is_none() && flag_rng.chance(0.02))
            .then(|| flag_rng.pick(&PE_FIRMS).map(|f| f.to_string()))
            .flatten();

        accounts.push(RawAccount {
            id,
            name: Some(format!("Account {n}")),
            parent_id: parent.map(|p| accounts[p].id.clone()),
            arr: Some(arr),
            atr: renewal_date.map(|_| (arr * flag_rng.between(0.5, 1.0)).round()),
            pipeline: Some(pipeline),
            tier: Some(1 + acct_rng.below(4) as u8),
            employees: Some(employees_for(arr.max(pipeline), &mut acct_rng)),
            region,
            owner_id: owner,
            days_since_owner_change: Some(flag_rng.below(900) as i64),
            owner_count: Some(1 + flag_rng.below(5) as u32),
            risk,
            pe_firm,
            is_strategic: strategic || parent.is_some_and(|p| accounts[p].is_strategic),
            manual_lock: flag_rng.chance(0.01),
            backfill_eligible: flag_rng.chance(0.8),
            renewal_date,
            ..RawAccount::default()
        });
        if parent.is_none() {
            parents.push(accounts.len() - 1);
        }
    }

    let mut opportunities = Vec::new();
    for account in &accounts {
        if !opp_rng.chance(0.2) {
            continue;
        }
        let renewal = account.renewal_date.is_some() && opp_rng.chance(0.5);
        let amount = opp_rng.pareto(8_000.0, 1.5).min(1_000_000.0).round();
        opportunities.push(RawOpportunity {
            id: format!("O-{}-{}", account.id, opportunities.len() + 1),
            account_id: account.id.clone(),
            kind: if renewal { OpportunityKind::Renewal } else { OpportunityKind::NewBusiness },
            amount,
            available_to_renew: renewal.then_some(amount),
            renewal_date: if renewal { account.renewal_date } else { None },
        });
    }

    ScenarioInput {
        scenario_id: spec.scenario_id.clone(),
        as_of: spec.as_of,
        accounts,
        reps: roster.reps,
        opportunities,
    }
}

/// Map each PE firm to the first assignable general rep, for configs
/// driving a synthetic book.
pub fn pe_firm_reps(input: &ScenarioInput) -> BTreeMap<String, RepId> {
    let Some(rep) = input
        .reps
        .iter()
        .find(|r| r.is_active && !r.is_strategic && !r.is_backfill_source)
    else {
        return BTreeMap::new();
    };
    PE_FIRMS.iter().map(|f| (f.to_string(), rep.id.clone())).collect()
}
