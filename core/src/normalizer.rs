//! Account/rep normalizer.
//!
//! Turns one scenario's raw records into a `Book`:
//!   1. Resolves every account's effective owner (pending owner first).
//!   2. Resolves every child to its ULTIMATE parent; orphans and cycles
//!      are promoted to parents with a warning, never a failure.
//!   3. Detects split ownership (child owned by someone other than the parent).
//!   4. Rolls non-split children into their parent's hierarchy totals.
//!   5. Groups accounts into balancing families.

use crate::{
    config::AssignmentConfig,
    event::{RunWarning, WarningLog},
    model::{
        Account, Book, Family, HierarchyTotals, OpportunityKind, RawAccount, RawOpportunity,
        RawRep, Rep, RiskSeverity, ScenarioInput, Values,
    },
    regions::RegionIndex,
    types::{AccountId, RepId},
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, Default)]
struct OpportunityRollup {
    renewal_arr: f64,
    renewal_atr: f64,
    pipeline: f64,
    next_renewal: Option<NaiveDate>,
}

fn rollup_opportunities(opps: &[RawOpportunity]) -> HashMap<&str, OpportunityRollup> {
    let mut out: HashMap<&str, OpportunityRollup> = HashMap::new();
    for opp in opps {
        let entry = out.entry(opp.account_id.as_str()).or_default();
        let amount = if opp.amount.is_finite() { opp.amount } else { 0.0 };
        match opp.kind {
            OpportunityKind::Renewal => {
                entry.renewal_arr += amount;
                entry.renewal_atr += opp.available_to_renew.filter(|v| v.is_finite()).unwrap_or(0.0);
                if let Some(date) = opp.renewal_date {
                    entry.next_renewal = Some(entry.next_renewal.map_or(date, |d| d.min(date)));
                }
            }
            OpportunityKind::NewBusiness | OpportunityKind::Expansion => {
                entry.pipeline += amount;
            }
        }
    }
    out
}

/// First non-zero, finite value in precedence order, else zero.
fn first_nonzero(candidates: &[Option<f64>]) -> f64 {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(0.0)
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn dedupe_by_id<'a, T>(
    items: &'a [T],
    id: impl Fn(&T) -> &str,
    warnings: &mut WarningLog,
) -> BTreeMap<&'a str, &'a T> {
    let mut out = BTreeMap::new();
    for item in items {
        let key = id(item);
        if out.contains_key(key) {
            warnings.push(RunWarning::DuplicateRecord { id: key.to_string() });
            continue;
        }
        out.insert(key, item);
    }
    out
}

fn normalize_reps(
    raw: &[RawRep],
    regions: &RegionIndex,
    config: &AssignmentConfig,
    warnings: &mut WarningLog,
) -> Vec<Rep> {
    dedupe_by_id(raw, |r| r.id.as_str(), warnings)
        .into_values()
        .map(|r| {
            let region = non_empty(&r.region).unwrap_or_default().to_string();
            if !region.is_empty() && !regions.is_known(&region) {
                warnings.push_once(RunWarning::UnknownRegion { region: region.clone() });
            }
            let team_tier = non_empty(&r.team_tier).map(str::to_string);
            if let Some(t) = &team_tier {
                if config.tiers.rank(t).is_none() {
                    warnings.push_once(RunWarning::UnknownTier { tier: t.clone() });
                }
            }
            Rep {
                id: r.id.clone(),
                name: r.name.clone(),
                region,
                team_tier,
                is_active: r.is_active,
                include_in_assignment: r.include_in_assignment,
                is_strategic: r.is_strategic,
                is_backfill_source: r.is_backfill_source,
                backfill_target_id: non_empty(&r.backfill_target_id).map(str::to_string),
                is_renewal_specialist: r.is_renewal_specialist,
                is_placeholder: r.is_placeholder,
            }
        })
        .collect()
}

/// Resolve each account's ultimate parent. Returns None for parents.
fn resolve_parents(
    raw: &BTreeMap<&str, &RawAccount>,
    warnings: &mut WarningLog,
) -> HashMap<AccountId, Option<AccountId>> {
    // One hop, with orphans promoted.
    let mut direct: HashMap<&str, Option<&str>> = HashMap::new();
    for (id, acct) in raw {
        let parent = non_empty(&acct.parent_id).filter(|p| p != id);
        let parent = match parent {
            Some(p) if raw.contains_key(p) => Some(p),
            Some(p) => {
                warnings.push(RunWarning::OrphanedChild {
                    account_id: id.to_string(),
                    missing_parent_id: p.to_string(),
                });
                None
            }
            None => None,
        };
        direct.insert(*id, parent);
    }

    // Cycle members are promoted; a chain that runs into a cycle attaches
    // to the member it enters first.
    let mut ultimate = HashMap::new();
    for id in raw.keys() {
        let mut path: Vec<&str> = vec![*id];
        let mut current = direct.get(id).copied().flatten();
        let mut top: Option<&str> = None;
        while let Some(p) = current {
            if let Some(pos) = path.iter().position(|&q| q == p) {
                if pos == 0 {
                    warnings.push(RunWarning::HierarchyCycle { account_id: id.to_string() });
                    top = None;
                } else {
                    top = Some(path[pos]);
                }
                break;
            }
            path.push(p);
            top = Some(p);
            current = direct.get(p).copied().flatten();
        }
        ultimate.insert(id.to_string(), top.map(str::to_string));
    }

    ultimate
}

/// Normalize one scenario. Never fails: every defect becomes a warning.
pub fn normalize(
    input: &ScenarioInput,
    config: &AssignmentConfig,
    warnings: &mut WarningLog,
) -> Book {
    let regions = RegionIndex::new(&config.regions);
    let reps = normalize_reps(&input.reps, &regions, config, warnings);
    let rep_ids: HashSet<&str> = reps.iter().map(|r| r.id.as_str()).collect();

    let raw_accounts = dedupe_by_id(&input.accounts, |a| a.id.as_str(), warnings);
    let opps = rollup_opportunities(&input.opportunities);
    let parents = resolve_parents(&raw_accounts, warnings);

    // ── Per-account fields ──────────────────────────────────────────────────
    let mut accounts: Vec<Account> = Vec::with_capacity(raw_accounts.len());
    for (id, raw) in &raw_accounts {
        let opp = opps.get(id).copied().unwrap_or_default();

        let owner_id: Option<RepId> = non_empty(&raw.pending_owner_id)
            .or_else(|| non_empty(&raw.owner_id))
            .and_then(|owner| {
                if rep_ids.contains(owner) {
                    Some(owner.to_string())
                } else {
                    warnings.push(RunWarning::UnknownOwner {
                        account_id: id.to_string(),
                        owner_id: owner.to_string(),
                    });
                    None
                }
            });

        let region = non_empty(&raw.region).unwrap_or_default().to_string();
        if !region.is_empty() && !regions.is_known(&region) {
            warnings.push_once(RunWarning::UnknownRegion { region: region.clone() });
        }

        let team_tier = non_empty(&raw.team_tier)
            .map(str::to_string)
            .or_else(|| raw.employees.and_then(|n| config.tiers.tier_for_employees(n)));
        if let Some(t) = &team_tier {
            if config.tiers.rank(t).is_none() {
                warnings.push_once(RunWarning::UnknownTier { tier: t.clone() });
            }
        }

        let own = Values {
            arr: first_nonzero(&[Some(opp.renewal_arr), raw.arr]),
            atr: first_nonzero(&[Some(opp.renewal_atr), raw.atr]),
            pipeline: first_nonzero(&[Some(opp.pipeline), raw.pipeline]),
        };

        let parent_id = parents.get(*id).cloned().flatten();
        accounts.push(Account {
            id: id.to_string(),
            name: raw.name.clone(),
            is_parent: parent_id.is_none(),
            parent_id,
            is_split_child: false,
            is_customer: false,
            own,
            hierarchy: None,
            tier: raw.tier,
            team_tier,
            region,
            owner_id,
            days_since_owner_change: raw.days_since_owner_change,
            owner_count: raw.owner_count,
            risk: non_empty(&raw.risk).map(RiskSeverity::parse).unwrap_or_default(),
            pe_firm: non_empty(&raw.pe_firm).map(str::to_string),
            is_strategic: raw.is_strategic,
            manual_lock: raw.manual_lock,
            lock_reason: raw.lock_reason.clone(),
            backfill_eligible: raw.backfill_eligible,
            renewal_date: opp.next_renewal.or(raw.renewal_date),
        });
    }

    let index: HashMap<String, usize> = accounts
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id.clone(), i))
        .collect();

    // ── Split detection ─────────────────────────────────────────────────────
    let mut children: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut split_counts: HashMap<usize, u32> = HashMap::new();
    for i in 0..accounts.len() {
        let Some(p) = accounts[i].parent_id.as_deref().and_then(|p| index.get(p).copied()) else {
            continue;
        };
        let split = match (&accounts[i].owner_id, &accounts[p].owner_id) {
            (None, _) => false,
            (Some(child), Some(parent)) => child != parent,
            (Some(_), None) => true,
        };
        accounts[i].is_split_child = split;
        if split {
            *split_counts.entry(p).or_default() += 1;
        } else {
            children.entry(p).or_default().push(i);
        }
    }

    // ── Parent rollup ───────────────────────────────────────────────────────
    for i in 0..accounts.len() {
        if !accounts[i].is_parent {
            continue;
        }
        let followers = children.get(&i).map(Vec::as_slice).unwrap_or(&[]);
        let mut rolled = accounts[i].own;
        let mut risk_count = u32::from(accounts[i].risk.is_risky());
        for &c in followers {
            rolled.arr += accounts[c].own.arr;
            rolled.atr += accounts[c].own.atr;
            rolled.pipeline += accounts[c].own.pipeline;
            risk_count += u32::from(accounts[c].risk.is_risky());
        }
        let split_children = split_counts.get(&i).copied().unwrap_or(0);
        let raw = raw_accounts[accounts[i].id.as_str()];
        let totals = HierarchyTotals {
            arr: first_nonzero(&[raw.hierarchy_arr, Some(rolled.arr)]),
            atr: first_nonzero(&[raw.hierarchy_atr, Some(rolled.atr)]),
            pipeline: rolled.pipeline,
            risk_count,
            split_children,
        };
        accounts[i].is_customer = totals.arr > 0.0;
        accounts[i].hierarchy = Some(totals);
    }

    // ── Customer flag for children ──────────────────────────────────────────
    for i in 0..accounts.len() {
        if accounts[i].is_parent {
            continue;
        }
        accounts[i].is_customer = if accounts[i].is_split_child {
            accounts[i].own.arr > 0.0
        } else {
            accounts[i]
                .parent_id
                .as_deref()
                .and_then(|p| index.get(p))
                .map(|&p| accounts[p].is_customer)
                .unwrap_or(false)
        };
    }

    // ── Families ────────────────────────────────────────────────────────────
    let families: Vec<Family> = (0..accounts.len())
        .filter(|&i| accounts[i].is_parent || accounts[i].is_split_child)
        .map(|i| Family {
            head: i,
            followers: if accounts[i].is_parent {
                children.get(&i).cloned().unwrap_or_default()
            } else {
                Vec::new()
            },
        })
        .collect();

    log::info!(
        "normalize: scenario={} accounts={} reps={} families={} split={}",
        input.scenario_id,
        accounts.len(),
        reps.len(),
        families.len(),
        accounts.iter().filter(|a| a.is_split_child).count(),
    );

    Book::new(input.scenario_id.clone(), input.as_of, accounts, reps, families)
}
