//! Account, representative and opportunity records.
//!
//! `Raw*` types are what the import collaborator hands over: type-correct
//! but with every optional field possibly missing. The normalizer turns
//! them into `Account`/`Rep` inside a `Book`, with hierarchy totals and
//! effective owners resolved.

use crate::types::{AccountId, RepId, ScenarioId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Risk severity ────────────────────────────────────────────────────────────

/// Ordered: none < closed < monitoring < pre-risk < at-risk < confirmed-churn.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    #[default]
    None,
    Closed,
    Monitoring,
    PreRisk,
    AtRisk,
    ConfirmedChurn,
}

impl RiskSeverity {
    /// Lenient parse of the free-text severity labels found in CRM exports.
    /// Unrecognised labels resolve to `None`.
    pub fn parse(label: &str) -> Self {
        let norm: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match norm.as_str() {
            "closed" => RiskSeverity::Closed,
            "monitoring" | "monitor" => RiskSeverity::Monitoring,
            "pre_risk" | "prerisk" => RiskSeverity::PreRisk,
            "at_risk" | "atrisk" | "risk" => RiskSeverity::AtRisk,
            "confirmed_churn" | "churn" | "churned" => RiskSeverity::ConfirmedChurn,
            _ => RiskSeverity::None,
        }
    }

    pub fn is_risky(&self) -> bool {
        *self >= RiskSeverity::AtRisk
    }
}

// ── Raw input ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAccount {
    pub id: AccountId,
    pub name: Option<String>,
    /// None or equal to `id` means the account is its own parent.
    pub parent_id: Option<AccountId>,
    pub arr: Option<f64>,
    pub atr: Option<f64>,
    pub pipeline: Option<f64>,
    pub hierarchy_arr: Option<f64>,
    pub hierarchy_atr: Option<f64>,
    /// Priority tier 1..4; drives the tier-1/tier-2 balance counts.
    pub tier: Option<u8>,
    /// Team-size segment used for team alignment.
    pub team_tier: Option<String>,
    pub employees: Option<u64>,
    pub region: Option<String>,
    pub owner_id: Option<RepId>,
    /// Takes precedence over `owner_id` when set.
    pub pending_owner_id: Option<RepId>,
    pub days_since_owner_change: Option<i64>,
    pub owner_count: Option<u32>,
    pub risk: Option<String>,
    pub pe_firm: Option<String>,
    pub is_strategic: bool,
    pub manual_lock: bool,
    pub lock_reason: Option<String>,
    pub backfill_eligible: bool,
    pub renewal_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRep {
    pub id: RepId,
    pub name: Option<String>,
    pub region: Option<String>,
    pub team_tier: Option<String>,
    pub is_active: bool,
    pub include_in_assignment: bool,
    pub is_strategic: bool,
    pub is_backfill_source: bool,
    pub backfill_target_id: Option<RepId>,
    pub is_renewal_specialist: bool,
    pub is_placeholder: bool,
}

impl Default for RawRep {
    fn default() -> Self {
        Self {
            id: RepId::new(),
            name: None,
            region: None,
            team_tier: None,
            is_active: true,
            include_in_assignment: true,
            is_strategic: false,
            is_backfill_source: false,
            backfill_target_id: None,
            is_renewal_specialist: false,
            is_placeholder: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    #[serde(alias = "renewals")]
    Renewal,
    #[default]
    #[serde(alias = "new")]
    NewBusiness,
    Expansion,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawOpportunity {
    pub id: String,
    pub account_id: AccountId,
    pub kind: OpportunityKind,
    pub amount: f64,
    /// Only meaningful for renewal opportunities.
    pub available_to_renew: Option<f64>,
    pub renewal_date: Option<NaiveDate>,
}

/// One scenario's input, as delivered by the import collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub scenario_id: ScenarioId,
    /// Reference date for renewal windows.
    pub as_of: NaiveDate,
    #[serde(default)]
    pub accounts: Vec<RawAccount>,
    #[serde(default)]
    pub reps: Vec<RawRep>,
    #[serde(default)]
    pub opportunities: Vec<RawOpportunity>,
}

impl ScenarioInput {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        Ok(serde_json::from_str(&content)?)
    }
}

// ── Normalized ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Values {
    pub arr: f64,
    pub atr: f64,
    pub pipeline: f64,
}

/// Totals over a parent and its non-split children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyTotals {
    pub arr: f64,
    pub atr: f64,
    pub pipeline: f64,
    pub risk_count: u32,
    pub split_children: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: Option<String>,
    /// Ultimate parent; None for parents, split children included.
    pub parent_id: Option<AccountId>,
    pub is_parent: bool,
    /// A child whose owner differs from its parent's.
    pub is_split_child: bool,
    pub is_customer: bool,
    pub own: Values,
    /// Present on parents only.
    pub hierarchy: Option<HierarchyTotals>,
    pub tier: Option<u8>,
    pub team_tier: Option<String>,
    pub region: String,
    pub owner_id: Option<RepId>,
    pub days_since_owner_change: Option<i64>,
    pub owner_count: Option<u32>,
    pub risk: RiskSeverity,
    pub pe_firm: Option<String>,
    pub is_strategic: bool,
    pub manual_lock: bool,
    pub lock_reason: Option<String>,
    pub backfill_eligible: bool,
    pub renewal_date: Option<NaiveDate>,
}

impl Account {
    /// ARR counted for balancing: hierarchy ARR on parents, own ARR otherwise.
    pub fn balance_arr(&self) -> f64 {
        self.hierarchy.map(|h| h.arr).unwrap_or(self.own.arr)
    }

    pub fn balance_atr(&self) -> f64 {
        self.hierarchy.map(|h| h.atr).unwrap_or(self.own.atr)
    }

    pub fn balance_pipeline(&self) -> f64 {
        self.hierarchy.map(|h| h.pipeline).unwrap_or(self.own.pipeline)
    }

    pub fn has_split_ownership(&self) -> bool {
        self.is_split_child || self.hierarchy.is_some_and(|h| h.split_children > 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rep {
    pub id: RepId,
    pub name: Option<String>,
    pub region: String,
    pub team_tier: Option<String>,
    pub is_active: bool,
    pub include_in_assignment: bool,
    pub is_strategic: bool,
    pub is_backfill_source: bool,
    pub backfill_target_id: Option<RepId>,
    pub is_renewal_specialist: bool,
    pub is_placeholder: bool,
}

impl Rep {
    /// Can receive accounts in this run.
    pub fn is_assignable(&self) -> bool {
        self.is_active && self.include_in_assignment && !self.is_backfill_source
    }
}

/// A balancing unit: a parent (or split child, or promoted orphan) plus
/// the non-split children that must follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub head: usize,
    pub followers: Vec<usize>,
}

impl Family {
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.head).chain(self.followers.iter().copied())
    }

    pub fn size(&self) -> usize {
        1 + self.followers.len()
    }
}

/// Normalized accounts and reps for one scenario, sorted by id.
#[derive(Debug, Clone)]
pub struct Book {
    pub scenario_id: ScenarioId,
    pub as_of: NaiveDate,
    pub accounts: Vec<Account>,
    pub reps: Vec<Rep>,
    pub families: Vec<Family>,
    account_index: HashMap<AccountId, usize>,
    rep_index: HashMap<RepId, usize>,
}

impl Book {
    pub fn new(
        scenario_id: ScenarioId,
        as_of: NaiveDate,
        accounts: Vec<Account>,
        reps: Vec<Rep>,
        families: Vec<Family>,
    ) -> Self {
        let account_index = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();
        let rep_index = reps
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self { scenario_id, as_of, accounts, reps, families, account_index, rep_index }
    }

    pub fn account_idx(&self, id: &str) -> Option<usize> {
        self.account_index.get(id).copied()
    }

    pub fn rep_idx(&self, id: &str) -> Option<usize> {
        self.rep_index.get(id).copied()
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.account_idx(id).map(|i| &self.accounts[i])
    }

    pub fn rep(&self, id: &str) -> Option<&Rep> {
        self.rep_idx(id).map(|i| &self.reps[i])
    }

    /// Index of the account's current owner, if it is in the roster.
    pub fn owner_idx(&self, account: usize) -> Option<usize> {
        self.accounts[account]
            .owner_id
            .as_deref()
            .and_then(|id| self.rep_idx(id))
    }

    /// Resolve a departing rep to its backfill target, if it has one.
    pub fn backfill_target(&self, rep: usize) -> Option<usize> {
        let r = &self.reps[rep];
        if !r.is_backfill_source {
            return Some(rep);
        }
        r.backfill_target_id.as_deref().and_then(|id| self.rep_idx(id))
    }
}
