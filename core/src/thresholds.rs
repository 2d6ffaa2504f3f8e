//! Balance threshold calculator.
//!
//! target = Σ(dimension over scope) / active rep count
//! min    = target · (1 − variance)
//! max    = target · (1 + variance)
//!
//! Thresholds are computed per run from the current roster and scope and
//! are never carried across a scope change.

use crate::{
    config::{BalanceConfig, BalanceScope},
    error::{AssignError, AssignResult},
    model::{Book, Family},
};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Arr,
    Atr,
    Pipeline,
    Accounts,
    Tier1Accounts,
    Tier2Accounts,
    RiskAccounts,
    RenewalsQ1,
    RenewalsQ2,
    RenewalsQ3,
    RenewalsQ4,
}

impl Dimension {
    pub const COUNT: usize = 11;

    pub const ALL: [Dimension; Dimension::COUNT] = [
        Dimension::Arr,
        Dimension::Atr,
        Dimension::Pipeline,
        Dimension::Accounts,
        Dimension::Tier1Accounts,
        Dimension::Tier2Accounts,
        Dimension::RiskAccounts,
        Dimension::RenewalsQ1,
        Dimension::RenewalsQ2,
        Dimension::RenewalsQ3,
        Dimension::RenewalsQ4,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Arr           => "arr",
            Dimension::Atr           => "atr",
            Dimension::Pipeline      => "pipeline",
            Dimension::Accounts      => "accounts",
            Dimension::Tier1Accounts => "tier1_accounts",
            Dimension::Tier2Accounts => "tier2_accounts",
            Dimension::RiskAccounts  => "risk_accounts",
            Dimension::RenewalsQ1    => "renewals_q1",
            Dimension::RenewalsQ2    => "renewals_q2",
            Dimension::RenewalsQ3    => "renewals_q3",
            Dimension::RenewalsQ4    => "renewals_q4",
        }
    }

    /// Dimensions that count whole families rather than sum money.
    pub fn is_count(self) -> bool {
        !matches!(self, Dimension::Arr | Dimension::Atr | Dimension::Pipeline)
    }

    /// A rep's room on this dimension as a model bound. Counts take whole families only.
    pub fn bound(self, room: f64) -> f64 {
        if self.is_count() { (room + 1e-9).floor().max(0.0) } else { room }
    }

    fn renewal_quarter(quarter: u32) -> Dimension {
        match quarter {
            1 => Dimension::RenewalsQ1,
            2 => Dimension::RenewalsQ2,
            3 => Dimension::RenewalsQ3,
            _ => Dimension::RenewalsQ4,
        }
    }
}

/// One value per dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionVector(pub [f64; Dimension::COUNT]);

impl Index<Dimension> for DimensionVector {
    type Output = f64;
    fn index(&self, dim: Dimension) -> &f64 {
        &self.0[dim.index()]
    }
}

impl IndexMut<Dimension> for DimensionVector {
    fn index_mut(&mut self, dim: Dimension) -> &mut f64 {
        &mut self.0[dim.index()]
    }
}

impl AddAssign<&DimensionVector> for DimensionVector {
    fn add_assign(&mut self, other: &DimensionVector) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
    }
}

/// What a family contributes to its owner's load.
pub fn family_values(book: &Book, family: &Family) -> DimensionVector {
    let head = &book.accounts[family.head];
    let mut v = DimensionVector::default();
    v[Dimension::Arr] = head.balance_arr();
    v[Dimension::Atr] = head.balance_atr();
    v[Dimension::Pipeline] = head.balance_pipeline();
    v[Dimension::Accounts] = 1.0;
    v[Dimension::Tier1Accounts] = f64::from(u8::from(head.tier == Some(1)));
    v[Dimension::Tier2Accounts] = f64::from(u8::from(head.tier == Some(2)));
    v[Dimension::RiskAccounts] = head
        .hierarchy
        .map(|h| f64::from(h.risk_count))
        .unwrap_or_else(|| f64::from(u8::from(head.risk.is_risky())));
    for member in family.members() {
        if let Some(date) = book.accounts[member].renewal_date {
            let quarter = date.month0() / 3 + 1;
            v[Dimension::renewal_quarter(quarter)] += 1.0;
        }
    }
    v
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionThreshold {
    pub total: f64,
    pub target: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceThresholds {
    pub scope: BalanceScope,
    pub rep_count: usize,
    pub variance_pct: f64,
    pub dimensions: Vec<DimensionThreshold>,
}

impl BalanceThresholds {
    /// Compute per-dimension target/min/max over the given family values.
    pub fn compute<'a>(
        values: impl IntoIterator<Item = &'a DimensionVector>,
        rep_count: usize,
        variance_pct: f64,
        scope: BalanceScope,
    ) -> AssignResult<Self> {
        if rep_count == 0 {
            return Err(AssignError::NoEligibleReps { scope: scope.label().to_string() });
        }
        let mut totals = DimensionVector::default();
        for v in values {
            totals += v;
        }
        let dimensions = Dimension::ALL
            .iter()
            .map(|&d| {
                let total = totals[d];
                let target = total / rep_count as f64;
                DimensionThreshold {
                    total,
                    target,
                    min: target * (1.0 - variance_pct),
                    max: target * (1.0 + variance_pct),
                }
            })
            .collect();
        Ok(Self { scope, rep_count, variance_pct, dimensions })
    }

    pub fn get(&self, dim: Dimension) -> &DimensionThreshold {
        &self.dimensions[dim.index()]
    }

    /// Hard ceiling for one rep on one dimension.
    pub fn capacity(&self, dim: Dimension, balance: &BalanceConfig) -> f64 {
        match (dim, balance.max_arr_per_rep) {
            (Dimension::Arr, Some(cap)) => cap,
            _ => self.get(dim).max,
        }
    }

    /// Relative deviation of a load from target; 0 when the target is 0.
    pub fn relative_deviation(&self, dim: Dimension, load: f64) -> f64 {
        let target = self.get(dim).target;
        if target > 0.0 { (load - target) / target } else { 0.0 }
    }

    pub fn ensure_scope(&self, scope: BalanceScope) -> AssignResult<()> {
        if self.scope != scope {
            return Err(AssignError::ThresholdScopeMismatch {
                expected: self.scope.label().to_string(),
                actual: scope.label().to_string(),
            });
        }
        Ok(())
    }
}
