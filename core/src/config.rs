use crate::{
    event::RunWarning,
    model::RiskSeverity,
    regions::{RegionEntry, RegionTable, TierEntry, TierTable},
    thresholds::Dimension,
    types::RepId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ── Engine selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Waterfall,
    Relaxed,
}

impl EngineKind {
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::Waterfall => "waterfall",
            EngineKind::Relaxed   => "relaxed",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "waterfall" => Some(EngineKind::Waterfall),
            "relaxed"   => Some(EngineKind::Relaxed),
            _ => None,
        }
    }
}

// ── Objectives ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub weight: f64,
}

impl Objective {
    fn on(weight: f64) -> Self {
        Self { enabled: true, weight }
    }

    fn effective(&self) -> f64 {
        if self.enabled { self.weight } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveWeights {
    pub continuity: Objective,
    pub geography: Objective,
    pub team_alignment: Objective,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            continuity: Objective::on(0.5),
            geography: Objective::on(0.3),
            team_alignment: Objective::on(0.2),
        }
    }
}

/// Weights actually applied to score terms; disabled objectives are zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectiveWeights {
    pub continuity: f64,
    pub geography: f64,
    pub team_alignment: f64,
}

impl ObjectiveWeights {
    pub fn effective(&self) -> EffectiveWeights {
        EffectiveWeights {
            continuity: self.continuity.effective(),
            geography: self.geography.effective(),
            team_alignment: self.team_alignment.effective(),
        }
    }
}

// ── Balance ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceScope {
    Customers,
    Prospects,
    #[default]
    All,
}

impl BalanceScope {
    pub fn label(&self) -> &'static str {
        match self {
            BalanceScope::Customers => "customers",
            BalanceScope::Prospects => "prospects",
            BalanceScope::All       => "all",
        }
    }

    pub fn includes(&self, is_customer: bool) -> bool {
        match self {
            BalanceScope::Customers => is_customer,
            BalanceScope::Prospects => !is_customer,
            BalanceScope::All       => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Relative penalty on a 0–1 scale, not a currency amount.
    #[serde(default)]
    pub penalty: f64,
    /// Whether the dimension's max bound limits how much a rep can take.
    #[serde(default)]
    pub capacity: bool,
}

impl DimensionConfig {
    pub fn disabled() -> Self {
        Self { enabled: false, penalty: 0.0, capacity: false }
    }

    fn on(penalty: f64, capacity: bool) -> Self {
        Self { enabled: true, penalty, capacity }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Global multiplier on every balance penalty.
    pub intensity: f64,
    /// Allowed relative deviation around target, e.g. 0.10 = ±10%.
    pub variance_pct: f64,
    pub scope: BalanceScope,
    /// Enforce capacity maxima as hard constraints in the relaxed engine.
    pub hard_caps: bool,
    /// Absolute per-rep ARR ceiling; replaces the computed ARR max when set.
    pub max_arr_per_rep: Option<f64>,
    /// Dimensions absent from the map are disabled.
    pub dimensions: BTreeMap<Dimension, DimensionConfig>,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        let dimensions = [
            (Dimension::Arr, DimensionConfig::on(1.0, true)),
            (Dimension::Accounts, DimensionConfig::on(0.5, true)),
            (Dimension::Atr, DimensionConfig::on(0.5, false)),
            (Dimension::Pipeline, DimensionConfig::on(0.5, false)),
            (Dimension::Tier1Accounts, DimensionConfig::on(0.3, false)),
            (Dimension::Tier2Accounts, DimensionConfig::on(0.2, false)),
            (Dimension::RiskAccounts, DimensionConfig::on(0.3, false)),
            (Dimension::RenewalsQ1, DimensionConfig::disabled()),
            (Dimension::RenewalsQ2, DimensionConfig::disabled()),
            (Dimension::RenewalsQ3, DimensionConfig::disabled()),
            (Dimension::RenewalsQ4, DimensionConfig::disabled()),
        ]
        .into_iter()
        .collect();
        Self {
            intensity: 1.0,
            variance_pct: 0.10,
            scope: BalanceScope::All,
            hard_caps: false,
            max_arr_per_rep: None,
            dimensions,
        }
    }
}

impl BalanceConfig {
    pub fn dimension(&self, dim: Dimension) -> DimensionConfig {
        self.dimensions
            .get(&dim)
            .copied()
            .unwrap_or_else(DimensionConfig::disabled)
    }

    pub fn is_enabled(&self, dim: Dimension) -> bool {
        self.dimension(dim).enabled
    }

    /// Dimensions that bound rep capacity. An absolute ARR ceiling makes
    /// ARR a capacity dimension whatever its flags say.
    pub fn capacity_dimensions(&self) -> Vec<Dimension> {
        Dimension::ALL
            .iter()
            .copied()
            .filter(|d| {
                let c = self.dimension(*d);
                (c.enabled && c.capacity)
                    || (*d == Dimension::Arr && self.max_arr_per_rep.is_some())
            })
            .collect()
    }
}

// ── Stability ────────────────────────────────────────────────────────────────

/// Longest lock window accepted, in days.
pub const MAX_WINDOW_DAYS: i64 = 3_650;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub risk_lock: bool,
    /// Accounts strictly above this severity are locked.
    pub risk_floor: RiskSeverity,
    pub renewal_lock: bool,
    pub renewal_window_days: i64,
    pub pe_firm_lock: bool,
    /// PE firm name → rep that owns that firm's portfolio.
    pub pe_firm_reps: BTreeMap<String, RepId>,
    pub recent_change_lock: bool,
    pub recent_change_days: i64,
    pub manual_lock: bool,
    pub backfill_migration: bool,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            risk_lock: true,
            risk_floor: RiskSeverity::PreRisk,
            renewal_lock: true,
            renewal_window_days: 90,
            pe_firm_lock: true,
            pe_firm_reps: BTreeMap::new(),
            recent_change_lock: true,
            recent_change_days: 90,
            manual_lock: true,
            backfill_migration: true,
        }
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuityParams {
    /// Score every non-owner gets; the owner's composite starts here too.
    pub base: f64,
    pub tenure_weight: f64,
    pub stability_weight: f64,
    pub value_weight: f64,
    pub max_days: f64,
    pub max_owners: f64,
    pub value_threshold: f64,
}

impl Default for ContinuityParams {
    fn default() -> Self {
        Self {
            base: 0.1,
            tenure_weight: 0.3,
            stability_weight: 0.2,
            value_weight: 0.4,
            max_days: 730.0,
            max_owners: 5.0,
            value_threshold: 250_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeographyScores {
    pub exact: f64,
    pub sibling: f64,
    pub parent: f64,
    pub global: f64,
    pub unknown: f64,
}

impl Default for GeographyScores {
    fn default() -> Self {
        Self { exact: 1.0, sibling: 0.65, parent: 0.4, global: 0.15, unknown: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamScores {
    pub same: f64,
    pub one_apart: f64,
    pub two_apart: f64,
    pub three_plus: f64,
    /// Extra deduction when the rep's tier is above the account's.
    pub reach_down_penalty: f64,
    pub unknown: f64,
}

impl Default for TeamScores {
    fn default() -> Self {
        Self {
            same: 1.0,
            one_apart: 0.6,
            two_apart: 0.3,
            three_plus: 0.1,
            reach_down_penalty: 0.15,
            unknown: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub continuity: ContinuityParams,
    pub geography: GeographyScores,
    pub team: TeamScores,
}

// ── Routing / solver ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Renewal specialists only take customers at or below this ARR.
    pub renewal_specialist_max_arr: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { renewal_specialist_max_arr: 25_000.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub timeout_secs: f64,
    /// Budget for each waterfall stage sub-problem.
    pub stage_timeout_secs: f64,
    pub node_limit: usize,
}

/// Longest solver budget accepted: one day.
pub const MAX_TIMEOUT_SECS: f64 = 86_400.0;

impl Default for SolverConfig {
    fn default() -> Self {
        Self { timeout_secs: 60.0, stage_timeout_secs: 10.0, node_limit: 5_000 }
    }
}

// ── Top level ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    pub engine: EngineKind,
    pub objectives: ObjectiveWeights,
    pub balance: BalanceConfig,
    pub stability: StabilityConfig,
    pub scoring: ScoringConfig,
    pub routing: RoutingConfig,
    pub solver: SolverConfig,
    pub regions: RegionTable,
    pub tiers: TierTable,
}

impl AssignmentConfig {
    /// Load from a data/ directory holding `assignment.json`,
    /// `regions.json` and `tiers.json`.
    /// In tests, use AssignmentConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/assignment.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let mut config = Self::from_json(&content)?;

        let region_path = format!("{data_dir}/regions.json");
        let region_content = std::fs::read_to_string(&region_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {region_path}: {e}"))?;
        config.regions = serde_json::from_str(&region_content)?;

        let tier_path = format!("{data_dir}/tiers.json");
        let tier_content = std::fs::read_to_string(&tier_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {tier_path}: {e}"))?;
        config.tiers = serde_json::from_str(&tier_content)?;

        Ok(config)
    }

    /// Parse a config object; absent fields take their defaults.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Config with hardcoded region and tier tables for use in tests.
    pub fn default_test() -> Self {
        let region = |name: &str, parent: Option<&str>| RegionEntry {
            name: name.into(),
            parent: parent.map(Into::into),
        };
        let tier = |name: &str, min: u64| TierEntry {
            name: name.into(),
            min_employees: Some(min),
        };
        Self {
            regions: RegionTable {
                regions: vec![
                    region("Global", None),
                    region("AMER", Some("Global")),
                    region("EMEA", Some("Global")),
                    region("APAC", Some("Global")),
                    region("East", Some("AMER")),
                    region("Central", Some("AMER")),
                    region("West", Some("AMER")),
                    region("UKI", Some("EMEA")),
                    region("DACH", Some("EMEA")),
                    region("ANZ", Some("APAC")),
                ],
                aliases: HashMap::from([
                    ("US East".to_string(), "East".to_string()),
                    ("Northeast".to_string(), "East".to_string()),
                ]),
            },
            tiers: TierTable {
                tiers: vec![
                    tier("SMB", 0),
                    tier("Commercial", 100),
                    tier("MidMarket", 500),
                    tier("Enterprise", 2_000),
                ],
                aliases: HashMap::from([
                    ("Mid-Market".to_string(), "MidMarket".to_string()),
                    ("ENT".to_string(), "Enterprise".to_string()),
                ]),
            },
            ..Self::default()
        }
    }

    /// Validate once at run start. Returns the corrected config and the
    /// warnings describing each correction.
    pub fn validated(&self) -> (Self, Vec<RunWarning>) {
        let mut cfg = self.clone();
        let mut warnings = Vec::new();

        let mut clamp = |field: &str, value: &mut f64, lo: f64, hi: f64, fallback: f64| {
            let fixed = if value.is_finite() { value.clamp(lo, hi) } else { fallback };
            if fixed != *value {
                warnings.push(RunWarning::ConfigValueClamped {
                    field: field.to_string(),
                    from: *value,
                    to: fixed,
                });
                *value = fixed;
            }
        };

        clamp("objectives.continuity.weight", &mut cfg.objectives.continuity.weight, 0.0, f64::MAX, 0.0);
        clamp("objectives.geography.weight", &mut cfg.objectives.geography.weight, 0.0, f64::MAX, 0.0);
        clamp("objectives.team_alignment.weight", &mut cfg.objectives.team_alignment.weight, 0.0, f64::MAX, 0.0);
        clamp("balance.intensity", &mut cfg.balance.intensity, 0.0, f64::MAX, 1.0);
        clamp("balance.variance_pct", &mut cfg.balance.variance_pct, 0.0, 1.0, 0.10);
        for (dim, dc) in cfg.balance.dimensions.iter_mut() {
            let field = format!("balance.dimensions.{}.penalty", dim.label());
            clamp(&field, &mut dc.penalty, 0.0, 1.0, 0.0);
        }
        let defaults = SolverConfig::default();
        clamp(
            "solver.timeout_secs",
            &mut cfg.solver.timeout_secs,
            0.001,
            MAX_TIMEOUT_SECS,
            defaults.timeout_secs,
        );
        clamp(
            "solver.stage_timeout_secs",
            &mut cfg.solver.stage_timeout_secs,
            0.001,
            MAX_TIMEOUT_SECS,
            defaults.stage_timeout_secs,
        );
        if let Some(cap) = cfg.balance.max_arr_per_rep.as_mut() {
            clamp("balance.max_arr_per_rep", cap, 0.0, f64::MAX, 0.0);
        }
        let stability = &mut cfg.stability;
        for (field, days) in [
            ("stability.renewal_window_days", &mut stability.renewal_window_days),
            ("stability.recent_change_days", &mut stability.recent_change_days),
        ] {
            let fixed = (*days).clamp(0, MAX_WINDOW_DAYS);
            if fixed != *days {
                warnings.push(RunWarning::ConfigValueClamped {
                    field: field.to_string(),
                    from: *days as f64,
                    to: fixed as f64,
                });
                *days = fixed;
            }
        }
        if cfg.solver.node_limit == 0 {
            cfg.solver.node_limit = defaults.node_limit;
        }

        let objectives = &mut cfg.objectives;
        let sum = objectives.continuity.effective()
            + objectives.geography.effective()
            + objectives.team_alignment.effective();
        if sum <= 0.0 {
            warnings.push(RunWarning::AllObjectivesDisabled);
            for o in [
                &mut objectives.continuity,
                &mut objectives.geography,
                &mut objectives.team_alignment,
            ] {
                *o = Objective::on(1.0 / 3.0);
            }
        } else if (sum - 1.0).abs() > 1e-9 {
            warnings.push(RunWarning::WeightsRenormalized { original_sum: sum });
            for o in [
                &mut objectives.continuity,
                &mut objectives.geography,
                &mut objectives.team_alignment,
            ] {
                o.weight = if o.enabled { o.weight / sum } else { 0.0 };
            }
        }

        (cfg, warnings)
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clamped(warnings: &[RunWarning], name: &str) -> Option<(f64, f64)> {
        warnings.iter().find_map(|w| match w {
            RunWarning::ConfigValueClamped { field, from, to } if field == name => Some((*from, *to)),
            _ => None,
        })
    }

    #[test]
    fn timeouts_are_capped_at_one_day() {
        let mut config = AssignmentConfig::default();
        config.solver.timeout_secs = 1e20;
        config.solver.stage_timeout_secs = f64::INFINITY;
        let (cfg, warnings) = config.validated();

        assert_eq!(cfg.solver.timeout_secs, MAX_TIMEOUT_SECS);
        assert_eq!(cfg.solver.stage_timeout_secs, SolverConfig::default().stage_timeout_secs);
        assert_eq!(clamped(&warnings, "solver.timeout_secs"), Some((1e20, MAX_TIMEOUT_SECS)));
        assert!(clamped(&warnings, "solver.stage_timeout_secs").is_some());
    }

    #[test]
    fn lock_windows_stay_within_ten_years() {
        let mut config = AssignmentConfig::default();
        config.stability.renewal_window_days = i64::MAX;
        config.stability.recent_change_days = -5;
        let (cfg, warnings) = config.validated();

        assert_eq!(cfg.stability.renewal_window_days, MAX_WINDOW_DAYS);
        assert_eq!(cfg.stability.recent_change_days, 0);
        assert_eq!(
            clamped(&warnings, "stability.renewal_window_days"),
            Some((i64::MAX as f64, MAX_WINDOW_DAYS as f64))
        );
        assert_eq!(clamped(&warnings, "stability.recent_change_days"), Some((-5.0, 0.0)));
    }

    #[test]
    fn defaults_pass_untouched() {
        let (_, warnings) = AssignmentConfig::default().validated();
        assert!(clamped(&warnings, "solver.timeout_secs").is_none());
        assert!(clamped(&warnings, "stability.renewal_window_days").is_none());
    }
}
