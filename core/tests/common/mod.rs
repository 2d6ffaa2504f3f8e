//! Shared builders for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use territory_core::{
    assignment::AssignmentRun,
    config::{AssignmentConfig, EngineKind},
    engine::{AssignmentEngine, RunOptions},
    error::AssignResult,
    model::{RawAccount, RawRep, ScenarioInput},
};

pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).single().expect("valid time")
}

pub fn rep(id: &str, region: &str) -> RawRep {
    RawRep {
        id: id.into(),
        name: Some(format!("Rep {id}")),
        region: Some(region.into()),
        ..RawRep::default()
    }
}

pub fn strategic_rep(id: &str, region: &str) -> RawRep {
    RawRep { is_strategic: true, ..rep(id, region) }
}

pub fn account(id: &str, arr: f64, region: &str, owner: Option<&str>) -> RawAccount {
    RawAccount {
        id: id.into(),
        arr: Some(arr),
        region: Some(region.into()),
        owner_id: owner.map(Into::into),
        ..RawAccount::default()
    }
}

pub fn child(id: &str, parent: &str, arr: f64, region: &str, owner: Option<&str>) -> RawAccount {
    RawAccount {
        parent_id: Some(parent.into()),
        ..account(id, arr, region, owner)
    }
}

pub fn scenario(accounts: Vec<RawAccount>, reps: Vec<RawRep>) -> ScenarioInput {
    ScenarioInput {
        scenario_id: "test-scenario".into(),
        as_of: as_of(),
        accounts,
        reps,
        opportunities: Vec::new(),
    }
}

/// Test config with region/tier tables and small solver budgets.
pub fn config(engine: EngineKind) -> AssignmentConfig {
    let mut config = AssignmentConfig::default_test();
    config.engine = engine;
    config.solver.timeout_secs = 20.0;
    config.solver.stage_timeout_secs = 5.0;
    config
}

pub fn options() -> RunOptions {
    RunOptions {
        run_id: Some("test-run".into()),
        generated_at: Some(fixed_time()),
        ..RunOptions::default()
    }
}

pub fn try_run(config: AssignmentConfig, input: &ScenarioInput) -> AssignResult<AssignmentRun> {
    AssignmentEngine::new(config).run_with(input, options())
}

pub fn run(config: AssignmentConfig, input: &ScenarioInput) -> AssignmentRun {
    try_run(config, input).expect("assignment run")
}

/// Four general reps in two AMER regions, evenly owned accounts.
pub fn balanced_book() -> ScenarioInput {
    let reps = vec![
        rep("R1", "East"),
        rep("R2", "East"),
        rep("R3", "West"),
        rep("R4", "West"),
    ];
    let mut accounts = Vec::new();
    for (i, owner) in ["R1", "R2", "R3", "R4"].iter().cycle().take(12).enumerate() {
        let region = if i % 4 < 2 { "East" } else { "West" };
        accounts.push(account(&format!("A{:02}", i + 1), 100_000.0, region, Some(owner)));
    }
    scenario(accounts, reps)
}

/// Σ ARR per rep over the run's assignments.
pub fn arr_by_rep(run: &AssignmentRun, input: &ScenarioInput) -> std::collections::BTreeMap<String, f64> {
    let mut out = std::collections::BTreeMap::new();
    for a in &run.assignments {
        let arr = input
            .accounts
            .iter()
            .find(|r| r.id == a.account_id)
            .and_then(|r| r.arr)
            .unwrap_or(0.0);
        *out.entry(a.rep_id.clone()).or_insert(0.0) += arr;
    }
    out
}

/// Route engine logs through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config for synthetic books: deterministic node limits, generous clocks.
pub fn synthetic_config(engine: EngineKind, input: &ScenarioInput) -> AssignmentConfig {
    let mut config = config(engine);
    config.solver.timeout_secs = 120.0;
    config.solver.stage_timeout_secs = 120.0;
    config.solver.node_limit = 40;
    config.stability.pe_firm_reps = territory_core::synthetic::pe_firm_reps(input);
    config
}

pub fn small_synthetic(seed: u64) -> ScenarioInput {
    let spec = territory_core::synthetic::BookSpec {
        scenario_id: format!("synthetic-{seed}"),
        accounts: 48,
        reps: 6,
        ..territory_core::synthetic::BookSpec::default()
    };
    territory_core::synthetic::generate_book(seed, &spec)
}
