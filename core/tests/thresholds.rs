mod common;

use chrono::Duration;
use common::{account, as_of, child, config, rep, scenario};
use territory_core::{
    config::{BalanceConfig, BalanceScope, EngineKind},
    error::AssignError,
    event::WarningLog,
    model::RawAccount,
    normalizer::normalize,
    thresholds::{family_values, BalanceThresholds, Dimension, DimensionVector},
};

fn vector(arr: f64, accounts: f64) -> DimensionVector {
    let mut v = DimensionVector::default();
    v[Dimension::Arr] = arr;
    v[Dimension::Accounts] = accounts;
    v
}

#[test]
fn targets_and_bounds_follow_variance() {
    let values = [vector(300.0, 1.0), vector(100.0, 1.0), vector(200.0, 2.0)];
    let t = BalanceThresholds::compute(values.iter(), 2, 0.10, BalanceScope::All).expect("thresholds");

    let arr = t.get(Dimension::Arr);
    assert_eq!(arr.total, 600.0);
    assert_eq!(arr.target, 300.0);
    assert!((arr.min - 270.0).abs() < 1e-9);
    assert!((arr.max - 330.0).abs() < 1e-9);
    assert_eq!(t.get(Dimension::Accounts).target, 2.0);
    assert!((t.relative_deviation(Dimension::Arr, 360.0) - 0.2).abs() < 1e-9);
    assert_eq!(t.relative_deviation(Dimension::Pipeline, 50.0), 0.0);
}

#[test]
fn zero_reps_is_an_error() {
    let err = BalanceThresholds::compute(std::iter::empty::<&DimensionVector>(), 0, 0.1, BalanceScope::Customers)
        .expect_err("no reps");
    assert!(matches!(err, AssignError::NoEligibleReps { .. }));
}

#[test]
fn absolute_arr_ceiling_replaces_computed_max() {
    let values = [vector(1_000.0, 1.0)];
    let t = BalanceThresholds::compute(values.iter(), 1, 0.10, BalanceScope::All).expect("thresholds");
    let mut balance = BalanceConfig::default();

    assert!((t.capacity(Dimension::Arr, &balance) - 1_100.0).abs() < 1e-9);
    balance.max_arr_per_rep = Some(5_000.0);
    assert_eq!(t.capacity(Dimension::Arr, &balance), 5_000.0);
    assert!(balance.capacity_dimensions().contains(&Dimension::Arr));
}

#[test]
fn thresholds_refuse_a_different_scope() {
    let t = BalanceThresholds::compute(std::iter::empty::<&DimensionVector>(), 3, 0.1, BalanceScope::Customers)
        .expect("thresholds");
    assert!(t.ensure_scope(BalanceScope::Customers).is_ok());
    let err = t.ensure_scope(BalanceScope::All).expect_err("scope mismatch");
    assert!(matches!(err, AssignError::ThresholdScopeMismatch { .. }));
}

#[test]
fn family_values_count_hierarchy_and_renewal_quarters() {
    let input = scenario(
        vec![
            RawAccount {
                tier: Some(1),
                risk: Some("at-risk".into()),
                renewal_date: Some(as_of() + Duration::days(10)),
                ..account("P", 100.0, "East", Some("R1"))
            },
            RawAccount {
                risk: Some("churn".into()),
                renewal_date: Some(as_of() + Duration::days(100)),
                ..child("C", "P", 50.0, "East", Some("R1"))
            },
        ],
        vec![rep("R1", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);
    let v = family_values(&book, &book.families[0]);

    assert_eq!(v[Dimension::Arr], 150.0);
    assert_eq!(v[Dimension::Accounts], 1.0);
    assert_eq!(v[Dimension::Tier1Accounts], 1.0);
    assert_eq!(v[Dimension::RiskAccounts], 2.0);
    assert_eq!(v[Dimension::RenewalsQ1], 1.0);
    assert_eq!(v[Dimension::RenewalsQ2], 1.0);
}
