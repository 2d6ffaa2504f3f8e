mod common;

use common::{account, as_of, child, config, rep, scenario};
use territory_core::{
    config::EngineKind,
    event::WarningLog,
    model::{OpportunityKind, RawAccount, RawOpportunity, RiskSeverity},
    normalizer::normalize,
};

#[test]
fn children_roll_into_parent_and_split_children_stand_alone() {
    let input = scenario(
        vec![
            account("P", 100.0, "East", Some("R1")),
            child("C1", "P", 50.0, "East", Some("R1")),
            child("C2", "P", 30.0, "East", Some("R2")),
        ],
        vec![rep("R1", "East"), rep("R2", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    let parent = book.account("P").expect("parent");
    let totals = parent.hierarchy.expect("parent totals");
    assert_eq!(totals.arr, 150.0, "split child must not roll up");
    assert_eq!(totals.split_children, 1);
    assert!(parent.has_split_ownership());

    let split = book.account("C2").expect("split child");
    assert!(split.is_split_child);
    assert!(split.is_customer);

    assert_eq!(book.families.len(), 2);
    let p = book.account_idx("P").expect("P index");
    let family = book.families.iter().find(|f| f.head == p).expect("parent family");
    assert_eq!(family.followers, vec![book.account_idx("C1").expect("C1 index")]);
    assert!(warnings.as_slice().is_empty());
}

#[test]
fn grandchildren_resolve_to_the_ultimate_parent() {
    let input = scenario(
        vec![
            account("TOP", 10.0, "East", Some("R1")),
            child("MID", "TOP", 10.0, "East", Some("R1")),
            child("LEAF", "MID", 10.0, "East", Some("R1")),
        ],
        vec![rep("R1", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    assert_eq!(book.account("LEAF").and_then(|a| a.parent_id.as_deref()), Some("TOP"));
    assert_eq!(book.families.len(), 1);
    assert_eq!(book.account("TOP").and_then(|a| a.hierarchy).map(|h| h.arr), Some(30.0));
}

#[test]
fn orphans_and_cycles_are_promoted_with_warnings() {
    let input = scenario(
        vec![
            child("ORPHAN", "GONE", 10.0, "East", None),
            child("X", "Y", 10.0, "East", None),
            child("Y", "X", 10.0, "East", None),
        ],
        vec![rep("R1", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    assert_eq!(warnings.count("orphaned_child"), 1);
    assert_eq!(warnings.count("hierarchy_cycle"), 2);
    assert!(book.accounts.iter().all(|a| a.is_parent));
    assert_eq!(book.families.len(), 3);
}

#[test]
fn chain_into_a_cycle_joins_the_member_it_reaches() {
    let input = scenario(
        vec![
            child("TAIL", "MID", 5.0, "East", None),
            child("MID", "X", 5.0, "East", None),
            child("X", "Y", 10.0, "East", None),
            child("Y", "X", 10.0, "East", None),
        ],
        vec![rep("R1", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    assert_eq!(warnings.count("hierarchy_cycle"), 2);
    for id in ["TAIL", "MID"] {
        let a = book.account(id).expect("chain member");
        assert!(!a.is_parent);
        assert_eq!(a.parent_id.as_deref(), Some("X"));
    }
    assert_eq!(book.families.len(), 2);
    assert_eq!(book.account("X").and_then(|a| a.hierarchy).map(|h| h.arr), Some(20.0));
}

#[test]
fn split_children_are_counted_per_parent() {
    let input = scenario(
        vec![
            account("P1", 100.0, "East", Some("R1")),
            child("P1-A", "P1", 10.0, "East", Some("R2")),
            child("P1-B", "P1", 10.0, "East", Some("R2")),
            child("P1-C", "P1", 10.0, "East", Some("R1")),
            account("P2", 100.0, "East", Some("R2")),
            child("P2-A", "P2", 10.0, "East", Some("R1")),
        ],
        vec![rep("R1", "East"), rep("R2", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    let split = |id: &str| book.account(id).and_then(|a| a.hierarchy).map(|h| h.split_children);
    assert_eq!(split("P1"), Some(2));
    assert_eq!(split("P2"), Some(1));
}

#[test]
fn pending_owner_wins_and_unknown_owner_is_dropped() {
    let input = scenario(
        vec![
            RawAccount {
                pending_owner_id: Some("R2".into()),
                ..account("A1", 10.0, "East", Some("R1"))
            },
            account("A2", 10.0, "East", Some("NOBODY")),
        ],
        vec![rep("R1", "East"), rep("R2", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    assert_eq!(book.account("A1").and_then(|a| a.owner_id.as_deref()), Some("R2"));
    assert_eq!(book.account("A2").and_then(|a| a.owner_id.as_deref()), None);
    assert_eq!(warnings.count("unknown_owner"), 1);
}

#[test]
fn duplicates_keep_the_first_record() {
    let input = scenario(
        vec![account("A1", 10.0, "East", None), account("A1", 99.0, "East", None)],
        vec![rep("R1", "East"), rep("R1", "West")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    assert_eq!(book.accounts.len(), 1);
    assert_eq!(book.accounts[0].own.arr, 10.0);
    assert_eq!(book.reps.len(), 1);
    assert_eq!(book.reps[0].region, "East");
    assert_eq!(warnings.count("duplicate_record"), 2);
}

#[test]
fn opportunities_override_raw_values() {
    let mut input = scenario(
        vec![account("A1", 10.0, "East", Some("R1"))],
        vec![rep("R1", "East")],
    );
    let renewal_date = as_of() + chrono::Duration::days(45);
    input.opportunities = vec![
        RawOpportunity {
            id: "O1".into(),
            account_id: "A1".into(),
            kind: OpportunityKind::Renewal,
            amount: 500.0,
            available_to_renew: Some(450.0),
            renewal_date: Some(renewal_date),
        },
        RawOpportunity {
            id: "O2".into(),
            account_id: "A1".into(),
            kind: OpportunityKind::NewBusiness,
            amount: 200.0,
            ..RawOpportunity::default()
        },
    ];
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);
    let a = book.account("A1").expect("A1");

    assert_eq!(a.own.arr, 500.0);
    assert_eq!(a.own.atr, 450.0);
    assert_eq!(a.own.pipeline, 200.0);
    assert_eq!(a.renewal_date, Some(renewal_date));
}

#[test]
fn prospects_team_tiers_and_risk_labels() {
    let input = scenario(
        vec![
            RawAccount {
                employees: Some(600),
                risk: Some("At Risk".into()),
                ..account("A1", 0.0, "Northeast", None)
            },
            RawAccount {
                team_tier: Some("Galactic".into()),
                ..account("A2", 10.0, "Atlantis", None)
            },
        ],
        vec![rep("R1", "East")],
    );
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    let a1 = book.account("A1").expect("A1");
    assert!(!a1.is_customer, "zero ARR is a prospect");
    assert_eq!(a1.team_tier.as_deref(), Some("MidMarket"));
    assert_eq!(a1.risk, RiskSeverity::AtRisk);
    assert_eq!(warnings.count("unknown_region"), 1, "aliases resolve, Atlantis does not");
    assert_eq!(warnings.count("unknown_tier"), 1);
}
