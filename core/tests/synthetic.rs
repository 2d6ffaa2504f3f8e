mod common;

use common::{config, init_logging, run, small_synthetic, synthetic_config};
use std::collections::HashSet;
use territory_core::{
    config::EngineKind,
    event::WarningLog,
    normalizer::normalize,
    synthetic::{generate_book, pe_firm_reps, BookSpec, PE_FIRMS},
};

#[test]
fn roster_has_strategic_and_backfill_reps() {
    let spec = BookSpec { reps: 5, strategic_reps: 2, departing_reps: 2, ..BookSpec::default() };
    let input = generate_book(3, &spec);
    let ids: HashSet<&str> = input.reps.iter().map(|r| r.id.as_str()).collect();

    assert_eq!(input.reps.len(), 5 + 2 + 2);
    assert_eq!(input.reps.iter().filter(|r| r.is_strategic).count(), 2);
    let sources: Vec<_> = input.reps.iter().filter(|r| r.is_backfill_source).collect();
    assert_eq!(sources.len(), 2);
    for source in sources {
        let target = source.backfill_target_id.as_deref().expect("target set");
        assert!(ids.contains(target), "{target} missing from roster");
    }
}

#[test]
fn book_has_requested_accounts_and_valid_links() {
    let spec = BookSpec { accounts: 150, ..BookSpec::default() };
    let input = generate_book(11, &spec);
    let ids: HashSet<&str> = input.accounts.iter().map(|a| a.id.as_str()).collect();
    let reps: HashSet<&str> = input.reps.iter().map(|r| r.id.as_str()).collect();

    assert_eq!(input.accounts.len(), 150);
    assert_eq!(ids.len(), 150, "account ids are unique");
    assert!(input.accounts.iter().any(|a| a.parent_id.is_some()));
    for a in &input.accounts {
        if let Some(parent) = a.parent_id.as_deref() {
            assert!(ids.contains(parent), "{} has unknown parent {parent}", a.id);
        }
        if let Some(owner) = a.owner_id.as_deref() {
            assert!(reps.contains(owner), "{} has unknown owner {owner}", a.id);
        }
    }
    for o in &input.opportunities {
        assert!(ids.contains(o.account_id.as_str()));
    }
}

#[test]
fn pe_firms_map_to_an_assignable_rep() {
    let input = small_synthetic(5);
    let map = pe_firm_reps(&input);

    assert_eq!(map.len(), PE_FIRMS.len());
    for rep_id in map.values() {
        let rep = input.reps.iter().find(|r| &r.id == rep_id).expect("rep exists");
        assert!(!rep.is_strategic && !rep.is_backfill_source);
    }
}

#[test]
fn generated_book_normalizes_cleanly() {
    let input = small_synthetic(17);
    let mut warnings = WarningLog::new();
    let book = normalize(&input, &config(EngineKind::Waterfall), &mut warnings);

    assert_eq!(book.accounts.len(), input.accounts.len());
    assert_eq!(warnings.count("orphaned_child"), 0);
    assert_eq!(warnings.count("hierarchy_cycle"), 0);
    assert_eq!(warnings.count("unknown_owner"), 0);
}

#[test]
fn generated_book_runs_end_to_end() {
    init_logging();
    let input = small_synthetic(23);
    let run = run(synthetic_config(EngineKind::Waterfall, &input), &input);

    assert_eq!(run.assignments.len(), input.accounts.len());
    assert!(run.metrics.continuity_rate > 0.0);
    assert_eq!(run.scenario_id, "synthetic-23");
}
