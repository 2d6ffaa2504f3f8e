mod common;

use chrono::Duration;
use common::{balanced_book, config, fixed_time, options, run};
use territory_core::{
    config::EngineKind,
    engine::{AssignmentEngine, RunOptions},
    store::AssignmentStore,
};

fn migrated_store() -> AssignmentStore {
    let store = AssignmentStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

#[test]
fn migrations_are_repeatable() {
    let store = migrated_store();
    store.migrate().expect("second migration is a no-op");
    assert_eq!(store.assignment_count("nothing-yet").expect("count"), 0);
    assert!(store.latest_run("nothing-yet").expect("query").is_none());
}

#[test]
fn persisted_run_reads_back() {
    let store = migrated_store();
    let input = balanced_book();
    let run = run(config(EngineKind::Waterfall), &input);
    store.replace_assignments(&run).expect("persist");

    assert_eq!(store.assignment_count(&input.scenario_id).expect("count"), 12);
    let stored = store.assignments_for_scenario(&input.scenario_id).expect("read");
    assert_eq!(stored.len(), run.assignments.len());
    for (s, a) in stored.iter().zip(&run.assignments) {
        assert_eq!(s.account_id, a.account_id);
        assert_eq!(s.rep_id, a.rep_id);
        assert_eq!(s.rule, a.rule);
        assert_eq!(s.rationale, a.rationale);
        assert_eq!(s.over_capacity, a.over_capacity);
        assert_eq!(s.generated_at, a.generated_at);
    }
    assert_eq!(
        store.rep_for_account(&input.scenario_id, "A01").expect("lookup").as_deref(),
        run.rep_of("A01")
    );
    assert_eq!(store.rep_for_account(&input.scenario_id, "NOPE").expect("lookup"), None);

    let record = store.latest_run(&input.scenario_id).expect("query").expect("run stored");
    assert_eq!(record.run_id, "test-run");
    assert_eq!(record.engine, EngineKind::Waterfall);
    assert_eq!(record.accounts, 12);
    assert_eq!(record.generated_at, fixed_time());
    assert_eq!(record.metrics.assigned_accounts, 12);
}

#[test]
fn second_run_replaces_the_whole_set() {
    let store = migrated_store();
    let mut input = balanced_book();
    let first = run(config(EngineKind::Waterfall), &input);
    store.replace_assignments(&first).expect("persist first");

    input.accounts.truncate(8);
    let second = AssignmentEngine::new(config(EngineKind::Relaxed))
        .run_with(
            &input,
            RunOptions {
                run_id: Some("second-run".into()),
                generated_at: Some(fixed_time() + Duration::hours(1)),
                ..options()
            },
        )
        .expect("second run");
    store.replace_assignments(&second).expect("persist second");

    assert_eq!(store.assignment_count(&input.scenario_id).expect("count"), 8);
    assert_eq!(store.rep_for_account(&input.scenario_id, "A12").expect("lookup"), None);
    assert_eq!(store.run_count(&input.scenario_id).expect("runs"), 2);
    let latest = store.latest_run(&input.scenario_id).expect("query").expect("latest");
    assert_eq!(latest.run_id, "second-run");
    assert_eq!(latest.engine, EngineKind::Relaxed);
}

#[test]
fn scenarios_are_stored_independently() {
    let store = migrated_store();
    let mut input = balanced_book();
    let run_a = run(config(EngineKind::Waterfall), &input);
    store.replace_assignments(&run_a).expect("persist a");

    input.scenario_id = "other-scenario".into();
    let run_b = AssignmentEngine::new(config(EngineKind::Waterfall))
        .run_with(&input, RunOptions { run_id: Some("other-run".into()), ..options() })
        .expect("run b");
    store.replace_assignments(&run_b).expect("persist b");

    assert_eq!(store.assignment_count("test-scenario").expect("count"), 12);
    assert_eq!(store.assignment_count("other-scenario").expect("count"), 12);
    assert_eq!(store.run_count("test-scenario").expect("runs"), 1);
}

#[test]
fn file_store_is_visible_to_a_second_connection() {
    let path = std::env::temp_dir().join(format!("territory-store-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let path_str = path.to_str().expect("utf-8 temp path");
    let input = balanced_book();
    let run = run(config(EngineKind::Relaxed), &input);
    {
        let writer = AssignmentStore::open(path_str).expect("open file store");
        writer.migrate().expect("migration");
        writer.replace_assignments(&run).expect("persist");
    }

    let reader = AssignmentStore::open(path_str).expect("reopen file store");
    reader.migrate().expect("migrations are repeatable on a file");
    assert_eq!(reader.assignment_count(&input.scenario_id).expect("count"), 12);
    let record = reader.latest_run(&input.scenario_id).expect("query").expect("run stored");
    assert_eq!(record.engine, EngineKind::Relaxed);

    drop(reader);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}
