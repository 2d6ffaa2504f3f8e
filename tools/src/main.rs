//! assign-runner: headless territory assignment runner.
//!
//! Usage:
//!   assign-runner --book scenario.json --engine relaxed --db plan.db
//!   assign-runner --synthetic --seed 12345 --accounts 400 --reps 12
//!   assign-runner --synthetic --json run.json

use anyhow::Result;
use std::env;
use territory_core::{
    assignment::AssignmentRun,
    config::{AssignmentConfig, EngineKind},
    engine::{AssignmentEngine, RunOptions},
    model::ScenarioInput,
    store::AssignmentStore,
    synthetic::{generate_book, pe_firm_reps, BookSpec},
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let accounts = parse_arg(&args, "--accounts", 200usize);
    let reps = parse_arg(&args, "--reps", 10usize);
    let synthetic = args.iter().any(|a| a == "--synthetic");
    let book_path = flag_value(&args, "--book");
    let json_out = flag_value(&args, "--json");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let engine_flag = flag_value(&args, "--engine");

    let mut config = if std::path::Path::new(data_dir).join("assignment.json").exists() {
        AssignmentConfig::load(data_dir)?
    } else {
        log::warn!("no config under {data_dir}; using built-in defaults");
        AssignmentConfig::default_test()
    };
    let engine = match engine_flag {
        Some(label) => EngineKind::from_label(label)
            .ok_or_else(|| anyhow::anyhow!("unknown engine '{label}' (waterfall | relaxed)"))?,
        None => config.engine,
    };

    let input = match (book_path, synthetic) {
        (Some(path), _) => ScenarioInput::load(path)?,
        (None, true) => {
            let spec = BookSpec {
                scenario_id: format!("synthetic-{seed}"),
                accounts,
                reps,
                ..BookSpec::default()
            };
            let input = generate_book(seed, &spec);
            if config.stability.pe_firm_reps.is_empty() {
                config.stability.pe_firm_reps = pe_firm_reps(&input);
            }
            input
        }
        (None, false) => anyhow::bail!("pass --book <path> or --synthetic"),
    };

    println!("Territory assignment: assign-runner");
    println!("  scenario:  {}", input.scenario_id);
    println!("  engine:    {}", engine.label());
    println!("  accounts:  {}", input.accounts.len());
    println!("  reps:      {}", input.reps.len());
    println!("  db:        {db}");
    println!("  data_dir:  {data_dir}");
    println!();

    let store = AssignmentStore::open(db)?;
    store.migrate()?;

    let runner = AssignmentEngine::new(config);
    let run = runner.run_with(
        &input,
        RunOptions {
            engine: Some(engine),
            ..RunOptions::default()
        },
    )?;
    store.replace_assignments(&run)?;

    print_summary(&run, &store)?;

    if let Some(path) = json_out {
        std::fs::write(path, serde_json::to_string_pretty(&run)?)?;
        println!();
        println!("Run written to {path}");
    }
    Ok(())
}

fn print_summary(run: &AssignmentRun, store: &AssignmentStore) -> Result<()> {
    let t = &run.telemetry;
    let m = &run.metrics;
    let stored = store.assignment_count(&run.scenario_id)?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:          {}", run.run_id);
    println!("  engine:          {}", run.engine.label());
    println!("  solver:          {}", t.solver);
    println!(
        "  solver status:   {}",
        t.solver_status.map(|s| s.label()).unwrap_or("n/a")
    );
    println!("  families:        {} ({} locked, {} strategic)", t.families, t.locked_families, t.strategic_families);
    println!("  accounts:        {} ({stored} stored)", t.accounts);
    println!("  model size:      {} vars / {} rows", t.variables, t.constraints);
    println!("  solve time:      {} ms", t.solve_ms);
    println!("  total time:      {} ms", t.total_ms);

    if !t.stages.is_empty() {
        println!();
        println!("=== STAGES ===");
        for s in &t.stages {
            println!(
                "  {:<22} candidates {:>5}  assigned {:>5}  {:>6} ms  {}",
                s.stage.label(),
                s.candidates,
                s.assigned,
                s.elapsed_ms,
                s.status.map(|st| st.label()).unwrap_or("-"),
            );
        }
    }

    println!();
    println!("=== OUTCOMES ===");
    println!("  continuity:      {:.1}%", m.continuity_rate * 100.0);
    println!("  hv continuity:   {:.1}%", m.high_value_continuity_rate * 100.0);
    println!("  moved accounts:  {}", m.moved_accounts);
    println!("  geo exact:       {:.1}%", m.geography.exact * 100.0);
    println!("  tier exact:      {:.1}%", m.tier.exact * 100.0);
    match m.arr_max_min_ratio {
        Some(r) => println!("  ARR max/min:     {r:.2}"),
        None => println!("  ARR max/min:     n/a (empty rep)"),
    }
    println!("  over capacity:   {}", m.over_capacity_assignments);

    println!();
    println!("=== REP LOADS ===");
    for r in &m.rep_loads {
        let arr = r
            .loads
            .get(&territory_core::thresholds::Dimension::Arr)
            .copied()
            .unwrap_or(0.0);
        println!(
            "  {:<10} {:>4} accts  ARR {:>14.0}  ({:+.1}% vs target){}{}",
            r.rep_id,
            r.accounts,
            arr,
            r.arr_variance_pct,
            if r.strategic { "  [strategic]" } else { "" },
            if r.over_capacity { "  [over capacity]" } else { "" },
        );
    }

    if !run.warnings.is_empty() {
        println!();
        println!("=== WARNINGS ({}) ===", run.warnings.len());
        let mut kinds: Vec<&str> = run.warnings.iter().map(|w| w.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        for kind in kinds {
            println!("  {:<32} {}", kind, run.warning_count(kind));
        }
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
