//! Waterfall assignment engine: the priority cascade.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   P0 Holdover              locked and strategic families (holdover.rs)
//!   P1 Continuity+Geography  current owner, same region, with room
//!   P2 Geography             any same-region rep with room
//!   P3 Continuity            current owner in any region, with room
//!   P4 Balance               any eligible rep with room, nearest to target
//!   Residual                 least-loaded eligible rep, over capacity if need be
//!
//! RULES:
//!   - P1–P4 each solve one assignment sub-problem over the families still
//!     unplaced: at most one rep per family, per-rep capacity rows built
//!     from the stage's starting snapshot, maximise the stage objective.
//!   - A stage never revisits an earlier stage's decisions. The cascade is
//!     myopic on purpose; a better global answer is the relaxed engine's job.
//!   - A failed stage solve places nothing; its families fall through.
//!   - P4 prices each rep's deviation from target with the shared
//!     piecewise penalty, on top of the load earlier stages left there.
//!     Every placement is worth more than the worst penalty it can add,
//!     so balance decides where a family goes, never whether.

use crate::{
    config::EngineKind,
    deviation::{add_deviation_row, MAX_SLOPE},
    eligibility::Pool,
    error::AssignResult,
    event::{RunWarning, WarningLog},
    holdover::holdover_stage,
    regions::RegionMatch,
    snapshot::{CapacitySnapshot, StageDelta},
    solver::{LpProblem, Sense, SolveStatus},
    strategy::{
        AssignmentRule, AssignmentStrategy, Placement, RunContext, Stage, StageReport,
        StrategyOutcome,
    },
    thresholds::Dimension,
};
use std::cmp::Ordering;

/// Small reward for placing a family at all, so zero-score pairs still land.
const PLACEMENT_BONUS: f64 = 1e-3;

const SOLVED_STAGES: [Stage; 4] = [
    Stage::ContinuityGeography,
    Stage::Geography,
    Stage::Continuity,
    Stage::Balance,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct WaterfallEngine;

impl WaterfallEngine {
    pub fn new() -> Self {
        Self
    }
}

fn stage_rule(stage: Stage) -> AssignmentRule {
    match stage {
        Stage::ContinuityGeography => AssignmentRule::ContinuityGeography,
        Stage::Geography => AssignmentRule::Geography,
        Stage::Continuity => AssignmentRule::Continuity,
        Stage::Residual => AssignmentRule::Residual,
        _ => AssignmentRule::Balance,
    }
}

/// Whether `stage` may consider putting `family` on `rep` at all.
fn admits(ctx: &RunContext<'_>, stage: Stage, family: usize, rep: usize) -> bool {
    let head = ctx.book.families[family].head;
    let is_owner = ctx.owner_of(family) == Some(rep);
    let exact = ctx.scores.region_match(head, rep) == RegionMatch::Exact;
    match stage {
        Stage::ContinuityGeography => is_owner && exact,
        Stage::Geography => exact,
        Stage::Continuity => is_owner,
        _ => true,
    }
}

/// (dimension, target, weight) of every balance row P4 prices.
fn balance_terms(ctx: &RunContext<'_>) -> Vec<(Dimension, f64, f64)> {
    Dimension::ALL
        .iter()
        .filter_map(|&d| {
            let dc = ctx.config.balance.dimension(d);
            let target = ctx.general.get(d).target;
            (dc.enabled && dc.penalty > 0.0 && target > 0.0).then_some((d, target, dc.penalty))
        })
        .collect()
}

fn objective(ctx: &RunContext<'_>, terms: &[(Dimension, f64, f64)], stage: Stage, family: usize, rep: usize) -> f64 {
    let score = ctx.family_score(family, rep);
    match stage {
        Stage::Balance => {
            let worst_penalty: f64 = terms
                .iter()
                .map(|&(d, target, weight)| weight * MAX_SLOPE * ctx.values[family][d] / target)
                .sum();
            1.0 + worst_penalty + PLACEMENT_BONUS * score
        }
        _ => score + PLACEMENT_BONUS,
    }
}

fn fits(ctx: &RunContext<'_>, snapshot: &CapacitySnapshot, family: usize, rep: usize) -> bool {
    ctx.capacity_dims
        .iter()
        .all(|&d| ctx.values[family][d] <= snapshot.headroom(ctx, rep, d) + 1e-9)
}

fn pending(ctx: &RunContext<'_>, snapshot: &CapacitySnapshot) -> Vec<usize> {
    ctx.eligibility
        .families_in(Pool::General)
        .filter(|&f| !snapshot.is_placed(f))
        .collect()
}

/// One solved stage (P1–P4).
fn solve_stage(
    ctx: &RunContext<'_>,
    snapshot: &CapacitySnapshot,
    stage: Stage,
    warnings: &mut WarningLog,
) -> (StageDelta, StageReport) {
    let families = pending(ctx, snapshot);
    let mut report = StageReport::new(stage, families.len());
    let mut delta = StageDelta::new(stage);

    let terms = if stage == Stage::Balance { balance_terms(ctx) } else { Vec::new() };

    // ── Variables and one-per-family rows ────────────────────────────────
    let mut problem = LpProblem::new();
    let mut pairs: Vec<(usize, usize, usize)> = Vec::new();
    for &f in &families {
        let head_id = &ctx.book.accounts[ctx.book.families[f].head].id;
        let mut row = Vec::new();
        for &r in ctx.eligibility.eligible(f) {
            if !admits(ctx, stage, f, r) || !fits(ctx, snapshot, f, r) {
                continue;
            }
            let coef = objective(ctx, &terms, stage, f, r);
            let var = problem.add_binary(format!("x_{head_id}_{}", ctx.book.reps[r].id), coef);
            pairs.push((f, r, var));
            row.push((var, 1.0));
        }
        if !row.is_empty() {
            problem.add_constraint(format!("one_{head_id}"), row, Sense::Le, 1.0);
        }
    }
    if pairs.is_empty() {
        return (delta, report);
    }

    // ── Capacity rows from the starting snapshot ─────────────────────────
    for &r in ctx.eligibility.reps(Pool::General) {
        for &d in &ctx.capacity_dims {
            let row: Vec<(usize, f64)> = pairs
                .iter()
                .filter(|&&(f, rep, _)| rep == r && ctx.values[f][d] > 0.0)
                .map(|&(f, _, var)| (var, ctx.values[f][d]))
                .collect();
            if !row.is_empty() {
                let name = format!("cap_{}_{}", ctx.book.reps[r].id, d.label());
                problem.add_constraint(name, row, Sense::Le, d.bound(snapshot.headroom(ctx, r, d)));
            }
        }
    }

    // ── Balance rows (P4) ────────────────────────────────────────────────
    for &r in ctx.eligibility.reps(Pool::General) {
        if !pairs.iter().any(|&(_, rep, _)| rep == r) {
            continue;
        }
        for &(d, target, weight) in &terms {
            let row: Vec<(usize, f64)> = pairs
                .iter()
                .filter(|&&(f, rep, _)| rep == r && ctx.values[f][d] > 0.0)
                .map(|&(f, _, var)| (var, ctx.values[f][d] / target))
                .collect();
            let name = format!("{}_{}", ctx.book.reps[r].id, d.label());
            let base = snapshot.load(r)[d] / target;
            add_deviation_row(&mut problem, &name, row, base, weight);
        }
    }

    let solution = ctx
        .solver
        .solve(&problem, &ctx.solve_limits(ctx.config.solver.stage_timeout_secs));
    report.variables = problem.variables.len();
    report.constraints = problem.constraints.len();
    report.status = Some(solution.status);
    report.elapsed_ms = solution.elapsed_ms;

    let Some(x) = solution.values else {
        warnings.push(RunWarning::StageSolverFailed {
            stage: stage.label().to_string(),
            status: solution.status.label().to_string(),
            detail: solution.detail,
        });
        return (delta, report);
    };
    for &(f, r, var) in &pairs {
        if x[var] > 0.5 {
            let placement = Placement { family: f, rep: r, rule: stage_rule(stage), over_capacity: false };
            delta.push(placement, &ctx.values[f]);
        }
    }
    report.assigned = delta.len();
    (delta, report)
}

/// Force every remaining family onto its least-loaded eligible rep.
/// Largest families go first so the smallest ones even out the tail.
fn residual_stage(
    ctx: &RunContext<'_>,
    snapshot: &CapacitySnapshot,
    warnings: &mut WarningLog,
) -> (StageDelta, StageReport) {
    let mut families = pending(ctx, snapshot);
    families.sort_by(|&a, &b| {
        ctx.values[b][Dimension::Arr]
            .total_cmp(&ctx.values[a][Dimension::Arr])
            .then(a.cmp(&b))
    });
    let mut report = StageReport::new(Stage::Residual, families.len());
    let mut delta = StageDelta::new(Stage::Residual);

    for f in families {
        let least_loaded = ctx.eligibility.eligible(f).iter().copied().min_by(|&a, &b| {
            let la = delta.load_over(snapshot, a);
            let lb = delta.load_over(snapshot, b);
            la[Dimension::Arr]
                .total_cmp(&lb[Dimension::Arr])
                .then(la[Dimension::Accounts].total_cmp(&lb[Dimension::Accounts]))
                .then(a.cmp(&b))
        });
        let Some(rep) = least_loaded else {
            continue;
        };
        let mut load = delta.load_over(snapshot, rep);
        load += &ctx.values[f];
        let over_capacity = ctx.exceeds_capacity(rep, &load);
        if over_capacity {
            warnings.push(RunWarning::ForcedOverCapacity {
                account_id: ctx.book.accounts[ctx.book.families[f].head].id.clone(),
                rep_id: ctx.book.reps[rep].id.clone(),
            });
        }
        let placement = Placement { family: f, rep, rule: AssignmentRule::Residual, over_capacity };
        delta.push(placement, &ctx.values[f]);
    }

    report.assigned = delta.len();
    (delta, report)
}

/// Worse statuses sort later.
fn severity(status: SolveStatus) -> u8 {
    match status {
        SolveStatus::Optimal    => 0,
        SolveStatus::Feasible   => 1,
        SolveStatus::TimedOut   => 2,
        SolveStatus::Infeasible => 3,
        SolveStatus::Error      => 4,
    }
}

impl AssignmentStrategy for WaterfallEngine {
    fn name(&self) -> &'static str {
        "waterfall"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Waterfall
    }

    fn assign(&self, ctx: &RunContext<'_>, warnings: &mut WarningLog) -> AssignResult<StrategyOutcome> {
        let mut snapshot = CapacitySnapshot::empty(ctx.book.reps.len(), ctx.book.families.len());
        let mut outcome = StrategyOutcome::default();

        let mut record = |snapshot: &mut CapacitySnapshot, delta: StageDelta, report: StageReport| {
            log::info!(
                "waterfall: {} placed {}/{} families",
                report.stage.label(),
                report.assigned,
                report.candidates,
            );
            *snapshot = snapshot.apply(&delta);
            outcome.variables += report.variables;
            outcome.constraints += report.constraints;
            outcome.solve_ms += report.elapsed_ms;
            if let Some(status) = report.status {
                let worse = outcome
                    .solver_status
                    .map_or(true, |s| severity(status).cmp(&severity(s)) == Ordering::Greater);
                if worse {
                    outcome.solver_status = Some(status);
                }
            }
            outcome.placements.extend(delta.placements);
            outcome.stages.push(report);
        };

        let (delta, report) = holdover_stage(ctx, &snapshot, warnings);
        record(&mut snapshot, delta, report);

        for stage in SOLVED_STAGES {
            let (delta, report) = solve_stage(ctx, &snapshot, stage, warnings);
            record(&mut snapshot, delta, report);
        }

        let (delta, report) = residual_stage(ctx, &snapshot, warnings);
        record(&mut snapshot, delta, report);

        Ok(outcome)
    }
}
