//! Relaxed (global) optimization engine. One MIP over the whole pool.
//!
//! Model, with every balance and cap row divided by the dimension target:
//!   x[f,r] ∈ {0,1}  family head f on rep r, one per eligible pair
//!   y[c,r] ∈ [0,1]  follower c on rep r, tied by  y[c,r] = x[f,r]
//!   Σ_r x[f,r] = 1                            every head placed once
//!   locked heads get a single variable: their required rep
//!   Σ_f v[f,d]·x[f,r] ≤ max(cap[r,d], pinned[r,d])   when hard caps are on
//!   Σ_f v[f,d]/target[d]·x[f,r] − Σ_k o[r,d,k] + Σ_k u[r,d,k] = 1
//!
//! Objective: Σ score·x + Σ score·y − Σ penalty·(o + u), the penalty
//! segments coming from `deviation`. Strategic reps and strategic
//! families carry no caps and no penalties.
//!
//! The solver starts from a greedy placement polished by single-family
//! moves, scored exactly as the model scores it, so a search cut short by
//! its limits still returns an optimised incumbent.

use crate::{
    config::EngineKind,
    deviation::{add_deviation_row, deviation_cost},
    eligibility::Pool,
    error::{AssignError, AssignResult},
    event::{RunWarning, WarningLog},
    solver::{LpProblem, Sense, SolveStatus, VarId},
    strategy::{
        AssignmentRule, AssignmentStrategy, Placement, RunContext, Stage, StageReport,
        StrategyOutcome,
    },
    thresholds::{Dimension, DimensionVector},
};
use std::collections::BTreeMap;

/// Passes of the single-move polish over the greedy start.
const POLISH_PASSES: usize = 25;
const MOVE_GAIN_TOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxedEngine;

impl RelaxedEngine {
    pub fn new() -> Self {
        Self
    }
}

struct FamilyVars {
    family: usize,
    /// (rep, head variable)
    heads: Vec<(usize, VarId)>,
}

/// One balance row of the model: `weight · deviation_cost(load/target − 1)`.
#[derive(Debug, Clone, Copy)]
struct Penalty {
    dim: Dimension,
    target: f64,
    weight: f64,
}

struct Model {
    problem: LpProblem,
    families: Vec<FamilyVars>,
    /// Balance rows per general rep.
    penalties: BTreeMap<usize, Vec<Penalty>>,
}

fn pinned_loads(ctx: &RunContext<'_>) -> BTreeMap<usize, DimensionVector> {
    let mut pinned: BTreeMap<usize, DimensionVector> = BTreeMap::new();
    for &f in ctx.eligibility.in_scope() {
        if let Some(lock) = ctx.lock_for(f) {
            *pinned.entry(lock.required_rep).or_default() += &ctx.values[f];
        }
    }
    pinned
}

fn candidate_reps(ctx: &RunContext<'_>, family: usize) -> Vec<usize> {
    match ctx.lock_for(family) {
        Some(lock) => vec![lock.required_rep],
        None => ctx.eligibility.eligible(family).to_vec(),
    }
}

/// Right-hand side of the hard-cap row of `rep` on `dim`.
fn cap_rhs(ctx: &RunContext<'_>, pinned: &BTreeMap<usize, DimensionVector>, rep: usize, dim: Dimension) -> f64 {
    let pinned = pinned.get(&rep).map_or(0.0, |v| v[dim]);
    dim.bound(ctx.capacity(rep, dim)).max(pinned)
}

/// Σ cap over general reps must cover Σ demand on every capacity dimension.
fn check_capacity(ctx: &RunContext<'_>, pinned: &BTreeMap<usize, DimensionVector>) -> AssignResult<()> {
    let reps = ctx.eligibility.reps(Pool::General);
    for &d in &ctx.capacity_dims {
        let demand: f64 = ctx.eligibility.families_in(Pool::General).map(|f| ctx.values[f][d]).sum();
        let supply: f64 = reps.iter().map(|&r| cap_rhs(ctx, pinned, r, d)).sum();
        if supply + 1e-6 * supply.abs().max(1.0) < demand {
            return Err(AssignError::Infeasible {
                diagnostic: format!(
                    "total {} capacity {supply:.2} across {} reps is below the {demand:.2} required",
                    d.label(),
                    reps.len(),
                ),
            });
        }
    }
    Ok(())
}

fn build_model(ctx: &RunContext<'_>, pinned: &BTreeMap<usize, DimensionVector>) -> Model {
    let book = ctx.book;
    let mut problem = LpProblem::new();
    let mut families = Vec::new();
    // Per general rep, the (var, family) terms that load it.
    let mut rep_terms: BTreeMap<usize, Vec<(VarId, usize)>> = BTreeMap::new();

    for &f in ctx.eligibility.in_scope() {
        let family = &book.families[f];
        let head_id = &book.accounts[family.head].id;
        let general = ctx.eligibility.pool(f) == Pool::General;

        let mut heads = Vec::new();
        for r in candidate_reps(ctx, f) {
            let score = ctx.scores.get(family.head, r).weighted;
            let var = problem.add_binary(format!("x_{head_id}_{}", book.reps[r].id), score);
            heads.push((r, var));
            if general {
                rep_terms.entry(r).or_default().push((var, f));
            }
        }
        let one: Vec<(VarId, f64)> = heads.iter().map(|&(_, v)| (v, 1.0)).collect();
        problem.add_constraint(format!("one_{head_id}"), one, Sense::Eq, 1.0);

        // Followers share the head's decision through equality rows.
        for &c in &family.followers {
            let child_id = &book.accounts[c].id;
            for &(r, head_var) in &heads {
                let score = ctx.scores.get(c, r).weighted;
                let var = problem.add_continuous(format!("y_{child_id}_{}", book.reps[r].id), 0.0, 1.0, score);
                problem.add_constraint(
                    format!("link_{child_id}_{}", book.reps[r].id),
                    vec![(var, 1.0), (head_var, -1.0)],
                    Sense::Eq,
                    0.0,
                );
            }
        }
        families.push(FamilyVars { family: f, heads });
    }

    let balance = &ctx.config.balance;
    let general_families = ctx.eligibility.families_in(Pool::General).count();
    let general_reps = ctx.eligibility.reps(Pool::General);
    let units_per_rep = (general_families as f64 / general_reps.len().max(1) as f64).max(1.0);
    let mut penalties: BTreeMap<usize, Vec<Penalty>> = BTreeMap::new();

    for &r in general_reps {
        let terms = rep_terms.get(&r).map(Vec::as_slice).unwrap_or(&[]);
        let rep_id = &book.reps[r].id;
        let scaled_row = |d: Dimension, scale: f64| -> Vec<(VarId, f64)> {
            terms
                .iter()
                .filter(|&&(_, f)| ctx.values[f][d] > 0.0)
                .map(|&(v, f)| (v, ctx.values[f][d] / scale))
                .collect()
        };

        // ── Hard caps ────────────────────────────────────────────────────
        if balance.hard_caps {
            for &d in &ctx.capacity_dims {
                let target = ctx.general.get(d).target;
                let scale = if target > 0.0 { target } else { 1.0 };
                let row = scaled_row(d, scale);
                if row.is_empty() {
                    continue;
                }
                let rhs = cap_rhs(ctx, pinned, r, d) / scale;
                problem.add_constraint(format!("cap_{rep_id}_{}", d.label()), row, Sense::Le, rhs);
            }
        }

        // ── Balance penalty ──────────────────────────────────────────────
        for d in Dimension::ALL {
            let dc = balance.dimension(d);
            let target = ctx.general.get(d).target;
            let weight = balance.intensity * dc.penalty * units_per_rep;
            if !dc.enabled || weight <= 0.0 || target <= 0.0 {
                continue;
            }
            let name = format!("{rep_id}_{}", d.label());
            add_deviation_row(&mut problem, &name, scaled_row(d, target), 0.0, weight);
            penalties.entry(r).or_default().push(Penalty { dim: d, target, weight });
        }
    }

    Model { problem, families, penalties }
}

/// Greedy placement: locked first, then by ARR descending; the best-scoring
/// rep with room, else the least ARR-loaded candidate, flagged over capacity.
fn greedy(ctx: &RunContext<'_>) -> Vec<Placement> {
    let mut loads = vec![DimensionVector::default(); ctx.book.reps.len()];
    let mut placements = Vec::new();

    let mut order: Vec<usize> = ctx.eligibility.in_scope().to_vec();
    order.sort_by(|&a, &b| {
        let unlocked = |f: usize| ctx.lock_for(f).is_none();
        unlocked(a)
            .cmp(&unlocked(b))
            .then(ctx.values[b][Dimension::Arr].total_cmp(&ctx.values[a][Dimension::Arr]))
            .then(a.cmp(&b))
    });

    for f in order {
        let general = ctx.eligibility.pool(f) == Pool::General;
        let candidates = candidate_reps(ctx, f);
        let with_room = |r: &usize| {
            let mut load = loads[*r];
            load += &ctx.values[f];
            !general || !ctx.exceeds_capacity(*r, &load)
        };
        let best_fit = candidates.iter().copied().filter(with_room).max_by(|&a, &b| {
            ctx.family_score(f, a)
                .total_cmp(&ctx.family_score(f, b))
                .then(b.cmp(&a))
        });
        let (rep, over_capacity) = match best_fit {
            Some(r) => (r, false),
            None => {
                let Some(r) = candidates.iter().copied().min_by(|&a, &b| {
                    loads[a][Dimension::Arr].total_cmp(&loads[b][Dimension::Arr]).then(a.cmp(&b))
                }) else {
                    continue;
                };
                (r, true)
            }
        };
        loads[rep] += &ctx.values[f];
        placements.push(Placement { family: f, rep, rule: rule_for(ctx, f), over_capacity });
    }
    placements
}

fn shifted(load: &DimensionVector, values: &DimensionVector, sign: f64) -> DimensionVector {
    let mut out = *load;
    for (o, v) in out.0.iter_mut().zip(values.0.iter()) {
        *o += sign * v;
    }
    out
}

/// Move single unlocked general families to whichever rep raises the model
/// objective most, until a pass moves nothing.
fn polish(
    ctx: &RunContext<'_>,
    model: &Model,
    pinned: &BTreeMap<usize, DimensionVector>,
    placements: &mut [Placement],
) -> usize {
    let penalty = |rep: usize, load: &DimensionVector| -> f64 {
        model.penalties.get(&rep).map_or(0.0, |rows| {
            rows.iter()
                .map(|p| p.weight * deviation_cost(load[p.dim] / p.target - 1.0))
                .sum()
        })
    };
    let hard_caps = ctx.config.balance.hard_caps;
    let fits = |rep: usize, load: &DimensionVector| {
        !hard_caps
            || ctx.capacity_dims.iter().all(|&d| {
                let rhs = cap_rhs(ctx, pinned, rep, d);
                load[d] <= rhs + 1e-9 * rhs.abs().max(1.0)
            })
    };

    let mut loads = vec![DimensionVector::default(); ctx.book.reps.len()];
    for p in placements.iter().filter(|p| ctx.eligibility.pool(p.family) == Pool::General) {
        loads[p.rep] += &ctx.values[p.family];
    }

    let mut moves = 0;
    for _ in 0..POLISH_PASSES {
        let mut moved = false;
        for p in placements.iter_mut() {
            let f = p.family;
            if ctx.lock_for(f).is_some() || ctx.eligibility.pool(f) != Pool::General {
                continue;
            }
            let from = p.rep;
            let values = &ctx.values[f];
            let from_after = shifted(&loads[from], values, -1.0);
            let leave_gain = penalty(from, &loads[from]) - penalty(from, &from_after);
            let here = ctx.family_score(f, from);

            let mut best: Option<(usize, f64)> = None;
            for &to in ctx.eligibility.eligible(f) {
                if to == from {
                    continue;
                }
                let to_after = shifted(&loads[to], values, 1.0);
                if !fits(to, &to_after) {
                    continue;
                }
                let gain = ctx.family_score(f, to) - here + leave_gain
                    - (penalty(to, &to_after) - penalty(to, &loads[to]));
                if gain > MOVE_GAIN_TOL && best.map_or(true, |(_, g)| gain > g) {
                    best = Some((to, gain));
                }
            }
            if let Some((to, _)) = best {
                loads[from] = from_after;
                loads[to] += values;
                p.rep = to;
                moved = true;
                moves += 1;
            }
        }
        if !moved {
            break;
        }
    }
    moves
}

/// Start point for the solver: the polished greedy placement as values of
/// the head variables. Follower and penalty columns are left for the
/// solver to fill.
fn starting_point(ctx: &RunContext<'_>, model: &Model, pinned: &BTreeMap<usize, DimensionVector>) -> Vec<f64> {
    let mut placements = greedy(ctx);
    let moves = polish(ctx, model, pinned, &mut placements);
    log::debug!("relaxed: start point polished with {moves} moves");

    let mut rep_of = vec![None; ctx.book.families.len()];
    for p in &placements {
        rep_of[p.family] = Some(p.rep);
    }
    let mut start = vec![0.0; model.problem.variables.len()];
    for fv in &model.families {
        if let Some(&(_, var)) = fv.heads.iter().find(|&&(r, _)| rep_of[fv.family] == Some(r)) {
            start[var] = 1.0;
        }
    }
    start
}

/// Deterministic completion used when the solver returns nothing usable.
fn greedy_completion(ctx: &RunContext<'_>, warnings: &mut WarningLog) -> Vec<Placement> {
    let placements = greedy(ctx);
    for p in placements.iter().filter(|p| p.over_capacity) {
        warnings.push(RunWarning::ForcedOverCapacity {
            account_id: ctx.book.accounts[ctx.book.families[p.family].head].id.clone(),
            rep_id: ctx.book.reps[p.rep].id.clone(),
        });
    }
    placements
}

fn rule_for(ctx: &RunContext<'_>, family: usize) -> AssignmentRule {
    match ctx.lock_for(family) {
        Some(lock) => AssignmentRule::Holdover { reason: lock.reason },
        None => AssignmentRule::Relaxed,
    }
}

impl AssignmentStrategy for RelaxedEngine {
    fn name(&self) -> &'static str {
        "relaxed"
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Relaxed
    }

    fn assign(&self, ctx: &RunContext<'_>, warnings: &mut WarningLog) -> AssignResult<StrategyOutcome> {
        let pinned = pinned_loads(ctx);
        if ctx.config.balance.hard_caps {
            check_capacity(ctx, &pinned)?;
        }

        let model = build_model(ctx, &pinned);
        let problem = &model.problem;
        log::info!(
            "relaxed: {} families, {} variables ({} integer), {} constraints",
            model.families.len(),
            problem.variables.len(),
            problem.num_integer(),
            problem.constraints.len(),
        );

        let start = starting_point(ctx, &model, &pinned);
        let solution = ctx.solver.solve_with_start(
            problem,
            &ctx.solve_limits(ctx.config.solver.timeout_secs),
            &start,
        );
        log::info!(
            "relaxed: solver {} returned {} in {}ms after {} nodes",
            ctx.solver.name(),
            solution.status.label(),
            solution.elapsed_ms,
            solution.nodes,
        );

        if solution.status == SolveStatus::Infeasible {
            return Err(AssignError::Infeasible {
                diagnostic: format!(
                    "solver proved no assignment satisfies every hard constraint \
                     ({} variables, {} constraints): {}",
                    problem.variables.len(),
                    problem.constraints.len(),
                    solution.detail,
                ),
            });
        }
        if solution.status == SolveStatus::TimedOut {
            warnings.push(RunWarning::SolverTimedOut {
                elapsed_ms: solution.elapsed_ms,
                has_incumbent: solution.has_values(),
            });
        }

        let mut placements = Vec::with_capacity(model.families.len());
        match &solution.values {
            Some(x) => {
                for fv in &model.families {
                    let chosen = fv.heads.iter().find(|&&(_, v)| x[v] > 0.5).map(|&(r, _)| r);
                    let Some(rep) = chosen else {
                        return Err(AssignError::Solver {
                            status: solution.status.label().to_string(),
                            detail: format!(
                                "incumbent leaves {} unassigned",
                                ctx.book.accounts[ctx.book.families[fv.family].head].id
                            ),
                        });
                    };
                    placements.push(Placement {
                        family: fv.family,
                        rep,
                        rule: rule_for(ctx, fv.family),
                        over_capacity: false,
                    });
                }
            }
            None => {
                warnings.push(RunWarning::SolverFallback {
                    reason: format!("{}: {}", solution.status.label(), solution.detail),
                });
                placements = greedy_completion(ctx, warnings);
            }
        }

        let mut report = StageReport::new(Stage::Global, model.families.len());
        report.variables = problem.variables.len();
        report.constraints = problem.constraints.len();
        report.assigned = placements.len();
        report.status = Some(solution.status);
        report.elapsed_ms = solution.elapsed_ms;

        Ok(StrategyOutcome {
            placements,
            stages: vec![report],
            solver_status: Some(solution.status),
            variables: problem.variables.len(),
            constraints: problem.constraints.len(),
            solve_ms: solution.elapsed_ms,
        })
    }
}
