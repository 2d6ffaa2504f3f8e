//! The assignment engine: one run over one scenario.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Validate configuration (corrections become warnings)
//!   2. Normalize raw records into a Book
//!   3. Eligibility and scope
//!   4. Stability locks, reconciled against the strategic pool
//!   5. Score matrix
//!   6. Family values and balance thresholds (per pool)
//!   7. Strategy: waterfall or relaxed
//!   8. Expand followers, then validate completeness and linkage
//!   9. Rationale, metrics, telemetry
//!
//! RULES:
//!   - A run either returns a complete assignment set or an error naming
//!     the reason. Never a partial set.
//!   - Identical input and configuration give identical assignments.
//!     Only the run id and timestamp differ, and both can be injected.
//!   - The engine holds no state between runs.

use crate::{
    assignment::{Assignment, AssignmentRun, RunTelemetry},
    config::{AssignmentConfig, EngineKind},
    eligibility::{Eligibility, Pool},
    error::{AssignError, AssignResult},
    event::WarningLog,
    metrics::compute_metrics,
    model::{Book, ScenarioInput},
    normalizer::normalize,
    rationale::rationale,
    relaxed_engine::RelaxedEngine,
    scoring::ScoreMatrix,
    solver::{BranchAndBound, CancelToken, LpSolver},
    stability::evaluate_locks,
    strategy::{AssignmentRule, AssignmentStrategy, Placement, RunContext},
    thresholds::{family_values, BalanceThresholds, DimensionVector},
    types::RunId,
    waterfall_engine::WaterfallEngine,
};
use chrono::{DateTime, Utc};
use std::time::Instant;
use uuid::Uuid;

/// Per-run overrides. Defaults: fresh uuid, current time, configured engine.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub run_id: Option<RunId>,
    pub generated_at: Option<DateTime<Utc>>,
    pub engine: Option<EngineKind>,
    pub cancel: CancelToken,
}

pub fn strategy_for(kind: EngineKind) -> Box<dyn AssignmentStrategy> {
    match kind {
        EngineKind::Waterfall => Box::new(WaterfallEngine::new()),
        EngineKind::Relaxed => Box::new(RelaxedEngine::new()),
    }
}

pub struct AssignmentEngine {
    config: AssignmentConfig,
    solver: Box<dyn LpSolver>,
}

/// One expanded account decision, before rationale.
struct Decision {
    account: usize,
    rep: usize,
    rule: AssignmentRule,
    over_capacity: bool,
}

impl AssignmentEngine {
    pub fn new(config: AssignmentConfig) -> Self {
        Self::with_solver(config, Box::new(BranchAndBound::default()))
    }

    /// Use a different solver behind the LP boundary.
    pub fn with_solver(config: AssignmentConfig, solver: Box<dyn LpSolver>) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &AssignmentConfig {
        &self.config
    }

    pub fn run(&self, input: &ScenarioInput) -> AssignResult<AssignmentRun> {
        self.run_with(input, RunOptions::default())
    }

    pub fn run_with(&self, input: &ScenarioInput, options: RunOptions) -> AssignResult<AssignmentRun> {
        let started = Instant::now();
        let mut warnings = WarningLog::new();

        let (config, corrections) = self.config.validated();
        warnings.extend(corrections);
        let engine = options.engine.unwrap_or(config.engine);

        let book = normalize(input, &config, &mut warnings);
        let eligibility = Eligibility::build(&book, config.balance.scope, &config.routing, &mut warnings)?;
        let mut locks = evaluate_locks(&book, &book.families, &config.stability, &mut warnings);
        eligibility.reconcile_locks(&book, &mut locks, &mut warnings);
        let scores = ScoreMatrix::build(&book, &config);

        let values: Vec<DimensionVector> = book.families.iter().map(|f| family_values(&book, f)).collect();
        let pool_thresholds = |pool: Pool| {
            // Eligibility already refused pools with families but no reps.
            BalanceThresholds::compute(
                eligibility.families_in(pool).map(|f| &values[f]),
                eligibility.reps(pool).len().max(1),
                config.balance.variance_pct,
                config.balance.scope,
            )
        };
        let general = pool_thresholds(Pool::General)?;
        general.ensure_scope(config.balance.scope)?;
        let strategic = if eligibility.strategic_active() {
            Some(pool_thresholds(Pool::Strategic)?)
        } else {
            None
        };

        let ctx = RunContext {
            book: &book,
            config: &config,
            scores: &scores,
            locks: &locks,
            eligibility: &eligibility,
            values: &values,
            general: &general,
            strategic: strategic.as_ref(),
            capacity_dims: config.balance.capacity_dimensions(),
            solver: self.solver.as_ref(),
            cancel: options.cancel.clone(),
        };

        let strategy = strategy_for(engine);
        log::info!(
            "run: scenario={} engine={} families={} locked={}",
            book.scenario_id,
            strategy.name(),
            eligibility.in_scope().len(),
            locks.len(),
        );
        let outcome = strategy.assign(&ctx, &mut warnings)?;

        let decisions = expand_followers(&book, &outcome.placements);
        validate(&book, &eligibility, &decisions)?;

        let generated_at = options.generated_at.unwrap_or_else(Utc::now);
        let assignments: Vec<Assignment> = decisions
            .iter()
            .map(|d| Assignment {
                account_id: book.accounts[d.account].id.clone(),
                rep_id: book.reps[d.rep].id.clone(),
                rule: d.rule,
                rationale: rationale(&ctx, d.account, d.rep, d.rule, d.over_capacity),
                scores: *scores.get(d.account, d.rep),
                over_capacity: d.over_capacity,
                generated_at,
            })
            .collect();
        let pairs: Vec<(usize, usize)> = decisions.iter().map(|d| (d.account, d.rep)).collect();
        let metrics = compute_metrics(&ctx, &outcome.placements, &pairs);

        let in_scope = eligibility.in_scope();
        let telemetry = RunTelemetry {
            engine,
            solver: self.solver.name().to_string(),
            accounts: assignments.len(),
            families: in_scope.len(),
            reps: eligibility.reps(Pool::General).len() + eligibility.reps(Pool::Strategic).len(),
            locked_families: in_scope.iter().filter(|&&f| ctx.lock_for(f).is_some()).count(),
            strategic_families: eligibility.families_in(Pool::Strategic).count(),
            variables: outcome.variables,
            constraints: outcome.constraints,
            stages: outcome.stages,
            solver_status: outcome.solver_status,
            solve_ms: outcome.solve_ms,
            total_ms: started.elapsed().as_millis() as u64,
        };

        let run = AssignmentRun {
            run_id: options.run_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            scenario_id: book.scenario_id.clone(),
            engine,
            generated_at,
            assignments,
            metrics,
            telemetry,
            warnings: warnings.into_vec(),
        };
        log::info!(
            "run: {} assigned {} accounts in {}ms, continuity {:.1}%, {} warning(s)",
            run.run_id,
            run.assignments.len(),
            run.telemetry.total_ms,
            run.metrics.continuity_rate * 100.0,
            run.warnings.len(),
        );
        Ok(run)
    }
}

/// Heads carry the placement's rule; followers carry `FollowsParent`.
/// Output is in account order, which is account id order.
fn expand_followers(book: &Book, placements: &[Placement]) -> Vec<Decision> {
    let mut decisions = Vec::new();
    for p in placements {
        let family = &book.families[p.family];
        decisions.push(Decision {
            account: family.head,
            rep: p.rep,
            rule: p.rule,
            over_capacity: p.over_capacity,
        });
        for &c in &family.followers {
            decisions.push(Decision {
                account: c,
                rep: p.rep,
                rule: AssignmentRule::FollowsParent,
                over_capacity: false,
            });
        }
    }
    decisions.sort_by_key(|d| d.account);
    decisions
}

/// Every in-scope account exactly once; every non-split child with its parent.
fn validate(book: &Book, eligibility: &Eligibility, decisions: &[Decision]) -> AssignResult<()> {
    let mut rep_of: Vec<Option<usize>> = vec![None; book.accounts.len()];
    for d in decisions {
        if rep_of[d.account].replace(d.rep).is_some() {
            return Err(AssignError::DuplicateAssignment {
                account_id: book.accounts[d.account].id.clone(),
            });
        }
    }

    let missing: Vec<String> = eligibility
        .in_scope()
        .iter()
        .flat_map(|&f| book.families[f].members())
        .filter(|&a| rep_of[a].is_none())
        .map(|a| book.accounts[a].id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(AssignError::IncompleteAssignment { missing });
    }

    for d in decisions {
        let child = &book.accounts[d.account];
        if child.is_split_child {
            continue;
        }
        let Some(parent) = child.parent_id.as_deref().and_then(|p| book.account_idx(p)) else {
            continue;
        };
        if rep_of[parent] != Some(d.rep) {
            return Err(AssignError::StructuralViolation {
                parent_id: book.accounts[parent].id.clone(),
                child_id: child.id.clone(),
                parent_rep: rep_of[parent]
                    .map(|r| book.reps[r].id.clone())
                    .unwrap_or_else(|| "unassigned".to_string()),
                child_rep: book.reps[d.rep].id.clone(),
            });
        }
    }
    Ok(())
}
