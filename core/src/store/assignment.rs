use super::AssignmentStore;
use crate::{
    assignment::{Assignment, AssignmentRun},
    error::{AssignError, AssignResult},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

pub(super) fn parse_timestamp(raw: &str) -> AssignResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AssignError::Other(anyhow::anyhow!("bad timestamp '{raw}': {e}")))
}

impl AssignmentStore {
    // ── Assignment sets ────────────────────────────────────────

    /// Replace the scenario's assignment set with this run's, atomically.
    /// Readers see either the previous set or the new one, never a mix.
    pub fn replace_assignments(&self, run: &AssignmentRun) -> AssignResult<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM assignment WHERE scenario_id = ?1",
            params![run.scenario_id],
        )?;
        tx.execute(
            "INSERT INTO assignment_run (
                run_id, scenario_id, engine, solver, solver_status,
                accounts, families, warning_count, total_ms, generated_at,
                metrics_json, telemetry_json, warnings_json
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            params![
                run.run_id,
                run.scenario_id,
                run.engine.label(),
                run.telemetry.solver,
                run.telemetry.solver_status.map(|s| s.label()),
                run.telemetry.accounts as i64,
                run.telemetry.families as i64,
                run.warnings.len() as i64,
                run.telemetry.total_ms as i64,
                run.generated_at.to_rfc3339(),
                serde_json::to_string(&run.metrics)?,
                serde_json::to_string(&run.telemetry)?,
                serde_json::to_string(&run.warnings)?,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO assignment (
                    scenario_id, account_id, run_id, rep_id, rule_json,
                    rationale, scores_json, over_capacity, generated_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            )?;
            for a in &run.assignments {
                stmt.execute(params![
                    run.scenario_id,
                    a.account_id,
                    run.run_id,
                    a.rep_id,
                    serde_json::to_string(&a.rule)?,
                    a.rationale,
                    serde_json::to_string(&a.scores)?,
                    a.over_capacity,
                    a.generated_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        log::debug!(
            "store: scenario {} now holds {} assignments from run {}",
            run.scenario_id,
            run.assignments.len(),
            run.run_id
        );
        Ok(())
    }

    /// Current set for a scenario, in account id order.
    pub fn assignments_for_scenario(&self, scenario_id: &str) -> AssignResult<Vec<Assignment>> {
        let mut stmt = self.conn.prepare(
            "SELECT account_id, rep_id, rule_json, rationale, scores_json,
                    over_capacity, generated_at
             FROM assignment WHERE scenario_id = ?1
             ORDER BY account_id ASC",
        )?;
        let rows = stmt
            .query_map(params![scenario_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, bool>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(account_id, rep_id, rule, rationale, scores, over_capacity, at)| {
                Ok(Assignment {
                    account_id,
                    rep_id,
                    rule: serde_json::from_str(&rule)?,
                    rationale,
                    scores: serde_json::from_str(&scores)?,
                    over_capacity,
                    generated_at: parse_timestamp(&at)?,
                })
            })
            .collect()
    }

    pub fn assignment_count(&self, scenario_id: &str) -> AssignResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assignment WHERE scenario_id = ?1",
            params![scenario_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Rep currently holding an account, if the scenario has a set.
    pub fn rep_for_account(&self, scenario_id: &str, account_id: &str) -> AssignResult<Option<String>> {
        let rep = self
            .conn
            .query_row(
                "SELECT rep_id FROM assignment WHERE scenario_id = ?1 AND account_id = ?2",
                params![scenario_id, account_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(rep)
    }
}
