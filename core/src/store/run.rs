use super::{assignment::parse_timestamp, AssignmentStore};
use crate::{
    config::EngineKind,
    error::{AssignError, AssignResult},
    metrics::RunMetrics,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

/// Summary row of a persisted run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: String,
    pub scenario_id: String,
    pub engine: EngineKind,
    pub solver: String,
    pub solver_status: Option<String>,
    pub accounts: usize,
    pub families: usize,
    pub warning_count: usize,
    pub total_ms: u64,
    pub generated_at: DateTime<Utc>,
    pub metrics: RunMetrics,
}

type RunRow = (String, String, String, String, Option<String>, i64, i64, i64, i64, String, String);

impl AssignmentStore {
    // ── Runs ───────────────────────────────────────────────────

    /// Most recent run persisted for a scenario.
    pub fn latest_run(&self, scenario_id: &str) -> AssignResult<Option<RunRecord>> {
        let row: Option<RunRow> = self
            .conn
            .query_row(
                "SELECT run_id, scenario_id, engine, solver, solver_status,
                        accounts, families, warning_count, total_ms,
                        generated_at, metrics_json
                 FROM assignment_run WHERE scenario_id = ?1
                 ORDER BY generated_at DESC, rowid DESC LIMIT 1",
                params![scenario_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                    ))
                },
            )
            .optional()?;

        let Some((run_id, scenario_id, engine, solver, solver_status, accounts, families, warnings, ms, at, metrics)) =
            row
        else {
            return Ok(None);
        };
        let engine = EngineKind::from_label(&engine)
            .ok_or_else(|| AssignError::Other(anyhow::anyhow!("unknown engine '{engine}'")))?;

        Ok(Some(RunRecord {
            run_id,
            scenario_id,
            engine,
            solver,
            solver_status,
            accounts: accounts as usize,
            families: families as usize,
            warning_count: warnings as usize,
            total_ms: ms as u64,
            generated_at: parse_timestamp(&at)?,
            metrics: serde_json::from_str(&metrics)?,
        }))
    }

    pub fn run_count(&self, scenario_id: &str) -> AssignResult<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM assignment_run WHERE scenario_id = ?1",
            params![scenario_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}
