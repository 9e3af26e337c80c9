//! Quality check result storage. Rows are append-only.

use jiff::Timestamp;
use rusqlite::{params, Connection};

use super::utils::{enum_at, id_at, json_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, Result},
    gate::StageRun,
    models::QualityCheckResult,
};

const INSERT_RESULT_SQL: &str = "INSERT INTO quality_results (task_id, attempt, stage, verdict, detail, duration_ms, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";
const SELECT_RESULTS_SQL: &str = "SELECT id, task_id, attempt, stage, verdict, detail, duration_ms, recorded_at FROM quality_results WHERE task_id = ?1 ORDER BY attempt, id";

/// Records one stage run for an attempt.
pub(crate) fn insert_result(
    conn: &Connection,
    task_id: u64,
    attempt: u32,
    run: &StageRun,
    now: Timestamp,
) -> Result<()> {
    let detail = serde_json::to_string(&run.detail)?;
    conn.execute(
        INSERT_RESULT_SQL,
        params![
            task_id as i64,
            attempt,
            run.stage.as_str(),
            run.verdict.as_str(),
            detail,
            run.duration_ms as i64,
            now.to_string()
        ],
    )
    .db_context("Failed to record quality result")?;
    Ok(())
}

impl super::Database {
    /// Retrieves every recorded quality result for a task, grouped by attempt.
    pub fn get_results(&self, task_id: u64) -> Result<Vec<QualityCheckResult>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_RESULTS_SQL)
            .db_context("Failed to prepare query")?;
        let results = stmt
            .query_map(params![task_id as i64], |row| {
                Ok(QualityCheckResult {
                    id: id_at(row, 0)?,
                    task_id: id_at(row, 1)?,
                    attempt: row.get(2)?,
                    stage: enum_at(row, 3)?,
                    verdict: enum_at(row, 4)?,
                    detail: json_at(row, 5)?,
                    duration_ms: row.get::<_, i64>(6)? as u64,
                    recorded_at: timestamp_at(row, 7)?,
                })
            })
            .db_context("Failed to query quality results")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read quality results")?;

        Ok(results)
    }
}
