//! Task reads and the transition log.

use jiff::Timestamp;
use rusqlite::{params, Connection, OptionalExtension};

use super::utils::{enum_at, id_at, json_at, millis_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, Result},
    models::{Lease, Task, TaskState, Transition},
    state_machine::check_transition,
};

const SELECT_TASK_BY_ID_SQL: &str = "SELECT id, plan_id, task_key, title, payload, state, retry_count, max_retries, lease_token, lease_owner, lease_expires_at, artifact_ref, last_diagnostic, created_at, updated_at FROM tasks WHERE id = ?1";
const SELECT_TASKS_BY_PLAN_SQL: &str = "SELECT id, plan_id, task_key, title, payload, state, retry_count, max_retries, lease_token, lease_owner, lease_expires_at, artifact_ref, last_diagnostic, created_at, updated_at FROM tasks WHERE plan_id = ?1 ORDER BY id";
const SELECT_DEPENDENCIES_SQL: &str =
    "SELECT depends_on FROM task_dependencies WHERE task_id = ?1 ORDER BY depends_on";
const SELECT_PLAN_DEPENDENCIES_SQL: &str = "SELECT d.task_id, d.depends_on FROM task_dependencies d JOIN tasks t ON t.id = d.task_id WHERE t.plan_id = ?1 ORDER BY d.task_id, d.depends_on";
const SELECT_HISTORY_SQL: &str = "SELECT id, task_id, from_state, to_state, actor, reason, at FROM task_transitions WHERE task_id = ?1 ORDER BY id";
const INSERT_TRANSITION_SQL: &str = "INSERT INTO task_transitions (task_id, from_state, to_state, actor, reason, at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

/// Builds a task (without dependencies, history or results) from a row
/// holding the full `tasks` column list in table order.
pub(crate) fn build_task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let id = id_at(row, 0)?;
    let token: Option<String> = row.get(8)?;
    let lease = match token {
        Some(token) => Some(Lease {
            task_id: id,
            token,
            owner: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            expires_at: millis_at(row, 10)?,
        }),
        None => None,
    };

    Ok(Task {
        id,
        plan_id: id_at(row, 1)?,
        key: row.get(2)?,
        title: row.get(3)?,
        payload: json_at(row, 4)?,
        state: enum_at(row, 5)?,
        retry_count: row.get(6)?,
        max_retries: row.get(7)?,
        depends_on: Vec::new(),
        lease,
        artifact_ref: row.get(11)?,
        last_diagnostic: row.get(12)?,
        created_at: timestamp_at(row, 13)?,
        updated_at: timestamp_at(row, 14)?,
        history: Vec::new(),
        results: Vec::new(),
    })
}

/// Validates a transition against the lifecycle table and appends it to the
/// log. Callers write the matching state change in the same transaction.
pub(crate) fn record_transition(
    conn: &Connection,
    task_id: u64,
    from: TaskState,
    to: TaskState,
    actor: &str,
    reason: &str,
    now: Timestamp,
) -> Result<()> {
    check_transition(task_id, from, to)?;
    conn.execute(
        INSERT_TRANSITION_SQL,
        params![
            task_id as i64,
            from.as_str(),
            to.as_str(),
            actor,
            reason,
            now.to_string()
        ],
    )
    .db_context("Failed to record transition")?;
    Ok(())
}

impl super::Database {
    /// Retrieves a task by its ID, with its dependency IDs.
    pub fn get_task(&self, id: u64) -> Result<Option<Task>> {
        let mut task = self
            .connection
            .query_row(SELECT_TASK_BY_ID_SQL, params![id as i64], build_task_from_row)
            .optional()
            .db_context("Failed to query task")?;

        if let Some(ref mut task) = task {
            let mut stmt = self
                .connection
                .prepare(SELECT_DEPENDENCIES_SQL)
                .db_context("Failed to prepare query")?;
            task.depends_on = stmt
                .query_map(params![id as i64], |row| id_at(row, 0))
                .db_context("Failed to query dependencies")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .db_context("Failed to read dependencies")?;
        }

        Ok(task)
    }

    /// Retrieves a task with its full transition history and quality results.
    pub fn get_task_detailed(&self, id: u64) -> Result<Option<Task>> {
        let Some(mut task) = self.get_task(id)? else {
            return Ok(None);
        };
        task.history = self.get_history(id)?;
        task.results = self.get_results(id)?;
        Ok(Some(task))
    }

    /// Retrieves every task of a plan in creation order, with dependencies.
    pub fn get_plan_tasks(&self, plan_id: u64) -> Result<Vec<Task>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_TASKS_BY_PLAN_SQL)
            .db_context("Failed to prepare query")?;
        let mut tasks = stmt
            .query_map(params![plan_id as i64], build_task_from_row)
            .db_context("Failed to query tasks")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read tasks")?;

        let mut stmt = self
            .connection
            .prepare(SELECT_PLAN_DEPENDENCIES_SQL)
            .db_context("Failed to prepare query")?;
        let edges = stmt
            .query_map(params![plan_id as i64], |row| {
                Ok((id_at(row, 0)?, id_at(row, 1)?))
            })
            .db_context("Failed to query dependencies")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read dependencies")?;

        for (task_id, depends_on) in edges {
            if let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) {
                task.depends_on.push(depends_on);
            }
        }

        Ok(tasks)
    }

    /// Retrieves the ordered transition history of a task.
    pub fn get_history(&self, task_id: u64) -> Result<Vec<Transition>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_HISTORY_SQL)
            .db_context("Failed to prepare query")?;
        let history = stmt
            .query_map(params![task_id as i64], |row| {
                Ok(Transition {
                    id: id_at(row, 0)?,
                    task_id: id_at(row, 1)?,
                    from: enum_at(row, 2)?,
                    to: enum_at(row, 3)?,
                    actor: row.get(4)?,
                    reason: row.get(5)?,
                    at: timestamp_at(row, 6)?,
                })
            })
            .db_context("Failed to query history")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read history")?;

        Ok(history)
    }
}
