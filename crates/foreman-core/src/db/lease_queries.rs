//! Lease lifecycle: claim, begin, heartbeat, report and reap.
//!
//! Every operation runs in an `IMMEDIATE` transaction and re-reads the
//! task's lease inside it. The conditional `UPDATE ... WHERE lease_token = ?`
//! is the single arbitration point between workers and the reaper.

use jiff::{SignedDuration, Timestamp};
use log::{debug, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use uuid::Uuid;

use super::{
    check_queries::insert_result,
    task_queries::record_transition,
    utils::{enum_at, id_at},
};
use crate::{
    error::{DatabaseResultExt, OrchestratorError, Result},
    gate::{GateOutcome, GateReport},
    models::{Lease, Task, TaskState},
    state_machine::retry_target,
};

const COUNT_LEASED_SQL: &str =
    "SELECT COUNT(*) FROM tasks WHERE state IN ('claimed', 'in_progress', 'validating')";
const SELECT_READY_SQL: &str = "SELECT t.id FROM tasks t JOIN plans p ON p.id = t.plan_id
    WHERE t.state = 'pending'
      AND (?2 IS NULL OR t.plan_id = ?2)
      AND NOT EXISTS (
          SELECT 1 FROM task_dependencies d JOIN tasks dep ON dep.id = d.depends_on
          WHERE d.task_id = t.id AND dep.state != 'completed')
      AND (SELECT COUNT(*) FROM tasks l
           WHERE l.plan_id = t.plan_id
             AND l.state IN ('claimed', 'in_progress', 'validating')) < ?1
    ORDER BY p.priority DESC, t.id ASC
    LIMIT 1";
const CLAIM_SQL: &str = "UPDATE tasks SET state = 'claimed', lease_token = ?1, lease_owner = ?2, lease_expires_at = ?3, updated_at = ?4 WHERE id = ?5 AND state = 'pending' AND lease_token IS NULL";
const SELECT_LEASE_SQL: &str = "SELECT state, lease_token, lease_owner, lease_expires_at, retry_count, max_retries FROM tasks WHERE id = ?1";
const SET_LEASED_STATE_SQL: &str = "UPDATE tasks SET state = ?1, artifact_ref = COALESCE(?2, artifact_ref), updated_at = ?3 WHERE id = ?4 AND lease_token = ?5";
const EXTEND_LEASE_SQL: &str = "UPDATE tasks SET lease_expires_at = ?1, updated_at = ?2 WHERE id = ?3 AND lease_token = ?4 AND lease_expires_at > ?5";
const RELEASE_SQL: &str = "UPDATE tasks SET state = ?1, retry_count = ?2, last_diagnostic = ?3, lease_token = NULL, lease_owner = NULL, lease_expires_at = NULL, updated_at = ?4 WHERE id = ?5 AND lease_token = ?6";
const SELECT_EXPIRED_SQL: &str = "SELECT id, state, lease_token, lease_owner, retry_count, max_retries FROM tasks WHERE lease_token IS NOT NULL AND lease_expires_at <= ?1 ORDER BY id";

/// Limits applied when claiming the next ready task.
#[derive(Debug, Clone, Copy)]
pub struct ClaimLimits {
    /// Upper bound on leased tasks across all plans
    pub max_concurrent: u32,
    /// Upper bound on leased tasks within one plan
    pub max_per_plan: u32,
    /// Lifetime of the new lease
    pub lease_ttl: SignedDuration,
    /// Restrict the claim to one plan
    pub plan_id: Option<u64>,
}

/// A task the reaper took back from an expired lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReapedTask {
    pub task_id: u64,
    pub from: TaskState,
    pub to: TaskState,
    pub retry_count: u32,
    /// Worker whose lease expired
    pub owner: String,
}

/// Lease columns of a task as read inside a transaction.
struct LeaseRow {
    state: TaskState,
    token: Option<String>,
    owner: String,
    expires_ms: Option<i64>,
    retry_count: u32,
    max_retries: u32,
}

impl LeaseRow {
    fn load(conn: &Connection, task_id: u64) -> Result<Self> {
        conn.query_row(SELECT_LEASE_SQL, params![task_id as i64], |row| {
            Ok(Self {
                state: enum_at(row, 0)?,
                token: row.get(1)?,
                owner: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                expires_ms: row.get(3)?,
                retry_count: row.get(4)?,
                max_retries: row.get(5)?,
            })
        })
        .optional()
        .db_context("Failed to read lease")?
        .ok_or(OrchestratorError::TaskNotFound { id: task_id })
    }

    /// Whether `token` names this lease and the lease has not run out.
    fn is_held(&self, token: &str, now: Timestamp) -> bool {
        self.token.as_deref() == Some(token)
            && self
                .expires_ms
                .is_some_and(|expires| expires > now.as_millisecond())
    }
}

fn expiry(now: Timestamp, ttl: SignedDuration) -> i64 {
    now.as_millisecond()
        .saturating_add(ttl.as_millis().clamp(0, i64::MAX as i128) as i64)
}

/// Loads the lease and rejects callers that no longer hold it.
fn held_lease(tx: &Transaction, task_id: u64, token: &str, now: Timestamp) -> Result<LeaseRow> {
    let lease = LeaseRow::load(tx, task_id)?;
    if lease.is_held(token, now) {
        Ok(lease)
    } else {
        debug!("Rejecting stale lease on task {task_id}");
        Err(OrchestratorError::StaleLease { task_id })
    }
}

/// Moves a leased task to a state that keeps the lease.
fn advance_leased(
    tx: &Transaction,
    task_id: u64,
    token: &str,
    to: TaskState,
    artifact: Option<&str>,
    now: Timestamp,
) -> Result<()> {
    let changed = tx
        .execute(
            SET_LEASED_STATE_SQL,
            params![to.as_str(), artifact, now.to_string(), task_id as i64, token],
        )
        .db_context("Failed to update task state")?;
    if changed == 1 {
        Ok(())
    } else {
        Err(OrchestratorError::StaleLease { task_id })
    }
}

/// Moves a task out of its leased states, dropping the lease.
fn release(
    tx: &Transaction,
    task_id: u64,
    token: &str,
    to: TaskState,
    retry_count: u32,
    diagnostic: Option<&str>,
    now: Timestamp,
) -> Result<()> {
    let changed = tx
        .execute(
            RELEASE_SQL,
            params![
                to.as_str(),
                retry_count,
                diagnostic,
                now.to_string(),
                task_id as i64,
                token
            ],
        )
        .db_context("Failed to release lease")?;
    if changed == 1 {
        Ok(())
    } else {
        Err(OrchestratorError::ConcurrencyConflict {
            message: format!("lease on task {task_id} changed during release"),
        })
    }
}

impl super::Database {
    /// Claims the next ready task for `worker`, or returns `None` when
    /// nothing is ready or a concurrency limit is reached.
    ///
    /// A task is ready when it is pending and every dependency has
    /// completed. Candidates are ordered by plan priority, then creation
    /// order.
    pub fn claim_next(
        &mut self,
        worker: &str,
        limits: &ClaimLimits,
        now: Timestamp,
    ) -> Result<Option<Task>> {
        let tx = self.immediate()?;

        let leased: i64 = tx
            .query_row(COUNT_LEASED_SQL, [], |row| row.get(0))
            .db_context("Failed to count leased tasks")?;
        if leased >= i64::from(limits.max_concurrent) {
            debug!("Global concurrency limit reached ({leased} leased)");
            return Ok(None);
        }

        let candidate = tx
            .query_row(
                SELECT_READY_SQL,
                params![limits.max_per_plan, limits.plan_id.map(|id| id as i64)],
                |row| id_at(row, 0),
            )
            .optional()
            .db_context("Failed to select ready task")?;
        let Some(task_id) = candidate else {
            return Ok(None);
        };

        let token = Uuid::new_v4().to_string();
        record_transition(
            &tx,
            task_id,
            TaskState::Pending,
            TaskState::Claimed,
            worker,
            "claimed",
            now,
        )?;
        let changed = tx
            .execute(
                CLAIM_SQL,
                params![
                    token,
                    worker,
                    expiry(now, limits.lease_ttl),
                    now.to_string(),
                    task_id as i64
                ],
            )
            .db_context("Failed to claim task")?;
        if changed != 1 {
            return Err(OrchestratorError::ConcurrencyConflict {
                message: format!("task {task_id} was claimed concurrently"),
            });
        }

        tx.commit().db_context("Failed to commit transaction")?;
        info!("Worker {worker} claimed task {task_id}");

        self.get_task(task_id)
    }

    /// Starts the external action: `claimed -> in_progress`.
    pub fn begin_task(&mut self, task_id: u64, token: &str, now: Timestamp) -> Result<Task> {
        let tx = self.immediate()?;
        let lease = held_lease(&tx, task_id, token, now)?;

        record_transition(
            &tx,
            task_id,
            lease.state,
            TaskState::InProgress,
            &lease.owner,
            "action started",
            now,
        )?;
        advance_leased(&tx, task_id, token, TaskState::InProgress, None, now)?;
        tx.commit().db_context("Failed to commit transaction")?;

        self.get_task(task_id)?
            .ok_or(OrchestratorError::TaskNotFound { id: task_id })
    }

    /// Extends a live lease by `ttl` from `now`.
    ///
    /// Fails with [`OrchestratorError::LeaseExpired`] when the token no longer
    /// names the lease or the lease has already run out.
    pub fn heartbeat(
        &mut self,
        task_id: u64,
        token: &str,
        ttl: SignedDuration,
        now: Timestamp,
    ) -> Result<Lease> {
        let tx = self.immediate()?;
        let lease = LeaseRow::load(&tx, task_id)?;
        let expires = expiry(now, ttl);

        let changed = tx
            .execute(
                EXTEND_LEASE_SQL,
                params![
                    expires,
                    now.to_string(),
                    task_id as i64,
                    token,
                    now.as_millisecond()
                ],
            )
            .db_context("Failed to extend lease")?;
        if changed != 1 {
            return Err(OrchestratorError::LeaseExpired { task_id });
        }
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Lease {
            task_id,
            token: token.to_string(),
            owner: lease.owner,
            expires_at: Timestamp::from_millisecond(expires).map_err(|e| {
                OrchestratorError::Configuration {
                    message: format!("Lease expiry out of range: {e}"),
                }
            })?,
        })
    }

    /// Records that the external action finished: `in_progress ->
    /// validating`, keeping the returned artifact reference.
    pub fn submit_action(
        &mut self,
        task_id: u64,
        token: &str,
        artifact: Option<&str>,
        now: Timestamp,
    ) -> Result<Task> {
        let tx = self.immediate()?;
        let lease = held_lease(&tx, task_id, token, now)?;

        record_transition(
            &tx,
            task_id,
            lease.state,
            TaskState::Validating,
            &lease.owner,
            "action finished",
            now,
        )?;
        advance_leased(&tx, task_id, token, TaskState::Validating, artifact, now)?;
        tx.commit().db_context("Failed to commit transaction")?;

        self.get_task(task_id)?
            .ok_or(OrchestratorError::TaskNotFound { id: task_id })
    }

    /// Records a gate report for the current attempt and applies its
    /// outcome.
    ///
    /// The results and the transitions are written in one transaction that
    /// first checks the lease, so a report from a stale attempt leaves no
    /// trace. A blocked outcome with retries left goes `validating ->
    /// blocked -> pending` and consumes one retry; without retries left it
    /// goes straight to `failed`.
    pub fn finish_validation(
        &mut self,
        task_id: u64,
        token: &str,
        report: &GateReport,
        now: Timestamp,
    ) -> Result<Task> {
        let tx = self.immediate()?;
        let lease = held_lease(&tx, task_id, token, now)?;
        let actor = lease.owner.as_str();
        let attempt = lease.retry_count + 1;

        let outcome = report
            .outcome
            .with_retry_budget(lease.retry_count < lease.max_retries);
        let diagnostic = report.diagnostic();
        let reason = diagnostic.as_deref().unwrap_or("quality gate passed");

        // Check the first hop before anything is written.
        let first = match outcome {
            GateOutcome::Pass => TaskState::Completed,
            GateOutcome::Blocked => TaskState::Blocked,
            GateOutcome::Failed => TaskState::Failed,
        };
        record_transition(&tx, task_id, lease.state, first, actor, reason, now)?;

        for run in &report.runs {
            insert_result(&tx, task_id, attempt, run, now)?;
        }

        match outcome {
            GateOutcome::Pass => {
                release(&tx, task_id, token, first, lease.retry_count, None, now)?;
            }
            GateOutcome::Failed => {
                release(
                    &tx,
                    task_id,
                    token,
                    first,
                    lease.retry_count,
                    diagnostic.as_deref(),
                    now,
                )?;
            }
            GateOutcome::Blocked => {
                let (next, retry_count) = retry_target(lease.retry_count, lease.max_retries);
                record_transition(
                    &tx,
                    task_id,
                    TaskState::Blocked,
                    next,
                    "scheduler",
                    &format!("retry {retry_count} of {}", lease.max_retries),
                    now,
                )?;
                release(
                    &tx,
                    task_id,
                    token,
                    next,
                    retry_count,
                    diagnostic.as_deref(),
                    now,
                )?;
            }
        }

        tx.commit().db_context("Failed to commit transaction")?;
        info!("Task {task_id} attempt {attempt} finished validation: {outcome}");

        self.get_task(task_id)?
            .ok_or(OrchestratorError::TaskNotFound { id: task_id })
    }

    /// Returns every task whose lease has run out to `pending`, consuming a
    /// retry, or to `failed` when no retries remain.
    pub fn reap_expired(&mut self, now: Timestamp) -> Result<Vec<ReapedTask>> {
        let tx = self.immediate()?;

        let expired = {
            let mut stmt = tx
                .prepare(SELECT_EXPIRED_SQL)
                .db_context("Failed to prepare query")?;
            let rows = stmt
                .query_map(params![now.as_millisecond()], |row| {
                    Ok((
                        id_at(row, 0)?,
                        LeaseRow {
                            state: enum_at(row, 1)?,
                            token: row.get(2)?,
                            owner: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                            expires_ms: None,
                            retry_count: row.get(4)?,
                            max_retries: row.get(5)?,
                        },
                    ))
                })
                .db_context("Failed to query expired leases")?
                .collect::<rusqlite::Result<Vec<_>>>()
                .db_context("Failed to read expired leases")?;
            rows
        };

        let mut reaped = Vec::with_capacity(expired.len());
        for (task_id, lease) in expired {
            let Some(token) = lease.token.as_deref() else {
                continue;
            };
            let (to, retry_count) = retry_target(lease.retry_count, lease.max_retries);
            let reason = format!("lease held by {} expired", lease.owner);

            record_transition(&tx, task_id, lease.state, to, "reaper", &reason, now)?;
            release(&tx, task_id, token, to, retry_count, Some(&reason), now)?;

            warn!(
                "Reaped task {task_id} from {}: {} -> {}",
                lease.owner,
                lease.state.as_str(),
                to.as_str()
            );
            reaped.push(ReapedTask {
                task_id,
                from: lease.state,
                to,
                retry_count,
                owner: lease.owner,
            });
        }

        tx.commit().db_context("Failed to commit transaction")?;
        Ok(reaped)
    }
}
