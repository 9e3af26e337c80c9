//! Scheduler: lease-based task assignment and lifecycle reporting.
//!
//! The [`Scheduler`] is the only component that moves tasks through their
//! leased states. Workers talk to it in a fixed order:
//!
//! ```text
//! poll ──▶ begin ──▶ heartbeat* ──▶ complete | fail
//!   │                                   │
//!   └── pending ──▶ claimed ──▶ in_progress ──▶ validating ──▶ completed
//!                                                  │        ├─▶ blocked ──▶ pending
//!                                                  │        └─▶ failed
//! ```
//!
//! The [`reaper`] sweeps leases that ran out, and the [`worker`] pool drives
//! the whole cycle against an [`executor::ActionExecutor`].
//!
//! Every call is one short transaction on the blocking pool; there is no
//! in-memory task state shared between calls.

use std::{
    future::Future,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use jiff::{SignedDuration, Timestamp};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::MissedTickBehavior;

use crate::{
    config::SchedulerConfig,
    db::{with_database, ClaimLimits, ReapedTask},
    error::{OrchestratorError, Result},
    gate::{GateOutcome, GateReport, QualityGate, StageRun},
    models::{Lease, Task, TaskState, Verdict},
};

pub mod executor;
pub mod reaper;
pub mod worker;

pub use executor::{ActionExecutor, ActionOutcome, CommandExecutor};
pub use reaper::Reaper;
pub use worker::WorkerPool;

/// Source of the current time for lease arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Used to drive lease expiry
/// deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: SignedDuration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.saturating_add(by).unwrap_or(*now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A finished attempt: the task as stored afterwards and the gate report
/// that decided its state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct AttemptResult {
    pub task: Task,
    pub report: GateReport,
}

/// Lease-based task scheduler over one database.
#[derive(Clone)]
pub struct Scheduler {
    db_path: PathBuf,
    config: SchedulerConfig,
    gate: QualityGate,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(
        db_path: PathBuf,
        config: SchedulerConfig,
        gate: QualityGate,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db_path,
            config,
            gate,
            clock,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn gate(&self) -> &QualityGate {
        &self.gate
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Claims the next ready task for `worker`, optionally within one plan.
    ///
    /// Returns `None` when nothing is ready or a concurrency limit is
    /// reached. Never blocks waiting for work.
    pub async fn poll(&self, worker: &str, plan_id: Option<u64>) -> Result<Option<Task>> {
        if worker.trim().is_empty() {
            return Err(OrchestratorError::invalid_input("worker").with_reason("cannot be empty"));
        }
        let limits = ClaimLimits {
            max_concurrent: self.config.max_concurrent,
            max_per_plan: self.config.max_per_plan,
            lease_ttl: self.config.lease_ttl(),
            plan_id,
        };
        let worker = worker.to_string();
        let now = self.now();

        with_database(self.db_path.clone(), move |db| {
            db.claim_next(&worker, &limits, now)
        })
        .await
    }

    /// `claimed -> in_progress`.
    pub async fn begin(&self, task_id: u64, token: &str) -> Result<Task> {
        let token = token.to_string();
        let now = self.now();
        with_database(self.db_path.clone(), move |db| {
            db.begin_task(task_id, &token, now)
        })
        .await
    }

    /// Extends the lease by the configured TTL.
    pub async fn heartbeat(&self, task_id: u64, token: &str) -> Result<Lease> {
        let token = token.to_string();
        let ttl = self.config.lease_ttl();
        let now = self.now();
        with_database(self.db_path.clone(), move |db| {
            db.heartbeat(task_id, &token, ttl, now)
        })
        .await
    }

    /// Reports a successful action: moves the task to `validating`, runs the
    /// quality gate against `artifact` and applies its outcome.
    ///
    /// The lease is renewed every heartbeat interval while the gate runs and
    /// checked again before the outcome is applied. If it was lost anyway,
    /// the report is dropped and [`OrchestratorError::StaleLease`] is
    /// returned.
    pub async fn complete(
        &self,
        task_id: u64,
        token: &str,
        artifact: Option<String>,
    ) -> Result<AttemptResult> {
        let task = self.submit(task_id, token, artifact).await?;
        let report = self
            .keeping_lease(task_id, token, self.gate.run(&task))
            .await;
        self.finish(task_id, token, report).await
    }

    /// Drives `work` to completion, heartbeating the lease on `task_id` on
    /// every tick. Heartbeats stop once the lease is gone; `work` still runs
    /// to the end.
    async fn keeping_lease<F: Future>(&self, task_id: u64, token: &str, work: F) -> F::Output {
        let period = self
            .config
            .heartbeat_interval()
            .max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(work);

        loop {
            tokio::select! {
                output = &mut work => return output,
                _ = ticker.tick() => {
                    match self.heartbeat(task_id, token).await {
                        Ok(lease) => debug!(
                            "Task {task_id} lease extended to {} during validation",
                            lease.expires_at
                        ),
                        Err(e) if e.is_retryable() => {
                            warn!("Heartbeat for task {task_id} failed: {e}");
                        }
                        Err(e) => {
                            warn!("Task {task_id} lost its lease during validation: {e}");
                            return work.await;
                        }
                    }
                }
            }
        }
    }

    /// Reports a failed action. The failure is recorded as an `execution`
    /// stage result and goes through the same fold as a gate report, so it
    /// consumes a retry like any recoverable failure.
    pub async fn fail(&self, task_id: u64, token: &str, detail: Value) -> Result<AttemptResult> {
        let started = Instant::now();
        self.submit(task_id, token, None).await?;
        let run = StageRun::execution(
            Verdict::Fail,
            detail,
            started.elapsed().as_millis() as u64,
        );
        let report = GateReport::from_runs(task_id, vec![run], Vec::new());
        self.finish(task_id, token, report).await
    }

    /// Returns every expired lease to `pending` or `failed`.
    pub async fn reap(&self) -> Result<Vec<ReapedTask>> {
        let now = self.now();
        with_database(self.db_path.clone(), move |db| db.reap_expired(now)).await
    }

    async fn submit(&self, task_id: u64, token: &str, artifact: Option<String>) -> Result<Task> {
        let token = token.to_string();
        let now = self.now();
        with_database(self.db_path.clone(), move |db| {
            db.submit_action(task_id, &token, artifact.as_deref(), now)
        })
        .await
    }

    async fn finish(
        &self,
        task_id: u64,
        token: &str,
        mut report: GateReport,
    ) -> Result<AttemptResult> {
        debug!("Task {task_id} gate outcome: {}", report.outcome);
        let token = token.to_string();
        let now = self.now();
        with_database(self.db_path.clone(), move |db| {
            let task = db.finish_validation(task_id, &token, &report, now)?;
            // A blocked attempt without retries left was applied as a failure.
            if task.state == TaskState::Failed {
                report.outcome = GateOutcome::Failed;
            }
            Ok(AttemptResult { task, report })
        })
        .await
    }
}
