//! Worker pool: poll, execute, report.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{sync::watch, task::JoinSet, time::MissedTickBehavior};

use super::{executor::ActionExecutor, AttemptResult, Scheduler};
use crate::{
    error::{OrchestratorError, Result},
    models::Task,
};

/// A fixed number of async workers sharing one scheduler and one executor.
#[derive(Clone)]
pub struct WorkerPool {
    scheduler: Scheduler,
    executor: Arc<dyn ActionExecutor>,
    workers: usize,
    name: String,
}

impl WorkerPool {
    pub fn new(scheduler: Scheduler, executor: Arc<dyn ActionExecutor>) -> Self {
        let workers = scheduler.config().workers.max(1);
        Self {
            scheduler,
            executor,
            workers,
            name: "worker".to_string(),
        }
    }

    /// Overrides the number of workers from configuration.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Prefix for worker ids recorded as transition actors.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn worker_id(&self, index: usize) -> String {
        format!("{}-{index}", self.name)
    }

    /// Runs every worker until `shutdown` flips to `true`.
    ///
    /// A worker that is mid-attempt finishes the attempt before it stops.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut workers = JoinSet::new();
        for index in 0..self.workers {
            let pool = self.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move { pool.worker_loop(index, shutdown).await });
        }
        info!("Started {} workers", self.workers);

        while let Some(joined) = workers.join_next().await {
            joined.map_err(OrchestratorError::join)?;
        }
        info!("All workers stopped");
        Ok(())
    }

    async fn worker_loop(&self, index: usize, mut shutdown: watch::Receiver<bool>) {
        let worker = self.worker_id(index);
        let idle = self.scheduler.config().poll_interval();

        while !*shutdown.borrow() {
            let wait = match self.run_once(&worker).await {
                Ok(Some(result)) => {
                    debug!(
                        "{worker} finished task {} as {}",
                        result.task.id,
                        result.task.state.as_str()
                    );
                    continue;
                }
                Ok(None) => idle,
                Err(e) => {
                    warn!("{worker}: {e}");
                    idle
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("{worker} stopped");
    }

    /// Runs attempts for `worker` back to back until no task is ready.
    ///
    /// An attempt that loses its lease or hits a busy store does not stop
    /// the drain: expired leases are reaped so their tasks can be retried,
    /// and the next attempt starts. Other errors end the drain.
    pub async fn drain(&self, worker: &str) -> Result<Vec<AttemptResult>> {
        let mut results = Vec::new();
        loop {
            match self.run_once(worker).await {
                Ok(Some(result)) => results.push(result),
                Ok(None) => return Ok(results),
                Err(e) if is_attempt_fault(&e) => {
                    warn!("{worker}: {e}; reclaiming expired leases");
                    let reaped = self.scheduler.reap().await?;
                    for task in &reaped {
                        info!("Task {} returned to {}", task.task_id, task.to.as_str());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs a single attempt for `worker`: claims a ready task, begins it,
    /// executes it while heartbeating, then reports the outcome.
    ///
    /// Returns `None` when nothing was ready.
    pub async fn run_once(&self, worker: &str) -> Result<Option<AttemptResult>> {
        let Some(task) = self.scheduler.poll(worker, None).await? else {
            return Ok(None);
        };
        let token = task
            .lease
            .as_ref()
            .map(|lease| lease.token.clone())
            .ok_or(OrchestratorError::StaleLease { task_id: task.id })?;

        let task = self.scheduler.begin(task.id, &token).await?;
        info!("{worker} started task {} '{}'", task.id, task.title);

        let heartbeat = self.spawn_heartbeat(&task, &token);
        let outcome = self.executor.execute(&task).await;
        heartbeat.abort();

        let result = if outcome.success {
            self.scheduler
                .complete(task.id, &token, outcome.artifact)
                .await
        } else {
            self.scheduler.fail(task.id, &token, outcome.detail).await
        };

        match result {
            Ok(result) => Ok(Some(result)),
            Err(OrchestratorError::StaleLease { task_id }) => {
                warn!("{worker} lost the lease on task {task_id}; its report was discarded");
                Err(OrchestratorError::StaleLease { task_id })
            }
            Err(e) => {
                error!("{worker} could not report task {}: {e}", task.id);
                Err(e)
            }
        }
    }

    /// Keeps the lease alive while the action runs. Stops on its own once
    /// the lease is gone.
    fn spawn_heartbeat(&self, task: &Task, token: &str) -> tokio::task::JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let task_id = task.id;
        let token = token.to_string();
        let period = scheduler.config().heartbeat_interval();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period.max(Duration::from_millis(10)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the lease is fresh.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = scheduler.heartbeat(task_id, &token).await {
                    warn!("Heartbeat for task {task_id} failed: {e}");
                    if !e.is_retryable() {
                        break;
                    }
                }
            }
        })
    }
}

/// Errors that end one attempt without meaning the pool cannot continue.
fn is_attempt_fault(e: &OrchestratorError) -> bool {
    e.is_retryable()
        || matches!(
            e,
            OrchestratorError::StaleLease { .. } | OrchestratorError::LeaseExpired { .. }
        )
}
