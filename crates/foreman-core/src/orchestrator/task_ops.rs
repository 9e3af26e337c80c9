//! Task operations for the Orchestrator: inspection, the advisory gate and
//! the worker lifecycle.

use serde_json::json;

use super::Orchestrator;
use crate::{
    db::with_database,
    display::{ClaimResult, ReapedTasks, TaskHistory},
    error::{OrchestratorError, Result},
    gate::GateReport,
    models::{Lease, Task},
    params::{ClaimTask, Id, LeaseRef, ReportDone, ReportFailure},
    scheduler::AttemptResult,
};

impl Orchestrator {
    /// Retrieves a task with its transition history and quality results.
    pub async fn show_task(&self, params: &Id) -> Result<Task> {
        let id = params.id;
        with_database(self.db_path.clone(), move |db| db.get_task_detailed(id))
            .await?
            .ok_or(OrchestratorError::TaskNotFound { id })
    }

    /// Retrieves the recorded transitions of a task, oldest first.
    pub async fn task_history(&self, params: &Id) -> Result<TaskHistory> {
        let task_id = params.id;
        let transitions = with_database(self.db_path.clone(), move |db| {
            db.get_task(task_id)?
                .ok_or(OrchestratorError::TaskNotFound { id: task_id })?;
            db.get_history(task_id)
        })
        .await?;
        Ok(TaskHistory {
            task_id,
            transitions,
        })
    }

    /// Runs the quality gate against a task's current artifact without
    /// recording anything or changing its state.
    pub async fn run_quality_gate(&self, params: &Id) -> Result<GateReport> {
        let task = self.show_task(params).await?;
        Ok(self.scheduler.gate().run(&task).await)
    }

    /// Claims the next ready task for a worker.
    pub async fn claim_task(&self, params: &ClaimTask) -> Result<ClaimResult> {
        let task = self
            .scheduler
            .poll(params.worker.trim(), params.plan_id)
            .await?;
        Ok(ClaimResult { task })
    }

    /// `claimed -> in_progress` for the lease holder.
    pub async fn begin_task(&self, params: &LeaseRef) -> Result<Task> {
        self.scheduler.begin(params.task_id, &params.token).await
    }

    /// Extends the caller's lease.
    pub async fn heartbeat(&self, params: &LeaseRef) -> Result<Lease> {
        self.scheduler
            .heartbeat(params.task_id, &params.token)
            .await
    }

    /// Reports a finished action and runs the quality gate.
    pub async fn report_done(&self, params: &ReportDone) -> Result<AttemptResult> {
        let artifact = params
            .artifact
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);
        self.scheduler
            .complete(params.task_id, &params.token, artifact)
            .await
    }

    /// Reports a failed action.
    pub async fn report_failure(&self, params: &ReportFailure) -> Result<AttemptResult> {
        self.scheduler
            .fail(
                params.task_id,
                &params.token,
                json!({ "message": params.message }),
            )
            .await
    }

    /// Runs one reaper sweep.
    pub async fn reap(&self) -> Result<ReapedTasks> {
        Ok(ReapedTasks(self.scheduler.reap().await?))
    }
}
