//! Plan summary types and functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{Plan, PlanStatus, TaskState};

/// Summary information about a plan with per-state task counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct PlanSummary {
    /// Plan ID
    pub id: u64,
    /// Title of the plan
    pub title: String,
    /// Project key
    pub project: String,
    /// Scheduling priority
    pub priority: i32,
    /// Derived plan status
    pub status: PlanStatus,
    /// Creation timestamp
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub created_at: Timestamp,
    /// Total number of tasks
    pub total_tasks: u32,
    /// Tasks waiting to run
    pub pending_tasks: u32,
    /// Tasks currently leased (claimed, in progress or validating)
    pub active_tasks: u32,
    /// Tasks that completed
    pub completed_tasks: u32,
    /// Tasks that failed
    pub failed_tasks: u32,
    /// Open questions attached to the plan
    pub open_questions: u32,
}

impl PlanSummary {
    /// Whether every task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.total_tasks > 0 && self.completed_tasks + self.failed_tasks == self.total_tasks
    }
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        let count = |pred: &dyn Fn(TaskState) -> bool| {
            plan.tasks.iter().filter(|t| pred(t.state)).count() as u32
        };
        let total_tasks = plan.tasks.len() as u32;
        let completed_tasks = count(&|s| s == TaskState::Completed);
        let failed_tasks = count(&|s| s == TaskState::Failed);

        Self {
            id: plan.id,
            title: plan.title.clone(),
            project: plan.project.clone(),
            priority: plan.priority,
            status: PlanStatus::from_counts(
                total_tasks.into(),
                completed_tasks.into(),
                failed_tasks.into(),
            ),
            created_at: plan.created_at,
            total_tasks,
            pending_tasks: count(&|s| matches!(s, TaskState::Pending | TaskState::Blocked)),
            active_tasks: count(&|s| s.is_leased()),
            completed_tasks,
            failed_tasks,
            open_questions: plan.questions.len() as u32,
        }
    }
}
