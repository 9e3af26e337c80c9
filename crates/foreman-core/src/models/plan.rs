//! Plan model definition and related functionality.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{PlanStatus, Task, TaskState};

/// A directed acyclic graph of tasks derived from an idea or submitted
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Plan {
    /// Unique identifier for the plan
    pub id: u64,

    /// Title of the plan
    pub title: String,

    /// Project the plan belongs to
    pub project: String,

    /// Scheduling priority; higher runs first
    #[serde(default)]
    pub priority: i32,

    /// Idea the plan was derived from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idea_id: Option<u64>,

    /// Content fingerprint of the planning input, if derived from an idea
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Status derived from the task states
    #[serde(default)]
    pub status: PlanStatus,

    /// Timestamp when the plan was created (UTC)
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub created_at: Timestamp,

    /// Associated tasks in creation order
    #[serde(default)]
    pub tasks: Vec<Task>,

    /// Gaps flagged during requirements analysis
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<OpenQuestion>,
}

impl Plan {
    /// Recomputes [`Plan::status`] from the loaded tasks.
    pub fn refresh_status(&mut self) {
        let total = self.tasks.len() as u64;
        let completed = self.count(TaskState::Completed);
        let failed = self.count(TaskState::Failed);
        self.status = PlanStatus::from_counts(total, completed, failed);
    }

    /// Whether every task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.state.is_terminal())
    }

    /// Looks up a task by its key.
    pub fn task_by_key(&self, key: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.key == key)
    }

    fn count(&self, state: TaskState) -> u64 {
        self.tasks.iter().filter(|t| t.state == state).count() as u64
    }
}

/// A requirement that could not be matched to acceptance criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct OpenQuestion {
    pub id: u64,
    pub plan_id: u64,
    /// Key of the requirement the question is about
    pub requirement_key: String,
    pub question: String,
}
