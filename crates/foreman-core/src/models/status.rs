//! Status enumerations for tasks and plans.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Pending`, `Completed` and `Failed` are stable; `Claimed`, `InProgress`
/// and `Validating` exist only while a worker holds a lease; `Blocked` is
/// transient and is immediately followed by `Pending`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for dependencies or a free worker
    Pending,
    /// Leased by a worker that has not started yet
    Claimed,
    /// External action running
    InProgress,
    /// Quality gate running
    Validating,
    /// Recoverable gate failure recorded, about to retry
    Blocked,
    /// Terminal failure; needs external intervention
    Failed,
    /// Terminal success
    Completed,
}

impl TaskState {
    /// All states, in lifecycle order.
    pub const ALL: [TaskState; 7] = [
        TaskState::Pending,
        TaskState::Claimed,
        TaskState::InProgress,
        TaskState::Validating,
        TaskState::Blocked,
        TaskState::Failed,
        TaskState::Completed,
    ];

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Claimed => "claimed",
            TaskState::InProgress => "in_progress",
            TaskState::Validating => "validating",
            TaskState::Blocked => "blocked",
            TaskState::Failed => "failed",
            TaskState::Completed => "completed",
        }
    }

    /// States that require a live lease.
    pub fn is_leased(&self) -> bool {
        matches!(
            self,
            TaskState::Claimed | TaskState::InProgress | TaskState::Validating
        )
    }

    /// States a task never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Status with a consistent icon for markdown output.
    pub fn with_icon(&self) -> &'static str {
        match self {
            TaskState::Pending => "○ Pending",
            TaskState::Claimed => "◔ Claimed",
            TaskState::InProgress => "➤ In Progress",
            TaskState::Validating => "◑ Validating",
            TaskState::Blocked => "⏸ Blocked",
            TaskState::Failed => "✗ Failed",
            TaskState::Completed => "✓ Completed",
        }
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskState::Pending),
            "claimed" => Ok(TaskState::Claimed),
            "in_progress" | "inprogress" => Ok(TaskState::InProgress),
            "validating" => Ok(TaskState::Validating),
            "blocked" => Ok(TaskState::Blocked),
            "failed" => Ok(TaskState::Failed),
            "completed" => Ok(TaskState::Completed),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Derived status of a plan, computed from its task states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// At least one task is not terminal
    #[default]
    Active,
    /// Every task completed
    Completed,
    /// Every task is terminal and at least one failed
    Failed,
}

impl PlanStatus {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
        }
    }

    /// Derive the plan status from task counts.
    pub fn from_counts(total: u64, completed: u64, failed: u64) -> Self {
        if total == 0 || completed + failed < total {
            PlanStatus::Active
        } else if failed == 0 {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        }
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(PlanStatus::Active),
            "completed" => Ok(PlanStatus::Completed),
            "failed" => Ok(PlanStatus::Failed),
            _ => Err(format!("Invalid plan status: {s}")),
        }
    }
}
