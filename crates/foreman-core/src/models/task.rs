//! Task model, its lease and transition history.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::{QualityCheckResult, TaskState};

/// Capability flags on a task payload. Quality stages select on these.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Touches UI-layer artifacts (views, components, templates)
    Ui,
    /// Touches persistent schema (migrations, models)
    Schema,
    /// Touches an externally consumed API surface
    Api,
}

impl Capability {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Ui => "ui",
            Capability::Schema => "schema",
            Capability::Api => "api",
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ui" | "frontend" => Ok(Capability::Ui),
            "schema" | "db" => Ok(Capability::Schema),
            "api" => Ok(Capability::Api),
            _ => Err(format!("Invalid capability: {s}")),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work description handed to the external action executor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct TaskPayload {
    /// What to build
    pub description: Option<String>,
    /// Completion criteria
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    /// Capability flags used to select quality stages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<Capability>,
}

impl TaskPayload {
    /// Whether the payload declares the capability.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// A time-bounded claim a worker holds on a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Lease {
    /// Task the lease covers
    pub task_id: u64,
    /// Opaque token proving ownership
    pub token: String,
    /// Worker that holds the lease
    pub owner: String,
    /// Expiry (UTC)
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub expires_at: Timestamp,
}

/// One recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Transition {
    pub id: u64,
    pub task_id: u64,
    pub from: TaskState,
    pub to: TaskState,
    /// Worker id, `reaper`, or `scheduler`
    pub actor: String,
    pub reason: String,
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub at: Timestamp,
}

/// The central unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Task {
    /// Unique identifier for the task
    pub id: u64,

    /// ID of the owning plan
    pub plan_id: u64,

    /// Stable key within the plan, used by dependency edges
    pub key: String,

    /// Brief title
    pub title: String,

    /// Work description and acceptance criteria
    pub payload: TaskPayload,

    /// Current lifecycle state
    pub state: TaskState,

    /// Re-attempts consumed so far
    pub retry_count: u32,

    /// Re-attempt budget fixed at creation
    pub max_retries: u32,

    /// IDs of the tasks this one waits for
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<u64>,

    /// Current lease, present only in leased states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<Lease>,

    /// Reference returned by the last external action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,

    /// Most recent failure diagnostic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_diagnostic: Option<String>,

    /// Timestamp when the task was created (UTC)
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub created_at: Timestamp,

    /// Timestamp when the task was last updated (UTC)
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub updated_at: Timestamp,

    /// Transition history (lazy-loaded)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Transition>,

    /// Quality results across all attempts (lazy-loaded)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<QualityCheckResult>,
}

impl Task {
    /// Attempt number of the current (or next) run, starting at 1.
    pub fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// Whether another retry fits in the budget.
    pub fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }
}
