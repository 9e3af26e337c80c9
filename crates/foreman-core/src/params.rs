//! Parameter structures for orchestrator operations.
//!
//! These are shared by every interface: the CLI converts its clap arguments
//! into them, and the tool surface deserializes them from JSON. With the
//! `schema` feature they also derive `JsonSchema`, which is what the MCP
//! server advertises as each tool's input schema.
//!
//! Deserialization only checks shape. [`Validate::validate`] checks content
//! and always runs before an operation touches the store.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{OrchestratorError, Result},
    models::DocumentKind,
    planning::TaskNode,
};

/// Content checks applied to parameters before any side effect.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(OrchestratorError::invalid_input(field).with_reason("cannot be empty"))
    } else {
        Ok(())
    }
}

/// Generic parameters for operations requiring just an ID.
///
/// Used by show_plan, show_task, task_history and run_quality_gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Id {
    /// The ID of the resource to operate on
    pub id: u64,
}

impl Validate for Id {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Parameters for turning an idea into a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct SubmitIdea {
    /// Project whose documentation the idea is planned against
    pub project: String,
    /// Idea text: an intent line, optional constraints and `- [key] title`
    /// feature bullets
    pub text: String,
    /// Scheduling priority of the resulting plan; higher runs first
    #[serde(default)]
    pub priority: i32,
}

impl Validate for SubmitIdea {
    fn validate(&self) -> Result<()> {
        required("project", &self.project)?;
        required("text", &self.text)
    }
}

/// Parameters for submitting an explicit task graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct CreatePlan {
    /// Title of the plan
    pub title: String,
    /// Project the plan belongs to
    pub project: String,
    /// Scheduling priority; higher runs first
    #[serde(default)]
    pub priority: i32,
    /// Tasks with dependencies named by key
    pub tasks: Vec<TaskNode>,
}

impl Validate for CreatePlan {
    fn validate(&self) -> Result<()> {
        required("title", &self.title)?;
        required("project", &self.project)?;
        if self.tasks.is_empty() {
            return Err(OrchestratorError::invalid_input("tasks").with_reason("cannot be empty"));
        }
        Ok(())
    }
}

/// Parameters for listing plans.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ListPlans {
    /// Only list plans of this project
    #[serde(default)]
    pub project: Option<String>,
}

impl Validate for ListPlans {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Parameters for listing open questions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ListQuestions {
    /// Only questions of this plan
    #[serde(default)]
    pub plan_id: Option<u64>,
    /// Only questions of plans in this project
    #[serde(default)]
    pub project: Option<String>,
}

impl Validate for ListQuestions {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Parameters for reading documentation.
///
/// Without `kind`, returns the latest version of every kind. With `kind`,
/// returns that kind at `version`, or its latest version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct FetchDocumentation {
    /// Project key
    pub project: String,
    /// Document kind: specification, architecture, user_story or note
    #[serde(default)]
    pub kind: Option<DocumentKind>,
    /// Version to read; latest when omitted
    #[serde(default)]
    pub version: Option<u32>,
}

impl Validate for FetchDocumentation {
    fn validate(&self) -> Result<()> {
        required("project", &self.project)?;
        if self.version.is_some() && self.kind.is_none() {
            return Err(OrchestratorError::invalid_input("version")
                .with_reason("a version can only be read together with a kind"));
        }
        if self.version == Some(0) {
            return Err(OrchestratorError::invalid_input("version").with_reason("versions start at 1"));
        }
        Ok(())
    }
}

/// Parameters for appending a documentation version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct AppendDocumentation {
    /// Project key
    pub project: String,
    /// Document kind: specification, architecture, user_story or note
    pub kind: DocumentKind,
    /// Full document body in Markdown
    pub body: String,
}

impl Validate for AppendDocumentation {
    fn validate(&self) -> Result<()> {
        required("project", &self.project)?;
        required("body", &self.body)
    }
}

/// Parameters for claiming the next ready task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ClaimTask {
    /// Identifier of the claiming worker, recorded in the task history
    pub worker: String,
    /// Only claim from this plan
    #[serde(default)]
    pub plan_id: Option<u64>,
}

impl Validate for ClaimTask {
    fn validate(&self) -> Result<()> {
        required("worker", &self.worker)
    }
}

/// A task together with the lease token its worker holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct LeaseRef {
    /// Task ID
    pub task_id: u64,
    /// Lease token returned by claim_task
    pub token: String,
}

impl Validate for LeaseRef {
    fn validate(&self) -> Result<()> {
        required("token", &self.token)
    }
}

/// Parameters for reporting a finished action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ReportDone {
    /// Task ID
    pub task_id: u64,
    /// Lease token returned by claim_task
    pub token: String,
    /// Reference to what the action produced (path, commit, URL)
    #[serde(default)]
    pub artifact: Option<String>,
}

impl Validate for ReportDone {
    fn validate(&self) -> Result<()> {
        required("token", &self.token)
    }
}

/// Parameters for reporting a failed action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ReportFailure {
    /// Task ID
    pub task_id: u64,
    /// Lease token returned by claim_task
    pub token: String,
    /// What went wrong
    pub message: String,
}

impl Validate for ReportFailure {
    fn validate(&self) -> Result<()> {
        required("token", &self.token)?;
        required("message", &self.message)
    }
}
