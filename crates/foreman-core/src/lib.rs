//! Core library for the Foreman task orchestrator.
//!
//! Foreman turns ideas into dependency-ordered task graphs, hands tasks to
//! workers under time-bounded leases, and decides each attempt's fate with a
//! staged quality gate. All state lives in one SQLite database; every task
//! state change goes through the lifecycle table in [`state_machine`].
//!
//! # Layout
//!
//! - [`planning`]: idea + documentation snapshot → validated task graph
//! - [`scheduler`]: claim, begin, heartbeat, complete/fail, reap; worker pool
//! - [`gate`]: quality stages, runners and the verdict fold
//! - [`db`]: the store, including the lease compare-and-swap
//! - [`orchestrator`]: async facade used by the CLI and the tool surface
//! - [`protocol`]: the tool catalog and its dispatcher
//! - [`display`]: Markdown rendering of everything above
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use foreman_core::{
//!     params::{ClaimTask, ReportDone, SubmitIdea},
//!     OrchestratorBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = OrchestratorBuilder::new()
//!     .with_database_path(Some("foreman.db"))
//!     .build()
//!     .await?;
//!
//! orchestrator
//!     .submit_idea(&SubmitIdea {
//!         project: "shop".to_string(),
//!         text: "Add login\n- [form] Login form => shows errors".to_string(),
//!         priority: 0,
//!     })
//!     .await?;
//!
//! let claim = orchestrator
//!     .claim_task(&ClaimTask {
//!         worker: "agent-1".to_string(),
//!         plan_id: None,
//!     })
//!     .await?;
//! if let Some(task) = claim.task {
//!     let token = task.lease.map(|l| l.token).unwrap_or_default();
//!     orchestrator
//!         .begin_task(&foreman_core::params::LeaseRef { task_id: task.id, token: token.clone() })
//!         .await?;
//!     let result = orchestrator
//!         .report_done(&ReportDone { task_id: task.id, token, artifact: None })
//!         .await?;
//!     println!("{result}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod gate;
pub mod models;
pub mod orchestrator;
pub mod params;
pub mod planning;
pub mod protocol;
pub mod scheduler;
pub mod state_machine;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{OrchestratorError, Result};
pub use models::{
    Document, DocumentKind, Plan, PlanStatus, PlanSummary, Task, TaskState, Transition,
};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use protocol::{dispatch, ToolName, ToolOutput};
pub use scheduler::{Scheduler, WorkerPool};
