//! Markdown rendering of orchestrator data.
//!
//! Every model and operation result implements [`std::fmt::Display`] as
//! Markdown, so the CLI can render it in the terminal and the tool surface
//! can return it as text without either side knowing the layout.
//!
//! - [`models`]: plans, tasks, transitions, documents, leases
//! - [`collections`]: lists with empty-state messages
//! - [`results`]: submissions, claims, gate reports, finished attempts
//! - [`datetime`]: timestamp and duration formatting

pub mod collections;
pub mod datetime;
pub mod models;
pub mod results;

pub use collections::{Documents, OpenQuestions, PlanSummaries, ReapedTasks, TaskHistory};
pub use datetime::{Elapsed, LocalDateTime};
pub use results::{ClaimResult, PlanSubmission};
