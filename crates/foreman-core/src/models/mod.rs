//! Data models for ideas, plans, tasks, quality results and documentation.
//!
//! Display implementations for these models live in
//! [`crate::display::models`] so that the data structures stay free of
//! presentation logic. Every model formats as markdown:
//!
//! - **Plan**: header with ID and title, metadata, nested task list
//! - **Task**: state with icon, lease, payload, quality results per attempt
//! - **PlanSummary**: compact list entry with per-state counts
//!
//! # Examples
//!
//! ```rust
//! use foreman_core::models::{Plan, PlanStatus};
//! use jiff::Timestamp;
//!
//! let plan = Plan {
//!     id: 1,
//!     title: "Add login".to_string(),
//!     project: "shop".to_string(),
//!     priority: 0,
//!     idea_id: None,
//!     fingerprint: None,
//!     status: PlanStatus::Active,
//!     created_at: Timestamp::now(),
//!     tasks: vec![],
//!     questions: vec![],
//! };
//! println!("{}", plan);
//! ```

pub mod document;
pub mod idea;
pub mod plan;
pub mod quality;
pub mod status;
pub mod summary;
pub mod task;


pub use document::{DocSnapshot, Document, DocumentKind};
pub use idea::Idea;
pub use plan::{OpenQuestion, Plan};
pub use quality::{QualityCheckResult, StageKind, Verdict};
pub use status::{PlanStatus, TaskState};
pub use summary::PlanSummary;
pub use task::{Capability, Lease, Task, TaskPayload, Transition};
