//! High-level orchestrator API.
//!
//! The [`Orchestrator`] is the single entry point the CLI and the tool
//! surface use. It owns the database path, the loaded configuration and the
//! [`Scheduler`]; every operation opens its own connection on the blocking
//! pool, so an `Orchestrator` can be shared freely between tasks.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────────┐    ┌──────────────┐
//! │ CLI / tools  │───▶│   Orchestrator   │───▶│   Database   │
//! │              │    │ plan/task/doc ops│    │   (db/)      │
//! └──────────────┘    └────────┬─────────┘    └──────────────┘
//!                              │ planning (pure)
//!                              │ scheduler + quality gate
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use foreman_core::{params::SubmitIdea, OrchestratorBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = OrchestratorBuilder::new()
//!     .with_database_path(Some("/tmp/foreman.db"))
//!     .build()
//!     .await?;
//!
//! let submission = orchestrator
//!     .submit_idea(&SubmitIdea {
//!         project: "shop".to_string(),
//!         text: "Add login\n- [form] Login form\n- [wire] Wire up (after: form)".to_string(),
//!         priority: 0,
//!     })
//!     .await?;
//! println!("{submission}");
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use crate::{config::Config, scheduler::Scheduler};

pub mod builder;
pub mod doc_ops;
pub mod plan_ops;
pub mod task_ops;

pub use builder::OrchestratorBuilder;

/// Main orchestrator interface.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) db_path: PathBuf,
    pub(crate) config: Config,
    pub(crate) scheduler: Scheduler,
}

impl Orchestrator {
    pub(crate) fn new(db_path: PathBuf, config: Config, scheduler: Scheduler) -> Self {
        Self {
            db_path,
            config,
            scheduler,
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The scheduler bound to this orchestrator's database and gate.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
