//! Database operations and SQLite management for the orchestrator.
//!
//! This module is the artifact store: ideas, plans, tasks with their leases,
//! transition history, quality results and documentation versions. It holds
//! no scheduling policy of its own beyond the lease compare-and-swap; every
//! task state change is checked against the lifecycle table in
//! [`crate::state_machine`] before it is written.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{DatabaseResultExt, OrchestratorError, Result};

pub mod check_queries;
pub mod document_queries;
pub mod lease_queries;
pub mod migrations;
pub mod plan_queries;
pub mod task_queries;
pub(crate) mod utils;

pub use lease_queries::{ClaimLimits, ReapedTask};

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection and operations handler.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Creates a new database connection and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;

        let db = Self { connection };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Starts a write transaction that takes the database write lock up front.
    ///
    /// Read-then-write sequences (lease checks, version numbering) run inside
    /// one of these so that no other writer can interleave between the read
    /// and the write.
    pub(crate) fn immediate(&mut self) -> Result<Transaction<'_>> {
        self.connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .db_context("Failed to begin transaction")
    }
}

/// Opens the database on the blocking pool and runs `op` against it.
///
/// Each call gets its own connection; SQLite's locking and the busy timeout
/// arbitrate between concurrent callers.
pub(crate) async fn with_database<T, F>(path: PathBuf, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Database) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut db = Database::new(&path)?;
        op(&mut db)
    })
    .await
    .map_err(OrchestratorError::join)?
}
