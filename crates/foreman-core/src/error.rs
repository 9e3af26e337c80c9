//! Error types for the orchestrator library.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::TaskState;

/// Comprehensive error type for all orchestrator operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// The store stayed locked past the busy timeout or a write lost a race
    #[error("Concurrency conflict: {message}")]
    ConcurrencyConflict { message: String },
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: u64 },
    /// Task not found for the given ID
    #[error("Task with ID {id} not found")]
    TaskNotFound { id: u64 },
    /// No documentation of the requested kind/version exists
    #[error("No {kind} documentation found for project '{project}'")]
    DocumentNotFound { project: String, kind: String },
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Dependency graph is cyclic or references unknown nodes
    #[error("Invalid plan graph: {reason}")]
    InvalidPlanGraph { reason: String },
    /// Transition not present in the lifecycle table
    #[error("Illegal transition for task {task_id}: {from} -> {to}")]
    IllegalTransition {
        task_id: u64,
        from: TaskState,
        to: TaskState,
    },
    /// Heartbeat against a lease that is no longer current
    #[error("Lease on task {task_id} has expired or was reclaimed")]
    LeaseExpired { task_id: u64 },
    /// Report against a lease that is no longer current
    #[error("Stale lease for task {task_id}; the report was not applied")]
    StaleLease { task_id: u64 },
    /// Tool name not in the catalog
    #[error("Unknown tool '{name}'")]
    UnknownTool { name: String },
    /// Tool arguments failed to deserialize or validate
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },
    /// External action executor failure
    #[error("Executor error: {message}")]
    Executor { message: String },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    ///
    /// Busy and locked failures surface as
    /// [`OrchestratorError::ConcurrencyConflict`] so callers can retry them.
    pub fn with_source(self, source: rusqlite::Error) -> OrchestratorError {
        if is_busy(&source) {
            return OrchestratorError::ConcurrencyConflict {
                message: format!("{}: {}", self.message, source),
            };
        }
        OrchestratorError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> OrchestratorError {
        OrchestratorError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

fn is_busy(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

impl OrchestratorError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    /// Creates an invalid plan graph error.
    pub fn invalid_graph(reason: impl Into<String>) -> Self {
        Self::InvalidPlanGraph {
            reason: reason.into(),
        }
    }

    /// Wraps a `spawn_blocking` join failure.
    pub fn join(error: tokio::task::JoinError) -> Self {
        Self::Configuration {
            message: format!("Task join error: {error}"),
        }
    }

    /// Taxonomy category reported to tool callers.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "ValidationError",
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::UnknownTool { .. } => "UnknownTool",
            Self::InvalidPlanGraph { .. } => "InvalidPlanGraph",
            Self::ConcurrencyConflict { .. } => "ConcurrencyConflict",
            Self::LeaseExpired { .. } => "LeaseExpired",
            Self::StaleLease { .. } => "StaleLease",
            Self::IllegalTransition { .. } => "IllegalTransition",
            Self::PlanNotFound { .. } | Self::TaskNotFound { .. } | Self::DocumentNotFound { .. } => {
                "NotFound"
            }
            Self::Executor { .. } => "ExecutorError",
            Self::Database { .. }
            | Self::FileSystem { .. }
            | Self::XdgDirectory(_)
            | Self::Serialization { .. }
            | Self::Configuration { .. } => "InternalError",
        }
    }

    /// Whether the caller should retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Executor { .. }
        )
    }

    /// Whether the error is the caller's fault (bad input, bad graph, bad tool).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::InvalidArguments { .. }
                | Self::UnknownTool { .. }
                | Self::InvalidPlanGraph { .. }
        )
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| OrchestratorError::database(message).with_source(e))
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
