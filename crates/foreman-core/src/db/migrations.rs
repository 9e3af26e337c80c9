//! Database schema initialization and migrations.

use log::debug;

use crate::error::{DatabaseResultExt, Result};

/// Schema revision written to `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

impl super::Database {
    /// Initializes the database schema using the embedded SQL file.
    pub(super) fn initialize_schema(&self) -> Result<()> {
        self.connection
            .pragma_update(None, "foreign_keys", "ON")
            .db_context("Failed to enable foreign keys")?;

        // WAL lets readers proceed while a worker holds the write lock
        let mode: String = self
            .connection
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .db_context("Failed to enable WAL journal")?;
        debug!("SQLite journal mode: {mode}");

        let schema_sql = include_str!("../../assets/schema.sql");
        self.connection
            .execute_batch(schema_sql)
            .db_context("Failed to initialize database schema")?;

        self.apply_migrations()?;

        Ok(())
    }

    /// Apply database migrations for existing databases
    fn apply_migrations(&self) -> Result<()> {
        let version: i64 = self
            .connection
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .db_context("Failed to read schema version")?;

        if version >= SCHEMA_VERSION {
            return Ok(());
        }

        // Early databases predate plan priorities
        let has_priority_column: bool = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM pragma_table_info('plans') WHERE name = 'priority'",
                [],
                |row| row.get(0),
            )
            .map(|count: i64| count > 0)
            .db_context("Failed to inspect plans table")?;

        if !has_priority_column {
            self.connection
                .execute(
                    "ALTER TABLE plans ADD COLUMN priority INTEGER NOT NULL DEFAULT 0",
                    [],
                )
                .db_context("Failed to add priority column to plans table")?;
        }

        self.connection
            .pragma_update(None, "user_version", SCHEMA_VERSION)
            .db_context("Failed to record schema version")?;
        debug!("Migrated database schema from version {version} to {SCHEMA_VERSION}");

        Ok(())
    }
}
