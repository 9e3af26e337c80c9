//! Versioned documentation storage. Appending is the only write.

use jiff::Timestamp;
use rusqlite::{params, OptionalExtension};

use super::utils::{enum_at, id_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, OrchestratorError, Result},
    models::{DocSnapshot, Document, DocumentKind},
};

const NEXT_VERSION_SQL: &str =
    "SELECT COALESCE(MAX(version), 0) + 1 FROM documents WHERE project = ?1 AND kind = ?2";
const INSERT_DOCUMENT_SQL: &str = "INSERT INTO documents (project, kind, version, body, created_at) VALUES (?1, ?2, ?3, ?4, ?5)";
const SELECT_LATEST_SQL: &str = "SELECT id, project, kind, version, body, created_at FROM documents WHERE project = ?1 AND kind = ?2 ORDER BY version DESC LIMIT 1";
const SELECT_VERSION_SQL: &str = "SELECT id, project, kind, version, body, created_at FROM documents WHERE project = ?1 AND kind = ?2 AND version = ?3";
const SELECT_ALL_SQL: &str = "SELECT id, project, kind, version, body, created_at FROM documents WHERE project = ?1 ORDER BY kind, version";
const SELECT_SNAPSHOT_SQL: &str = "SELECT d.id, d.project, d.kind, d.version, d.body, d.created_at FROM documents d
    WHERE d.project = ?1
      AND d.version = (SELECT MAX(version) FROM documents m WHERE m.project = d.project AND m.kind = d.kind)
    ORDER BY d.kind";

fn build_document_from_row(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: id_at(row, 0)?,
        project: row.get(1)?,
        kind: enum_at(row, 2)?,
        version: row.get(3)?,
        body: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
    })
}

impl super::Database {
    /// Appends a new version of a document. The first version is 1.
    pub fn append_document(
        &mut self,
        project: &str,
        kind: DocumentKind,
        body: &str,
        now: Timestamp,
    ) -> Result<Document> {
        if project.trim().is_empty() {
            return Err(OrchestratorError::invalid_input("project").with_reason("cannot be empty"));
        }

        let tx = self.immediate()?;
        let version: u32 = tx
            .query_row(NEXT_VERSION_SQL, params![project, kind.as_str()], |row| {
                row.get(0)
            })
            .db_context("Failed to compute next document version")?;

        tx.execute(
            INSERT_DOCUMENT_SQL,
            params![project, kind.as_str(), version, body, now.to_string()],
        )
        .db_context("Failed to insert document")?;
        let id = tx.last_insert_rowid() as u64;
        tx.commit().db_context("Failed to commit transaction")?;

        Ok(Document {
            id,
            project: project.to_string(),
            kind,
            version,
            body: body.to_string(),
            created_at: now,
        })
    }

    /// Reads one version of a document, or the latest when `version` is
    /// `None`.
    pub fn get_document(
        &self,
        project: &str,
        kind: DocumentKind,
        version: Option<u32>,
    ) -> Result<Option<Document>> {
        let document = match version {
            Some(version) => self.connection.query_row(
                SELECT_VERSION_SQL,
                params![project, kind.as_str(), version],
                build_document_from_row,
            ),
            None => self.connection.query_row(
                SELECT_LATEST_SQL,
                params![project, kind.as_str()],
                build_document_from_row,
            ),
        };
        document.optional().db_context("Failed to query document")
    }

    /// Lists every version of every document of a project.
    pub fn list_documents(&self, project: &str) -> Result<Vec<Document>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_ALL_SQL)
            .db_context("Failed to prepare query")?;
        let documents = stmt
            .query_map(params![project], build_document_from_row)
            .db_context("Failed to query documents")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read documents")?;

        Ok(documents)
    }

    /// Captures the latest version of each document kind for a project.
    pub fn snapshot(&self, project: &str) -> Result<DocSnapshot> {
        let mut stmt = self
            .connection
            .prepare(SELECT_SNAPSHOT_SQL)
            .db_context("Failed to prepare query")?;
        let documents = stmt
            .query_map(params![project], build_document_from_row)
            .db_context("Failed to query snapshot")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read snapshot")?;

        Ok(DocSnapshot {
            project: project.to_string(),
            documents,
        })
    }
}
