//! Documentation operations for the Orchestrator.

use super::Orchestrator;
use crate::{
    db::with_database,
    display::Documents,
    error::{OrchestratorError, Result},
    models::Document,
    params::{AppendDocumentation, FetchDocumentation},
};

impl Orchestrator {
    /// Appends a new version of a document.
    pub async fn append_documentation(&self, params: &AppendDocumentation) -> Result<Document> {
        let project = params.project.trim().to_string();
        let kind = params.kind;
        let body = params.body.clone();
        let now = self.scheduler.now();

        with_database(self.db_path.clone(), move |db| {
            db.append_document(&project, kind, &body, now)
        })
        .await
    }

    /// Reads documentation.
    ///
    /// Without a kind: the latest version of every kind (the planning
    /// snapshot). With a kind: that document at the requested version, or
    /// its latest version.
    pub async fn fetch_documentation(&self, params: &FetchDocumentation) -> Result<Documents> {
        let project = params.project.trim().to_string();
        let kind = params.kind;
        let version = params.version;

        let documents = with_database(self.db_path.clone(), move |db| match kind {
            None => Ok(db.snapshot(&project)?.documents),
            Some(kind) => {
                let document = db.get_document(&project, kind, version)?.ok_or_else(|| {
                    OrchestratorError::DocumentNotFound {
                        project: project.clone(),
                        kind: match version {
                            Some(v) => format!("{kind} v{v}"),
                            None => kind.to_string(),
                        },
                    }
                })?;
                Ok(vec![document])
            }
        })
        .await?;
        Ok(Documents(documents))
    }

    /// Lists every stored version of every document of a project.
    pub async fn list_documentation(&self, project: &str) -> Result<Documents> {
        let project = project.trim().to_string();
        let documents =
            with_database(self.db_path.clone(), move |db| db.list_documents(&project)).await?;
        Ok(Documents(documents))
    }
}
