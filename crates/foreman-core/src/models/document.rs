//! Versioned documentation artifacts and the snapshot handed to planning.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Kind of documentation artifact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Specification,
    Architecture,
    UserStory,
    Note,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Specification => "specification",
            DocumentKind::Architecture => "architecture",
            DocumentKind::UserStory => "user_story",
            DocumentKind::Note => "note",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "specification" | "spec" => Ok(DocumentKind::Specification),
            "architecture" => Ok(DocumentKind::Architecture),
            "user_story" | "story" => Ok(DocumentKind::UserStory),
            "note" => Ok(DocumentKind::Note),
            _ => Err(format!("Invalid document kind: {s}")),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable version of a documentation artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Document {
    pub id: u64,
    pub project: String,
    pub kind: DocumentKind,
    /// Monotonic per `(project, kind)`, starting at 1
    pub version: u32,
    pub body: String,
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub created_at: Timestamp,
}

/// The latest version of every documentation kind for a project, captured
/// once and passed explicitly into the planning pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocSnapshot {
    pub project: String,
    pub documents: Vec<Document>,
}

impl DocSnapshot {
    /// Creates an empty snapshot for a project.
    pub fn empty(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            documents: Vec::new(),
        }
    }

    /// Documents of one kind.
    pub fn of_kind(&self, kind: DocumentKind) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(move |d| d.kind == kind)
    }

    /// `(kind, version)` pairs identifying the snapshot, sorted.
    pub fn versions(&self) -> Vec<(DocumentKind, u32)> {
        let mut versions: Vec<_> = self.documents.iter().map(|d| (d.kind, d.version)).collect();
        versions.sort();
        versions
    }
}
