//! Planner pipeline: idea + documentation snapshot -> validated task graph.
//!
//! The pipeline runs three pure stages in order:
//!
//! 1. [`analysis`]: intent, constraints and features from the idea text
//! 2. [`requirements`]: acceptance criteria from the snapshot's stories and
//!    specifications, with open questions for the gaps
//! 3. [`graph`]: one task per requirement, validated and ordered
//!
//! The same idea text and snapshot always produce the same graph and the
//! same fingerprint. Nothing here reads the store; the caller captures the
//! [`DocSnapshot`] and persists the result.

use sha2::{Digest, Sha256};

use crate::{error::Result, models::DocSnapshot};

pub mod analysis;
pub mod graph;
pub mod requirements;

pub use graph::{PlanGraph, QuestionDraft, TaskNode};

/// SHA-256 over the idea text, the project and the snapshot's
/// `(kind, version)` pairs, hex encoded.
pub fn fingerprint(project: &str, text: &str, snapshot: &DocSnapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project.as_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    for (kind, version) in snapshot.versions() {
        hasher.update([0]);
        hasher.update(kind.as_str().as_bytes());
        hasher.update(version.to_be_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Runs the full pipeline for an idea.
pub fn plan_from_idea(
    project: &str,
    text: &str,
    priority: i32,
    snapshot: &DocSnapshot,
) -> Result<PlanGraph> {
    let analysis = analysis::analyze(text)?;
    let requirements = requirements::analyze(&analysis, snapshot);
    let nodes = graph::validate(graph::generate(&requirements))?;

    Ok(PlanGraph {
        title: analysis.intent,
        project: project.to_string(),
        priority,
        idea: Some(text.to_string()),
        fingerprint: Some(fingerprint(project, text, snapshot)),
        nodes,
        questions: requirements.questions,
    })
}

/// Validates an explicitly submitted graph.
pub fn plan_from_nodes(
    title: &str,
    project: &str,
    priority: i32,
    nodes: Vec<TaskNode>,
) -> Result<PlanGraph> {
    Ok(PlanGraph {
        title: title.to_string(),
        project: project.to_string(),
        priority,
        idea: None,
        fingerprint: None,
        nodes: graph::validate(nodes)?,
        questions: Vec::new(),
    })
}
