//! Task graph generation and validation.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::requirements::RequirementSet;
use crate::{
    error::{OrchestratorError, Result},
    models::TaskPayload,
};

/// A task to be created, with dependencies named by key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct TaskNode {
    /// Unique key within the plan
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub payload: TaskPayload,
    /// Keys of the tasks this one waits for
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A gap to attach to the plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionDraft {
    pub requirement_key: String,
    pub question: String,
}

/// A validated plan ready for persistence. Nodes are in dependency order:
/// every node comes after the nodes it depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanGraph {
    pub title: String,
    pub project: String,
    pub priority: i32,
    /// Idea text the graph was derived from
    pub idea: Option<String>,
    pub fingerprint: Option<String>,
    pub nodes: Vec<TaskNode>,
    pub questions: Vec<QuestionDraft>,
}

/// Decomposes requirements into task nodes, one per requirement.
pub fn generate(requirements: &RequirementSet) -> Vec<TaskNode> {
    requirements
        .requirements
        .iter()
        .map(|req| TaskNode {
            key: req.key.clone(),
            title: req.title.clone(),
            payload: TaskPayload {
                description: Some(req.description.clone()),
                acceptance_criteria: req.acceptance_criteria.clone(),
                capabilities: req.capabilities.clone(),
            },
            depends_on: req.depends_on.clone(),
        })
        .collect()
}

/// Validates the dependency graph and returns the nodes in dependency
/// order, keeping the submitted order among independent nodes.
///
/// Rejects empty graphs, blank or duplicate keys, unknown dependency keys,
/// self-edges and cycles with [`OrchestratorError::InvalidPlanGraph`].
pub fn validate(nodes: Vec<TaskNode>) -> Result<Vec<TaskNode>> {
    if nodes.is_empty() {
        return Err(OrchestratorError::invalid_graph("plan has no tasks"));
    }

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if node.key.trim().is_empty() {
            return Err(OrchestratorError::invalid_graph(format!(
                "task {} has an empty key",
                i + 1
            )));
        }
        if node.title.trim().is_empty() {
            return Err(OrchestratorError::invalid_graph(format!(
                "task '{}' has an empty title",
                node.key
            )));
        }
        if index.insert(node.key.as_str(), i).is_some() {
            return Err(OrchestratorError::invalid_graph(format!(
                "duplicate task key '{}'",
                node.key
            )));
        }
    }

    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        let mut seen = BTreeSet::new();
        for dep in &node.depends_on {
            let Some(&j) = index.get(dep.as_str()) else {
                return Err(OrchestratorError::invalid_graph(format!(
                    "task '{}' depends on unknown task '{dep}'",
                    node.key
                )));
            };
            if i == j {
                return Err(OrchestratorError::invalid_graph(format!(
                    "task '{}' depends on itself",
                    node.key
                )));
            }
            if seen.insert(j) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    // Kahn's algorithm, always taking the lowest ready index
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                ready.insert(d);
            }
        }
    }

    if order.len() < nodes.len() {
        let cyclic: Vec<&str> = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].key.as_str())
            .collect();
        return Err(OrchestratorError::invalid_graph(format!(
            "dependency cycle among tasks: {}",
            cyclic.join(", ")
        )));
    }

    let mut slots: Vec<Option<TaskNode>> = nodes.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}
