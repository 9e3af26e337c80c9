//! Stage configuration for the quality gate.

use serde::{Deserialize, Serialize};

use crate::models::{Capability, StageKind, TaskPayload};

/// How a failing required stage affects the task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The task may retry
    #[default]
    Recoverable,
    /// The task terminates as failed
    Fatal,
}

/// Configuration of a single stage in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StageConfig {
    pub kind: StageKind,
    pub enabled: bool,
    /// Whether the stage counts toward the verdict
    pub required: bool,
    pub severity: Severity,
    /// Skip every later stage when this one does not pass
    pub short_circuit: bool,
    /// Run only for tasks whose payload declares this capability
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_capability: Option<Capability>,
    /// Shell command for the stage's runner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Minimum percentage for threshold-based runners
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::new(StageKind::Tests)
    }
}

impl StageConfig {
    /// A required, recoverable, enabled stage of the given kind.
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            enabled: true,
            required: true,
            severity: Severity::Recoverable,
            short_circuit: false,
            requires_capability: None,
            command: None,
            threshold: None,
        }
    }

    pub fn fatal(mut self) -> Self {
        self.severity = Severity::Fatal;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn short_circuit(mut self) -> Self {
        self.short_circuit = true;
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn requiring(mut self, capability: Capability) -> Self {
        self.requires_capability = Some(capability);
        self
    }

    /// Whether the stage runs for a task with this payload.
    pub fn applies_to(&self, payload: &TaskPayload) -> bool {
        self.enabled
            && self
                .requires_capability
                .is_none_or(|capability| payload.has_capability(capability))
    }
}

/// The default pipeline: every stage kind in order, with the frontend
/// contract check limited to UI tasks.
///
/// Stages start disabled because no runner command is known yet; a stage
/// from a configuration file is enabled unless it says otherwise.
pub fn default_stages() -> Vec<StageConfig> {
    StageKind::DEFAULT_ORDER
        .iter()
        .map(|&kind| {
            let mut stage = StageConfig::new(kind);
            stage.enabled = false;
            match kind {
                StageKind::Syntax => stage.fatal().short_circuit(),
                StageKind::Security => stage.fatal(),
                StageKind::Lint => stage.optional(),
                StageKind::Coverage => stage.optional().with_threshold(80.0),
                StageKind::FrontendContract => stage.requiring(Capability::Ui),
                _ => stage,
            }
        })
        .collect()
}
