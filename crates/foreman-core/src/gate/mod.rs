//! Quality gate pipeline.
//!
//! A [`QualityGate`] runs the configured stages in order against a task's
//! artifact and folds their verdicts into a [`GateOutcome`]. Running the
//! gate never touches the store; the scheduler records the resulting
//! [`GateReport`] together with the lease-checked transition.

use std::{fmt, sync::Arc, time::Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::GateConfig,
    models::{StageKind, Task, Verdict},
};

pub mod runner;
pub mod stage;

pub use runner::{CheckOutcome, CheckRunner, CommandRunner, CoverageRunner, RunnerRegistry};
pub use stage::{Severity, StageConfig};

/// Composite verdict of a gate run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum GateOutcome {
    /// Every required stage that ran passed
    Pass,
    /// A required stage failed recoverably; the task may retry
    Blocked,
    /// A required fatal stage failed, or retries are exhausted
    Failed,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Pass => "pass",
            GateOutcome::Blocked => "blocked",
            GateOutcome::Failed => "failed",
        }
    }

    /// Applies the retry budget: a blocked outcome with no retries left is a
    /// failure.
    #[must_use]
    pub fn with_retry_budget(self, has_retry_budget: bool) -> Self {
        match self {
            GateOutcome::Blocked if !has_retry_budget => GateOutcome::Failed,
            other => other,
        }
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage within a gate run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct StageRun {
    pub stage: StageKind,
    pub verdict: Verdict,
    pub detail: serde_json::Value,
    pub duration_ms: u64,
    pub required: bool,
    pub severity: Severity,
}

impl StageRun {
    /// Whether this run alone blocks a passing verdict.
    pub fn is_blocking(&self) -> bool {
        self.required && self.verdict != Verdict::Pass
    }

    /// Synthetic result describing the outcome of the external action.
    pub fn execution(verdict: Verdict, detail: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            stage: StageKind::Execution,
            verdict,
            detail,
            duration_ms,
            required: true,
            severity: Severity::Recoverable,
        }
    }
}

/// Everything a gate run produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct GateReport {
    pub task_id: u64,
    pub outcome: GateOutcome,
    /// Stages that ran, in order
    pub runs: Vec<StageRun>,
    /// Stages skipped by a failed short-circuit stage
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<StageKind>,
}

impl GateReport {
    /// Builds a report from stage runs, folding them into an outcome.
    pub fn from_runs(task_id: u64, runs: Vec<StageRun>, skipped: Vec<StageKind>) -> Self {
        Self {
            task_id,
            outcome: fold(&runs),
            runs,
            skipped,
        }
    }

    /// One-line description of the blocking stages, if any.
    pub fn diagnostic(&self) -> Option<String> {
        let blocking: Vec<String> = self
            .runs
            .iter()
            .filter(|run| run.is_blocking())
            .map(|run| match run.detail.get("message").and_then(|m| m.as_str()) {
                Some(message) => format!("{} {}: {}", run.stage, run.verdict.as_str(), message),
                None => format!("{} {}", run.stage, run.verdict.as_str()),
            })
            .collect();

        if blocking.is_empty() {
            None
        } else {
            Some(blocking.join("; "))
        }
    }
}

/// Folds stage runs into one outcome.
///
/// A required fatal `fail` fails the task; otherwise any required `fail` or
/// `error` blocks it; otherwise it passes. Optional stages never affect the
/// outcome.
pub fn fold(runs: &[StageRun]) -> GateOutcome {
    let fatal = runs
        .iter()
        .any(|r| r.required && r.verdict == Verdict::Fail && r.severity == Severity::Fatal);
    if fatal {
        GateOutcome::Failed
    } else if runs.iter().any(StageRun::is_blocking) {
        GateOutcome::Blocked
    } else {
        GateOutcome::Pass
    }
}

/// Ordered stage pipeline bound to a runner registry.
#[derive(Clone)]
pub struct QualityGate {
    stages: Vec<StageConfig>,
    runners: Arc<RunnerRegistry>,
}

impl QualityGate {
    pub fn new(stages: Vec<StageConfig>, runners: RunnerRegistry) -> Self {
        Self {
            stages,
            runners: Arc::new(runners),
        }
    }

    /// Builds the gate from configuration, registering a command-backed
    /// runner for every stage that names a command.
    pub fn from_config(config: &GateConfig) -> Self {
        let runners = RunnerRegistry::from_stages(&config.stages, config.check_timeout());
        Self::new(config.stages.clone(), runners)
    }

    pub fn stages(&self) -> &[StageConfig] {
        &self.stages
    }

    /// Runs every applicable stage against the task's artifact.
    pub async fn run(&self, task: &Task) -> GateReport {
        let artifact = task.artifact_ref.as_deref().unwrap_or_default();
        let mut runs = Vec::new();
        let mut skipped = Vec::new();
        let mut short_circuited = false;

        for stage in self.stages.iter().filter(|s| s.applies_to(&task.payload)) {
            if short_circuited {
                skipped.push(stage.kind);
                continue;
            }

            let started = Instant::now();
            let outcome = match self.runners.get(stage.kind) {
                Some(runner) => runner.run(stage, artifact).await,
                None => CheckOutcome::error(format!("no runner registered for stage {}", stage.kind)),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            debug!(
                "Task {} stage {} finished with {} in {duration_ms}ms",
                task.id,
                stage.kind,
                outcome.verdict.as_str()
            );
            if outcome.verdict != Verdict::Pass && stage.short_circuit {
                warn!(
                    "Task {} stage {} did not pass; skipping remaining stages",
                    task.id, stage.kind
                );
                short_circuited = true;
            }

            runs.push(StageRun {
                stage: stage.kind,
                verdict: outcome.verdict,
                detail: outcome.detail,
                duration_ms,
                required: stage.required,
                severity: stage.severity,
            });
        }

        GateReport::from_runs(task.id, runs, skipped)
    }
}

#[cfg(test)]
mod tests;
