//! Check runners: one capability per stage kind.

use std::{collections::HashMap, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use super::stage::StageConfig;
use crate::models::{StageKind, Verdict};

/// Wall-clock limit for a check command unless one is configured.
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(600);

/// Characters of output kept in a result's detail.
const OUTPUT_TAIL: usize = 2_000;

/// Verdict and structured detail produced by a runner.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    pub detail: Value,
}

impl CheckOutcome {
    pub fn pass(detail: Value) -> Self {
        Self {
            verdict: Verdict::Pass,
            detail,
        }
    }

    pub fn fail(detail: Value) -> Self {
        Self {
            verdict: Verdict::Fail,
            detail,
        }
    }

    /// The check could not produce a verdict.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Error,
            detail: json!({ "message": message.into() }),
        }
    }
}

/// A quality check. Implementations must be safe to run repeatedly against
/// the same artifact, since every retry re-runs every stage.
#[async_trait]
pub trait CheckRunner: Send + Sync {
    async fn run(&self, stage: &StageConfig, artifact: &str) -> CheckOutcome;
}

/// Captured result of a shell command.
#[derive(Debug)]
pub(crate) struct ShellOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `command` through `sh -c` with extra environment variables.
pub(crate) async fn run_shell(
    command: &str,
    env: &[(&str, String)],
    timeout: Duration,
) -> Result<ShellOutput, String> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| format!("command timed out after {}s", timeout.as_secs()))?
        .map_err(|e| format!("failed to spawn command: {e}"))?;

    Ok(ShellOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

pub(crate) fn tail(text: &str) -> &str {
    let start = text.len().saturating_sub(OUTPUT_TAIL);
    let start = (start..text.len())
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(text.len());
    &text[start..]
}

fn stage_env(stage: &StageConfig, artifact: &str) -> [(&'static str, String); 2] {
    [
        ("FOREMAN_STAGE", stage.kind.as_str().to_string()),
        ("FOREMAN_ARTIFACT", artifact.to_string()),
    ]
}

/// Runs a shell command; exit status 0 passes.
pub struct CommandRunner {
    command: String,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CheckRunner for CommandRunner {
    async fn run(&self, stage: &StageConfig, artifact: &str) -> CheckOutcome {
        let output = match run_shell(&self.command, &stage_env(stage, artifact), self.timeout).await {
            Ok(output) => output,
            Err(message) => return CheckOutcome::error(message),
        };

        let detail = json!({
            "command": self.command,
            "exit_code": output.exit_code,
            "stdout": tail(&output.stdout),
            "stderr": tail(&output.stderr),
        });
        if output.success {
            CheckOutcome::pass(detail)
        } else {
            let mut detail = detail;
            detail["message"] = json!(format!(
                "command exited with status {}",
                output
                    .exit_code
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string())
            ));
            CheckOutcome::fail(detail)
        }
    }
}

/// Runs a command that prints a coverage percentage and compares the last
/// percentage it printed against the stage threshold.
pub struct CoverageRunner {
    command: String,
    default_threshold: f64,
    timeout: Duration,
}

impl CoverageRunner {
    pub fn new(command: impl Into<String>, default_threshold: f64) -> Self {
        Self {
            command: command.into(),
            default_threshold,
            timeout: DEFAULT_CHECK_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Finds the last `NN%` or `NN.N%` token in the text.
pub(crate) fn last_percentage(text: &str) -> Option<f64> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .filter_map(|token| token.strip_suffix('%'))
        .filter_map(|number| number.parse::<f64>().ok())
        .last()
}

#[async_trait]
impl CheckRunner for CoverageRunner {
    async fn run(&self, stage: &StageConfig, artifact: &str) -> CheckOutcome {
        let threshold = stage.threshold.unwrap_or(self.default_threshold);
        let output = match run_shell(&self.command, &stage_env(stage, artifact), self.timeout).await {
            Ok(output) => output,
            Err(message) => return CheckOutcome::error(message),
        };

        if !output.success {
            return CheckOutcome::fail(json!({
                "command": self.command,
                "exit_code": output.exit_code,
                "stderr": tail(&output.stderr),
                "message": "coverage command failed",
            }));
        }

        let Some(coverage) = last_percentage(&output.stdout) else {
            return CheckOutcome::error("coverage command printed no percentage");
        };

        let detail = json!({
            "command": self.command,
            "coverage": coverage,
            "threshold": threshold,
        });
        if coverage >= threshold {
            CheckOutcome::pass(detail)
        } else {
            let mut detail = detail;
            detail["message"] = json!(format!("coverage {coverage}% is below {threshold}%"));
            CheckOutcome::fail(detail)
        }
    }
}

/// Runners keyed by stage kind.
#[derive(Default, Clone)]
pub struct RunnerRegistry {
    runners: HashMap<StageKind, Arc<dyn CheckRunner>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a runner for one stage kind, replacing any previous one.
    pub fn register(&mut self, kind: StageKind, runner: Arc<dyn CheckRunner>) -> &mut Self {
        self.runners.insert(kind, runner);
        self
    }

    pub fn get(&self, kind: StageKind) -> Option<Arc<dyn CheckRunner>> {
        self.runners.get(&kind).cloned()
    }

    /// Registers a command-backed runner for every stage with a command.
    /// Each command is limited to `timeout`.
    pub fn from_stages(stages: &[StageConfig], timeout: Duration) -> Self {
        let mut registry = Self::new();
        for stage in stages {
            let Some(command) = stage.command.as_deref() else {
                continue;
            };
            let runner: Arc<dyn CheckRunner> = match stage.kind {
                StageKind::Coverage => Arc::new(
                    CoverageRunner::new(command, stage.threshold.unwrap_or(80.0))
                        .with_timeout(timeout),
                ),
                _ => Arc::new(CommandRunner::new(command).with_timeout(timeout)),
            };
            registry.register(stage.kind, runner);
        }
        registry
    }
}
