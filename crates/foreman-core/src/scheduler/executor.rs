//! External action execution.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    gate::runner::{run_shell, tail},
    models::Task,
};

/// What the external action reported back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    /// Reference to whatever the action produced (path, commit, URL)
    pub artifact: Option<String>,
    pub detail: Value,
}

impl ActionOutcome {
    pub fn succeeded(artifact: Option<String>, detail: Value) -> Self {
        Self {
            success: true,
            artifact,
            detail,
        }
    }

    pub fn failed(detail: Value) -> Self {
        Self {
            success: false,
            artifact: None,
            detail,
        }
    }
}

/// Performs the work a task describes.
///
/// Implementations report failures through [`ActionOutcome::success`]; they
/// do not return errors. A failed outcome consumes a retry.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, task: &Task) -> ActionOutcome;
}

/// Runs a shell command per task.
///
/// The task is passed in `FOREMAN_TASK_ID`, `FOREMAN_TASK_KEY`,
/// `FOREMAN_TASK_TITLE`, `FOREMAN_TASK_ATTEMPT` and `FOREMAN_TASK_PAYLOAD`
/// (JSON). Exit status 0 is success; the last non-empty line of stdout, if
/// any, becomes the artifact reference.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: String,
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    fn env(task: &Task) -> serde_json::Result<Vec<(&'static str, String)>> {
        Ok(vec![
            ("FOREMAN_TASK_ID", task.id.to_string()),
            ("FOREMAN_TASK_KEY", task.key.clone()),
            ("FOREMAN_TASK_TITLE", task.title.clone()),
            ("FOREMAN_TASK_ATTEMPT", task.attempt().to_string()),
            ("FOREMAN_TASK_PAYLOAD", serde_json::to_string(&task.payload)?),
        ])
    }
}

#[async_trait]
impl ActionExecutor for CommandExecutor {
    async fn execute(&self, task: &Task) -> ActionOutcome {
        let started = Instant::now();
        debug!("Running action for task {}: {}", task.id, self.command);

        let env = match Self::env(task) {
            Ok(env) => env,
            Err(e) => {
                warn!("Task {} payload could not be encoded: {e}", task.id);
                return ActionOutcome::failed(json!({
                    "message": format!("could not encode task payload: {e}"),
                }));
            }
        };

        match run_shell(&self.command, &env, self.timeout).await {
            Ok(output) => {
                let detail = json!({
                    "exit_code": output.exit_code,
                    "duration_ms": started.elapsed().as_millis() as u64,
                    "stdout": tail(&output.stdout),
                    "stderr": tail(&output.stderr),
                });
                if output.success {
                    let artifact = output
                        .stdout
                        .lines()
                        .map(str::trim)
                        .rfind(|line| !line.is_empty())
                        .map(String::from);
                    ActionOutcome::succeeded(artifact, detail)
                } else {
                    ActionOutcome::failed(detail)
                }
            }
            Err(message) => ActionOutcome::failed(json!({ "message": message })),
        }
    }
}
