//! Result wrappers for operations that change state.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::datetime::{Elapsed, LocalDateTime};
use crate::{
    gate::GateReport,
    models::{Plan, Task},
    scheduler::AttemptResult,
};

/// Outcome of submitting an idea or a task graph.
///
/// `created` is `false` when an identical idea had already been planned
/// against the same documentation and the existing plan was returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct PlanSubmission {
    pub plan: Plan,
    pub created: bool,
}

impl fmt::Display for PlanSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.created {
            writeln!(
                f,
                "Created plan with ID: {} ({} tasks)",
                self.plan.id,
                self.plan.tasks.len()
            )?;
        } else {
            writeln!(
                f,
                "Plan {} already covers this idea; nothing was created.",
                self.plan.id
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", self.plan)
    }
}

/// Outcome of a claim: the leased task, or nothing ready.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct ClaimResult {
    pub task: Option<Task>,
}

impl fmt::Display for ClaimResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(task) = &self.task else {
            return writeln!(f, "No task is ready to claim.");
        };
        writeln!(f, "Claimed task {}: {}", task.id, task.title)?;
        writeln!(f)?;
        if let Some(lease) = &task.lease {
            writeln!(f, "- Token: `{}`", lease.token)?;
            writeln!(f, "- Expires: {}", LocalDateTime(&lease.expires_at))?;
        }
        writeln!(f, "- Attempt: {}", task.attempt())?;
        if let Some(description) = &task.payload.description {
            writeln!(f)?;
            writeln!(f, "{description}")?;
        }
        if !task.payload.acceptance_criteria.is_empty() {
            writeln!(f, "\n## Acceptance")?;
            writeln!(f)?;
            for criterion in &task.payload.acceptance_criteria {
                writeln!(f, "- {criterion}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for GateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Quality gate for task {}: {}", self.task_id, self.outcome)?;
        writeln!(f)?;
        if self.runs.is_empty() {
            writeln!(f, "No stages apply to this task.")?;
        } else {
            writeln!(f, "| Stage | Verdict | Required | Duration |")?;
            writeln!(f, "|---|---|---|---|")?;
            for run in &self.runs {
                writeln!(
                    f,
                    "| {} | {} | {} | {} |",
                    run.stage,
                    run.verdict.with_icon(),
                    if run.required { "yes" } else { "no" },
                    Elapsed(run.duration_ms)
                )?;
            }
        }
        if !self.skipped.is_empty() {
            let skipped: Vec<&str> = self.skipped.iter().map(|s| s.as_str()).collect();
            writeln!(f)?;
            writeln!(f, "Skipped: {}", skipped.join(", "))?;
        }
        if let Some(diagnostic) = self.diagnostic() {
            writeln!(f)?;
            writeln!(f, "Diagnostic: {diagnostic}")?;
        }
        Ok(())
    }
}

impl fmt::Display for AttemptResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Task {} is now {}",
            self.task.id,
            self.task.state.with_icon()
        )?;
        if self.task.retry_count > 0 && !self.task.state.is_terminal() {
            writeln!(
                f,
                "Retry {} of {} scheduled.",
                self.task.retry_count, self.task.max_retries
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", self.report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        gate::{Severity, StageRun},
        models::{StageKind, Verdict},
    };

    #[test]
    fn test_gate_report_lists_runs_and_skips() {
        let report = GateReport::from_runs(
            9,
            vec![StageRun {
                stage: StageKind::Syntax,
                verdict: Verdict::Fail,
                detail: json!({ "message": "unexpected token" }),
                duration_ms: 12,
                required: true,
                severity: Severity::Fatal,
            }],
            vec![StageKind::Tests],
        );
        let output = report.to_string();
        assert!(output.contains("Quality gate for task 9: failed"));
        assert!(output.contains("| syntax |"));
        assert!(output.contains("Skipped: tests"));
        assert!(output.contains("unexpected token"));
    }

    #[test]
    fn test_empty_claim() {
        let output = ClaimResult { task: None }.to_string();
        assert_eq!(output, "No task is ready to claim.\n");
    }
}
