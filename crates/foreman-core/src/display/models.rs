//! Markdown Display implementations for domain models.

use std::fmt;

use super::datetime::{Elapsed, LocalDateTime};
use crate::models::{
    Document, Lease, OpenQuestion, Plan, PlanStatus, PlanSummary, QualityCheckResult, Task,
    TaskState, Transition, Verdict,
};

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn id_list(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}. {}", self.id, self.title)?;
        writeln!(f)?;
        writeln!(f, "- Project: {}", self.project)?;
        writeln!(f, "- Status: {}", self.status)?;
        writeln!(f, "- Priority: {}", self.priority)?;
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        if let Some(fingerprint) = &self.fingerprint {
            let short: String = fingerprint.chars().take(12).collect();
            writeln!(f, "- Fingerprint: `{short}`")?;
        }

        if self.tasks.is_empty() {
            writeln!(f, "\nNo tasks in this plan.")?;
        } else {
            writeln!(f, "\n## Tasks")?;
            writeln!(f)?;
            for task in &self.tasks {
                task.fmt_brief(f)?;
            }
        }

        if !self.questions.is_empty() {
            writeln!(f, "\n## Open Questions")?;
            writeln!(f)?;
            for question in &self.questions {
                write!(f, "{question}")?;
            }
        }

        Ok(())
    }
}

impl Task {
    /// One block per task, as listed inside a plan.
    fn fmt_brief(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "### {}. {} ({})",
            self.id,
            self.title,
            self.state.with_icon()
        )?;
        writeln!(f)?;
        writeln!(f, "- Key: `{}`", self.key)?;
        if !self.depends_on.is_empty() {
            writeln!(f, "- Depends on: {}", id_list(&self.depends_on))?;
        }
        if self.retry_count > 0 {
            writeln!(f, "- Retries: {}/{}", self.retry_count, self.max_retries)?;
        }
        if let Some(lease) = &self.lease {
            writeln!(f, "- Leased by: {}", lease.owner)?;
        }
        if let Some(diagnostic) = &self.last_diagnostic {
            writeln!(f, "- Last diagnostic: {diagnostic}")?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# {}. {} ({})",
            self.id,
            self.title,
            self.state.with_icon()
        )?;
        writeln!(f)?;
        writeln!(f, "- Plan: {}", self.plan_id)?;
        writeln!(f, "- Key: `{}`", self.key)?;
        writeln!(f, "- Retries: {}/{}", self.retry_count, self.max_retries)?;
        if !self.depends_on.is_empty() {
            writeln!(f, "- Depends on: {}", id_list(&self.depends_on))?;
        }
        if !self.payload.capabilities.is_empty() {
            let flags: Vec<&str> = self.payload.capabilities.iter().map(|c| c.as_str()).collect();
            writeln!(f, "- Capabilities: {}", flags.join(", "))?;
        }
        if let Some(lease) = &self.lease {
            writeln!(
                f,
                "- Lease: {} until {}",
                lease.owner,
                LocalDateTime(&lease.expires_at)
            )?;
        }
        if let Some(artifact) = &self.artifact_ref {
            writeln!(f, "- Artifact: `{artifact}`")?;
        }
        if let Some(diagnostic) = &self.last_diagnostic {
            writeln!(f, "- Last diagnostic: {diagnostic}")?;
        }
        writeln!(f, "- Updated: {}", LocalDateTime(&self.updated_at))?;

        if let Some(description) = &self.payload.description {
            writeln!(f)?;
            writeln!(f, "{description}")?;
        }

        if !self.payload.acceptance_criteria.is_empty() {
            writeln!(f, "\n## Acceptance")?;
            writeln!(f)?;
            for criterion in &self.payload.acceptance_criteria {
                writeln!(f, "- {criterion}")?;
            }
        }

        if !self.history.is_empty() {
            writeln!(f, "\n## History")?;
            writeln!(f)?;
            for transition in &self.history {
                write!(f, "{transition}")?;
            }
        }

        if !self.results.is_empty() {
            writeln!(f, "\n## Quality Results")?;
            writeln!(f)?;
            writeln!(f, "| Attempt | Stage | Verdict | Duration |")?;
            writeln!(f, "|---|---|---|---|")?;
            for result in &self.results {
                write!(f, "{result}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- {} {} → {} by {}: {}",
            LocalDateTime(&self.at),
            self.from,
            self.to,
            self.actor,
            self.reason
        )
    }
}

/// One table row; the header is written by the enclosing view.
impl fmt::Display for QualityCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "| {} | {} | {} | {} |",
            self.attempt,
            self.stage,
            self.verdict.with_icon(),
            Elapsed(self.duration_ms)
        )
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Lease on task {} held by {}", self.task_id, self.owner)?;
        writeln!(f)?;
        writeln!(f, "- Token: `{}`", self.token)?;
        writeln!(f, "- Expires: {}", LocalDateTime(&self.expires_at))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "# {} / {} (v{})",
            self.project, self.kind, self.version
        )?;
        writeln!(f)?;
        writeln!(f, "- Added: {}", LocalDateTime(&self.created_at))?;
        writeln!(f)?;
        writeln!(f, "{}", self.body.trim_end())
    }
}

impl fmt::Display for OpenQuestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- [{}] {} (plan {})",
            self.requirement_key, self.question, self.plan_id
        )
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "## {} (ID: {}) ({}/{})",
            self.title, self.id, self.completed_tasks, self.total_tasks
        )?;
        writeln!(f)?;
        writeln!(f, "- **Project**: {}", self.project)?;
        writeln!(f, "- **Status**: {}", self.status)?;
        if self.priority != 0 {
            writeln!(f, "- **Priority**: {}", self.priority)?;
        }
        writeln!(
            f,
            "- **Tasks**: {} pending, {} active, {} completed, {} failed",
            self.pending_tasks, self.active_tasks, self.completed_tasks, self.failed_tasks
        )?;
        if self.open_questions > 0 {
            writeln!(f, "- **Open questions**: {}", self.open_questions)?;
        }
        writeln!(f, "- **Created**: {}", LocalDateTime(&self.created_at))?;
        writeln!(f)
    }
}
