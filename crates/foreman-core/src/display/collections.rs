//! Collection wrappers with empty-collection handling.

use std::{fmt, ops::Deref};

use crate::{
    db::ReapedTask,
    models::{Document, OpenQuestion, PlanSummary, Transition},
};

/// Plan summaries, highest priority first.
///
/// # Examples
///
/// ```rust
/// use foreman_core::{
///     display::PlanSummaries,
///     models::{PlanStatus, PlanSummary},
/// };
/// use jiff::Timestamp;
///
/// let summary = PlanSummary {
///     id: 1,
///     title: "Add login".to_string(),
///     project: "shop".to_string(),
///     priority: 0,
///     status: PlanStatus::Active,
///     created_at: Timestamp::now(),
///     total_tasks: 3,
///     pending_tasks: 2,
///     active_tasks: 1,
///     completed_tasks: 0,
///     failed_tasks: 0,
///     open_questions: 1,
/// };
/// let output = PlanSummaries(vec![summary]).to_string();
/// assert!(output.contains("Add login"));
/// assert!(output.contains("2 pending, 1 active"));
/// ```
pub struct PlanSummaries(pub Vec<PlanSummary>);

impl Deref for PlanSummaries {
    type Target = [PlanSummary];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for PlanSummaries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No plans found.");
        }
        for summary in &self.0 {
            write!(f, "{summary}")?;
        }
        Ok(())
    }
}

/// Documentation versions.
#[derive(Debug)]
pub struct Documents(pub Vec<Document>);

impl Deref for Documents {
    type Target = [Document];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Documents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No documentation found.");
        }
        for (i, document) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{document}")?;
        }
        Ok(())
    }
}

/// Open questions across plans.
pub struct OpenQuestions(pub Vec<OpenQuestion>);

impl Deref for OpenQuestions {
    type Target = [OpenQuestion];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for OpenQuestions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No open questions.");
        }
        writeln!(f, "# Open Questions")?;
        writeln!(f)?;
        for question in &self.0 {
            write!(f, "{question}")?;
        }
        Ok(())
    }
}

/// The recorded transitions of one task.
#[derive(Debug)]
pub struct TaskHistory {
    pub task_id: u64,
    pub transitions: Vec<Transition>,
}

impl fmt::Display for TaskHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# History of task {}", self.task_id)?;
        writeln!(f)?;
        if self.transitions.is_empty() {
            return writeln!(f, "No transitions recorded.");
        }
        for transition in &self.transitions {
            write!(f, "{transition}")?;
        }
        Ok(())
    }
}

/// Tasks taken back by a reaper sweep.
pub struct ReapedTasks(pub Vec<ReapedTask>);

impl Deref for ReapedTasks {
    type Target = [ReapedTask];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ReapedTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No expired leases.");
        }
        writeln!(f, "Reclaimed {} tasks:", self.0.len())?;
        writeln!(f)?;
        for reaped in &self.0 {
            writeln!(
                f,
                "- Task {}: {} → {} (lease held by {}, retry {})",
                reaped.task_id, reaped.from, reaped.to, reaped.owner, reaped.retry_count
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskState;

    #[test]
    fn test_empty_collections() {
        assert_eq!(PlanSummaries(vec![]).to_string(), "No plans found.\n");
        assert_eq!(Documents(vec![]).to_string(), "No documentation found.\n");
        assert_eq!(OpenQuestions(vec![]).to_string(), "No open questions.\n");
        assert_eq!(ReapedTasks(vec![]).to_string(), "No expired leases.\n");
    }

    #[test]
    fn test_reaped_tasks() {
        let output = ReapedTasks(vec![ReapedTask {
            task_id: 4,
            from: TaskState::InProgress,
            to: TaskState::Pending,
            retry_count: 1,
            owner: "worker-0".to_string(),
        }])
        .to_string();
        assert!(output.contains("Task 4: in_progress → pending"));
        assert!(output.contains("worker-0"));
    }
}
