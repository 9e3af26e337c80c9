//! Plan, idea and open question storage.

use jiff::Timestamp;
use log::info;
use rusqlite::{params, OptionalExtension};

use super::utils::{id_at, timestamp_at};
use crate::{
    error::{DatabaseResultExt, OrchestratorError, Result},
    models::{Idea, OpenQuestion, Plan, PlanStatus, PlanSummary},
    planning::PlanGraph,
};

const INSERT_IDEA_SQL: &str =
    "INSERT INTO ideas (project, text, submitted_at) VALUES (?1, ?2, ?3)";
const SELECT_IDEA_SQL: &str = "SELECT id, project, text, submitted_at FROM ideas WHERE id = ?1";
const INSERT_PLAN_SQL: &str = "INSERT INTO plans (title, project, priority, idea_id, fingerprint, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";
const SELECT_PLAN_SQL: &str = "SELECT id, title, project, priority, idea_id, fingerprint, created_at FROM plans WHERE id = ?1";
const SELECT_PLAN_BY_FINGERPRINT_SQL: &str = "SELECT id FROM plans WHERE fingerprint = ?1";
const INSERT_TASK_SQL: &str = "INSERT INTO tasks (plan_id, task_key, title, payload, state, retry_count, max_retries, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, 'pending', 0, ?5, ?6, ?6)";
const INSERT_DEPENDENCY_SQL: &str =
    "INSERT OR IGNORE INTO task_dependencies (task_id, depends_on) VALUES (?1, ?2)";
const INSERT_QUESTION_SQL: &str =
    "INSERT INTO open_questions (plan_id, requirement_key, question) VALUES (?1, ?2, ?3)";
const SELECT_QUESTIONS_BY_PLAN_SQL: &str = "SELECT id, plan_id, requirement_key, question FROM open_questions WHERE plan_id = ?1 ORDER BY id";
const SELECT_QUESTIONS_SQL: &str = "SELECT q.id, q.plan_id, q.requirement_key, q.question FROM open_questions q JOIN plans p ON p.id = q.plan_id WHERE (?1 IS NULL OR p.project = ?1) ORDER BY q.id";
const PLAN_SUMMARY_SQL: &str = "SELECT id, title, project, priority, created_at, total_tasks, pending_tasks, active_tasks, completed_tasks, failed_tasks, open_questions FROM plan_summaries WHERE (?1 IS NULL OR project = ?1) ORDER BY priority DESC, id";

fn build_question_from_row(row: &rusqlite::Row) -> rusqlite::Result<OpenQuestion> {
    Ok(OpenQuestion {
        id: id_at(row, 0)?,
        plan_id: id_at(row, 1)?,
        requirement_key: row.get(2)?,
        question: row.get(3)?,
    })
}

impl super::Database {
    /// Persists a validated plan graph in one transaction: the idea (if
    /// any), the plan, its tasks, their dependency edges and the open
    /// questions.
    ///
    /// A graph whose fingerprint matches an existing plan is not stored
    /// again; the existing plan is returned with `false`.
    pub fn create_plan(
        &mut self,
        graph: &PlanGraph,
        max_retries: u32,
        now: Timestamp,
    ) -> Result<(Plan, bool)> {
        if graph.project.trim().is_empty() {
            return Err(OrchestratorError::invalid_input("project").with_reason("cannot be empty"));
        }

        let tx = self.immediate()?;
        let now_str = now.to_string();

        if let Some(fingerprint) = graph.fingerprint.as_deref() {
            let existing = tx
                .query_row(SELECT_PLAN_BY_FINGERPRINT_SQL, params![fingerprint], |row| {
                    id_at(row, 0)
                })
                .optional()
                .db_context("Failed to look up plan fingerprint")?;
            if let Some(id) = existing {
                drop(tx);
                info!("Plan {id} already covers this idea and documentation");
                let plan = self.get_plan(id)?.ok_or(OrchestratorError::PlanNotFound { id })?;
                return Ok((plan, false));
            }
        }

        let idea_id = match graph.idea.as_deref() {
            Some(text) => {
                tx.execute(INSERT_IDEA_SQL, params![graph.project, text, now_str])
                    .db_context("Failed to insert idea")?;
                Some(tx.last_insert_rowid())
            }
            None => None,
        };

        tx.execute(
            INSERT_PLAN_SQL,
            params![
                graph.title,
                graph.project,
                graph.priority,
                idea_id,
                graph.fingerprint,
                now_str
            ],
        )
        .db_context("Failed to insert plan")?;
        let plan_id = tx.last_insert_rowid();

        // Nodes arrive in dependency order, so every dependency key is
        // already resolved when a node is inserted.
        let mut ids = std::collections::HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            let payload = serde_json::to_string(&node.payload)?;
            tx.execute(
                INSERT_TASK_SQL,
                params![plan_id, node.key, node.title, payload, max_retries, now_str],
            )
            .db_context("Failed to insert task")?;
            let task_id = tx.last_insert_rowid();

            for dep in &node.depends_on {
                let depends_on = ids.get(dep.as_str()).copied().ok_or_else(|| {
                    OrchestratorError::invalid_graph(format!(
                        "task '{}' depends on '{dep}', which is not ordered before it",
                        node.key
                    ))
                })?;
                tx.execute(INSERT_DEPENDENCY_SQL, params![task_id, depends_on])
                    .db_context("Failed to insert dependency")?;
            }
            ids.insert(node.key.as_str(), task_id);
        }

        for question in &graph.questions {
            tx.execute(
                INSERT_QUESTION_SQL,
                params![plan_id, question.requirement_key, question.question],
            )
            .db_context("Failed to insert open question")?;
        }

        tx.commit().db_context("Failed to commit transaction")?;
        info!(
            "Created plan {plan_id} '{}' with {} tasks",
            graph.title,
            graph.nodes.len()
        );

        let id = plan_id as u64;
        let plan = self.get_plan(id)?.ok_or(OrchestratorError::PlanNotFound { id })?;
        Ok((plan, true))
    }

    /// Retrieves a plan by its ID with its tasks and open questions.
    pub fn get_plan(&self, id: u64) -> Result<Option<Plan>> {
        let mut plan = self
            .connection
            .query_row(SELECT_PLAN_SQL, params![id as i64], |row| {
                Ok(Plan {
                    id: id_at(row, 0)?,
                    title: row.get(1)?,
                    project: row.get(2)?,
                    priority: row.get(3)?,
                    idea_id: row.get::<_, Option<i64>>(4)?.map(|id| id as u64),
                    fingerprint: row.get(5)?,
                    status: PlanStatus::Active,
                    created_at: timestamp_at(row, 6)?,
                    tasks: Vec::new(),
                    questions: Vec::new(),
                })
            })
            .optional()
            .db_context("Failed to query plan")?;

        if let Some(ref mut plan) = plan {
            plan.tasks = self.get_plan_tasks(plan.id)?;
            plan.questions = self.get_plan_questions(plan.id)?;
            plan.refresh_status();
        }

        Ok(plan)
    }

    /// Lists plan summaries, highest priority first.
    pub fn list_plan_summaries(&self, project: Option<&str>) -> Result<Vec<PlanSummary>> {
        let mut stmt = self
            .connection
            .prepare(PLAN_SUMMARY_SQL)
            .db_context("Failed to prepare query")?;
        let summaries = stmt
            .query_map(params![project], |row| {
                let total_tasks: u32 = row.get(5)?;
                let completed_tasks: u32 = row.get(8)?;
                let failed_tasks: u32 = row.get(9)?;
                Ok(PlanSummary {
                    id: id_at(row, 0)?,
                    title: row.get(1)?,
                    project: row.get(2)?,
                    priority: row.get(3)?,
                    status: PlanStatus::from_counts(
                        total_tasks.into(),
                        completed_tasks.into(),
                        failed_tasks.into(),
                    ),
                    created_at: timestamp_at(row, 4)?,
                    total_tasks,
                    pending_tasks: row.get(6)?,
                    active_tasks: row.get(7)?,
                    completed_tasks,
                    failed_tasks,
                    open_questions: row.get(10)?,
                })
            })
            .db_context("Failed to query plan summaries")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read plan summaries")?;

        Ok(summaries)
    }

    /// Open questions attached to one plan.
    pub fn get_plan_questions(&self, plan_id: u64) -> Result<Vec<OpenQuestion>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_QUESTIONS_BY_PLAN_SQL)
            .db_context("Failed to prepare query")?;
        let questions = stmt
            .query_map(params![plan_id as i64], build_question_from_row)
            .db_context("Failed to query open questions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read open questions")?;

        Ok(questions)
    }

    /// Open questions across plans, optionally limited to one project.
    pub fn list_questions(&self, project: Option<&str>) -> Result<Vec<OpenQuestion>> {
        let mut stmt = self
            .connection
            .prepare(SELECT_QUESTIONS_SQL)
            .db_context("Failed to prepare query")?;
        let questions = stmt
            .query_map(params![project], build_question_from_row)
            .db_context("Failed to query open questions")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .db_context("Failed to read open questions")?;

        Ok(questions)
    }

    /// Retrieves a submitted idea.
    pub fn get_idea(&self, id: u64) -> Result<Option<Idea>> {
        self.connection
            .query_row(SELECT_IDEA_SQL, params![id as i64], |row| {
                Ok(Idea {
                    id: id_at(row, 0)?,
                    project: row.get(1)?,
                    text: row.get(2)?,
                    submitted_at: timestamp_at(row, 3)?,
                })
            })
            .optional()
            .db_context("Failed to query idea")
    }
}
