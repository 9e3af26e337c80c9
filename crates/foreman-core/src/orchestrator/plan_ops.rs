//! Plan operations for the Orchestrator.

use log::info;

use super::Orchestrator;
use crate::{
    db::with_database,
    display::{OpenQuestions, PlanSubmission, PlanSummaries},
    error::{OrchestratorError, Result},
    models::Plan,
    params::{CreatePlan, Id, ListPlans, ListQuestions, SubmitIdea},
    planning,
};

impl Orchestrator {
    /// Plans an idea against the project's current documentation.
    ///
    /// The snapshot is captured, planned and persisted on one connection. An
    /// idea already planned against the same documentation versions returns
    /// the existing plan with `created == false`; nothing new is stored.
    pub async fn submit_idea(&self, params: &SubmitIdea) -> Result<PlanSubmission> {
        let project = params.project.trim().to_string();
        let text = params.text.clone();
        let priority = params.priority;
        let max_retries = self.config.scheduler.max_retries;
        let now = self.scheduler.now();

        let (plan, created) = with_database(self.db_path.clone(), move |db| {
            let snapshot = db.snapshot(&project)?;
            let graph = planning::plan_from_idea(&project, &text, priority, &snapshot)?;
            db.create_plan(&graph, max_retries, now)
        })
        .await?;

        if created {
            info!(
                "Planned idea for '{}' into plan {} with {} open questions",
                plan.project,
                plan.id,
                plan.questions.len()
            );
        }
        Ok(PlanSubmission { plan, created })
    }

    /// Stores an explicitly submitted task graph after validating it.
    pub async fn create_plan(&self, params: &CreatePlan) -> Result<PlanSubmission> {
        let graph = planning::plan_from_nodes(
            params.title.trim(),
            params.project.trim(),
            params.priority,
            params.tasks.clone(),
        )?;
        let max_retries = self.config.scheduler.max_retries;
        let now = self.scheduler.now();

        let (plan, created) = with_database(self.db_path.clone(), move |db| {
            db.create_plan(&graph, max_retries, now)
        })
        .await?;
        Ok(PlanSubmission { plan, created })
    }

    /// Retrieves a plan with its tasks and open questions.
    pub async fn get_plan(&self, params: &Id) -> Result<Option<Plan>> {
        let id = params.id;
        with_database(self.db_path.clone(), move |db| db.get_plan(id)).await
    }

    /// Like [`Orchestrator::get_plan`], but a missing plan is an error.
    pub async fn show_plan(&self, params: &Id) -> Result<Plan> {
        self.get_plan(params)
            .await?
            .ok_or(OrchestratorError::PlanNotFound { id: params.id })
    }

    /// Lists plan summaries, highest priority first.
    pub async fn list_plans(&self, params: &ListPlans) -> Result<PlanSummaries> {
        let project = params.project.clone();
        let summaries = with_database(self.db_path.clone(), move |db| {
            db.list_plan_summaries(project.as_deref())
        })
        .await?;
        Ok(PlanSummaries(summaries))
    }

    /// Lists open questions of one plan, one project, or everything.
    pub async fn list_questions(&self, params: &ListQuestions) -> Result<OpenQuestions> {
        let plan_id = params.plan_id;
        let project = params.project.clone();
        let questions = with_database(self.db_path.clone(), move |db| match plan_id {
            Some(plan_id) => {
                db.get_plan(plan_id)?
                    .ok_or(OrchestratorError::PlanNotFound { id: plan_id })?;
                db.get_plan_questions(plan_id)
            }
            None => db.list_questions(project.as_deref()),
        })
        .await?;
        Ok(OpenQuestions(questions))
    }
}
