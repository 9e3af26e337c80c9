//! The tool surface: a fixed catalog of named operations with JSON inputs
//! and structured outputs.
//!
//! [`dispatch`] is the generic entry point: it resolves the tool name,
//! deserializes and validates the arguments, and only then runs the
//! operation. Interfaces that already hold typed parameters (the MCP server)
//! call the per-tool functions directly; they validate the same way.
//!
//! Every tool returns a [`ToolOutput`] carrying both the JSON result and its
//! Markdown rendering. No state is kept between calls.

use std::{fmt, str::FromStr};

use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    error::{OrchestratorError, Result},
    orchestrator::Orchestrator,
    params::{self, Validate},
};

/// Every tool in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    SubmitIdea,
    CreatePlan,
    ListPlans,
    ShowPlan,
    ShowTask,
    TaskHistory,
    RunQualityGate,
    FetchDocumentation,
    AppendDocumentation,
    ListQuestions,
    ClaimTask,
    BeginTask,
    Heartbeat,
    ReportDone,
    ReportFailure,
}

impl ToolName {
    pub const ALL: [ToolName; 15] = [
        ToolName::SubmitIdea,
        ToolName::CreatePlan,
        ToolName::ListPlans,
        ToolName::ShowPlan,
        ToolName::ShowTask,
        ToolName::TaskHistory,
        ToolName::RunQualityGate,
        ToolName::FetchDocumentation,
        ToolName::AppendDocumentation,
        ToolName::ListQuestions,
        ToolName::ClaimTask,
        ToolName::BeginTask,
        ToolName::Heartbeat,
        ToolName::ReportDone,
        ToolName::ReportFailure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::SubmitIdea => "submit_idea",
            ToolName::CreatePlan => "create_plan",
            ToolName::ListPlans => "list_plans",
            ToolName::ShowPlan => "show_plan",
            ToolName::ShowTask => "show_task",
            ToolName::TaskHistory => "task_history",
            ToolName::RunQualityGate => "run_quality_gate",
            ToolName::FetchDocumentation => "fetch_documentation",
            ToolName::AppendDocumentation => "append_documentation",
            ToolName::ListQuestions => "list_questions",
            ToolName::ClaimTask => "claim_task",
            ToolName::BeginTask => "begin_task",
            ToolName::Heartbeat => "heartbeat",
            ToolName::ReportDone => "report_done",
            ToolName::ReportFailure => "report_failure",
        }
    }

    /// One-line summary shown in tool listings.
    pub fn summary(&self) -> &'static str {
        match self {
            ToolName::SubmitIdea => "Plan an idea against the project's current documentation",
            ToolName::CreatePlan => "Create a plan from an explicit task graph",
            ToolName::ListPlans => "List plans with per-state task counts",
            ToolName::ShowPlan => "Show a plan with its tasks and open questions",
            ToolName::ShowTask => "Show a task with its history and quality results",
            ToolName::TaskHistory => "Show the recorded state transitions of a task",
            ToolName::RunQualityGate => "Evaluate the quality gate for a task without changing it",
            ToolName::FetchDocumentation => "Read project documentation",
            ToolName::AppendDocumentation => "Append a new documentation version",
            ToolName::ListQuestions => "List open questions raised during planning",
            ToolName::ClaimTask => "Claim the next ready task and receive a lease",
            ToolName::BeginTask => "Start work on a claimed task",
            ToolName::Heartbeat => "Extend a lease while work is running",
            ToolName::ReportDone => "Report a finished action and run the quality gate",
            ToolName::ReportFailure => "Report a failed action",
        }
    }

    /// JSON schema of the tool's arguments.
    #[cfg(feature = "schema")]
    pub fn input_schema(&self) -> Value {
        fn schema<T: schemars::JsonSchema>() -> Value {
            serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
        }

        match self {
            ToolName::SubmitIdea => schema::<params::SubmitIdea>(),
            ToolName::CreatePlan => schema::<params::CreatePlan>(),
            ToolName::ListPlans => schema::<params::ListPlans>(),
            ToolName::ShowPlan
            | ToolName::ShowTask
            | ToolName::TaskHistory
            | ToolName::RunQualityGate => schema::<params::Id>(),
            ToolName::FetchDocumentation => schema::<params::FetchDocumentation>(),
            ToolName::AppendDocumentation => schema::<params::AppendDocumentation>(),
            ToolName::ListQuestions => schema::<params::ListQuestions>(),
            ToolName::ClaimTask => schema::<params::ClaimTask>(),
            ToolName::BeginTask | ToolName::Heartbeat => schema::<params::LeaseRef>(),
            ToolName::ReportDone => schema::<params::ReportDone>(),
            ToolName::ReportFailure => schema::<params::ReportFailure>(),
        }
    }
}

impl FromStr for ToolName {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        ToolName::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| OrchestratorError::UnknownTool {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of a tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool: &'static str,
    /// Machine-readable result
    pub data: Value,
    /// Markdown rendering of the same result
    pub text: String,
}

impl ToolOutput {
    fn new(tool: ToolName, data: &impl Serialize, text: impl fmt::Display) -> Result<Self> {
        Ok(Self {
            tool: tool.as_str(),
            data: serde_json::to_value(data)?,
            text: text.to_string(),
        })
    }
}

/// Content validation at the tool boundary. Failures are reported as
/// [`OrchestratorError::InvalidArguments`] and nothing runs.
fn check<P: Validate>(tool: ToolName, params: &P) -> Result<()> {
    params.validate().map_err(|e| invalid_arguments(tool, e))
}

fn invalid_arguments(tool: ToolName, reason: impl fmt::Display) -> OrchestratorError {
    OrchestratorError::InvalidArguments {
        tool: tool.as_str().to_string(),
        reason: reason.to_string(),
    }
}

fn parse<P: DeserializeOwned>(tool: ToolName, args: Value) -> Result<P> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        args => args,
    };
    serde_json::from_value(args).map_err(|e| invalid_arguments(tool, e))
}

/// Resolves `name`, checks `args` and runs the tool.
pub async fn dispatch(orchestrator: &Orchestrator, name: &str, args: Value) -> Result<ToolOutput> {
    let tool: ToolName = name.parse()?;
    debug!("Dispatching tool {tool}");

    match tool {
        ToolName::SubmitIdea => submit_idea(orchestrator, &parse(tool, args)?).await,
        ToolName::CreatePlan => create_plan(orchestrator, &parse(tool, args)?).await,
        ToolName::ListPlans => list_plans(orchestrator, &parse(tool, args)?).await,
        ToolName::ShowPlan => show_plan(orchestrator, &parse(tool, args)?).await,
        ToolName::ShowTask => show_task(orchestrator, &parse(tool, args)?).await,
        ToolName::TaskHistory => task_history(orchestrator, &parse(tool, args)?).await,
        ToolName::RunQualityGate => run_quality_gate(orchestrator, &parse(tool, args)?).await,
        ToolName::FetchDocumentation => {
            fetch_documentation(orchestrator, &parse(tool, args)?).await
        }
        ToolName::AppendDocumentation => {
            append_documentation(orchestrator, &parse(tool, args)?).await
        }
        ToolName::ListQuestions => list_questions(orchestrator, &parse(tool, args)?).await,
        ToolName::ClaimTask => claim_task(orchestrator, &parse(tool, args)?).await,
        ToolName::BeginTask => begin_task(orchestrator, &parse(tool, args)?).await,
        ToolName::Heartbeat => heartbeat(orchestrator, &parse(tool, args)?).await,
        ToolName::ReportDone => report_done(orchestrator, &parse(tool, args)?).await,
        ToolName::ReportFailure => report_failure(orchestrator, &parse(tool, args)?).await,
    }
}

pub async fn submit_idea(o: &Orchestrator, params: &params::SubmitIdea) -> Result<ToolOutput> {
    let tool = ToolName::SubmitIdea;
    check(tool, params)?;
    let submission = o.submit_idea(params).await?;
    ToolOutput::new(tool, &submission, &submission)
}

pub async fn create_plan(o: &Orchestrator, params: &params::CreatePlan) -> Result<ToolOutput> {
    let tool = ToolName::CreatePlan;
    check(tool, params)?;
    let submission = o.create_plan(params).await?;
    ToolOutput::new(tool, &submission, &submission)
}

pub async fn list_plans(o: &Orchestrator, params: &params::ListPlans) -> Result<ToolOutput> {
    let tool = ToolName::ListPlans;
    check(tool, params)?;
    let summaries = o.list_plans(params).await?;
    ToolOutput::new(tool, &summaries.0, &summaries)
}

pub async fn show_plan(o: &Orchestrator, params: &params::Id) -> Result<ToolOutput> {
    let tool = ToolName::ShowPlan;
    check(tool, params)?;
    let plan = o.show_plan(params).await?;
    ToolOutput::new(tool, &plan, &plan)
}

pub async fn show_task(o: &Orchestrator, params: &params::Id) -> Result<ToolOutput> {
    let tool = ToolName::ShowTask;
    check(tool, params)?;
    let task = o.show_task(params).await?;
    ToolOutput::new(tool, &task, &task)
}

pub async fn task_history(o: &Orchestrator, params: &params::Id) -> Result<ToolOutput> {
    let tool = ToolName::TaskHistory;
    check(tool, params)?;
    let history = o.task_history(params).await?;
    ToolOutput::new(tool, &history.transitions, &history)
}

pub async fn run_quality_gate(o: &Orchestrator, params: &params::Id) -> Result<ToolOutput> {
    let tool = ToolName::RunQualityGate;
    check(tool, params)?;
    let report = o.run_quality_gate(params).await?;
    ToolOutput::new(tool, &report, &report)
}

pub async fn fetch_documentation(
    o: &Orchestrator,
    params: &params::FetchDocumentation,
) -> Result<ToolOutput> {
    let tool = ToolName::FetchDocumentation;
    check(tool, params)?;
    let documents = o.fetch_documentation(params).await?;
    ToolOutput::new(tool, &documents.0, &documents)
}

pub async fn append_documentation(
    o: &Orchestrator,
    params: &params::AppendDocumentation,
) -> Result<ToolOutput> {
    let tool = ToolName::AppendDocumentation;
    check(tool, params)?;
    let document = o.append_documentation(params).await?;
    ToolOutput::new(
        tool,
        &document,
        format!(
            "Stored {} v{} for project '{}'.\n",
            document.kind, document.version, document.project
        ),
    )
}

pub async fn list_questions(
    o: &Orchestrator,
    params: &params::ListQuestions,
) -> Result<ToolOutput> {
    let tool = ToolName::ListQuestions;
    check(tool, params)?;
    let questions = o.list_questions(params).await?;
    ToolOutput::new(tool, &questions.0, &questions)
}

pub async fn claim_task(o: &Orchestrator, params: &params::ClaimTask) -> Result<ToolOutput> {
    let tool = ToolName::ClaimTask;
    check(tool, params)?;
    let claim = o.claim_task(params).await?;
    ToolOutput::new(tool, &claim, &claim)
}

pub async fn begin_task(o: &Orchestrator, params: &params::LeaseRef) -> Result<ToolOutput> {
    let tool = ToolName::BeginTask;
    check(tool, params)?;
    let task = o.begin_task(params).await?;
    ToolOutput::new(
        tool,
        &task,
        format!("Task {} is now {}.\n", task.id, task.state.with_icon()),
    )
}

pub async fn heartbeat(o: &Orchestrator, params: &params::LeaseRef) -> Result<ToolOutput> {
    let tool = ToolName::Heartbeat;
    check(tool, params)?;
    let lease = o.heartbeat(params).await?;
    ToolOutput::new(tool, &lease, &lease)
}

pub async fn report_done(o: &Orchestrator, params: &params::ReportDone) -> Result<ToolOutput> {
    let tool = ToolName::ReportDone;
    check(tool, params)?;
    let result = o.report_done(params).await?;
    ToolOutput::new(tool, &result, &result)
}

pub async fn report_failure(
    o: &Orchestrator,
    params: &params::ReportFailure,
) -> Result<ToolOutput> {
    let tool = ToolName::ReportFailure;
    check(tool, params)?;
    let result = o.report_failure(params).await?;
    ToolOutput::new(tool, &result, &result)
}
