//! MCP server for Foreman.
//!
//! Exposes the tool catalog over the Model Context Protocol on stdio. Every
//! tool validates its arguments and calls the matching operation in
//! [`foreman_core::protocol`]; no state is kept between calls.

use std::future::Future;

use anyhow::Result;
use foreman_core::{protocol, Orchestrator};
use log::{debug, error, info};
use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};

use crate::cli::shutdown_signal;

pub mod errors;
pub mod handlers;

pub use handlers::{
    AppendDocumentation, ClaimTask, CreatePlan, FetchDocumentation, Id, LeaseRef, ListPlans,
    ListQuestions, McpResult, ReportDone, ReportFailure, SubmitIdea,
};
use handlers::into_tool_result;

#[derive(Clone)]
pub struct ForemanMcpServer {
    orchestrator: Orchestrator,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl ForemanMcpServer {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "submit_idea",
        description = "Plan an idea against the project's current documentation. The first line is the intent; bullet lines like '- [key] Title (after: a, b) {ui} => acceptance' become tasks. Submitting the same idea against unchanged documentation returns the existing plan."
    )]
    async fn submit_idea(&self, Parameters(params): Parameters<SubmitIdea>) -> McpResult {
        into_tool_result(protocol::submit_idea(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "create_plan",
        description = "Create a plan from an explicit task graph. Each task has a unique key, a title, an optional payload and the keys it depends on. Cyclic or dangling graphs are rejected and nothing is stored."
    )]
    async fn create_plan(&self, Parameters(params): Parameters<CreatePlan>) -> McpResult {
        into_tool_result(protocol::create_plan(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "list_plans",
        description = "List plans, optionally for one project, with status and per-state task counts."
    )]
    async fn list_plans(&self, Parameters(params): Parameters<ListPlans>) -> McpResult {
        into_tool_result(protocol::list_plans(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "show_plan",
        description = "Show a plan with every task, its state, dependencies and lease, plus the open questions raised during planning."
    )]
    async fn show_plan(&self, Parameters(params): Parameters<Id>) -> McpResult {
        into_tool_result(protocol::show_plan(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "show_task",
        description = "Show one task with its payload, transition history and quality results for every attempt."
    )]
    async fn show_task(&self, Parameters(params): Parameters<Id>) -> McpResult {
        into_tool_result(protocol::show_task(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "task_history",
        description = "List the recorded state transitions of a task, oldest first, with actor and reason."
    )]
    async fn task_history(&self, Parameters(params): Parameters<Id>) -> McpResult {
        into_tool_result(protocol::task_history(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "run_quality_gate",
        description = "Evaluate the configured quality stages against a task's current artifact. Advisory only: nothing is recorded and the task does not move."
    )]
    async fn run_quality_gate(&self, Parameters(params): Parameters<Id>) -> McpResult {
        into_tool_result(protocol::run_quality_gate(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "fetch_documentation",
        description = "Read project documentation. Without a kind, returns the latest version of every kind. With a kind, returns that document at the given version or its latest."
    )]
    async fn fetch_documentation(
        &self,
        Parameters(params): Parameters<FetchDocumentation>,
    ) -> McpResult {
        into_tool_result(protocol::fetch_documentation(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "append_documentation",
        description = "Store a new version of a project document (specification, architecture, user_story or note). Earlier versions are kept; later ideas are planned against the newest."
    )]
    async fn append_documentation(
        &self,
        Parameters(params): Parameters<AppendDocumentation>,
    ) -> McpResult {
        into_tool_result(protocol::append_documentation(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "list_questions",
        description = "List open questions raised during planning, for one plan or one project."
    )]
    async fn list_questions(&self, Parameters(params): Parameters<ListQuestions>) -> McpResult {
        into_tool_result(protocol::list_questions(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "claim_task",
        description = "Claim the next ready task (pending with all dependencies completed) and receive a lease token. Returns no task when nothing is ready or a concurrency limit is reached."
    )]
    async fn claim_task(&self, Parameters(params): Parameters<ClaimTask>) -> McpResult {
        into_tool_result(protocol::claim_task(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "begin_task",
        description = "Start work on a claimed task using its lease token."
    )]
    async fn begin_task(&self, Parameters(params): Parameters<LeaseRef>) -> McpResult {
        into_tool_result(protocol::begin_task(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "heartbeat",
        description = "Extend a lease while work is running. Fails once the lease has expired or been reclaimed; stop working on the task then."
    )]
    async fn heartbeat(&self, Parameters(params): Parameters<LeaseRef>) -> McpResult {
        into_tool_result(protocol::heartbeat(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "report_done",
        description = "Report a finished action with an optional artifact reference. Runs the quality gate: the task completes, goes back to pending with one retry consumed, or fails."
    )]
    async fn report_done(&self, Parameters(params): Parameters<ReportDone>) -> McpResult {
        into_tool_result(protocol::report_done(&self.orchestrator, params.as_ref()).await)
    }

    #[tool(
        name = "report_failure",
        description = "Report that the action failed. Consumes a retry like a blocking quality stage; the task fails once its retries are spent."
    )]
    async fn report_failure(&self, Parameters(params): Parameters<ReportFailure>) -> McpResult {
        into_tool_result(protocol::report_failure(&self.orchestrator, params.as_ref()).await)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for ForemanMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "foreman".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(r#"Foreman orchestrates work: ideas become plans of dependency-ordered tasks, workers lease tasks, and a quality gate decides every attempt.

## Planning
1. Store context with `append_documentation` (specification, architecture, user_story, note)
2. Plan with `submit_idea`, or submit an explicit graph with `create_plan`
3. Review with `show_plan` and answer gaps listed by `list_questions`

## Working a task
1. `claim_task` with your worker name; keep the returned token
2. `begin_task` with the token
3. Call `heartbeat` well within the lease lifetime while you work
4. Finish with `report_done` (optionally naming the artifact) or `report_failure`

A report with an expired or reclaimed lease is rejected and changes nothing. Blocked attempts return the task to pending with one retry consumed.

## Inspection
`list_plans`, `show_task`, `task_history`, `run_quality_gate`, `fetch_documentation`"#.to_string()),
        }
    }
}

/// Runs the MCP server on stdio until the client disconnects or the process
/// is signalled.
pub async fn run_stdio_server(server: ForemanMcpServer) -> Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    info!("Starting Foreman MCP server on stdio");
    debug!(
        "Server created with {} tools",
        server.tool_router.list_all().len()
    );

    let service = server.serve(stdio()).await.inspect_err(|e| {
        error!("serving error: {e:?}");
    })?;

    tokio::select! {
        result = service.waiting() => {
            match result {
                Ok(_) => info!("MCP server stopped normally"),
                Err(e) => error!("MCP server error: {e:?}"),
            }
        }
        received = shutdown_signal() => {
            info!("Received {}, shutting down", received?);
        }
    }

    info!("MCP server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use foreman_core::ToolName;

    use super::*;

    #[tokio::test]
    async fn test_router_covers_catalog() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let orchestrator = foreman_core::OrchestratorBuilder::new()
            .with_database_path(Some(temp_dir.path().join("test.db")))
            .build()
            .await
            .unwrap();
        let server = ForemanMcpServer::new(orchestrator);

        let mut routed: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        routed.sort();
        let mut catalog: Vec<String> = ToolName::ALL
            .iter()
            .map(|tool| tool.as_str().to_string())
            .collect();
        catalog.sort();
        assert_eq!(routed, catalog);
    }
}
