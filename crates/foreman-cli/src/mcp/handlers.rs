//! Parameter wrappers and result conversion for MCP tools.

use foreman_core::{params as core, protocol::ToolOutput, OrchestratorError};
use log::debug;
use rmcp::{
    model::{CallToolResult, Content},
    ErrorData,
};
use schemars::JsonSchema;
use serde::Deserialize;

use super::errors::to_mcp_error;

/// Transparent wrapper that gives a core parameter type the derives the MCP
/// tool router needs, keeping the core free of rmcp.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct McpParams<T>(T)
where
    T: JsonSchema;

impl<T> JsonSchema for McpParams<T>
where
    T: JsonSchema,
{
    fn schema_name() -> std::borrow::Cow<'static, str> {
        T::schema_name()
    }

    fn json_schema(g: &mut schemars::SchemaGenerator) -> schemars::Schema {
        T::json_schema(g)
    }
}

impl<T> AsRef<T> for McpParams<T>
where
    T: JsonSchema,
{
    fn as_ref(&self) -> &T {
        &self.0
    }
}

pub type Id = McpParams<core::Id>;
pub type SubmitIdea = McpParams<core::SubmitIdea>;
pub type CreatePlan = McpParams<core::CreatePlan>;
pub type ListPlans = McpParams<core::ListPlans>;
pub type ListQuestions = McpParams<core::ListQuestions>;
pub type FetchDocumentation = McpParams<core::FetchDocumentation>;
pub type AppendDocumentation = McpParams<core::AppendDocumentation>;
pub type ClaimTask = McpParams<core::ClaimTask>;
pub type LeaseRef = McpParams<core::LeaseRef>;
pub type ReportDone = McpParams<core::ReportDone>;
pub type ReportFailure = McpParams<core::ReportFailure>;

pub type McpResult = Result<CallToolResult, ErrorData>;

/// Returns the Markdown rendering followed by the JSON result, so both
/// people and programs can read the answer.
pub fn into_tool_result(output: Result<ToolOutput, OrchestratorError>) -> McpResult {
    let output = output.map_err(|e| {
        debug!("Tool call failed: {e}");
        to_mcp_error(e)
    })?;
    let json = serde_json::to_string_pretty(&output.data)
        .map_err(|e| to_mcp_error(OrchestratorError::from(e)))?;

    Ok(CallToolResult::success(vec![
        Content::text(output.text),
        Content::text(json),
    ]))
}
