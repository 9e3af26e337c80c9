//! Maps orchestrator errors onto MCP error codes.

use foreman_core::OrchestratorError;
use rmcp::ErrorData;
use serde_json::json;

/// Caller mistakes become `invalid_params`, missing entities
/// `resource_not_found`, everything else `internal_error`. The taxonomy
/// category travels in the error data.
pub fn to_mcp_error(error: OrchestratorError) -> ErrorData {
    let data = Some(json!({ "category": error.category() }));
    let message = error.to_string();
    match error.category() {
        "NotFound" => ErrorData::resource_not_found(message, data),
        "InternalError" | "ExecutorError" => ErrorData::internal_error(message, data),
        _ if error.is_validation() => ErrorData::invalid_params(message, data),
        // lease and lifecycle conflicts
        _ => ErrorData::invalid_request(message, data),
    }
}
