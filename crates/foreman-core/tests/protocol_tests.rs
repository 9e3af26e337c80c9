mod common;

use common::create_test_orchestrator;
use foreman_core::{dispatch, OrchestratorError, ToolName};
use serde_json::json;

#[tokio::test]
async fn test_worker_session_over_tools() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;

    let created = dispatch(
        &orchestrator,
        "create_plan",
        json!({
            "title": "Add login",
            "project": "shop",
            "tasks": [
                { "key": "form", "title": "Login form" },
                { "key": "wire", "title": "Wire it up", "depends_on": ["form"] }
            ]
        }),
    )
    .await
    .unwrap();
    assert_eq!(created.tool, "create_plan");
    assert_eq!(created.data["created"], json!(true));
    let plan_id = created.data["plan"]["id"].as_u64().unwrap();

    let claim = dispatch(&orchestrator, "claim_task", json!({ "worker": "agent-1" }))
        .await
        .unwrap();
    let task_id = claim.data["task"]["id"].as_u64().unwrap();
    let token = claim.data["task"]["lease"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(claim.data["task"]["key"], json!("form"));

    let lease = json!({ "task_id": task_id, "token": token });
    dispatch(&orchestrator, "begin_task", lease.clone())
        .await
        .unwrap();
    let beat = dispatch(&orchestrator, "heartbeat", lease.clone())
        .await
        .unwrap();
    assert_eq!(beat.data["owner"], json!("agent-1"));

    let done = dispatch(
        &orchestrator,
        "report_done",
        json!({ "task_id": task_id, "token": token, "artifact": "out/form" }),
    )
    .await
    .unwrap();
    assert_eq!(done.data["task"]["state"], json!("completed"));
    assert_eq!(done.data["report"]["outcome"], json!("pass"));
    assert!(!done.text.is_empty());

    let history = dispatch(&orchestrator, "task_history", json!({ "id": task_id }))
        .await
        .unwrap();
    assert_eq!(history.data.as_array().unwrap().len(), 4);

    let plans = dispatch(&orchestrator, "list_plans", json!(null))
        .await
        .unwrap();
    assert_eq!(plans.data[0]["id"].as_u64(), Some(plan_id));
    assert!(plans.text.contains("Add login"));
}

#[tokio::test]
async fn test_dispatch_errors_have_no_side_effects() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;

    let err = dispatch(&orchestrator, "drop_tables", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownTool { .. }));

    let err = dispatch(&orchestrator, "claim_task", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidArguments { ref tool, .. } if tool == "claim_task"));

    let err = dispatch(&orchestrator, "submit_idea", json!({ "project": "shop", "text": "   " }))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidArguments { .. }));
    assert_eq!(err.category(), "InvalidArguments");

    let err = dispatch(
        &orchestrator,
        "fetch_documentation",
        json!({ "project": "shop", "version": 2 }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidArguments { .. }));

    let plans = dispatch(&orchestrator, "list_plans", json!({}))
        .await
        .unwrap();
    assert_eq!(plans.data, json!([]));
}

#[tokio::test]
async fn test_not_found_passes_through() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;
    let err = dispatch(&orchestrator, "show_task", json!({ "id": 99 }))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::TaskNotFound { id: 99 }));
}

#[tokio::test]
async fn test_every_tool_is_dispatchable() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;
    for tool in ToolName::ALL {
        // Empty arguments may be rejected, but never as an unknown tool
        if let Err(err) = dispatch(&orchestrator, tool.as_str(), json!({})).await {
            assert!(!matches!(err, OrchestratorError::UnknownTool { .. }), "{tool}");
        }
    }
}
