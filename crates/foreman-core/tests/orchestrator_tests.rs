mod common;

use common::{
    claim, claim_and_begin, create_gated_environment, create_login_plan,
    create_test_orchestrator, lease_ref, node,
};
use foreman_core::{
    gate::{GateOutcome, StageConfig},
    models::{DocumentKind, StageKind, Verdict},
    params::{
        AppendDocumentation, CreatePlan, FetchDocumentation, Id, ListPlans, ListQuestions,
        ReportDone, ReportFailure, SubmitIdea,
    },
    state_machine::validate_history,
    OrchestratorError, PlanStatus, TaskState,
};

const LOGIN_IDEA: &str = "Add login to the shop. Passwords must never be stored in plain text.

- [form] Login form {ui} => shows an error on bad credentials
- [session] Session handling
- [wire] Wire form to sessions (after: form, session)";

fn done(lease: &foreman_core::params::LeaseRef, artifact: &str) -> ReportDone {
    ReportDone {
        task_id: lease.task_id,
        token: lease.token.clone(),
        artifact: Some(artifact.to_string()),
    }
}

#[tokio::test]
async fn test_login_plan_runs_in_dependency_order() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;
    let plan_id = create_login_plan(&orchestrator).await;

    // form and session are independent and can be leased together
    let (form, form_lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let (session, session_lease) = claim_and_begin(&orchestrator, "worker-b").await;
    assert_eq!(form.key, "form");
    assert_eq!(session.key, "session");
    assert!(claim(&orchestrator, "worker-c").await.is_none());

    let result = orchestrator
        .report_done(&done(&form_lease, "out/form"))
        .await
        .unwrap();
    assert_eq!(result.task.state, TaskState::Completed);
    assert_eq!(result.report.outcome, GateOutcome::Pass);
    assert_eq!(result.task.artifact_ref.as_deref(), Some("out/form"));
    assert!(result.task.lease.is_none());

    // wire still waits for session
    assert!(claim(&orchestrator, "worker-c").await.is_none());

    orchestrator
        .report_done(&done(&session_lease, "out/session"))
        .await
        .unwrap();

    let (wire, wire_lease) = claim_and_begin(&orchestrator, "worker-c").await;
    assert_eq!(wire.key, "wire");
    assert_eq!(wire.depends_on, vec![form.id, session.id]);
    orchestrator
        .report_done(&done(&wire_lease, "out/wire"))
        .await
        .unwrap();

    let plan = orchestrator.show_plan(&Id { id: plan_id }).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan
        .tasks
        .iter()
        .all(|task| task.state == TaskState::Completed));

    for task in &plan.tasks {
        let history = orchestrator
            .task_history(&Id { id: task.id })
            .await
            .unwrap();
        validate_history(&history.transitions).unwrap();
        let states: Vec<_> = history.transitions.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![
                TaskState::Claimed,
                TaskState::InProgress,
                TaskState::Validating,
                TaskState::Completed
            ]
        );
    }
}

#[tokio::test]
async fn test_recoverable_gate_failure_retries() {
    let (_temp_dir, orchestrator, _clock) =
        create_gated_environment(StageConfig::new(StageKind::Tests), &[Verdict::Fail], 2).await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let result = orchestrator
        .report_done(&done(&lease, "out/1"))
        .await
        .unwrap();
    assert_eq!(result.report.outcome, GateOutcome::Blocked);
    assert_eq!(result.task.state, TaskState::Pending);
    assert_eq!(result.task.retry_count, 1);
    assert!(result
        .task
        .last_diagnostic
        .as_deref()
        .unwrap()
        .contains("2 tests failed"));

    // The same task comes back first on the next claim
    let (retried, lease) = claim_and_begin(&orchestrator, "worker-b").await;
    assert_eq!(retried.id, task.id);
    let result = orchestrator
        .report_done(&done(&lease, "out/2"))
        .await
        .unwrap();
    assert_eq!(result.task.state, TaskState::Completed);

    let detailed = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    let attempts: Vec<_> = detailed
        .results
        .iter()
        .map(|r| (r.attempt, r.verdict))
        .collect();
    assert_eq!(attempts, vec![(1, Verdict::Fail), (2, Verdict::Pass)]);

    validate_history(&detailed.history).unwrap();
    let path: Vec<_> = detailed.history.iter().map(|t| (t.from, t.to)).collect();
    assert!(path.contains(&(TaskState::Validating, TaskState::Blocked)));
    assert!(path.contains(&(TaskState::Blocked, TaskState::Pending)));
}

#[tokio::test]
async fn test_fatal_gate_failure_fails_task_and_plan() {
    let (_temp_dir, orchestrator, _clock) = create_gated_environment(
        StageConfig::new(StageKind::Tests).fatal(),
        &[Verdict::Fail],
        3,
    )
    .await;
    let plan_id = orchestrator
        .create_plan(&CreatePlan {
            title: "Single".to_string(),
            project: "shop".to_string(),
            priority: 0,
            tasks: vec![node("only", &[])],
        })
        .await
        .unwrap()
        .plan
        .id;

    let (_, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let result = orchestrator
        .report_done(&done(&lease, "out/1"))
        .await
        .unwrap();
    assert_eq!(result.report.outcome, GateOutcome::Failed);
    assert_eq!(result.task.state, TaskState::Failed);
    assert_eq!(result.task.retry_count, 0);

    let plan = orchestrator.show_plan(&Id { id: plan_id }).await.unwrap();
    assert_eq!(plan.status, PlanStatus::Failed);
}

#[tokio::test]
async fn test_runner_error_blocks_even_on_fatal_stage() {
    let (_temp_dir, orchestrator, _clock) = create_gated_environment(
        StageConfig::new(StageKind::Tests).fatal(),
        &[Verdict::Error],
        3,
    )
    .await;
    create_login_plan(&orchestrator).await;

    let (_, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let result = orchestrator
        .report_done(&done(&lease, "out/1"))
        .await
        .unwrap();
    assert_eq!(result.report.outcome, GateOutcome::Blocked);
    assert_eq!(result.task.state, TaskState::Pending);
}

#[tokio::test]
async fn test_optional_stage_never_blocks() {
    let (_temp_dir, orchestrator, _clock) = create_gated_environment(
        StageConfig::new(StageKind::Tests).optional(),
        &[Verdict::Fail],
        3,
    )
    .await;
    create_login_plan(&orchestrator).await;

    let (_, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let result = orchestrator
        .report_done(&done(&lease, "out/1"))
        .await
        .unwrap();
    assert_eq!(result.report.outcome, GateOutcome::Pass);
    assert_eq!(result.task.state, TaskState::Completed);
    assert_eq!(result.report.runs.len(), 1);
}

#[tokio::test]
async fn test_worker_failure_consumes_retry_then_fails() {
    let (_temp_dir, orchestrator, _clock) =
        create_gated_environment(StageConfig::new(StageKind::Tests), &[], 1).await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let result = orchestrator
        .report_failure(&ReportFailure {
            task_id: lease.task_id,
            token: lease.token.clone(),
            message: "compiler crashed".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(result.task.state, TaskState::Pending);
    assert_eq!(result.task.retry_count, 1);
    assert_eq!(result.report.runs[0].stage, StageKind::Execution);

    let (retried, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    assert_eq!(retried.id, task.id);
    let result = orchestrator
        .report_failure(&ReportFailure {
            task_id: lease.task_id,
            token: lease.token.clone(),
            message: "compiler crashed again".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(result.report.outcome, GateOutcome::Failed);
    assert_eq!(result.task.state, TaskState::Failed);
    assert_eq!(result.task.retry_count, 1);
}

#[tokio::test]
async fn test_begin_twice_is_illegal() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let err = orchestrator.begin_task(&lease).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestratorError::IllegalTransition {
            from: TaskState::InProgress,
            to: TaskState::InProgress,
            ..
        }
    ));

    let history = orchestrator
        .task_history(&Id { id: task.id })
        .await
        .unwrap();
    assert_eq!(history.transitions.len(), 2);
}

#[tokio::test]
async fn test_submit_idea_is_idempotent_per_snapshot() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;
    let idea = SubmitIdea {
        project: "shop".to_string(),
        text: LOGIN_IDEA.to_string(),
        priority: 1,
    };

    let first = orchestrator.submit_idea(&idea).await.unwrap();
    assert!(first.created);
    assert_eq!(first.plan.tasks.len(), 3);
    assert_eq!(first.plan.priority, 1);
    let keys: Vec<_> = first.plan.tasks.iter().map(|t| t.key.as_str()).collect();
    assert_eq!(keys, vec!["form", "session", "wire"]);
    // session has no acceptance criteria, wire neither
    assert_eq!(first.plan.questions.len(), 2);

    let again = orchestrator.submit_idea(&idea).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.plan.id, first.plan.id);
    assert_eq!(
        orchestrator
            .list_plans(&ListPlans { project: None })
            .await
            .unwrap()
            .len(),
        1
    );

    // New documentation changes the snapshot and therefore the plan
    orchestrator
        .append_documentation(&AppendDocumentation {
            project: "shop".to_string(),
            kind: DocumentKind::UserStory,
            body: "Session handling\n- Given a login, Then a session cookie is set".to_string(),
        })
        .await
        .unwrap();
    let replanned = orchestrator.submit_idea(&idea).await.unwrap();
    assert!(replanned.created);
    assert_ne!(replanned.plan.id, first.plan.id);
    let session = replanned.plan.task_by_key("session").unwrap();
    assert!(!session.payload.acceptance_criteria.is_empty());

    let questions = orchestrator
        .list_questions(&ListQuestions {
            plan_id: Some(replanned.plan.id),
            project: None,
        })
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].requirement_key, "wire");
}

#[tokio::test]
async fn test_invalid_graphs_store_nothing() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;

    let cycle = CreatePlan {
        title: "Cycle".to_string(),
        project: "shop".to_string(),
        priority: 0,
        tasks: vec![node("a", &["b"]), node("b", &["a"])],
    };
    let err = orchestrator.create_plan(&cycle).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidPlanGraph { .. }));

    let dangling = CreatePlan {
        tasks: vec![node("a", &["missing"])],
        ..cycle
    };
    let err = orchestrator.create_plan(&dangling).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidPlanGraph { .. }));

    let plans = orchestrator
        .list_plans(&ListPlans { project: None })
        .await
        .unwrap();
    assert!(plans.is_empty());
    assert!(claim(&orchestrator, "worker-a").await.is_none());
}

#[tokio::test]
async fn test_documentation_versions() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;
    for body in ["first draft", "second draft"] {
        orchestrator
            .append_documentation(&AppendDocumentation {
                project: "shop".to_string(),
                kind: DocumentKind::Specification,
                body: body.to_string(),
            })
            .await
            .unwrap();
    }
    orchestrator
        .append_documentation(&AppendDocumentation {
            project: "shop".to_string(),
            kind: DocumentKind::Note,
            body: "remember the cookie banner".to_string(),
        })
        .await
        .unwrap();

    let latest = orchestrator
        .fetch_documentation(&FetchDocumentation {
            project: "shop".to_string(),
            kind: Some(DocumentKind::Specification),
            version: None,
        })
        .await
        .unwrap();
    assert_eq!(latest[0].version, 2);
    assert_eq!(latest[0].body, "second draft");

    let first = orchestrator
        .fetch_documentation(&FetchDocumentation {
            project: "shop".to_string(),
            kind: Some(DocumentKind::Specification),
            version: Some(1),
        })
        .await
        .unwrap();
    assert_eq!(first[0].body, "first draft");

    let snapshot = orchestrator
        .fetch_documentation(&FetchDocumentation {
            project: "shop".to_string(),
            kind: None,
            version: None,
        })
        .await
        .unwrap();
    assert_eq!(snapshot.len(), 2);

    let all = orchestrator.list_documentation("shop").await.unwrap();
    assert_eq!(all.len(), 3);

    let err = orchestrator
        .fetch_documentation(&FetchDocumentation {
            project: "shop".to_string(),
            kind: Some(DocumentKind::Architecture),
            version: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::DocumentNotFound { .. }));
}

#[tokio::test]
async fn test_quality_gate_run_is_advisory() {
    let (_temp_dir, orchestrator, _clock) =
        create_gated_environment(StageConfig::new(StageKind::Tests), &[Verdict::Fail], 2).await;
    create_login_plan(&orchestrator).await;
    let task = claim(&orchestrator, "worker-a").await.unwrap();

    let report = orchestrator
        .run_quality_gate(&Id { id: task.id })
        .await
        .unwrap();
    assert_eq!(report.outcome, GateOutcome::Blocked);

    let after = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    assert_eq!(after.state, TaskState::Claimed);
    assert!(after.results.is_empty());
    assert_eq!(after.lease, task.lease);
    // lease_ref still names the live lease
    orchestrator.heartbeat(&lease_ref(&task)).await.unwrap();
}

#[tokio::test]
async fn test_missing_entities() {
    let (_temp_dir, orchestrator, _clock) = create_test_orchestrator().await;

    let err = orchestrator.show_plan(&Id { id: 42 }).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::PlanNotFound { id: 42 }));
    assert!(orchestrator.get_plan(&Id { id: 42 }).await.unwrap().is_none());

    let err = orchestrator.show_task(&Id { id: 7 }).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TaskNotFound { id: 7 }));
    let err = orchestrator.task_history(&Id { id: 7 }).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::TaskNotFound { id: 7 }));
}
