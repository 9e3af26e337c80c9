use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use jiff::Timestamp;
use serde_json::json;

use super::*;
use crate::models::{Capability, TaskPayload, TaskState};

struct Fixed {
    verdict: Verdict,
    calls: AtomicUsize,
}

impl Fixed {
    fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CheckRunner for Fixed {
    async fn run(&self, _stage: &StageConfig, _artifact: &str) -> CheckOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        CheckOutcome {
            verdict: self.verdict,
            detail: json!({ "message": "fixed" }),
        }
    }
}

fn task(capabilities: Vec<Capability>) -> Task {
    Task {
        id: 11,
        plan_id: 1,
        key: "login".to_string(),
        title: "Login form".to_string(),
        payload: TaskPayload {
            capabilities,
            ..Default::default()
        },
        state: TaskState::Validating,
        retry_count: 0,
        max_retries: 3,
        depends_on: vec![],
        lease: None,
        artifact_ref: Some("commit-1".to_string()),
        last_diagnostic: None,
        created_at: Timestamp::UNIX_EPOCH,
        updated_at: Timestamp::UNIX_EPOCH,
        history: vec![],
        results: vec![],
    }
}

fn run(stage: StageKind, verdict: Verdict, required: bool, severity: Severity) -> StageRun {
    StageRun {
        stage,
        verdict,
        detail: json!(null),
        duration_ms: 1,
        required,
        severity,
    }
}

#[test]
fn test_fold_all_pass() {
    let runs = vec![
        run(StageKind::Syntax, Verdict::Pass, true, Severity::Fatal),
        run(StageKind::Tests, Verdict::Pass, true, Severity::Recoverable),
    ];
    assert_eq!(fold(&runs), GateOutcome::Pass);
    assert_eq!(fold(&[]), GateOutcome::Pass);
}

#[test]
fn test_fold_recoverable_failure_blocks() {
    let runs = vec![
        run(StageKind::Syntax, Verdict::Pass, true, Severity::Fatal),
        run(StageKind::Tests, Verdict::Fail, true, Severity::Recoverable),
    ];
    assert_eq!(fold(&runs), GateOutcome::Blocked);
}

#[test]
fn test_fold_fatal_failure_wins() {
    let runs = vec![
        run(StageKind::Tests, Verdict::Fail, true, Severity::Recoverable),
        run(StageKind::Security, Verdict::Fail, true, Severity::Fatal),
    ];
    assert_eq!(fold(&runs), GateOutcome::Failed);
}

#[test]
fn test_fold_error_on_fatal_stage_is_recoverable() {
    let runs = vec![run(StageKind::Security, Verdict::Error, true, Severity::Fatal)];
    assert_eq!(fold(&runs), GateOutcome::Blocked);
}

#[test]
fn test_fold_ignores_optional_stages() {
    let runs = vec![
        run(StageKind::Lint, Verdict::Fail, false, Severity::Fatal),
        run(StageKind::Coverage, Verdict::Error, false, Severity::Recoverable),
    ];
    assert_eq!(fold(&runs), GateOutcome::Pass);
}

#[test]
fn test_retry_budget_turns_blocked_into_failed() {
    assert_eq!(
        GateOutcome::Blocked.with_retry_budget(false),
        GateOutcome::Failed
    );
    assert_eq!(
        GateOutcome::Blocked.with_retry_budget(true),
        GateOutcome::Blocked
    );
    assert_eq!(GateOutcome::Pass.with_retry_budget(false), GateOutcome::Pass);
}

#[test]
fn test_diagnostic_lists_blocking_stages() {
    let mut failing = run(StageKind::Tests, Verdict::Fail, true, Severity::Recoverable);
    failing.detail = json!({ "message": "2 tests failed" });
    let report = GateReport::from_runs(
        1,
        vec![
            run(StageKind::Syntax, Verdict::Pass, true, Severity::Fatal),
            failing,
        ],
        vec![],
    );
    assert_eq!(report.diagnostic().as_deref(), Some("tests fail: 2 tests failed"));
}

#[tokio::test]
async fn test_short_circuit_skips_downstream_stages() {
    let syntax = Fixed::new(Verdict::Fail);
    let tests = Fixed::new(Verdict::Pass);
    let mut registry = RunnerRegistry::new();
    registry
        .register(StageKind::Syntax, syntax.clone())
        .register(StageKind::Tests, tests.clone());

    let gate = QualityGate::new(
        vec![
            StageConfig::new(StageKind::Syntax).fatal().short_circuit(),
            StageConfig::new(StageKind::Tests),
        ],
        registry,
    );
    let report = gate.run(&task(vec![])).await;

    assert_eq!(report.outcome, GateOutcome::Failed);
    assert_eq!(report.runs.len(), 1);
    assert_eq!(report.skipped, vec![StageKind::Tests]);
    assert_eq!(tests.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failures_do_not_stop_independent_stages() {
    let tests = Fixed::new(Verdict::Fail);
    let lint = Fixed::new(Verdict::Pass);
    let mut registry = RunnerRegistry::new();
    registry
        .register(StageKind::Tests, tests.clone())
        .register(StageKind::Lint, lint.clone());

    let gate = QualityGate::new(
        vec![
            StageConfig::new(StageKind::Tests),
            StageConfig::new(StageKind::Lint).optional(),
        ],
        registry,
    );
    let report = gate.run(&task(vec![])).await;

    assert_eq!(report.outcome, GateOutcome::Blocked);
    assert_eq!(report.runs.len(), 2);
    assert_eq!(lint.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_frontend_stage_runs_only_for_ui_tasks() {
    let frontend = Fixed::new(Verdict::Pass);
    let mut registry = RunnerRegistry::new();
    registry.register(StageKind::FrontendContract, frontend.clone());

    let gate = QualityGate::new(
        vec![StageConfig::new(StageKind::FrontendContract).requiring(Capability::Ui)],
        registry,
    );

    let report = gate.run(&task(vec![Capability::Api])).await;
    assert!(report.runs.is_empty());

    let report = gate.run(&task(vec![Capability::Ui])).await;
    assert_eq!(report.runs.len(), 1);
    assert_eq!(frontend.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_runner_yields_error_verdict() {
    let gate = QualityGate::new(vec![StageConfig::new(StageKind::Security)], RunnerRegistry::new());
    let report = gate.run(&task(vec![])).await;

    assert_eq!(report.runs[0].verdict, Verdict::Error);
    assert_eq!(report.outcome, GateOutcome::Blocked);
}
