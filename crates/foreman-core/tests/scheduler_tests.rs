mod common;

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use common::{
    claim, claim_and_begin, create_login_plan, create_realtime_environment,
    create_test_environment, test_config,
};
use foreman_core::{
    gate::{CheckOutcome, CheckRunner, RunnerRegistry, StageConfig},
    models::{StageKind, Verdict},
    params::{Id, ReportDone},
    scheduler::{ActionExecutor, ActionOutcome, ManualClock, Reaper},
    state_machine::validate_history,
    OrchestratorError, Task, TaskState, WorkerPool,
};
use jiff::SignedDuration;
use serde_json::json;
use tokio::sync::watch;

/// Executor that succeeds for every task except those whose key is listed.
struct FakeExecutor {
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl FakeExecutor {
    fn new(failing: &[&str]) -> Self {
        Self {
            failing: failing.iter().map(|k| k.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ActionExecutor for FakeExecutor {
    async fn execute(&self, task: &Task) -> ActionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&task.key) {
            ActionOutcome::failed(json!({ "message": format!("cannot build {}", task.key) }))
        } else {
            ActionOutcome::succeeded(Some(format!("out/{}", task.key)), json!({}))
        }
    }
}

#[tokio::test]
async fn test_expired_lease_is_reaped_and_retried() {
    let (_temp_dir, orchestrator, clock) = create_test_environment(test_config(), None).await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    clock.advance(SignedDuration::from_secs(11));

    let reaped = orchestrator.reap().await.unwrap();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].task_id, task.id);
    assert_eq!(reaped[0].from, TaskState::InProgress);
    assert_eq!(reaped[0].to, TaskState::Pending);
    assert_eq!(reaped[0].owner, "worker-a");

    let after = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    assert_eq!(after.state, TaskState::Pending);
    assert_eq!(after.retry_count, 1);
    assert!(after.lease.is_none());
    assert_eq!(after.history.last().unwrap().actor, "reaper");
    validate_history(&after.history).unwrap();

    // The original holder can no longer report or extend
    let err = orchestrator
        .report_done(&ReportDone {
            task_id: task.id,
            token: lease.token.clone(),
            artifact: Some("out/late".to_string()),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::StaleLease { .. }));
    let err = orchestrator.heartbeat(&lease).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::LeaseExpired { .. }));

    let after = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    assert!(after.results.is_empty());
    assert_eq!(after.artifact_ref, None);

    // A second sweep finds nothing
    assert!(orchestrator.reap().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_report_after_expiry_without_reap_is_stale() {
    let (_temp_dir, orchestrator, clock) = create_test_environment(test_config(), None).await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    clock.advance(SignedDuration::from_secs(10));

    let err = orchestrator
        .report_done(&ReportDone {
            task_id: task.id,
            token: lease.token.clone(),
            artifact: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::StaleLease { task_id } if task_id == task.id));

    let after = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    assert_eq!(after.state, TaskState::InProgress);
}

#[tokio::test]
async fn test_heartbeat_keeps_lease_alive() {
    let (_temp_dir, orchestrator, clock) = create_test_environment(test_config(), None).await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "worker-a").await;
    let original_expiry = task.lease.as_ref().unwrap().expires_at;

    for _ in 0..3 {
        clock.advance(SignedDuration::from_secs(6));
        let extended = orchestrator.heartbeat(&lease).await.unwrap();
        assert!(extended.expires_at > original_expiry);
        assert!(orchestrator.reap().await.unwrap().is_empty());
    }

    let result = orchestrator
        .report_done(&ReportDone {
            task_id: task.id,
            token: lease.token.clone(),
            artifact: Some("out/form".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(result.task.state, TaskState::Completed);
}

#[tokio::test]
async fn test_reaping_without_retries_fails_task() {
    let mut config = test_config();
    config.scheduler.max_retries = 0;
    let (_temp_dir, orchestrator, clock) = create_test_environment(config, None).await;
    create_login_plan(&orchestrator).await;

    let task = claim(&orchestrator, "worker-a").await.unwrap();
    clock.advance(SignedDuration::from_secs(30));

    let reaped = orchestrator.reap().await.unwrap();
    assert_eq!(reaped[0].from, TaskState::Claimed);
    assert_eq!(reaped[0].to, TaskState::Failed);

    let after = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    assert_eq!(after.state, TaskState::Failed);
    assert_eq!(after.retry_count, 0);
}

#[tokio::test]
async fn test_concurrent_claims_never_share_a_task() {
    let (_temp_dir, orchestrator, _clock) = create_test_environment(test_config(), None).await;
    create_login_plan(&orchestrator).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            claim(&orchestrator, &format!("worker-{i}")).await
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(task) = handle.await.unwrap() {
            claimed.push(task);
        }
    }

    // Only form and session are ready
    assert_eq!(claimed.len(), 2);
    let ids: HashSet<_> = claimed.iter().map(|t| t.id).collect();
    assert_eq!(ids.len(), 2);
    let tokens: HashSet<_> = claimed
        .iter()
        .map(|t| t.lease.as_ref().unwrap().token.clone())
        .collect();
    assert_eq!(tokens.len(), 2);
}

#[tokio::test]
async fn test_per_plan_limit() {
    let mut config = test_config();
    config.scheduler.max_per_plan = 1;
    let (_temp_dir, orchestrator, _clock) = create_test_environment(config, None).await;
    create_login_plan(&orchestrator).await;

    assert!(claim(&orchestrator, "worker-a").await.is_some());
    assert!(claim(&orchestrator, "worker-b").await.is_none());
}

#[tokio::test]
async fn test_worker_pool_run_once() {
    let (_temp_dir, orchestrator, _clock) = create_test_environment(test_config(), None).await;
    let plan_id = create_login_plan(&orchestrator).await;

    let executor = Arc::new(FakeExecutor::new(&["session"]));
    let pool = WorkerPool::new(orchestrator.scheduler().clone(), executor.clone());

    let first = pool.run_once("pool-0").await.unwrap().unwrap();
    assert_eq!(first.task.key, "form");
    assert_eq!(first.task.state, TaskState::Completed);
    assert_eq!(first.task.artifact_ref.as_deref(), Some("out/form"));

    let second = pool.run_once("pool-0").await.unwrap().unwrap();
    assert_eq!(second.task.key, "session");
    assert_eq!(second.task.state, TaskState::Pending);
    assert_eq!(second.task.retry_count, 1);
    assert!(second
        .task
        .last_diagnostic
        .as_deref()
        .unwrap()
        .contains("cannot build session"));

    // session keeps failing until its budget is spent; wire never becomes ready
    while pool.run_once("pool-0").await.unwrap().is_some() {}
    assert_eq!(executor.calls.load(Ordering::SeqCst), 4);

    let plan = orchestrator.show_plan(&Id { id: plan_id }).await.unwrap();
    let states: Vec<_> = plan.tasks.iter().map(|t| t.state).collect();
    assert_eq!(
        states,
        vec![TaskState::Completed, TaskState::Failed, TaskState::Pending]
    );
}

#[tokio::test]
async fn test_worker_pool_runs_until_shutdown() {
    let (_temp_dir, orchestrator, _clock) = create_test_environment(test_config(), None).await;
    let plan_id = create_login_plan(&orchestrator).await;

    let executor = Arc::new(FakeExecutor::new(&[]));
    let pool = WorkerPool::new(orchestrator.scheduler().clone(), executor).with_workers(2);
    let reaper = Reaper::new(orchestrator.scheduler().clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reaper_rx = shutdown_rx.clone();
    let reaper_handle = tokio::spawn(async move { reaper.run(reaper_rx).await });
    let pool_handle = tokio::spawn(async move { pool.run(shutdown_rx).await });

    let mut completed = false;
    for _ in 0..200 {
        let plan = orchestrator.show_plan(&Id { id: plan_id }).await.unwrap();
        if plan.is_terminal() {
            completed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    pool_handle.await.unwrap().unwrap();
    reaper_handle.await.unwrap();
    assert!(completed, "plan did not finish in time");
}

/// Check runner that takes `delay` of wall-clock time and then passes.
struct SlowRunner {
    delay: Duration,
}

#[async_trait]
impl CheckRunner for SlowRunner {
    async fn run(&self, _stage: &StageConfig, artifact: &str) -> CheckOutcome {
        tokio::time::sleep(self.delay).await;
        CheckOutcome::pass(json!({ "artifact": artifact }))
    }
}

/// Executor that takes `delay` of wall-clock time and then succeeds.
struct SlowExecutor {
    delay: Duration,
}

#[async_trait]
impl ActionExecutor for SlowExecutor {
    async fn execute(&self, task: &Task) -> ActionOutcome {
        tokio::time::sleep(self.delay).await;
        ActionOutcome::succeeded(Some(format!("out/{}", task.key)), json!({}))
    }
}

/// One-second leases renewed every 100ms, with a `tests` stage that runs
/// longer than a lease.
async fn create_slow_gate_environment() -> (tempfile::TempDir, foreman_core::Orchestrator) {
    let mut config = test_config();
    config.scheduler.lease_ttl_secs = 1;
    config.scheduler.heartbeat_interval_ms = 100;
    config.gate.stages = vec![StageConfig::new(StageKind::Tests)];

    let mut runners = RunnerRegistry::new();
    runners.register(
        StageKind::Tests,
        Arc::new(SlowRunner {
            delay: Duration::from_millis(1_500),
        }),
    );
    create_realtime_environment(config, runners).await
}

#[tokio::test]
async fn test_lease_outlives_slow_action_and_gate() {
    let (_temp_dir, orchestrator) = create_slow_gate_environment().await;
    create_login_plan(&orchestrator).await;

    let executor = Arc::new(SlowExecutor {
        delay: Duration::from_millis(1_500),
    });
    let pool = WorkerPool::new(orchestrator.scheduler().clone(), executor);

    let result = pool.run_once("pool-0").await.unwrap().unwrap();
    assert_eq!(result.task.key, "form");
    assert_eq!(result.task.state, TaskState::Completed);
    assert_eq!(result.report.runs.len(), 1);
    assert_eq!(result.report.runs[0].verdict, Verdict::Pass);

    let task = orchestrator.show_task(&Id { id: result.task.id }).await.unwrap();
    assert_eq!(task.results.len(), 1);
    assert_eq!(task.retry_count, 0);
    assert!(task.history.iter().all(|t| t.actor != "reaper"));
    validate_history(&task.history).unwrap();
}

#[tokio::test]
async fn test_report_done_keeps_lease_while_gate_runs() {
    let (_temp_dir, orchestrator) = create_slow_gate_environment().await;
    create_login_plan(&orchestrator).await;

    let (task, lease) = claim_and_begin(&orchestrator, "agent-1").await;

    // A reaper sweeping throughout the gate run finds nothing to reclaim
    let reaper =
        Reaper::new(orchestrator.scheduler().clone()).with_interval(Duration::from_millis(50));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reaper_handle = tokio::spawn(async move { reaper.run(shutdown_rx).await });

    let result = orchestrator
        .report_done(&ReportDone {
            task_id: task.id,
            token: lease.token.clone(),
            artifact: Some("out/form".to_string()),
        })
        .await
        .unwrap();
    shutdown_tx.send(true).unwrap();
    reaper_handle.await.unwrap();

    assert_eq!(result.task.state, TaskState::Completed);
    assert_eq!(result.task.retry_count, 0);

    let after = orchestrator.show_task(&Id { id: task.id }).await.unwrap();
    assert_eq!(after.results.len(), 1);
    assert_eq!(after.results[0].verdict, Verdict::Pass);
}

/// Executor whose first action runs past the lease window.
struct StallingExecutor {
    clock: Arc<ManualClock>,
    calls: AtomicUsize,
}

#[async_trait]
impl ActionExecutor for StallingExecutor {
    async fn execute(&self, task: &Task) -> ActionOutcome {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.clock.advance(SignedDuration::from_secs(11));
        }
        ActionOutcome::succeeded(Some(format!("out/{}", task.key)), json!({}))
    }
}

#[tokio::test]
async fn test_drain_continues_after_lost_lease() {
    let (_temp_dir, orchestrator, clock) = create_test_environment(test_config(), None).await;
    let plan_id = create_login_plan(&orchestrator).await;

    let executor = Arc::new(StallingExecutor {
        clock,
        calls: AtomicUsize::new(0),
    });
    let pool = WorkerPool::new(orchestrator.scheduler().clone(), executor.clone());

    let results = pool.drain("pool-0").await.unwrap();
    assert_eq!(executor.calls.load(Ordering::SeqCst), 4);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.task.state == TaskState::Completed));

    // The stalled attempt was reaped and retried, not abandoned under a lease
    let form = orchestrator.show_task(&Id { id: 1 }).await.unwrap();
    assert_eq!(form.state, TaskState::Completed);
    assert_eq!(form.retry_count, 1);
    assert!(form.history.iter().any(|t| t.actor == "reaper"));
    validate_history(&form.history).unwrap();

    let plan = orchestrator.show_plan(&Id { id: plan_id }).await.unwrap();
    assert!(plan.tasks.iter().all(|t| t.lease.is_none()));
}

