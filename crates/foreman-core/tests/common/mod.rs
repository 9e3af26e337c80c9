#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use foreman_core::{
    gate::{CheckOutcome, CheckRunner, RunnerRegistry, StageConfig},
    models::{StageKind, Verdict},
    params::{ClaimTask, CreatePlan, LeaseRef},
    planning::TaskNode,
    scheduler::ManualClock,
    Config, Orchestrator, OrchestratorBuilder, Task,
};
use jiff::Timestamp;
use serde_json::json;
use tempfile::TempDir;

pub const START_SECOND: i64 = 1_700_000_000;

/// Short leases and generous limits so tests control every expiry.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.scheduler.lease_ttl_secs = 10;
    config.scheduler.heartbeat_interval_ms = 2_000;
    config.scheduler.max_retries = 2;
    config.scheduler.max_concurrent = 8;
    config.scheduler.max_per_plan = 8;
    config.scheduler.poll_interval_ms = 10;
    config.scheduler.reaper_interval_ms = 20;
    config.gate.stages = Vec::new();
    config
}

/// Helper function to create a test orchestrator with no gate stages
pub async fn create_test_orchestrator() -> (TempDir, Orchestrator, Arc<ManualClock>) {
    create_test_environment(test_config(), None).await
}

pub async fn create_test_environment(
    config: Config,
    runners: Option<RunnerRegistry>,
) -> (TempDir, Orchestrator, Arc<ManualClock>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let clock = Arc::new(ManualClock::new(
        Timestamp::from_second(START_SECOND).expect("valid timestamp"),
    ));

    let mut builder = OrchestratorBuilder::new()
        .with_database_path(Some(&db_path))
        .with_config(config)
        .with_clock(clock.clone());
    if let Some(runners) = runners {
        builder = builder.with_runners(runners);
    }
    let orchestrator = builder.build().await.expect("Failed to create orchestrator");
    (temp_dir, orchestrator, clock)
}

/// Same as [`create_test_environment`] but on the system clock, for tests
/// where leases have to run out in real time.
pub async fn create_realtime_environment(
    config: Config,
    runners: RunnerRegistry,
) -> (TempDir, Orchestrator) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let orchestrator = OrchestratorBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_config(config)
        .with_runners(runners)
        .build()
        .await
        .expect("Failed to create orchestrator");
    (temp_dir, orchestrator)
}

/// A gate with one required `tests` stage answered by a scripted runner.
pub async fn create_gated_environment(
    stage: StageConfig,
    verdicts: &[Verdict],
    max_retries: u32,
) -> (TempDir, Orchestrator, Arc<ManualClock>) {
    let mut config = test_config();
    config.scheduler.max_retries = max_retries;
    config.gate.stages = vec![stage];

    let mut runners = RunnerRegistry::new();
    runners.register(StageKind::Tests, Arc::new(ScriptedRunner::new(verdicts)));
    create_test_environment(config, Some(runners)).await
}

/// Check runner that answers with queued verdicts, then passes.
pub struct ScriptedRunner {
    verdicts: Mutex<VecDeque<Verdict>>,
}

impl ScriptedRunner {
    pub fn new(verdicts: &[Verdict]) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl CheckRunner for ScriptedRunner {
    async fn run(&self, _stage: &StageConfig, artifact: &str) -> CheckOutcome {
        let next = self.verdicts.lock().unwrap().pop_front();
        match next.unwrap_or(Verdict::Pass) {
            Verdict::Pass => CheckOutcome::pass(json!({ "artifact": artifact })),
            Verdict::Fail => CheckOutcome::fail(json!({ "message": "2 tests failed" })),
            Verdict::Error => CheckOutcome::error("runner crashed"),
        }
    }
}

pub fn node(key: &str, depends_on: &[&str]) -> TaskNode {
    TaskNode {
        key: key.to_string(),
        title: format!("Build {key}"),
        payload: Default::default(),
        depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
    }
}

/// Creates the three-task login plan: `wire` waits for `form` and `session`.
pub async fn create_login_plan(orchestrator: &Orchestrator) -> u64 {
    orchestrator
        .create_plan(&CreatePlan {
            title: "Add login".to_string(),
            project: "shop".to_string(),
            priority: 0,
            tasks: vec![
                node("form", &[]),
                node("session", &[]),
                node("wire", &["form", "session"]),
            ],
        })
        .await
        .expect("Failed to create plan")
        .plan
        .id
}

pub async fn claim(orchestrator: &Orchestrator, worker: &str) -> Option<Task> {
    orchestrator
        .claim_task(&ClaimTask {
            worker: worker.to_string(),
            plan_id: None,
        })
        .await
        .expect("Failed to claim")
        .task
}

pub fn lease_ref(task: &Task) -> LeaseRef {
    LeaseRef {
        task_id: task.id,
        token: task.lease.as_ref().expect("task is leased").token.clone(),
    }
}

/// Claims the next task and moves it to `in_progress`.
pub async fn claim_and_begin(orchestrator: &Orchestrator, worker: &str) -> (Task, LeaseRef) {
    let task = claim(orchestrator, worker).await.expect("a ready task");
    let lease = lease_ref(&task);
    orchestrator
        .begin_task(&lease)
        .await
        .expect("Failed to begin task");
    (task, lease)
}
