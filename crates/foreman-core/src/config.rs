//! Runtime configuration loaded from JSON.
//!
//! Every section falls back to defaults, so an empty object or a missing
//! file yields a usable configuration:
//!
//! ```json
//! {
//!   "scheduler": { "lease_ttl_secs": 120, "max_retries": 2 },
//!   "gate": { "stages": [{ "kind": "tests", "command": "cargo test" }] },
//!   "executor": { "command": "./do-task.sh", "timeout_secs": 900 }
//! }
//! ```

use std::{path::Path, time::Duration};

use jiff::SignedDuration;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{OrchestratorError, Result},
    gate::stage::{default_stages, StageConfig},
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub gate: GateConfig,
    pub executor: ExecutorConfig,
}

/// Lease, retry and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Lease lifetime granted on claim and on every heartbeat
    pub lease_ttl_secs: u64,
    /// Retry budget stamped onto new tasks
    pub max_retries: u32,
    /// Upper bound on leased tasks across all plans
    pub max_concurrent: u32,
    /// Upper bound on leased tasks within one plan
    pub max_per_plan: u32,
    /// Idle sleep between polls of a worker that found nothing
    pub poll_interval_ms: u64,
    /// Interval between reaper sweeps
    pub reaper_interval_ms: u64,
    /// Interval between heartbeats while an action runs
    pub heartbeat_interval_ms: u64,
    /// Number of workers in the pool
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: 300,
            max_retries: 3,
            max_concurrent: 4,
            max_per_plan: 2,
            poll_interval_ms: 1_000,
            reaper_interval_ms: 5_000,
            heartbeat_interval_ms: 60_000,
            workers: 2,
        }
    }
}

impl SchedulerConfig {
    pub fn lease_ttl(&self) -> SignedDuration {
        SignedDuration::from_secs(self.lease_ttl_secs as i64)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

/// Ordered quality stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    pub stages: Vec<StageConfig>,
    /// Wall-clock limit for each stage command
    pub check_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            stages: default_stages(),
            check_timeout_secs: 600,
        }
    }
}

impl GateConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

/// External action executor settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Shell command run once per task attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Wall-clock limit for one run
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 600,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Loads configuration from a JSON file. A missing file yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| OrchestratorError::FileSystem {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&raw)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| OrchestratorError::Configuration {
                message: format!("Invalid configuration: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        let invalid = |message: &str| {
            Err(OrchestratorError::Configuration {
                message: message.to_string(),
            })
        };

        if s.lease_ttl_secs == 0 {
            return invalid("scheduler.lease_ttl_secs must be positive");
        }
        if s.max_concurrent == 0 || s.max_per_plan == 0 {
            return invalid("scheduler concurrency limits must be positive");
        }
        if s.heartbeat_interval_ms >= s.lease_ttl_secs.saturating_mul(1_000) {
            return invalid("scheduler.heartbeat_interval_ms must be shorter than the lease");
        }
        if self.gate.check_timeout_secs == 0 {
            return invalid("gate.check_timeout_secs must be positive");
        }
        for (i, stage) in self.gate.stages.iter().enumerate() {
            if self.gate.stages[..i].iter().any(|s| s.kind == stage.kind) {
                return invalid(&format!("gate stage '{}' is configured twice", stage.kind));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StageKind;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.gate.stages.len(), 6);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_json(
            r#"{"scheduler": {"max_retries": 1, "lease_ttl_secs": 10, "heartbeat_interval_ms": 2000},
                "gate": {"stages": [{"kind": "tests", "command": "true"}]}}"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.max_retries, 1);
        assert_eq!(config.scheduler.max_concurrent, 4);
        assert_eq!(config.gate.stages.len(), 1);
        assert_eq!(config.gate.stages[0].kind, StageKind::Tests);
        assert_eq!(config.gate.check_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_check_timeout_is_configurable() {
        let config = Config::from_json(r#"{"gate": {"check_timeout_secs": 45}}"#).unwrap();
        assert_eq!(config.gate.check_timeout(), Duration::from_secs(45));

        let err = Config::from_json(r#"{"gate": {"check_timeout_secs": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("check_timeout_secs"));
    }

    #[test]
    fn test_rejects_heartbeat_longer_than_lease() {
        let err = Config::from_json(r#"{"scheduler": {"lease_ttl_secs": 1}}"#).unwrap_err();
        assert!(matches!(err, OrchestratorError::Configuration { .. }));
    }

    #[test]
    fn test_rejects_duplicate_stages() {
        let err = Config::from_json(r#"{"gate": {"stages": [{"kind": "lint"}, {"kind": "lint"}]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("lint"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.json")).unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
    }
}
