//! Builder for creating and configuring Orchestrator instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;

use super::Orchestrator;
use crate::{
    config::Config,
    db::with_database,
    error::{OrchestratorError, Result},
    gate::{QualityGate, RunnerRegistry},
    scheduler::{Clock, Scheduler, SystemClock},
};

/// Builder for creating and configuring Orchestrator instances.
#[derive(Default)]
pub struct OrchestratorBuilder {
    database_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    config: Option<Config>,
    runners: Option<RunnerRegistry>,
    clock: Option<Arc<dyn Clock>>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses `$XDG_DATA_HOME/foreman/foreman.db` or
    /// `~/.local/share/foreman/foreman.db`.
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Sets a custom configuration file path.
    ///
    /// If not specified, uses `$XDG_CONFIG_HOME/foreman/config.json`. A
    /// missing file means defaults.
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.config_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses `config` as-is instead of reading a file.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the command-backed check runners derived from the gate
    /// configuration.
    pub fn with_runners(mut self, runners: RunnerRegistry) -> Self {
        self.runners = Some(runners);
        self
    }

    /// Replaces the wall clock used for lease arithmetic.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the configured orchestrator.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Configuration` if the configuration is invalid
    /// Returns `OrchestratorError::FileSystem` if the database directory cannot be created
    /// Returns `OrchestratorError::Database` if database initialization fails
    pub async fn build(self) -> Result<Orchestrator> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => match self.config_path.or_else(Self::default_config_path) {
                Some(path) => {
                    debug!("Loading configuration from {}", path.display());
                    Config::load(path)?
                }
                None => Config::default(),
            },
        };

        let db_path = match self.database_path {
            Some(path) => path,
            None => Self::default_database_path()?,
        };
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| OrchestratorError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        with_database(db_path.clone(), |_| Ok(())).await?;

        let gate = match self.runners {
            Some(runners) => QualityGate::new(config.gate.stages.clone(), runners),
            None => QualityGate::from_config(&config.gate),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let scheduler = Scheduler::new(db_path.clone(), config.scheduler.clone(), gate, clock);

        Ok(Orchestrator::new(db_path, config, scheduler))
    }

    /// `$XDG_DATA_HOME/foreman/foreman.db`
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("foreman")
            .place_data_file("foreman.db")
            .map_err(|e| OrchestratorError::XdgDirectory(e.to_string()))
    }

    /// `$XDG_CONFIG_HOME/foreman/config.json`, if it exists.
    fn default_config_path() -> Option<PathBuf> {
        xdg::BaseDirectories::with_prefix("foreman").find_config_file("config.json")
    }
}
