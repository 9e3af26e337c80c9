//! Quality check results recorded per stage per attempt.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Named quality stage. The declaration order is the default pipeline order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Synthetic stage recording the outcome of the external action itself
    Execution,
    Syntax,
    Tests,
    Security,
    Lint,
    Coverage,
    FrontendContract,
}

impl StageKind {
    /// Gate stages in default order (excludes the synthetic execution stage).
    pub const DEFAULT_ORDER: [StageKind; 6] = [
        StageKind::Syntax,
        StageKind::Tests,
        StageKind::Security,
        StageKind::Lint,
        StageKind::Coverage,
        StageKind::FrontendContract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Execution => "execution",
            StageKind::Syntax => "syntax",
            StageKind::Tests => "tests",
            StageKind::Security => "security",
            StageKind::Lint => "lint",
            StageKind::Coverage => "coverage",
            StageKind::FrontendContract => "frontend_contract",
        }
    }
}

impl FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "execution" => Ok(StageKind::Execution),
            "syntax" => Ok(StageKind::Syntax),
            "tests" | "test" => Ok(StageKind::Tests),
            "security" => Ok(StageKind::Security),
            "lint" => Ok(StageKind::Lint),
            "coverage" => Ok(StageKind::Coverage),
            "frontend_contract" | "frontend" => Ok(StageKind::FrontendContract),
            _ => Err(format!("Invalid stage: {s}")),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of a single stage run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// The check itself could not run to a verdict
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::Error => "error",
        }
    }

    pub fn with_icon(&self) -> &'static str {
        match self {
            Verdict::Pass => "✓ pass",
            Verdict::Fail => "✗ fail",
            Verdict::Error => "⚠ error",
        }
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pass" => Ok(Verdict::Pass),
            "fail" => Ok(Verdict::Fail),
            "error" => Ok(Verdict::Error),
            _ => Err(format!("Invalid verdict: {s}")),
        }
    }
}

/// Immutable record of one stage run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct QualityCheckResult {
    /// Store identifier (0 until persisted)
    pub id: u64,
    pub task_id: u64,
    /// Attempt the result belongs to, starting at 1
    pub attempt: u32,
    pub stage: StageKind,
    pub verdict: Verdict,
    /// Runner-specific structured detail
    pub detail: serde_json::Value,
    pub duration_ms: u64,
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub recorded_at: Timestamp,
}
