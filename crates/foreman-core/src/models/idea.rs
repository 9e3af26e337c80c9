//! Submitted ideas.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Free-text description of desired functionality. Immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
pub struct Idea {
    pub id: u64,
    pub project: String,
    pub text: String,
    #[cfg_attr(feature = "schema", schemars(with = "String"))]
    pub submitted_at: Timestamp,
}
