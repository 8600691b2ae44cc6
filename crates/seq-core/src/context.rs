//! Run context for tracking the origin of an execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies a single execution run
///
/// Trigger sub-sequences execute under a child context so that log lines and
/// progress can be traced back to the run that fired them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Unique identifier for this run (ULID)
    pub id: String,

    /// Parent run ID for nested trigger executions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Create a new context with a fresh ULID
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: None,
            started_at: Utc::now(),
        }
    }

    /// Create a child context with this context as parent
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
            started_at: Utc::now(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
