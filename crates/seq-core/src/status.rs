//! Entity Status State Machine
//!
//! Enforces valid lifecycle transitions for every sequence entity:
//!
//! ```text
//! Created → Running → Finished
//!                   ↘ Failed
//!                   ↘ Skipped
//!
//! Created → Skipped   (cancelled or disabled before it started)
//! Created → Failed    (rejected by the pre-run validation gate)
//!
//! Finished/Failed/Skipped → Created   (reset before a re-run)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::issue::Issue;

/// Lifecycle state of a sequence entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Freshly constructed, cloned or reset
    #[default]
    Created,
    /// Currently executing
    Running,
    /// Completed successfully
    Finished,
    /// Failed with an unrecoverable error
    Failed,
    /// Not executed (precondition unmet, cancelled or disabled)
    Skipped,
}

/// Error when an invalid status transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid status transition from {from} to {to}: {reason}")]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
    pub reason: &'static str,
}

impl Status {
    /// Whether this status ends a run for the entity
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Finished | Status::Failed | Status::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Running => "running",
            Status::Finished => "finished",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }

    /// Attempt a transition to a new status.
    ///
    /// Returns the new status if valid, or an error describing why the
    /// transition is invalid.
    pub fn try_transition(self, to: Status) -> Result<Status, InvalidTransition> {
        use Status::*;

        let valid = match (self, to) {
            (Created, Running) => true,
            (Created, Skipped) => true,
            (Created, Failed) => true,

            (Running, Finished) => true,
            (Running, Failed) => true,
            (Running, Skipped) => true,

            (Finished, Created) => true,
            (Failed, Created) => true,
            (Skipped, Created) => true,

            _ => false,
        };

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition {
                from: self,
                to,
                reason: Self::transition_error_reason(self, to),
            })
        }
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(self, to: Status) -> bool {
        self.try_transition(to).is_ok()
    }

    fn transition_error_reason(from: Status, to: Status) -> &'static str {
        use Status::*;

        match (from, to) {
            (Created, Finished) => "Cannot finish without running first",
            (Running, Created) => "Cannot reset an entity while it is running",
            (Running, Running) => "Entity is already running",
            (Finished | Failed | Skipped, Running) => {
                "Terminal status must be reset to Created before running again"
            }
            (Finished | Failed | Skipped, _) => "Terminal status can only be reset to Created",
            (Created, Created) => "Entity is already in Created",
            _ => "Invalid status transition",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to an entity's runtime state
pub type StateHandle = Arc<EntityState>;

/// Runtime state of a single entity: its status and its latest issue list.
///
/// The execution flow is the only writer; observers (progress UI, CLI) may
/// read concurrently. Each entity carries its own locks so a reader never
/// contends with the whole tree.
#[derive(Debug, Default)]
pub struct EntityState {
    status: RwLock<Status>,
    issues: RwLock<Vec<Issue>>,
}

impl EntityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh shared state handle
    pub fn handle() -> StateHandle {
        Arc::new(Self::new())
    }

    /// Current status
    pub fn status(&self) -> Status {
        match self.status.read() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Move to `to`, rejecting transitions the state machine does not allow.
    ///
    /// Returns the previous status.
    pub fn transition(&self, to: Status) -> Result<Status, InvalidTransition> {
        let mut guard = match self.status.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let from = *guard;
        *guard = from.try_transition(to)?;
        Ok(from)
    }

    /// Reset a terminal status back to `Created`.
    ///
    /// An entity that is already `Created` is left untouched; a `Running`
    /// entity cannot be reset.
    pub fn reset(&self) -> Result<(), InvalidTransition> {
        if self.status() == Status::Created {
            return Ok(());
        }
        self.transition(Status::Created).map(|_| ())
    }

    /// Latest validation issues
    pub fn issues(&self) -> Vec<Issue> {
        match self.issues.read() {
            Ok(issues) => issues.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the issue list (rebuilt on every validation pass)
    pub fn set_issues(&self, issues: Vec<Issue>) {
        let mut guard = match self.issues.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = issues;
    }

    pub fn is_valid(&self) -> bool {
        match self.issues.read() {
            Ok(issues) => issues.is_empty(),
            Err(poisoned) => poisoned.into_inner().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::*;

    // ==================== Valid Transitions ====================

    #[test]
    fn test_created_to_running() {
        assert!(Created.can_transition_to(Running));
        assert_eq!(Created.try_transition(Running), Ok(Running));
    }

    #[test]
    fn test_running_to_terminal() {
        assert!(Running.can_transition_to(Finished));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Skipped));
    }

    #[test]
    fn test_created_to_skipped_and_failed() {
        assert!(Created.can_transition_to(Skipped));
        assert!(Created.can_transition_to(Failed));
    }

    #[test]
    fn test_terminal_reset() {
        for terminal in [Finished, Failed, Skipped] {
            assert!(terminal.can_transition_to(Created));
        }
    }

    // ==================== Invalid Transitions ====================

    #[test]
    fn test_created_cannot_finish() {
        let err = Created.try_transition(Finished).unwrap_err();
        assert_eq!(err.from, Created);
        assert_eq!(err.to, Finished);
        assert!(err.reason.contains("running first"));
    }

    #[test]
    fn test_terminal_cannot_rerun_without_reset() {
        for terminal in [Finished, Failed, Skipped] {
            assert!(!terminal.can_transition_to(Running));
        }
        assert!(!Finished.can_transition_to(Failed));
    }

    #[test]
    fn test_running_cannot_reset() {
        assert!(!Running.can_transition_to(Created));
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn test_terminal_states() {
        assert!(!Created.is_terminal());
        assert!(!Running.is_terminal());
        assert!(Finished.is_terminal());
        assert!(Failed.is_terminal());
        assert!(Skipped.is_terminal());
    }

    // ==================== EntityState ====================

    #[test]
    fn test_entity_state_transitions() {
        let state = EntityState::new();
        assert_eq!(state.status(), Created);

        assert_eq!(state.transition(Running), Ok(Created));
        assert_eq!(state.transition(Finished), Ok(Running));
        assert!(state.transition(Running).is_err());
        assert_eq!(state.status(), Finished);

        state.reset().unwrap();
        assert_eq!(state.status(), Created);
    }

    #[test]
    fn test_reset_running_is_rejected() {
        let state = EntityState::new();
        state.transition(Running).unwrap();
        assert!(state.reset().is_err());
        assert_eq!(state.status(), Running);
    }

    #[test]
    fn test_issues_replace() {
        let state = EntityState::new();
        assert!(state.is_valid());
        state.set_issues(vec![Issue::custom("boom")]);
        assert!(!state.is_valid());
        state.set_issues(Vec::new());
        assert!(state.is_valid());
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&Skipped).unwrap(), "\"skipped\"");
        let parsed: Status = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(parsed, Running);
    }
}
