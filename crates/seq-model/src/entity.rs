//! Entity contracts
//!
//! Items, conditions and triggers are open sets: concrete variants live in
//! other crates and implement the traits below. Every variant must be able to
//! clone itself into a fresh boxed instance, which is how the tree deep-copies
//! templates without knowing concrete types.

use async_trait::async_trait;
use seq_core::{
    CancellationToken, InvalidTransition, Issue, ProgressKind, ProgressSink, ProgressUpdate,
    RunContext, Status, Target,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::tree::SequenceTree;

/// Descriptive attributes shared by every entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Opaque icon reference, only meaningful to a UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Disabled entities are never executed and end `Skipped`
    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

impl EntityInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            icon: None,
            enabled: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Errors surfaced by executing entities
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Trigger '{trigger}' failed: {message}")]
    Trigger { trigger: String, message: String },

    #[error("'{entity}' failed: {message}")]
    Child { entity: String, message: String },

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ExecutionError::Failed(message.into())
    }
}

/// Result of executing an item, a trigger or a nested sequence
///
/// A skip is a recoverable, local outcome; a failure propagates according to
/// the enclosing container's strategy; cancellation always unwinds the run.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Completed,
    Skipped(String),
    Failed(ExecutionError),
    Cancelled,
}

impl ItemOutcome {
    /// Terminal status recorded for the entity that produced this outcome
    pub fn status(&self) -> Status {
        match self {
            ItemOutcome::Completed => Status::Finished,
            ItemOutcome::Failed(_) => Status::Failed,
            ItemOutcome::Skipped(_) | ItemOutcome::Cancelled => Status::Skipped,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed(_))
    }
}

/// Context resolved from an entity's ancestors after it is attached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParentContext {
    /// Target of the nearest ancestor container that carries one
    pub target: Option<Target>,
}

/// Everything an item needs while it executes
pub struct ItemContext<'a> {
    pub name: &'a str,
    pub progress: &'a dyn ProgressSink,
    pub token: &'a CancellationToken,
    pub run: &'a RunContext,
}

impl ItemContext<'_> {
    /// Publish a free-form status message for this item
    pub fn report(&self, message: impl Into<String>) {
        self.progress.report(
            ProgressUpdate::new(ProgressKind::Status, message)
                .with_entity(self.name)
                .with_status(Status::Running),
        );
    }

    pub fn report_percent(&self, message: impl Into<String>, percent: f64) {
        self.progress.report(
            ProgressUpdate::new(ProgressKind::Status, message)
                .with_entity(self.name)
                .with_status(Status::Running)
                .with_percent(percent),
        );
    }
}

/// Read-only view of an item adjacent to a condition or trigger check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemView<'a> {
    pub name: &'a str,
    pub kind: &'a str,
    pub status: Status,
}

/// Inputs to a condition check
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionContext<'a> {
    /// Item that just completed, if any
    pub previous: Option<ItemView<'a>>,
    /// Item that will run next, if any
    pub next: Option<ItemView<'a>>,
    /// Passes the container has completed so far in this run
    pub completed_iterations: u32,
}

/// Inputs to a trigger's `should_trigger`
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerContext<'a> {
    pub previous: Option<ItemView<'a>>,
    pub next: Option<ItemView<'a>>,
    /// Leaf items completed so far in this run
    pub items_completed: u64,
}

/// Runs nested sequences on behalf of triggers
#[async_trait]
pub trait SequenceRunner: Send + Sync {
    async fn run_sequence(&self, sequence: &SequenceTree) -> ItemOutcome;
}

/// Everything a firing trigger needs
pub struct TriggerRun<'a> {
    pub name: &'a str,
    pub sequence: Option<&'a SequenceTree>,
    pub runner: &'a dyn SequenceRunner,
    pub progress: &'a dyn ProgressSink,
    pub token: &'a CancellationToken,
    pub items_completed: u64,
}

impl TriggerRun<'_> {
    /// Execute the trigger's nested sequence through the engine
    pub async fn run_sequence(&self) -> ItemOutcome {
        match self.sequence {
            Some(sequence) => self.runner.run_sequence(sequence).await,
            None => ItemOutcome::Completed,
        }
    }
}

/// Leaf entity performing one unit of work
#[async_trait]
pub trait SequenceItem: Send + Sync {
    /// Discriminator used in the serialized form
    fn kind(&self) -> &'static str;

    /// Preconditions not currently met; empty means valid
    fn validate(&self) -> Vec<Issue> {
        Vec::new()
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome;

    fn estimated_duration(&self) -> Duration {
        Duration::ZERO
    }

    /// Called after the item is attached somewhere new
    fn after_parent_changed(&mut self, _parent: &ParentContext) {}

    fn clone_item(&self) -> Box<dyn SequenceItem>;

    /// Variant parameters for the serialized form
    fn params(&self) -> serde_json::Value;
}

/// Predicate deciding whether a looping container runs another pass
pub trait SequenceCondition: Send + Sync {
    fn kind(&self) -> &'static str;

    fn check(&self, ctx: &ConditionContext<'_>) -> bool;

    fn validate(&self) -> Vec<Issue> {
        Vec::new()
    }

    /// Expected number of passes, when knowable up front
    fn iteration_hint(&self) -> Option<u32> {
        None
    }

    fn clone_condition(&self) -> Box<dyn SequenceCondition>;

    fn params(&self) -> serde_json::Value;
}

/// Reactive entity evaluated after every completed item
#[async_trait]
pub trait SequenceTrigger: Send + Sync {
    fn kind(&self) -> &'static str;

    fn should_trigger(&self, ctx: &TriggerContext<'_>) -> bool;

    /// Default behaviour runs the nested sequence, if any
    async fn execute(&self, run: TriggerRun<'_>) -> ItemOutcome {
        run.run_sequence().await
    }

    fn validate(&self) -> Vec<Issue> {
        Vec::new()
    }

    /// Forget per-run bookkeeping before a new run starts
    fn reset(&self) {}

    fn clone_trigger(&self) -> Box<dyn SequenceTrigger>;

    fn params(&self) -> serde_json::Value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_info_defaults() {
        let info: EntityInfo = serde_json::from_str(r#"{"name": "Lights"}"#).unwrap();
        assert!(info.enabled);
        assert!(info.description.is_none());

        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("enabled").is_none());

        let json = serde_json::to_value(EntityInfo::new("Darks").disabled()).unwrap();
        assert_eq!(json["enabled"], false);
    }

    #[test]
    fn test_outcome_status() {
        assert_eq!(ItemOutcome::Completed.status(), Status::Finished);
        assert_eq!(ItemOutcome::Skipped("x".into()).status(), Status::Skipped);
        assert_eq!(ItemOutcome::Cancelled.status(), Status::Skipped);
        assert_eq!(
            ItemOutcome::Failed(ExecutionError::failed("boom")).status(),
            Status::Failed
        );
    }
}
