//! Scripted sequence item

use async_trait::async_trait;
use seq_core::{CancellationToken, Issue};
use seq_model::{ExecutionError, ItemContext, ItemOutcome, SequenceItem};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::Journal;

/// An item that records its label and returns a predetermined outcome
#[derive(Clone)]
pub struct ScriptedItem {
    label: String,
    outcome: ItemOutcome,
    journal: Journal,
    issues: Vec<Issue>,
    duration: Duration,
    /// Cancel this token while executing, as a user pressing stop would
    cancels: Option<CancellationToken>,
    /// Block until notified (or cancelled)
    gate: Option<Arc<Notify>>,
}

impl ScriptedItem {
    pub fn ok(label: &str, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            outcome: ItemOutcome::Completed,
            journal: journal.clone(),
            issues: Vec::new(),
            duration: Duration::ZERO,
            cancels: None,
            gate: None,
        }
    }

    pub fn skip(label: &str, journal: &Journal) -> Self {
        Self {
            outcome: ItemOutcome::Skipped(format!("{label} not needed")),
            ..Self::ok(label, journal)
        }
    }

    pub fn fail(label: &str, journal: &Journal) -> Self {
        Self {
            outcome: ItemOutcome::Failed(ExecutionError::failed(format!("{label} broke"))),
            ..Self::ok(label, journal)
        }
    }

    pub fn with_issue(mut self, issue: Issue) -> Self {
        self.issues.push(issue);
        self
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn cancelling(mut self, token: &CancellationToken) -> Self {
        self.cancels = Some(token.clone());
        self
    }

    pub fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(gate.clone());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl SequenceItem for ScriptedItem {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn validate(&self) -> Vec<Issue> {
        self.issues.clone()
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        self.journal.record(self.label.clone());

        if let Some(token) = &self.cancels {
            token.cancel();
        }
        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = gate.notified() => {}
                _ = ctx.token.cancelled() => return ItemOutcome::Cancelled,
            }
        }
        self.outcome.clone()
    }

    fn estimated_duration(&self) -> Duration {
        self.duration
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "label": self.label })
    }
}
