//! Progress reporting
//!
//! The engine reports coarse-grained progress (entity start/finish, trigger
//! fired, loop pass boundary, run finished) through an injected
//! [`ProgressSink`]. Reporting is fire-and-forget: a sink must never block
//! the execution flow.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;

use crate::status::Status;

/// What a progress update is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    RunStarted,
    EntityStarted,
    EntityFinished,
    TriggerFired,
    LoopPass,
    /// Free-form status text published by an item while it executes
    Status,
    RunFinished,
}

/// A single structured progress update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub kind: ProgressKind,

    /// Name of the entity the update concerns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Status of the entity at the time of the update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    pub message: String,

    /// Completion percentage, `0.0..=100.0`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

impl ProgressUpdate {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity: None,
            status: None,
            message: message.into(),
            percent: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.percent = Some(percent.clamp(0.0, 100.0));
        self
    }
}

/// Receives progress updates from the engine
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Logs every update through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, update: ProgressUpdate) {
        info!(
            kind = ?update.kind,
            entity = update.entity.as_deref().unwrap_or("-"),
            status = update.status.map(Status::as_str).unwrap_or("-"),
            percent = ?update.percent,
            "{}",
            update.message
        );
    }
}

/// Forwards updates into an unbounded channel
///
/// Unbounded so that a slow observer can never stall execution.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        // A dropped receiver just means nobody is watching any more.
        let _ = self.sender.send(update);
    }
}
