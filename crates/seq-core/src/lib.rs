//! Core types for the sequencer
//!
//! This crate provides the fundamental types shared by every other crate:
//! entity [`Status`] and its state machine, the run-wide
//! [`CancellationToken`], [`ProgressSink`] observers, validation [`Issue`]s
//! and the equipment value types items work with.

mod cancel;
mod context;
mod equipment;
mod issue;
mod progress;
mod status;

pub use cancel::CancellationToken;
pub use context::RunContext;
pub use equipment::{Coordinates, DeviceKind, Target};
pub use issue::{EnglishFormatter, Issue, IssueFormatter};
pub use progress::{
    ChannelProgress, NullProgress, ProgressKind, ProgressSink, ProgressUpdate, TracingProgress,
};
pub use status::{EntityState, InvalidTransition, StateHandle, Status};
