//! Sequence Engine
//!
//! This crate runs sequences built from the entity model.
//!
//! # Item Types
//!
//! - Waits and annotations
//! - Exposures (camera)
//! - Filter changes (filter wheel)
//! - Slews and parking (mount)
//! - External scripts
//!
//! # Key Types
//!
//! - [`Engine`] - Executes a sequence tree
//! - [`Sequencer`] - Owns the active sequence; one run at a time
//! - [`RunReport`] - How a run ended

pub mod executor;
pub mod items;
pub mod sequencer;

pub use executor::{Engine, EngineConfig, RunOutcome, RunReport};
pub use items::{
    Annotation, ExposureConfig, FilterConfig, ParkTelescope, RunScript, SlewConfig, SlewToTarget,
    SwitchFilter, TakeExposure, Wait,
};
pub use sequencer::{SequenceError, SequenceResult, Sequencer};
