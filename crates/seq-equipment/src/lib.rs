//! Equipment mediators
//!
//! Sequence items never talk to hardware directly. Each item depends on a
//! narrow mediator trait from this crate; concrete drivers live outside the
//! sequencer and implement these traits.
//!
//! # Key Types
//!
//! - [`Camera`], [`FilterWheel`], [`Telescope`], [`SafetyMonitor`] - device contracts
//! - [`Equipment`] - the bundle of mediators handed to item factories
//! - [`sim`] - in-memory simulated devices used by the CLI and tests

pub mod mediator;
pub mod sim;

pub use mediator::{
    Camera, Equipment, EquipmentError, EquipmentResult, ExposureRequest, ExposureResult,
    FilterWheel, SafetyMonitor, Telescope,
};
