//! Validation issues
//!
//! Issues are plain error codes with their parameters. Turning them into
//! human-readable text is the job of an injected [`IssueFormatter`], so the
//! engine never reaches for a process-wide locale.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::equipment::DeviceKind;

/// A single validation issue reported by an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Issue {
    /// A device the entity depends on is not connected
    DeviceNotConnected { device: DeviceKind },

    /// A numeric parameter is outside its allowed range
    OutOfRange {
        parameter: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A required parameter has no value
    MissingParameter { parameter: String },

    /// The requested filter is not installed in the wheel
    UnknownFilter { filter: String },

    /// A repeat-while container has no conditions to stop it
    NoLoopConditions,

    /// No coordinates could be resolved from this entity or its ancestors
    NoTarget,

    /// Free-form issue text
    Custom { message: String },
}

impl Issue {
    pub fn out_of_range(parameter: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        Issue::OutOfRange {
            parameter: parameter.into(),
            value,
            min,
            max,
        }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        Issue::Custom {
            message: message.into(),
        }
    }

    pub fn missing(parameter: impl Into<String>) -> Self {
        Issue::MissingParameter {
            parameter: parameter.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Issue::DeviceNotConnected { .. } => "device_not_connected",
            Issue::OutOfRange { .. } => "out_of_range",
            Issue::MissingParameter { .. } => "missing_parameter",
            Issue::UnknownFilter { .. } => "unknown_filter",
            Issue::NoLoopConditions => "no_loop_conditions",
            Issue::NoTarget => "no_target",
            Issue::Custom { .. } => "custom",
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&EnglishFormatter.format(self))
    }
}

/// Renders issues as human-readable messages
pub trait IssueFormatter: Send + Sync {
    fn format(&self, issue: &Issue) -> String;
}

/// Default English messages
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishFormatter;

impl IssueFormatter for EnglishFormatter {
    fn format(&self, issue: &Issue) -> String {
        match issue {
            Issue::DeviceNotConnected { device } => format!("{} not connected", device.label()),
            Issue::OutOfRange {
                parameter,
                value,
                min,
                max,
            } => format!("{parameter} {value} is out of range [{min}, {max}]"),
            Issue::MissingParameter { parameter } => format!("{parameter} is not set"),
            Issue::UnknownFilter { filter } => format!("Filter '{filter}' is not installed"),
            Issue::NoLoopConditions => "Loop has no conditions and would never stop".to_string(),
            Issue::NoTarget => "No target coordinates available".to_string(),
            Issue::Custom { message } => message.clone(),
        }
    }
}
