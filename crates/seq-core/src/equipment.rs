//! Equipment-facing value types shared by items, containers and mediators

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::issue::Issue;

/// Kind of device a mediator abstracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Camera,
    FilterWheel,
    Telescope,
    SafetyMonitor,
}

impl DeviceKind {
    pub fn label(self) -> &'static str {
        match self {
            DeviceKind::Camera => "Camera",
            DeviceKind::FilterWheel => "Filter wheel",
            DeviceKind::Telescope => "Telescope",
            DeviceKind::SafetyMonitor => "Safety monitor",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Equatorial coordinates (J2000)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Right ascension in hours, `[0, 24)`
    pub ra_hours: f64,
    /// Declination in degrees, `[-90, 90]`
    pub dec_degrees: f64,
}

impl Coordinates {
    pub fn new(ra_hours: f64, dec_degrees: f64) -> Self {
        Self {
            ra_hours,
            dec_degrees,
        }
    }

    /// Range issues, empty when the coordinates are usable
    pub fn issues(&self) -> Vec<Issue> {
        let mut issues = Vec::new();
        if !(0.0..24.0).contains(&self.ra_hours) {
            issues.push(Issue::out_of_range("ra_hours", self.ra_hours, 0.0, 24.0));
        }
        if !(-90.0..=90.0).contains(&self.dec_degrees) {
            issues.push(Issue::out_of_range(
                "dec_degrees",
                self.dec_degrees,
                -90.0,
                90.0,
            ));
        }
        issues
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RA {:.4}h Dec {:+.4}°", self.ra_hours, self.dec_degrees)
    }
}

/// A named deep-sky target attached to a container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

impl Target {
    pub fn new(name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }
}
