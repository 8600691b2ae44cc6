//! Device mediator contracts

use async_trait::async_trait;
use seq_core::{CancellationToken, Coordinates, DeviceKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::sim::{SimCamera, SimFilterWheel, SimSafetyMonitor, SimTelescope};

/// Equipment errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EquipmentError {
    #[error("{0} not connected")]
    NotConnected(DeviceKind),

    #[error("{device} fault: {message}")]
    Fault { device: DeviceKind, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type for mediator calls
pub type EquipmentResult<T> = Result<T, EquipmentError>;

/// Parameters of a single exposure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRequest {
    pub duration: Duration,
    pub gain: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Metadata of a captured frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureResult {
    /// Sequential frame number assigned by the camera
    pub frame: u64,
    pub duration: Duration,
    pub gain: i32,
}

/// Camera mediator
#[async_trait]
pub trait Camera: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Inclusive gain range accepted by `capture`
    fn gain_range(&self) -> (i32, i32);

    /// Take a single exposure
    async fn capture(
        &self,
        request: ExposureRequest,
        token: &CancellationToken,
    ) -> EquipmentResult<ExposureResult>;
}

/// Filter wheel mediator
#[async_trait]
pub trait FilterWheel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Installed filter names, in slot order
    fn filters(&self) -> Vec<String>;

    fn current_filter(&self) -> Option<String>;

    async fn change_filter(&self, name: &str, token: &CancellationToken) -> EquipmentResult<()>;
}

/// Telescope mount mediator
#[async_trait]
pub trait Telescope: Send + Sync {
    fn is_connected(&self) -> bool;

    fn position(&self) -> Option<Coordinates>;

    async fn slew(&self, target: Coordinates, token: &CancellationToken) -> EquipmentResult<()>;

    fn is_parked(&self) -> bool;

    async fn park(&self, token: &CancellationToken) -> EquipmentResult<()>;
}

/// Safety monitor mediator (weather, roof, ...)
pub trait SafetyMonitor: Send + Sync {
    fn is_connected(&self) -> bool;

    fn is_safe(&self) -> bool;
}

/// The set of mediators available to item and condition factories
#[derive(Clone)]
pub struct Equipment {
    pub camera: Arc<dyn Camera>,
    pub filter_wheel: Arc<dyn FilterWheel>,
    pub telescope: Arc<dyn Telescope>,
    pub safety: Arc<dyn SafetyMonitor>,
}

impl Equipment {
    pub fn new(
        camera: Arc<dyn Camera>,
        filter_wheel: Arc<dyn FilterWheel>,
        telescope: Arc<dyn Telescope>,
        safety: Arc<dyn SafetyMonitor>,
    ) -> Self {
        Self {
            camera,
            filter_wheel,
            telescope,
            safety,
        }
    }

    /// Connected simulators with default settings
    pub fn simulated() -> Self {
        Self::new(
            Arc::new(SimCamera::new()),
            Arc::new(SimFilterWheel::new(SimFilterWheel::DEFAULT_FILTERS)),
            Arc::new(SimTelescope::new()),
            Arc::new(SimSafetyMonitor::new()),
        )
    }
}

impl std::fmt::Debug for Equipment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Equipment")
            .field("camera_connected", &self.camera.is_connected())
            .field("filter_wheel_connected", &self.filter_wheel.is_connected())
            .field("telescope_connected", &self.telescope.is_connected())
            .field("safety_connected", &self.safety.is_connected())
            .finish()
    }
}
