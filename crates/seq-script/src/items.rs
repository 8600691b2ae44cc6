//! Built-in sequence items
//!
//! Each item keeps its serializable parameters in a `…Config` struct (what
//! the document stores) and its mediators separately (what the registry
//! injects when the document is loaded).

use async_trait::async_trait;
use seq_core::{DeviceKind, Issue, Target};
use seq_equipment::{Camera, EquipmentError, ExposureRequest, FilterWheel, Telescope};
use seq_model::{ExecutionError, ItemContext, ItemOutcome, ParentContext, SequenceItem};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Map a mediator error onto an item outcome
fn equipment_outcome(err: EquipmentError) -> ItemOutcome {
    match err {
        EquipmentError::Cancelled => ItemOutcome::Cancelled,
        other => ItemOutcome::Failed(ExecutionError::Device(other.to_string())),
    }
}

fn not_connected(device: DeviceKind) -> Vec<Issue> {
    vec![Issue::DeviceNotConnected { device }]
}

fn params<T: Serialize>(config: &T) -> serde_json::Value {
    serde_json::to_value(config).unwrap_or(serde_json::Value::Null)
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

// ============================================================================
// Wait
// ============================================================================

/// Pause the sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wait {
    pub seconds: f64,
}

impl Wait {
    pub const KIND: &'static str = "wait";

    pub fn new(duration: Duration) -> Self {
        Self {
            seconds: duration.as_secs_f64(),
        }
    }
}

#[async_trait]
impl SequenceItem for Wait {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate(&self) -> Vec<Issue> {
        if self.seconds.is_finite() && self.seconds >= 0.0 {
            Vec::new()
        } else {
            vec![Issue::out_of_range("seconds", self.seconds, 0.0, f64::MAX)]
        }
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        let duration = seconds(self.seconds);
        debug!("Delaying for {:?}", duration);
        tokio::select! {
            _ = tokio::time::sleep(duration) => ItemOutcome::Completed,
            _ = ctx.token.cancelled() => ItemOutcome::Cancelled,
        }
    }

    fn estimated_duration(&self) -> Duration {
        seconds(self.seconds)
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        params(self)
    }
}

// ============================================================================
// Annotation
// ============================================================================

/// Publish a message to the progress log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub message: String,
}

impl Annotation {
    pub const KIND: &'static str = "annotation";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl SequenceItem for Annotation {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        info!(entity = ctx.name, "{}", self.message);
        ctx.report(self.message.clone());
        ItemOutcome::Completed
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        params(self)
    }
}

// ============================================================================
// Take exposure
// ============================================================================

/// Serializable parameters of [`TakeExposure`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureConfig {
    /// Exposure time of each frame, in seconds
    pub exposure: f64,

    #[serde(default = "default_count")]
    pub count: u32,

    #[serde(default)]
    pub gain: i32,

    /// Filter requested in the frame metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

fn default_count() -> u32 {
    1
}

/// Capture one or more frames with the camera
pub struct TakeExposure {
    config: ExposureConfig,
    camera: Arc<dyn Camera>,
}

impl TakeExposure {
    pub const KIND: &'static str = "take_exposure";

    pub fn new(config: ExposureConfig, camera: Arc<dyn Camera>) -> Self {
        Self { config, camera }
    }

    pub fn config(&self) -> &ExposureConfig {
        &self.config
    }
}

#[async_trait]
impl SequenceItem for TakeExposure {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate(&self) -> Vec<Issue> {
        if !self.camera.is_connected() {
            return not_connected(DeviceKind::Camera);
        }

        let mut issues = Vec::new();
        if !(self.config.exposure.is_finite() && self.config.exposure > 0.0) {
            issues.push(Issue::out_of_range(
                "exposure",
                self.config.exposure,
                0.0,
                f64::MAX,
            ));
        }
        let (min, max) = self.camera.gain_range();
        if !(min..=max).contains(&self.config.gain) {
            issues.push(Issue::out_of_range(
                "gain",
                f64::from(self.config.gain),
                f64::from(min),
                f64::from(max),
            ));
        }
        issues
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        let total = self.config.count;
        for frame in 0..total {
            if ctx.token.is_cancelled() {
                return ItemOutcome::Cancelled;
            }

            let request = ExposureRequest {
                duration: seconds(self.config.exposure),
                gain: self.config.gain,
                filter: self.config.filter.clone(),
            };
            match self.camera.capture(request, ctx.token).await {
                Ok(result) => {
                    debug!(frame = result.frame, "Exposure captured");
                    ctx.report_percent(
                        format!("Exposure {}/{}", frame + 1, total),
                        f64::from(frame + 1) * 100.0 / f64::from(total),
                    );
                }
                Err(err) => return equipment_outcome(err),
            }
        }
        ItemOutcome::Completed
    }

    fn estimated_duration(&self) -> Duration {
        seconds(self.config.exposure).saturating_mul(self.config.count)
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(Self::new(self.config.clone(), self.camera.clone()))
    }

    fn params(&self) -> serde_json::Value {
        params(&self.config)
    }
}

// ============================================================================
// Switch filter
// ============================================================================

/// Serializable parameters of [`SwitchFilter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub filter: String,
}

/// Move the filter wheel to a named filter
pub struct SwitchFilter {
    config: FilterConfig,
    wheel: Arc<dyn FilterWheel>,
}

impl SwitchFilter {
    pub const KIND: &'static str = "switch_filter";

    pub fn new(config: FilterConfig, wheel: Arc<dyn FilterWheel>) -> Self {
        Self { config, wheel }
    }
}

#[async_trait]
impl SequenceItem for SwitchFilter {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate(&self) -> Vec<Issue> {
        if !self.wheel.is_connected() {
            return not_connected(DeviceKind::FilterWheel);
        }
        if self.config.filter.is_empty() {
            return vec![Issue::missing("filter")];
        }
        if !self.wheel.filters().contains(&self.config.filter) {
            return vec![Issue::UnknownFilter {
                filter: self.config.filter.clone(),
            }];
        }
        Vec::new()
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        if self.wheel.current_filter().as_deref() == Some(self.config.filter.as_str()) {
            return ItemOutcome::Completed;
        }
        ctx.report(format!("Switching to {}", self.config.filter));
        match self.wheel.change_filter(&self.config.filter, ctx.token).await {
            Ok(()) => ItemOutcome::Completed,
            Err(err) => equipment_outcome(err),
        }
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(Self::new(self.config.clone(), self.wheel.clone()))
    }

    fn params(&self) -> serde_json::Value {
        params(&self.config)
    }
}

// ============================================================================
// Slew to target
// ============================================================================

/// Serializable parameters of [`SlewToTarget`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlewConfig {
    /// Explicit target; when absent the nearest ancestor's target is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
}

/// Slew the mount to a target
pub struct SlewToTarget {
    config: SlewConfig,
    inherited: Option<Target>,
    telescope: Arc<dyn Telescope>,
}

impl SlewToTarget {
    pub const KIND: &'static str = "slew_to_target";

    pub fn new(config: SlewConfig, telescope: Arc<dyn Telescope>) -> Self {
        Self {
            config,
            inherited: None,
            telescope,
        }
    }

    /// Target the slew will use
    pub fn target(&self) -> Option<&Target> {
        self.config.target.as_ref().or(self.inherited.as_ref())
    }
}

#[async_trait]
impl SequenceItem for SlewToTarget {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate(&self) -> Vec<Issue> {
        if !self.telescope.is_connected() {
            return not_connected(DeviceKind::Telescope);
        }
        match self.target() {
            Some(target) => target.coordinates.issues(),
            None => vec![Issue::NoTarget],
        }
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        let Some(target) = self.target() else {
            return ItemOutcome::Skipped("no target".to_string());
        };
        ctx.report(format!("Slewing to {} ({})", target.name, target.coordinates));
        match self.telescope.slew(target.coordinates, ctx.token).await {
            Ok(()) => ItemOutcome::Completed,
            Err(err) => equipment_outcome(err),
        }
    }

    fn after_parent_changed(&mut self, parent: &ParentContext) {
        self.inherited = parent.target.clone();
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(Self {
            config: self.config.clone(),
            inherited: self.inherited.clone(),
            telescope: self.telescope.clone(),
        })
    }

    fn params(&self) -> serde_json::Value {
        params(&self.config)
    }
}

// ============================================================================
// Park telescope
// ============================================================================

/// Park the mount
pub struct ParkTelescope {
    telescope: Arc<dyn Telescope>,
}

impl ParkTelescope {
    pub const KIND: &'static str = "park_telescope";

    pub fn new(telescope: Arc<dyn Telescope>) -> Self {
        Self { telescope }
    }
}

#[async_trait]
impl SequenceItem for ParkTelescope {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate(&self) -> Vec<Issue> {
        if self.telescope.is_connected() {
            Vec::new()
        } else {
            not_connected(DeviceKind::Telescope)
        }
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        if self.telescope.is_parked() {
            return ItemOutcome::Skipped("already parked".to_string());
        }
        ctx.report("Parking");
        match self.telescope.park(ctx.token).await {
            Ok(()) => ItemOutcome::Completed,
            Err(err) => equipment_outcome(err),
        }
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(Self::new(self.telescope.clone()))
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

// ============================================================================
// Run external script
// ============================================================================

/// Run an external program; a non-zero exit status fails the item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunScript {
    pub command: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl RunScript {
    pub const KIND: &'static str = "run_script";

    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl SequenceItem for RunScript {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn validate(&self) -> Vec<Issue> {
        if self.command.trim().is_empty() {
            vec![Issue::missing("command")]
        } else {
            Vec::new()
        }
    }

    async fn execute(&self, ctx: &ItemContext<'_>) -> ItemOutcome {
        let mut child = match tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return ItemOutcome::Failed(ExecutionError::failed(format!(
                    "Cannot start '{}': {err}",
                    self.command
                )))
            }
        };

        tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => ItemOutcome::Completed,
                Ok(status) => ItemOutcome::Failed(ExecutionError::failed(format!(
                    "'{}' exited with {status}",
                    self.command
                ))),
                Err(err) => ItemOutcome::Failed(ExecutionError::failed(err.to_string())),
            },
            _ = ctx.token.cancelled() => {
                if let Err(err) = child.kill().await {
                    warn!(command = %self.command, %err, "Cannot stop script");
                }
                ItemOutcome::Cancelled
            }
        }
    }

    fn clone_item(&self) -> Box<dyn SequenceItem> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        params(self)
    }
}
