//! Simulated equipment
//!
//! In-memory devices with switchable connection state, scaled delays and
//! call recording. Every simulated wait observes the run's cancellation token.

use async_trait::async_trait;
use seq_core::{CancellationToken, Coordinates, DeviceKind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use crate::mediator::{
    Camera, EquipmentError, EquipmentResult, ExposureRequest, ExposureResult, FilterWheel,
    SafetyMonitor, Telescope,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn simulate(delay: Duration, token: &CancellationToken) -> EquipmentResult<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = token.cancelled() => Err(EquipmentError::Cancelled),
    }
}

/// Simulated camera
///
/// Exposures take `duration * time_scale` of wall-clock time; the default
/// scale of zero makes them instantaneous.
#[derive(Debug)]
pub struct SimCamera {
    connected: AtomicBool,
    time_scale: f64,
    gain_range: (i32, i32),
    next_frame: AtomicU64,
    fault: Mutex<Option<String>>,
    captures: Mutex<Vec<ExposureRequest>>,
}

impl SimCamera {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            time_scale: 0.0,
            gain_range: (0, 600),
            next_frame: AtomicU64::new(1),
            fault: Mutex::new(None),
            captures: Mutex::new(Vec::new()),
        }
    }

    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    pub fn with_gain_range(mut self, min: i32, max: i32) -> Self {
        self.gain_range = (min, max);
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Make the next capture fail with a device fault
    pub fn fail_next(&self, message: impl Into<String>) {
        *lock(&self.fault) = Some(message.into());
    }

    /// Every request captured so far
    pub fn captures(&self) -> Vec<ExposureRequest> {
        lock(&self.captures).clone()
    }
}

impl Default for SimCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Camera for SimCamera {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn gain_range(&self) -> (i32, i32) {
        self.gain_range
    }

    async fn capture(
        &self,
        request: ExposureRequest,
        token: &CancellationToken,
    ) -> EquipmentResult<ExposureResult> {
        if !self.is_connected() {
            return Err(EquipmentError::NotConnected(DeviceKind::Camera));
        }
        if let Some(message) = lock(&self.fault).take() {
            return Err(EquipmentError::Fault {
                device: DeviceKind::Camera,
                message,
            });
        }

        simulate(request.duration.mul_f64(self.time_scale), token).await?;

        let frame = self.next_frame.fetch_add(1, Ordering::SeqCst);
        debug!(frame, duration = ?request.duration, gain = request.gain, "Simulated exposure");
        let result = ExposureResult {
            frame,
            duration: request.duration,
            gain: request.gain,
        };
        lock(&self.captures).push(request);
        Ok(result)
    }
}

/// Simulated filter wheel
#[derive(Debug)]
pub struct SimFilterWheel {
    connected: AtomicBool,
    filters: Vec<String>,
    current: Mutex<Option<String>>,
    switch_delay: Duration,
    changes: Mutex<Vec<String>>,
}

impl SimFilterWheel {
    pub const DEFAULT_FILTERS: &'static [&'static str] = &["L", "R", "G", "B", "Ha", "OIII", "SII"];

    pub fn new<S: AsRef<str>>(filters: &[S]) -> Self {
        Self {
            connected: AtomicBool::new(true),
            filters: filters.iter().map(|f| f.as_ref().to_string()).collect(),
            current: Mutex::new(None),
            switch_delay: Duration::ZERO,
            changes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_switch_delay(mut self, delay: Duration) -> Self {
        self.switch_delay = delay;
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Filters selected so far, in order
    pub fn changes(&self) -> Vec<String> {
        lock(&self.changes).clone()
    }
}

#[async_trait]
impl FilterWheel for SimFilterWheel {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn filters(&self) -> Vec<String> {
        self.filters.clone()
    }

    fn current_filter(&self) -> Option<String> {
        lock(&self.current).clone()
    }

    async fn change_filter(&self, name: &str, token: &CancellationToken) -> EquipmentResult<()> {
        if !self.is_connected() {
            return Err(EquipmentError::NotConnected(DeviceKind::FilterWheel));
        }
        if !self.filters.iter().any(|f| f == name) {
            return Err(EquipmentError::InvalidRequest(format!(
                "unknown filter '{name}'"
            )));
        }
        if self.current_filter().as_deref() != Some(name) {
            simulate(self.switch_delay, token).await?;
        }

        debug!(filter = name, "Simulated filter change");
        *lock(&self.current) = Some(name.to_string());
        lock(&self.changes).push(name.to_string());
        Ok(())
    }
}

/// Simulated telescope mount
#[derive(Debug)]
pub struct SimTelescope {
    connected: AtomicBool,
    position: Mutex<Option<Coordinates>>,
    parked: AtomicBool,
    slew_delay: Duration,
    slews: Mutex<Vec<Coordinates>>,
}

impl SimTelescope {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            position: Mutex::new(None),
            parked: AtomicBool::new(false),
            slew_delay: Duration::ZERO,
            slews: Mutex::new(Vec::new()),
        }
    }

    pub fn with_slew_delay(mut self, delay: Duration) -> Self {
        self.slew_delay = delay;
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn slews(&self) -> Vec<Coordinates> {
        lock(&self.slews).clone()
    }
}

impl Default for SimTelescope {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Telescope for SimTelescope {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn position(&self) -> Option<Coordinates> {
        *lock(&self.position)
    }

    async fn slew(&self, target: Coordinates, token: &CancellationToken) -> EquipmentResult<()> {
        if !self.is_connected() {
            return Err(EquipmentError::NotConnected(DeviceKind::Telescope));
        }
        simulate(self.slew_delay, token).await?;

        debug!(%target, "Simulated slew");
        self.parked.store(false, Ordering::SeqCst);
        *lock(&self.position) = Some(target);
        lock(&self.slews).push(target);
        Ok(())
    }

    fn is_parked(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }

    async fn park(&self, token: &CancellationToken) -> EquipmentResult<()> {
        if !self.is_connected() {
            return Err(EquipmentError::NotConnected(DeviceKind::Telescope));
        }
        simulate(self.slew_delay, token).await?;

        debug!("Simulated park");
        self.parked.store(true, Ordering::SeqCst);
        *lock(&self.position) = None;
        Ok(())
    }
}

/// Simulated safety monitor
#[derive(Debug)]
pub struct SimSafetyMonitor {
    connected: AtomicBool,
    safe: AtomicBool,
}

impl SimSafetyMonitor {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            safe: AtomicBool::new(true),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_safe(&self, safe: bool) {
        self.safe.store(safe, Ordering::SeqCst);
    }
}

impl Default for SimSafetyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyMonitor for SimSafetyMonitor {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn is_safe(&self) -> bool {
        self.is_connected() && self.safe.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(secs: u64) -> ExposureRequest {
        ExposureRequest {
            duration: Duration::from_secs(secs),
            gain: 100,
            filter: None,
        }
    }

    #[tokio::test]
    async fn test_camera_records_captures() {
        let camera = SimCamera::new();
        let token = CancellationToken::new();

        let first = camera.capture(request(30), &token).await.unwrap();
        let second = camera.capture(request(60), &token).await.unwrap();

        assert_eq!(first.frame, 1);
        assert_eq!(second.frame, 2);
        assert_eq!(camera.captures().len(), 2);
    }

    #[tokio::test]
    async fn test_camera_disconnected_and_fault() {
        let camera = SimCamera::new();
        let token = CancellationToken::new();

        camera.fail_next("shutter stuck");
        let err = camera.capture(request(1), &token).await.unwrap_err();
        assert!(matches!(err, EquipmentError::Fault { .. }));

        camera.set_connected(false);
        let err = camera.capture(request(1), &token).await.unwrap_err();
        assert_eq!(err, EquipmentError::NotConnected(DeviceKind::Camera));
    }

    #[tokio::test]
    async fn test_camera_exposure_observes_cancellation() {
        let camera = SimCamera::new().with_time_scale(1.0);
        let token = CancellationToken::new();
        token.cancel();

        let err = camera.capture(request(300), &token).await.unwrap_err();
        assert_eq!(err, EquipmentError::Cancelled);
        assert!(camera.captures().is_empty());
    }

    #[tokio::test]
    async fn test_filter_wheel_rejects_unknown_filter() {
        let wheel = SimFilterWheel::new(&["L", "Ha"]);
        let token = CancellationToken::new();

        wheel.change_filter("Ha", &token).await.unwrap();
        assert_eq!(wheel.current_filter().as_deref(), Some("Ha"));

        let err = wheel.change_filter("OIII", &token).await.unwrap_err();
        assert!(matches!(err, EquipmentError::InvalidRequest(_)));
        assert_eq!(wheel.changes(), vec!["Ha".to_string()]);
    }

    #[tokio::test]
    async fn test_telescope_slew_updates_position() {
        let mount = SimTelescope::new();
        let token = CancellationToken::new();
        let m42 = Coordinates::new(5.588, -5.391);

        mount.slew(m42, &token).await.unwrap();
        assert_eq!(mount.position(), Some(m42));
        assert_eq!(mount.slews(), vec![m42]);

        mount.park(&token).await.unwrap();
        assert!(mount.is_parked());
        assert_eq!(mount.position(), None);

        mount.slew(m42, &token).await.unwrap();
        assert!(!mount.is_parked());
    }

    #[test]
    fn test_safety_monitor_unsafe_when_disconnected() {
        let monitor = SimSafetyMonitor::new();
        assert!(monitor.is_safe());
        monitor.set_safe(false);
        assert!(!monitor.is_safe());
        monitor.set_safe(true);
        monitor.set_connected(false);
        assert!(!monitor.is_safe());
    }
}
