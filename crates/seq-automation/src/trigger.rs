//! Built-in reactive triggers
//!
//! Triggers are asked after every completed item whether they want to fire.
//! Their per-run bookkeeping lives in atomics so that `should_trigger` and
//! `execute` can stay `&self`; [`SequenceTrigger::reset`] clears it before
//! every run.

use async_trait::async_trait;
use seq_core::{DeviceKind, Issue};
use seq_equipment::SafetyMonitor;
use seq_model::{ItemOutcome, SequenceTrigger, TriggerContext, TriggerRun};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Serializable parameters of [`AfterItems`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AfterItemsConfig {
    /// Fire once every this many completed items
    pub every: u64,
}

/// Fire every N completed items, e.g. to refocus or dither
#[derive(Debug)]
pub struct AfterItems {
    config: AfterItemsConfig,
    last_fired_at: AtomicU64,
}

impl AfterItems {
    pub const KIND: &'static str = "after_items";

    pub fn new(every: u64) -> Self {
        Self::from_config(AfterItemsConfig { every })
    }

    pub fn from_config(config: AfterItemsConfig) -> Self {
        Self {
            config,
            last_fired_at: AtomicU64::new(0),
        }
    }

    pub fn every(&self) -> u64 {
        self.config.every
    }
}

#[async_trait]
impl SequenceTrigger for AfterItems {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn should_trigger(&self, ctx: &TriggerContext<'_>) -> bool {
        let last = self.last_fired_at.load(Ordering::SeqCst);
        self.config.every > 0 && ctx.items_completed.saturating_sub(last) >= self.config.every
    }

    async fn execute(&self, run: TriggerRun<'_>) -> ItemOutcome {
        self.last_fired_at
            .store(run.items_completed, Ordering::SeqCst);
        debug!(trigger = run.name, items = run.items_completed, "Item count reached");
        run.run_sequence().await
    }

    fn validate(&self) -> Vec<Issue> {
        if self.config.every == 0 {
            vec![Issue::out_of_range("every", 0.0, 1.0, u64::MAX as f64)]
        } else {
            Vec::new()
        }
    }

    fn reset(&self) {
        self.last_fired_at.store(0, Ordering::SeqCst);
    }

    fn clone_trigger(&self) -> Box<dyn SequenceTrigger> {
        Box::new(Self::from_config(self.config))
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(self.config).unwrap_or(serde_json::Value::Null)
    }
}

/// Fire once when the safety monitor turns unsafe, e.g. to park and close
///
/// The trigger re-arms once conditions are safe again.
pub struct WhenUnsafe {
    monitor: Arc<dyn SafetyMonitor>,
    handled: AtomicBool,
}

impl WhenUnsafe {
    pub const KIND: &'static str = "when_unsafe";

    pub fn new(monitor: Arc<dyn SafetyMonitor>) -> Self {
        Self {
            monitor,
            handled: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl SequenceTrigger for WhenUnsafe {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn should_trigger(&self, _ctx: &TriggerContext<'_>) -> bool {
        if self.monitor.is_safe() {
            self.handled.store(false, Ordering::SeqCst);
            return false;
        }
        !self.handled.load(Ordering::SeqCst)
    }

    async fn execute(&self, run: TriggerRun<'_>) -> ItemOutcome {
        self.handled.store(true, Ordering::SeqCst);
        debug!(trigger = run.name, "Unsafe conditions reported");
        run.run_sequence().await
    }

    fn validate(&self) -> Vec<Issue> {
        if self.monitor.is_connected() {
            Vec::new()
        } else {
            vec![Issue::DeviceNotConnected {
                device: DeviceKind::SafetyMonitor,
            }]
        }
    }

    fn reset(&self) {
        self.handled.store(false, Ordering::SeqCst);
    }

    fn clone_trigger(&self) -> Box<dyn SequenceTrigger> {
        Box::new(Self::new(self.monitor.clone()))
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}
