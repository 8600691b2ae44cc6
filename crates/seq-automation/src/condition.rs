//! Built-in loop conditions
//!
//! Conditions decide whether a repeat-while container runs another pass.
//! They are pure predicates over the [`ConditionContext`] and, where needed,
//! the current state of a device mediator.

use chrono::{Local, NaiveTime};
use seq_core::{DeviceKind, Issue};
use seq_equipment::SafetyMonitor;
use seq_model::{ConditionContext, SequenceCondition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

/// Loop a fixed number of times
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopCount {
    pub iterations: u32,
}

impl LoopCount {
    pub const KIND: &'static str = "loop_count";

    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl SequenceCondition for LoopCount {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, ctx: &ConditionContext<'_>) -> bool {
        ctx.completed_iterations < self.iterations
    }

    fn iteration_hint(&self) -> Option<u32> {
        Some(self.iterations)
    }

    fn clone_condition(&self) -> Box<dyn SequenceCondition> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Loop until a local wall-clock time of day
///
/// The comparison is against the time of day only, so a session that must
/// run past midnight should use a later condition instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopUntilTime {
    #[serde(with = "time_of_day")]
    pub until: NaiveTime,

    /// Override for the current time (for testing)
    #[serde(skip)]
    pub time_override: Option<NaiveTime>,
}

impl LoopUntilTime {
    pub const KIND: &'static str = "loop_until_time";

    pub fn new(until: NaiveTime) -> Self {
        Self {
            until,
            time_override: None,
        }
    }

    /// Set time override for testing
    pub fn with_time(mut self, now: NaiveTime) -> Self {
        self.time_override = Some(now);
        self
    }

    fn now(&self) -> NaiveTime {
        self.time_override.unwrap_or_else(|| Local::now().time())
    }
}

impl SequenceCondition for LoopUntilTime {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, _ctx: &ConditionContext<'_>) -> bool {
        let now = self.now();
        trace!(%now, until = %self.until, "Time condition");
        now < self.until
    }

    fn clone_condition(&self) -> Box<dyn SequenceCondition> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Loop while the safety monitor reports safe conditions
pub struct LoopWhileSafe {
    monitor: Arc<dyn SafetyMonitor>,
}

impl LoopWhileSafe {
    pub const KIND: &'static str = "loop_while_safe";

    pub fn new(monitor: Arc<dyn SafetyMonitor>) -> Self {
        Self { monitor }
    }
}

impl SequenceCondition for LoopWhileSafe {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, _ctx: &ConditionContext<'_>) -> bool {
        self.monitor.is_safe()
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

    fn clone_condition(&self) -> Box<dyn SequenceCondition> {
        Box::new(Self {
            monitor: self.monitor.clone(),
        })
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

/// Parse time string in `HH:MM:SS` or `HH:MM` form
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

mod time_of_day {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid time of day '{raw}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seq_equipment::sim::SimSafetyMonitor;

    fn after(passes: u32) -> ConditionContext<'static> {
        ConditionContext {
            completed_iterations: passes,
            ..Default::default()
        }
    }

    #[test]
    fn test_loop_count() {
        let condition = LoopCount::new(3);
        assert!(condition.check(&after(0)));
        assert!(condition.check(&after(2)));
        assert!(!condition.check(&after(3)));
        assert_eq!(condition.iteration_hint(), Some(3));
    }

    #[test]
    fn test_loop_count_params() {
        let condition: LoopCount = serde_json::from_value(serde_json::json!({"iterations": 4})).unwrap();
        assert_eq!(condition.params(), serde_json::json!({"iterations": 4}));
    }

    #[test]
    fn test_loop_until_time() {
        let until = NaiveTime::from_hms_opt(5, 30, 0).unwrap();
        let early = LoopUntilTime::new(until).with_time(NaiveTime::from_hms_opt(4, 0, 0).unwrap());
        let late = LoopUntilTime::new(until).with_time(NaiveTime::from_hms_opt(5, 30, 0).unwrap());

        assert!(early.check(&after(0)));
        assert!(!late.check(&after(0)));
        assert_eq!(early.iteration_hint(), None);
    }

    #[test]
    fn test_loop_until_time_accepts_short_form() {
        let condition: LoopUntilTime =
            serde_json::from_value(serde_json::json!({"until": "05:45"})).unwrap();
        assert_eq!(condition.until, NaiveTime::from_hms_opt(5, 45, 0).unwrap());
        assert_eq!(condition.params(), serde_json::json!({"until": "05:45:00"}));

        let bad: Result<LoopUntilTime, _> =
            serde_json::from_value(serde_json::json!({"until": "dawn"}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_loop_while_safe() {
        let monitor = Arc::new(SimSafetyMonitor::new());
        let condition = LoopWhileSafe::new(monitor.clone());
        assert!(condition.check(&after(10)));
        assert!(condition.validate().is_empty());

        monitor.set_safe(false);
        assert!(!condition.check(&after(0)));

        monitor.set_connected(false);
        assert_eq!(
            condition.validate(),
            vec![Issue::DeviceNotConnected {
                device: DeviceKind::SafetyMonitor
            }]
        );
    }
}
