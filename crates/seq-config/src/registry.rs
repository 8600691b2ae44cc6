//! Entity registry
//!
//! Maps document discriminators to factory functions. The registry is built
//! once at startup around an equipment bundle; every factory receives the
//! variant's parameters and that bundle.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use seq_automation::{AfterItems, AfterItemsConfig, LoopCount, LoopUntilTime, LoopWhileSafe, WhenUnsafe};
use seq_equipment::Equipment;
use seq_model::{SequenceCondition, SequenceItem, SequenceTrigger};
use seq_script::{
    Annotation, ExposureConfig, FilterConfig, ParkTelescope, RunScript, SlewConfig, SlewToTarget,
    SwitchFilter, TakeExposure, Wait,
};
use tracing::debug;

use crate::error::{DocumentError, DocumentResult};

/// Builds an item from its parameters
pub type ItemFactory = fn(&Value, &Equipment) -> DocumentResult<Box<dyn SequenceItem>>;

/// Builds a condition from its parameters
pub type ConditionFactory = fn(&Value, &Equipment) -> DocumentResult<Box<dyn SequenceCondition>>;

/// Builds a trigger from its parameters
pub type TriggerFactory = fn(&Value, &Equipment) -> DocumentResult<Box<dyn SequenceTrigger>>;

/// Discriminator → factory tables for items, conditions and triggers
pub struct Registry {
    equipment: Equipment,
    items: DashMap<String, ItemFactory>,
    conditions: DashMap<String, ConditionFactory>,
    triggers: DashMap<String, TriggerFactory>,
}

impl Registry {
    /// Empty registry
    pub fn empty(equipment: Equipment) -> Self {
        Self {
            equipment,
            items: DashMap::new(),
            conditions: DashMap::new(),
            triggers: DashMap::new(),
        }
    }

    /// Registry with every built-in variant
    pub fn with_builtins(equipment: Equipment) -> Self {
        let registry = Self::empty(equipment);

        registry.register_item(Wait::KIND, |params, _| {
            Ok(Box::new(config::<Wait>(Wait::KIND, params)?))
        });
        registry.register_item(Annotation::KIND, |params, _| {
            Ok(Box::new(config::<Annotation>(Annotation::KIND, params)?))
        });
        registry.register_item(TakeExposure::KIND, |params, equipment| {
            let config = config::<ExposureConfig>(TakeExposure::KIND, params)?;
            Ok(Box::new(TakeExposure::new(config, equipment.camera.clone())))
        });
        registry.register_item(SwitchFilter::KIND, |params, equipment| {
            let config = config::<FilterConfig>(SwitchFilter::KIND, params)?;
            Ok(Box::new(SwitchFilter::new(config, equipment.filter_wheel.clone())))
        });
        registry.register_item(SlewToTarget::KIND, |params, equipment| {
            let config = config::<SlewConfig>(SlewToTarget::KIND, params)?;
            Ok(Box::new(SlewToTarget::new(config, equipment.telescope.clone())))
        });
        registry.register_item(ParkTelescope::KIND, |_, equipment| {
            Ok(Box::new(ParkTelescope::new(equipment.telescope.clone())))
        });
        registry.register_item(RunScript::KIND, |params, _| {
            Ok(Box::new(config::<RunScript>(RunScript::KIND, params)?))
        });

        registry.register_condition(LoopCount::KIND, |params, _| {
            Ok(Box::new(config::<LoopCount>(LoopCount::KIND, params)?))
        });
        registry.register_condition(LoopUntilTime::KIND, |params, _| {
            Ok(Box::new(config::<LoopUntilTime>(LoopUntilTime::KIND, params)?))
        });
        registry.register_condition(LoopWhileSafe::KIND, |_, equipment| {
            Ok(Box::new(LoopWhileSafe::new(equipment.safety.clone())))
        });

        registry.register_trigger(AfterItems::KIND, |params, _| {
            let config = config::<AfterItemsConfig>(AfterItems::KIND, params)?;
            Ok(Box::new(AfterItems::from_config(config)))
        });
        registry.register_trigger(WhenUnsafe::KIND, |_, equipment| {
            Ok(Box::new(WhenUnsafe::new(equipment.safety.clone())))
        });

        debug!(
            items = registry.items.len(),
            conditions = registry.conditions.len(),
            triggers = registry.triggers.len(),
            "Registered built-in entities"
        );
        registry
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    /// Register (or replace) an item factory
    pub fn register_item(&self, kind: impl Into<String>, factory: ItemFactory) {
        self.items.insert(kind.into(), factory);
    }

    pub fn register_condition(&self, kind: impl Into<String>, factory: ConditionFactory) {
        self.conditions.insert(kind.into(), factory);
    }

    pub fn register_trigger(&self, kind: impl Into<String>, factory: TriggerFactory) {
        self.triggers.insert(kind.into(), factory);
    }

    pub fn has_item(&self, kind: &str) -> bool {
        self.items.contains_key(kind)
    }

    /// Registered item discriminators, sorted
    pub fn item_kinds(&self) -> Vec<String> {
        sorted_keys(&self.items)
    }

    pub fn condition_kinds(&self) -> Vec<String> {
        sorted_keys(&self.conditions)
    }

    pub fn trigger_kinds(&self) -> Vec<String> {
        sorted_keys(&self.triggers)
    }

    pub fn create_item(&self, kind: &str, params: &Value) -> DocumentResult<Box<dyn SequenceItem>> {
        let factory = self
            .items
            .get(kind)
            .map(|entry| *entry.value())
            .ok_or_else(|| unknown("item", kind))?;
        factory(params, &self.equipment)
    }

    pub fn create_condition(
        &self,
        kind: &str,
        params: &Value,
    ) -> DocumentResult<Box<dyn SequenceCondition>> {
        let factory = self
            .conditions
            .get(kind)
            .map(|entry| *entry.value())
            .ok_or_else(|| unknown("condition", kind))?;
        factory(params, &self.equipment)
    }

    pub fn create_trigger(
        &self,
        kind: &str,
        params: &Value,
    ) -> DocumentResult<Box<dyn SequenceTrigger>> {
        let factory = self
            .triggers
            .get(kind)
            .map(|entry| *entry.value())
            .ok_or_else(|| unknown("trigger", kind))?;
        factory(params, &self.equipment)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("items", &self.item_kinds())
            .field("conditions", &self.condition_kinds())
            .field("triggers", &self.trigger_kinds())
            .finish()
    }
}

/// Deserialize a variant's parameters
fn config<T: DeserializeOwned>(kind: &str, params: &Value) -> DocumentResult<T> {
    serde_json::from_value(params.clone()).map_err(|err| DocumentError::InvalidParams {
        kind: kind.to_string(),
        reason: err.to_string(),
    })
}

fn unknown(role: &'static str, kind: &str) -> DocumentError {
    DocumentError::UnknownKind {
        role,
        kind: kind.to_string(),
    }
}

fn sorted_keys<V>(map: &DashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = map.iter().map(|entry| entry.key().clone()).collect();
    keys.sort();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::with_builtins(Equipment::simulated())
    }

    #[test]
    fn test_builtins_registered() {
        let registry = registry();
        assert_eq!(
            registry.item_kinds(),
            vec![
                "annotation",
                "park_telescope",
                "run_script",
                "slew_to_target",
                "switch_filter",
                "take_exposure",
                "wait",
            ]
        );
        assert_eq!(
            registry.condition_kinds(),
            vec!["loop_count", "loop_until_time", "loop_while_safe"]
        );
        assert_eq!(registry.trigger_kinds(), vec!["after_items", "when_unsafe"]);
    }

    #[test]
    fn test_create_item_from_params() {
        let item = registry()
            .create_item("take_exposure", &json!({"exposure": 30.0, "count": 4}))
            .unwrap();

        assert_eq!(item.kind(), "take_exposure");
        assert_eq!(item.estimated_duration().as_secs(), 120);
    }

    #[test]
    fn test_unknown_kind() {
        let err = registry().create_item("dance", &json!({})).err().unwrap();
        assert!(matches!(
            err,
            DocumentError::UnknownKind { role: "item", ref kind } if kind == "dance"
        ));

        // Conditions and triggers have their own tables
        assert!(registry().create_condition("wait", &json!({})).is_err());
    }

    #[test]
    fn test_invalid_params() {
        let err = registry()
            .create_condition("loop_count", &json!({"iterations": "many"}))
            .err().unwrap();
        assert!(matches!(err, DocumentError::InvalidParams { ref kind, .. } if kind == "loop_count"));
    }

    #[test]
    fn test_register_replaces_factory() {
        let registry = registry();
        registry.register_item("wait", |_, _| Ok(Box::new(Annotation::new("replaced"))));

        let item = registry.create_item("wait", &json!({})).unwrap();
        assert_eq!(item.kind(), "annotation");
    }
}
