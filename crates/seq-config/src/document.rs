//! Serialized sequence documents
//!
//! A document is a tree of tagged entries. Every entry names its variant with
//! `type`; containers use the `container` discriminator and carry their
//! strategy, children, conditions, triggers and optional target. Any other
//! keys are the variant's own parameters.
//!
//! ```yaml
//! type: container
//! name: M31
//! strategy: repeat_while
//! target: { name: M31, ra_hours: 0.712, dec_degrees: 41.27 }
//! conditions:
//!   - type: loop_count
//!     name: Twice
//!     iterations: 2
//! children:
//!   - type: take_exposure
//!     name: Lights
//!     exposure: 120
//!     count: 10
//! ```
//!
//! Status and validation issues are runtime state and never appear here.

use seq_core::Target;
use seq_model::{EntityInfo, Strategy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminator of container entries
pub const CONTAINER_KIND: &str = "container";

/// One entry of a sequence document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDocument {
    /// Variant discriminator
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name; defaults to the discriminator
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<EntityDocument>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<EntityDocument>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EntityDocument>,

    /// Sub-sequence run when a trigger fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Box<EntityDocument>>,

    /// Variant parameters
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn default_enabled() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

impl EntityDocument {
    /// Entry of the given variant with no parameters
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            description: None,
            icon: None,
            enabled: true,
            strategy: None,
            target: None,
            conditions: Vec::new(),
            triggers: Vec::new(),
            children: Vec::new(),
            sequence: None,
            params: Map::new(),
        }
    }

    /// Container entry with the given strategy
    pub fn container(name: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            strategy: Some(strategy),
            ..Self::new(CONTAINER_KIND, name)
        }
    }

    pub fn is_container(&self) -> bool {
        self.kind == CONTAINER_KIND
    }

    /// Builder: set a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Builder: append a child entry
    pub fn with_child(mut self, child: EntityDocument) -> Self {
        self.children.push(child);
        self
    }

    /// Descriptive attributes; the name falls back to the discriminator
    pub fn info(&self) -> EntityInfo {
        let name = if self.name.is_empty() {
            self.kind.clone()
        } else {
            self.name.clone()
        };
        EntityInfo {
            name,
            description: self.description.clone(),
            icon: self.icon.clone(),
            enabled: self.enabled,
        }
    }

    /// Copy descriptive attributes from an entity
    pub fn set_info(&mut self, info: &EntityInfo) {
        self.name = info.name.clone();
        self.description = info.description.clone();
        self.icon = info.icon.clone();
        self.enabled = info.enabled;
    }

    /// Parameters as a single JSON object, for factories
    pub fn params_value(&self) -> Value {
        Value::Object(self.params.clone())
    }

    /// Replace the parameters with the fields of a JSON object.
    ///
    /// Anything other than an object (a variant without parameters reports
    /// `null`) clears them.
    pub fn set_params(&mut self, params: Value) {
        self.params = match params {
            Value::Object(map) => map,
            _ => Map::new(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_container_with_params() {
        let yaml = r#"
type: container
name: Night
strategy: best_effort
children:
  - type: wait
    seconds: 5
  - type: annotation
    name: Note
    enabled: false
    message: hello
"#;
        let doc: EntityDocument = serde_yaml::from_str(yaml).unwrap();

        assert!(doc.is_container());
        assert_eq!(doc.strategy, Some(Strategy::BestEffort));
        assert_eq!(doc.children.len(), 2);

        let wait = &doc.children[0];
        assert_eq!(wait.info().name, "wait");
        assert_eq!(wait.params_value(), serde_json::json!({"seconds": 5}));

        let note = &doc.children[1];
        assert!(!note.enabled);
        assert_eq!(note.params.get("message"), Some(&Value::from("hello")));
        assert!(note.params.get("enabled").is_none());
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let result: Result<EntityDocument, _> = serde_yaml::from_str("name: Lost\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_omits_defaults() {
        let doc = EntityDocument::container("Root", Strategy::Sequential)
            .with_child(EntityDocument::new("wait", "Pause").with_param("seconds", 2.0));

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "container",
                "name": "Root",
                "strategy": "sequential",
                "children": [{"type": "wait", "name": "Pause", "seconds": 2.0}],
            })
        );
    }

    #[test]
    fn test_set_params_ignores_non_objects() {
        let mut doc = EntityDocument::new("park_telescope", "Park").with_param("stale", 1);
        doc.set_params(Value::Null);
        assert!(doc.params.is_empty());
    }
}
