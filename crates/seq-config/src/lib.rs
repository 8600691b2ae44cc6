//! Sequence documents and settings
//!
//! This crate turns files into runnable sequences and back:
//!
//! - [`EntityDocument`] - tagged, serde-friendly form of a sequence tree
//! - [`Registry`] - discriminator → factory tables, built once around an
//!   equipment bundle
//! - YAML/JSON load and save of whole sequences and reusable templates
//! - [`Settings`] - engine and simulator settings with environment overrides
//!
//! # Example
//!
//! ```ignore
//! use seq_config::{save_tree, Registry, Settings};
//!
//! let settings = Settings::load("settings.yaml")?;
//! let registry = Registry::with_builtins(settings.equipment.build());
//!
//! let tree = registry.load("m31.yaml")?;
//! save_tree("m31.json", &tree)?;
//! ```

mod builder;
mod document;
mod error;
mod loader;
mod registry;
mod settings;

pub use builder::{subtree_to_document, tree_to_document};
pub use document::{EntityDocument, CONTAINER_KIND};
pub use error::{DocumentError, DocumentResult, SettingsError, SettingsResult};
pub use loader::{load_document, save_document, save_template, save_tree, DocumentFormat};
pub use registry::{ConditionFactory, ItemFactory, Registry, TriggerFactory};
pub use settings::{Settings, SimulationSettings, ENV_LOG, ENV_SKIP_VALIDATION};
