//! Loop conditions and reactive triggers
//!
//! This crate provides the built-in conditions and triggers a sequence can
//! attach to its containers, plus the two evaluators the engine consults:
//!
//! ```text
//! before each pass  → ConditionEvaluator → run another pass?
//! after each item   → TriggerEvaluator   → fire reactive sub-sequences
//! ```
//!
//! # Key Types
//!
//! - [`LoopCount`], [`LoopUntilTime`], [`LoopWhileSafe`] - loop conditions
//! - [`AfterItems`], [`WhenUnsafe`] - triggers
//! - [`ConditionEvaluator`] - decides whether a container makes another pass
//! - [`TriggerEvaluator`] - asks and fires triggers after each item

pub mod condition;
pub mod eval;
pub mod trigger;
pub mod trigger_eval;

pub use condition::{parse_time, LoopCount, LoopUntilTime, LoopWhileSafe};
pub use eval::{ConditionEvaluator, LoopDecision};
pub use trigger::{AfterItems, AfterItemsConfig, WhenUnsafe};
pub use trigger_eval::{FiringEnv, TriggerEvaluator, TriggerSummary};
