//! Sequence entity model
//!
//! The entity tree (containers, items, conditions, triggers), its structural
//! operations, recursive validation and duration estimation. Execution lives
//! in `seq-script`; concrete entities live in `seq-automation` and
//! `seq-script`.

pub mod container;
pub mod entity;
pub mod estimate;
pub mod tree;
pub mod validate;

pub use container::{ConditionSlot, Container, Strategy, TriggerSlot};
pub use entity::{
    ConditionContext, EntityInfo, ExecutionError, ItemContext, ItemOutcome, ItemView,
    ParentContext, SequenceCondition, SequenceItem, SequenceRunner, SequenceTrigger,
    TriggerContext, TriggerRun,
};
pub use estimate::expected_passes;
pub use tree::{Node, NodeId, NodeKind, SequenceTree, TreeError, TreeResult};
pub use validate::{ValidationEntry, ValidationReport};
