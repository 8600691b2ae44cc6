//! Sequence containers
//!
//! A container owns an ordered list of child nodes (held by the tree), plus
//! the conditions and triggers attached to it and the strategy selecting its
//! iteration semantics.

use seq_core::{EntityState, StateHandle, Target};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityInfo, SequenceCondition, SequenceTrigger};
use crate::tree::{NodeId, SequenceTree};

/// Iteration semantics of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Run every child once, in order; abort on the first failure
    #[default]
    Sequential,

    /// Run passes over the children while every condition holds
    RepeatWhile,

    /// Run every child once, in order, isolating child failures
    BestEffort,
}

impl Strategy {
    pub fn is_looping(self) -> bool {
        matches!(self, Strategy::RepeatWhile)
    }

    /// Whether a failed child leaves the container running and unfailed
    pub fn isolates_failures(self) -> bool {
        matches!(self, Strategy::BestEffort)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::RepeatWhile => "repeat_while",
            Strategy::BestEffort => "best_effort",
        }
    }
}

/// A condition attached to a container
pub struct ConditionSlot {
    pub info: EntityInfo,
    pub condition: Box<dyn SequenceCondition>,
}

impl ConditionSlot {
    pub fn new(info: EntityInfo, condition: Box<dyn SequenceCondition>) -> Self {
        Self { info, condition }
    }

    /// Deep copy
    pub fn duplicate(&self) -> Self {
        Self {
            info: self.info.clone(),
            condition: self.condition.clone_condition(),
        }
    }
}

impl std::fmt::Debug for ConditionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionSlot")
            .field("name", &self.info.name)
            .field("kind", &self.condition.kind())
            .finish()
    }
}

/// A trigger attached to a container, with its optional nested sequence
pub struct TriggerSlot {
    pub info: EntityInfo,
    pub trigger: Box<dyn SequenceTrigger>,
    /// Sub-sequence executed when the trigger fires; owned by the trigger
    pub sequence: Option<SequenceTree>,
    state: StateHandle,
}

impl TriggerSlot {
    pub fn new(info: EntityInfo, trigger: Box<dyn SequenceTrigger>) -> Self {
        Self {
            info,
            trigger,
            sequence: None,
            state: EntityState::handle(),
        }
    }

    pub fn with_sequence(mut self, sequence: SequenceTree) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    /// Deep copy with fresh status and per-run trigger state
    pub fn duplicate(&self) -> Self {
        Self {
            info: self.info.clone(),
            trigger: self.trigger.clone_trigger(),
            sequence: self.sequence.as_ref().map(SequenceTree::duplicate),
            state: EntityState::handle(),
        }
    }
}

impl std::fmt::Debug for TriggerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerSlot")
            .field("name", &self.info.name)
            .field("kind", &self.trigger.kind())
            .field("status", &self.state.status())
            .field("has_sequence", &self.sequence.is_some())
            .finish()
    }
}

/// Interior node of a sequence tree
#[derive(Debug, Default)]
pub struct Container {
    pub strategy: Strategy,
    pub target: Option<Target>,
    pub(crate) children: Vec<NodeId>,
    conditions: Vec<ConditionSlot>,
    triggers: Vec<TriggerSlot>,
}

impl Container {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn sequential() -> Self {
        Self::new(Strategy::Sequential)
    }

    pub fn repeat_while() -> Self {
        Self::new(Strategy::RepeatWhile)
    }

    pub fn best_effort() -> Self {
        Self::new(Strategy::BestEffort)
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_condition(mut self, slot: ConditionSlot) -> Self {
        self.conditions.push(slot);
        self
    }

    pub fn with_trigger(mut self, slot: TriggerSlot) -> Self {
        self.triggers.push(slot);
        self
    }

    /// Child node IDs in execution order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Conditions in attachment order
    pub fn conditions(&self) -> &[ConditionSlot] {
        &self.conditions
    }

    /// Triggers in attachment order
    pub fn triggers(&self) -> &[TriggerSlot] {
        &self.triggers
    }

    pub fn add_condition(&mut self, slot: ConditionSlot) {
        self.conditions.push(slot);
    }

    pub fn remove_condition(&mut self, index: usize) -> Option<ConditionSlot> {
        (index < self.conditions.len()).then(|| self.conditions.remove(index))
    }

    pub fn add_trigger(&mut self, slot: TriggerSlot) {
        self.triggers.push(slot);
    }

    pub fn remove_trigger(&mut self, index: usize) -> Option<TriggerSlot> {
        (index < self.triggers.len()).then(|| self.triggers.remove(index))
    }

    /// Copy of everything except the children, which the tree re-creates
    pub(crate) fn duplicate_shell(&self) -> Self {
        Self {
            strategy: self.strategy,
            target: self.target.clone(),
            children: Vec::new(),
            conditions: self.conditions.iter().map(ConditionSlot::duplicate).collect(),
            triggers: self.triggers.iter().map(TriggerSlot::duplicate).collect(),
        }
    }
}
