//! Scripted conditions and triggers

use async_trait::async_trait;
use seq_model::{
    ConditionContext, ConditionSlot, EntityInfo, ItemOutcome, SequenceCondition,
    SequenceTrigger, TriggerContext, TriggerRun, TriggerSlot,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::Journal;

/// A condition answering from a fixed script, `false` once it runs out
#[derive(Clone)]
pub struct ScriptedCondition {
    answers: Arc<Vec<bool>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedCondition {
    pub fn new(answers: &[bool]) -> Self {
        Self {
            answers: Arc::new(answers.to_vec()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn slot(&self) -> ConditionSlot {
        ConditionSlot::new(EntityInfo::new("scripted"), Box::new(self.clone()))
    }
}

impl SequenceCondition for ScriptedCondition {
    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn check(&self, _ctx: &ConditionContext<'_>) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers.get(call).copied().unwrap_or(false)
    }

    fn clone_condition(&self) -> Box<dyn SequenceCondition> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "answers": *self.answers })
    }
}

/// A trigger that fires after every item and records its label
#[derive(Clone)]
pub struct RecordingTrigger {
    label: String,
    journal: Journal,
}

impl RecordingTrigger {
    pub fn slot(label: &str, journal: &Journal) -> TriggerSlot {
        TriggerSlot::new(
            EntityInfo::new(label),
            Box::new(Self {
                label: label.to_string(),
                journal: journal.clone(),
            }),
        )
    }
}

#[async_trait]
impl SequenceTrigger for RecordingTrigger {
    fn kind(&self) -> &'static str {
        "recording"
    }

    fn should_trigger(&self, _ctx: &TriggerContext<'_>) -> bool {
        true
    }

    async fn execute(&self, run: TriggerRun<'_>) -> ItemOutcome {
        self.journal.record(self.label.clone());
        run.run_sequence().await
    }

    fn clone_trigger(&self) -> Box<dyn SequenceTrigger> {
        Box::new(self.clone())
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({ "label": self.label })
    }
}
