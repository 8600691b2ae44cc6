//! Trigger evaluation and firing
//!
//! After an item completes, the engine hands the triggers of each enclosing
//! container to the [`TriggerEvaluator`]. Every enabled trigger is asked in
//! attachment order; one that wants to fire executes to completion before the
//! next is asked. Triggers never run concurrently with anything.

use seq_core::{CancellationToken, ProgressKind, ProgressSink, ProgressUpdate, Status};
use seq_model::{
    ExecutionError, ItemOutcome, SequenceRunner, TriggerContext, TriggerRun, TriggerSlot,
};
use tracing::{debug, trace};

/// Collaborators a firing trigger runs with
#[derive(Clone, Copy)]
pub struct FiringEnv<'a> {
    pub runner: &'a dyn SequenceRunner,
    pub progress: &'a dyn ProgressSink,
    pub token: &'a CancellationToken,
}

/// What happened while evaluating a set of triggers
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerSummary {
    /// Number of triggers that fired
    pub fired: usize,
    /// `Completed` unless a trigger failed or the run was cancelled
    pub outcome: ItemOutcome,
}

/// Trigger evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Whether the trigger in `slot` wants to fire. Disabled triggers never do.
    pub fn should_fire(&self, slot: &TriggerSlot, ctx: &TriggerContext<'_>) -> bool {
        if !slot.info.enabled {
            return false;
        }
        let fire = slot.trigger.should_trigger(ctx);
        trace!(
            trigger = %slot.info.name,
            kind = slot.trigger.kind(),
            items = ctx.items_completed,
            fire,
            "Trigger check result"
        );
        fire
    }

    /// Execute one trigger, recording its status on the slot
    pub async fn fire(
        &self,
        slot: &TriggerSlot,
        items_completed: u64,
        env: FiringEnv<'_>,
    ) -> ItemOutcome {
        let state = slot.state();
        if let Err(err) = state.reset().and_then(|_| state.transition(Status::Running)) {
            return ItemOutcome::Failed(err.into());
        }

        debug!(trigger = %slot.info.name, items = items_completed, "Trigger fired");
        env.progress.report(
            ProgressUpdate::new(ProgressKind::TriggerFired, format!("{} fired", slot.info.name))
                .with_entity(slot.info.name.clone())
                .with_status(Status::Running),
        );

        let outcome = slot
            .trigger
            .execute(TriggerRun {
                name: &slot.info.name,
                sequence: slot.sequence.as_ref(),
                runner: env.runner,
                progress: env.progress,
                token: env.token,
                items_completed,
            })
            .await;

        let outcome = match outcome {
            ItemOutcome::Failed(err) => ItemOutcome::Failed(ExecutionError::Trigger {
                trigger: slot.info.name.clone(),
                message: err.to_string(),
            }),
            other => other,
        };

        if let Err(err) = state.transition(outcome.status()) {
            return ItemOutcome::Failed(err.into());
        }
        outcome
    }

    /// Ask every trigger in `slots` and fire the ones that want to.
    ///
    /// Stops at the first trigger that fails or observes cancellation; a
    /// skipped trigger does not stop the others.
    pub async fn evaluate_and_fire(
        &self,
        slots: &[TriggerSlot],
        ctx: &TriggerContext<'_>,
        env: FiringEnv<'_>,
    ) -> TriggerSummary {
        let mut fired = 0;
        for slot in slots {
            if env.token.is_cancelled() {
                return TriggerSummary {
                    fired,
                    outcome: ItemOutcome::Cancelled,
                };
            }
            if !self.should_fire(slot, ctx) {
                continue;
            }

            fired += 1;
            match self.fire(slot, ctx.items_completed, env).await {
                ItemOutcome::Completed | ItemOutcome::Skipped(_) => {}
                outcome => return TriggerSummary { fired, outcome },
            }
        }

        TriggerSummary {
            fired,
            outcome: ItemOutcome::Completed,
        }
    }
}
