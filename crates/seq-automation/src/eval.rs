//! Condition evaluation logic
//!
//! Decides, before every pass of a container, whether that pass runs.
//! Run-once containers make exactly one pass and ignore their conditions.
//! Looping containers make another pass while every enabled condition holds;
//! conditions are evaluated fresh each time, in attachment order, stopping at
//! the first one that fails.

use seq_model::{ConditionContext, ConditionSlot, Container};
use tracing::{debug, trace, warn};

/// Outcome of asking whether a container runs another pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopDecision {
    /// Run the pass
    Continue,
    /// A condition is false, or a run-once container already made its pass
    Done,
    /// The configured iteration cap was hit
    LimitReached,
}

impl LoopDecision {
    pub fn should_run(self) -> bool {
        matches!(self, LoopDecision::Continue)
    }
}

/// Condition evaluator
#[derive(Debug, Clone, Default)]
pub struct ConditionEvaluator {
    /// Safety stop for looping containers; `None` means unlimited
    max_iterations: Option<u32>,
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: Option<u32>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn max_iterations(&self) -> Option<u32> {
        self.max_iterations
    }

    /// Evaluate a single condition. Disabled conditions always pass.
    pub fn evaluate(&self, slot: &ConditionSlot, ctx: &ConditionContext<'_>) -> bool {
        if !slot.info.enabled {
            return true;
        }
        let result = slot.condition.check(ctx);
        trace!(
            condition = %slot.info.name,
            kind = slot.condition.kind(),
            pass = ctx.completed_iterations,
            result,
            "Condition check result"
        );
        result
    }

    /// Evaluate multiple conditions (all must pass)
    pub fn evaluate_all(&self, conditions: &[ConditionSlot], ctx: &ConditionContext<'_>) -> bool {
        conditions.iter().all(|slot| self.evaluate(slot, ctx))
    }

    /// Decide whether `container` runs its next pass
    pub fn next_pass(&self, container: &Container, ctx: &ConditionContext<'_>) -> LoopDecision {
        let first = ctx.completed_iterations == 0;

        if !container.strategy.is_looping() {
            return if first {
                LoopDecision::Continue
            } else {
                LoopDecision::Done
            };
        }

        if !container.conditions().iter().any(|slot| slot.info.enabled) {
            if first {
                warn!("Repeat-while container has no conditions, running a single pass");
                return LoopDecision::Continue;
            }
            return LoopDecision::Done;
        }

        if let Some(max) = self.max_iterations {
            if ctx.completed_iterations >= max {
                warn!(max, "Loop reached the iteration limit, stopping");
                return LoopDecision::LimitReached;
            }
        }

        if self.evaluate_all(container.conditions(), ctx) {
            LoopDecision::Continue
        } else {
            debug!(passes = ctx.completed_iterations, "Loop conditions no longer hold");
            LoopDecision::Done
        }
    }
}
