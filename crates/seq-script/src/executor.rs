//! Sequence executor
//!
//! Walks a [`SequenceTree`] one entity at a time. Before each pass of a
//! container the condition evaluator decides whether the pass runs; after
//! each leaf item the triggers of its container and of every enclosing
//! container are evaluated, innermost first, and fired synchronously. Skips
//! stay local, failures propagate according to the container's strategy and
//! cancellation unwinds the run, leaving everything not yet started
//! `Skipped`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use seq_automation::{ConditionEvaluator, FiringEnv, TriggerEvaluator, TriggerSummary};
use seq_core::{
    CancellationToken, EnglishFormatter, IssueFormatter, ProgressKind, ProgressSink,
    ProgressUpdate, RunContext, Status,
};
use seq_model::{
    ConditionContext, Container, ExecutionError, ItemContext, ItemOutcome, ItemView, Node,
    NodeId, NodeKind, SequenceItem, SequenceRunner, SequenceTree, TriggerContext,
    ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bypass the pre-run validation gate; items still self-validate
    pub skip_validation: bool,

    /// Safety stop for repeat-while containers; `None` means unlimited
    pub max_loop_iterations: Option<u32>,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Failed(String),
    Cancelled,
    /// Rejected by the pre-run validation gate
    Invalid,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Finished)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Finished => f.write_str("finished"),
            RunOutcome::Failed(message) => write!(f, "failed: {message}"),
            RunOutcome::Cancelled => f.write_str("cancelled"),
            RunOutcome::Invalid => f.write_str("invalid"),
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub outcome: RunOutcome,
    /// Issues found by the validation gate; empty when it passed or was skipped
    pub issues: ValidationReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Sequence execution engine
pub struct Engine {
    config: EngineConfig,
    conditions: ConditionEvaluator,
    triggers: TriggerEvaluator,
    formatter: Arc<dyn IssueFormatter>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let conditions = ConditionEvaluator::new().with_max_iterations(config.max_loop_iterations);
        Self {
            config,
            conditions,
            triggers: TriggerEvaluator::new(),
            formatter: Arc::new(EnglishFormatter),
        }
    }

    pub fn with_formatter(mut self, formatter: Arc<dyn IssueFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn formatter(&self) -> &dyn IssueFormatter {
        self.formatter.as_ref()
    }

    /// Run the whole tree once.
    ///
    /// Every entity is reset to `Created` first, so the same tree can be run
    /// again after it finished, failed or was cancelled.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        tree: &SequenceTree,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> RunReport {
        let run = RunContext::new();
        let root = tree.root();
        let name = tree
            .node(root)
            .map(|node| node.name().to_string())
            .unwrap_or_default();

        if let Err(err) = tree.reset(root) {
            warn!(%err, "Cannot reset sequence before running");
            let outcome = RunOutcome::Failed(err.to_string());
            return self.finish(&run, &name, outcome, ValidationReport::default(), progress);
        }

        info!(run_id = %run.id, sequence = %name, "Sequence run started");
        progress.report(
            ProgressUpdate::new(ProgressKind::RunStarted, format!("Running {name}"))
                .with_entity(name.clone()),
        );

        if !self.config.skip_validation {
            let issues = match tree.validate(root) {
                Ok(issues) => issues,
                Err(err) => {
                    let outcome = RunOutcome::Failed(err.to_string());
                    return self.finish(&run, &name, outcome, ValidationReport::default(), progress);
                }
            };

            if !issues.is_valid() {
                warn!(issues = issues.len(), "Sequence failed validation");
                for message in issues.messages(self.formatter()) {
                    progress.report(
                        ProgressUpdate::new(ProgressKind::Status, message)
                            .with_entity(name.clone())
                            .with_status(Status::Failed),
                    );
                }
                if let Ok(node) = tree.node(root) {
                    if let Err(err) = node.state().transition(Status::Failed) {
                        warn!(%err, "Cannot mark sequence failed");
                    }
                }
                return self.finish(&run, &name, RunOutcome::Invalid, issues, progress);
            }
        }

        let scope = RunScope::new(self, progress, token, run.clone());
        let outcome = match scope.execute_node(tree, root).await {
            ItemOutcome::Completed | ItemOutcome::Skipped(_) => RunOutcome::Finished,
            ItemOutcome::Failed(err) => RunOutcome::Failed(err.to_string()),
            ItemOutcome::Cancelled => RunOutcome::Cancelled,
        };

        self.finish(&run, &name, outcome, ValidationReport::default(), progress)
    }

    fn finish(
        &self,
        run: &RunContext,
        name: &str,
        outcome: RunOutcome,
        issues: ValidationReport,
        progress: &dyn ProgressSink,
    ) -> RunReport {
        let finished_at = Utc::now();
        info!(run_id = %run.id, sequence = %name, %outcome, "Sequence run finished");
        progress.report(
            ProgressUpdate::new(ProgressKind::RunFinished, format!("{name} {outcome}"))
                .with_entity(name),
        );

        RunReport {
            run_id: run.id.clone(),
            outcome,
            issues,
            started_at: run.started_at,
            finished_at,
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish()
    }
}

/// Per-item bookkeeping of a container while it runs
#[derive(Debug, Default)]
struct Tally {
    executed: usize,
    skipped: usize,
    isolated_failures: usize,
}

/// Read-only view of a node for conditions and triggers
fn view(tree: &SequenceTree, id: NodeId) -> Option<ItemView<'_>> {
    let node = tree.node(id).ok()?;
    Some(ItemView {
        name: node.name(),
        kind: node.kind_name(),
        status: node.status(),
    })
}

/// State shared by everything executing within one run (or one trigger
/// sequence inside it)
struct RunScope<'a> {
    engine: &'a Engine,
    progress: &'a dyn ProgressSink,
    token: &'a CancellationToken,
    run: RunContext,
    items_completed: AtomicU64,
}

impl<'a> RunScope<'a> {
    fn new(
        engine: &'a Engine,
        progress: &'a dyn ProgressSink,
        token: &'a CancellationToken,
        run: RunContext,
    ) -> Self {
        Self {
            engine,
            progress,
            token,
            run,
            items_completed: AtomicU64::new(0),
        }
    }

    fn execute_node<'t>(&'t self, tree: &'t SequenceTree, id: NodeId) -> BoxFuture<'t, ItemOutcome> {
        Box::pin(async move {
            let node = match tree.node(id) {
                Ok(node) => node,
                Err(err) => return ItemOutcome::Failed(ExecutionError::failed(err.to_string())),
            };

            if !node.info().enabled {
                debug!(entity = node.name(), "Entity disabled, skipping");
                self.skip_pending(tree, &[id]);
                return ItemOutcome::Skipped("disabled".to_string());
            }

            match node.kind() {
                NodeKind::Item(item) => self.execute_item(node, item.as_ref()).await,
                NodeKind::Container(container) => {
                    self.execute_container(tree, node, container).await
                }
            }
        })
    }

    async fn execute_item(&self, node: &Node, item: &dyn SequenceItem) -> ItemOutcome {
        let name = node.name();

        let issues = item.validate();
        node.state().set_issues(issues.clone());
        if !issues.is_empty() {
            let reason = issues
                .iter()
                .map(|issue| self.engine.formatter().format(issue))
                .collect::<Vec<_>>()
                .join("; ");
            warn!(entity = name, %reason, "Item not ready, skipping");
            return self.conclude(node, ItemOutcome::Skipped(reason));
        }

        if let Err(err) = node.state().transition(Status::Running) {
            return ItemOutcome::Failed(err.into());
        }
        self.started(node);

        let ctx = ItemContext {
            name,
            progress: self.progress,
            token: self.token,
            run: &self.run,
        };
        let outcome = item.execute(&ctx).await;
        if outcome == ItemOutcome::Completed {
            self.items_completed.fetch_add(1, Ordering::SeqCst);
        }

        self.conclude(node, outcome)
    }

    async fn execute_container(
        &self,
        tree: &SequenceTree,
        node: &Node,
        container: &Container,
    ) -> ItemOutcome {
        if let Err(err) = node.state().transition(Status::Running) {
            return ItemOutcome::Failed(err.into());
        }
        self.started(node);

        let children = container.children();
        let isolates = container.strategy.isolates_failures();
        let mut tally = Tally::default();
        let mut failure: Option<ExecutionError> = None;
        let mut cancelled = false;
        let mut passes: u32 = 0;
        let mut last: Option<NodeId> = None;

        'passes: loop {
            if self.token.is_cancelled() {
                cancelled = true;
                self.skip_pending(tree, children);
                break;
            }

            let ctx = ConditionContext {
                previous: last.and_then(|id| view(tree, id)),
                next: children.first().and_then(|id| view(tree, *id)),
                completed_iterations: passes,
            };
            if !self.engine.conditions.next_pass(container, &ctx).should_run() {
                break;
            }

            if passes > 0 {
                for child in children {
                    if let Err(err) = tree.reset_status(*child) {
                        failure = Some(ExecutionError::failed(err.to_string()));
                        break 'passes;
                    }
                }
                debug!(entity = node.name(), pass = passes + 1, "Starting loop pass");
                self.progress.report(
                    ProgressUpdate::new(ProgressKind::LoopPass, format!("Pass {}", passes + 1))
                        .with_entity(node.name())
                        .with_status(Status::Running),
                );
                tokio::task::yield_now().await;
            }

            for (index, &child) in children.iter().enumerate() {
                if self.token.is_cancelled() {
                    cancelled = true;
                    self.skip_pending(tree, &children[index..]);
                    break 'passes;
                }

                let outcome = self.execute_node(tree, child).await;
                let leaf = matches!(tree.node(child), Ok(n) if !n.is_container() && n.info().enabled);
                last = Some(child);
                tally.executed += 1;

                match outcome {
                    ItemOutcome::Completed => {}
                    ItemOutcome::Skipped(_) => tally.skipped += 1,
                    ItemOutcome::Cancelled => {
                        cancelled = true;
                        self.skip_pending(tree, &children[index + 1..]);
                        break 'passes;
                    }
                    ItemOutcome::Failed(err) if isolates => {
                        warn!(entity = node.name(), %err, "Child failed, continuing");
                        tally.isolated_failures += 1;
                    }
                    ItemOutcome::Failed(err) => {
                        failure = Some(match tree.node(child) {
                            Ok(child) if leaf => ExecutionError::Child {
                                entity: child.name().to_string(),
                                message: err.to_string(),
                            },
                            _ => err,
                        });
                        break 'passes;
                    }
                }

                if !leaf {
                    continue;
                }

                let next = children.get(index + 1).copied();
                let summary = self.fire_triggers(tree, child, next).await;
                match summary.outcome {
                    ItemOutcome::Completed | ItemOutcome::Skipped(_) => {}
                    ItemOutcome::Cancelled => {
                        cancelled = true;
                        self.skip_pending(tree, &children[index + 1..]);
                        break 'passes;
                    }
                    ItemOutcome::Failed(err) if isolates => {
                        warn!(entity = node.name(), %err, "Trigger failed, continuing");
                        tally.isolated_failures += 1;
                    }
                    ItemOutcome::Failed(err) => {
                        failure = Some(err);
                        break 'passes;
                    }
                }
            }

            passes += 1;
        }

        let outcome = if let Some(err) = failure {
            ItemOutcome::Failed(err)
        } else if cancelled {
            ItemOutcome::Cancelled
        } else if tally.executed > 0 && tally.skipped == tally.executed {
            ItemOutcome::Skipped("every child was skipped".to_string())
        } else {
            if tally.isolated_failures > 0 {
                warn!(
                    entity = node.name(),
                    failures = tally.isolated_failures,
                    "Container finished with isolated failures"
                );
            }
            ItemOutcome::Completed
        };

        debug!(entity = node.name(), passes, "Container done");
        self.conclude(node, outcome)
    }

    /// Evaluate the triggers of every container enclosing `item`, innermost
    /// first
    async fn fire_triggers(
        &self,
        tree: &SequenceTree,
        item: NodeId,
        next: Option<NodeId>,
    ) -> TriggerSummary {
        let ctx = TriggerContext {
            previous: view(tree, item),
            next: next.and_then(|id| view(tree, id)),
            items_completed: self.items_completed.load(Ordering::SeqCst),
        };
        let env = FiringEnv {
            runner: self,
            progress: self.progress,
            token: self.token,
        };

        let mut fired = 0;
        for ancestor in tree.ancestors(item).unwrap_or_default() {
            let Ok(container) = tree.container(ancestor) else {
                continue;
            };
            if container.triggers().is_empty() {
                continue;
            }

            let summary = self
                .engine
                .triggers
                .evaluate_and_fire(container.triggers(), &ctx, env)
                .await;
            fired += summary.fired;
            if !matches!(summary.outcome, ItemOutcome::Completed) {
                return TriggerSummary {
                    fired,
                    outcome: summary.outcome,
                };
            }
        }

        TriggerSummary {
            fired,
            outcome: ItemOutcome::Completed,
        }
    }

    /// Mark every not-yet-started entity under `ids` as `Skipped`.
    ///
    /// Entities that already ran keep their status and are not reported.
    fn skip_pending(&self, tree: &SequenceTree, ids: &[NodeId]) {
        for &id in ids {
            for pending in tree.descendants(id).unwrap_or_default() {
                let Ok(node) = tree.node(pending) else {
                    continue;
                };
                if node.status() != Status::Created {
                    continue;
                }
                if let Err(err) = node.state().transition(Status::Skipped) {
                    debug!(entity = node.name(), %err, "Cannot skip entity");
                    continue;
                }
                self.progress.report(
                    ProgressUpdate::new(ProgressKind::EntityFinished, "Skipped")
                        .with_entity(node.name())
                        .with_status(Status::Skipped),
                );
            }
        }
    }

    fn started(&self, node: &Node) {
        debug!(entity = node.name(), kind = node.kind_name(), "Entity started");
        self.progress.report(
            ProgressUpdate::new(ProgressKind::EntityStarted, format!("{} started", node.name()))
                .with_entity(node.name())
                .with_status(Status::Running),
        );
    }

    /// Record the terminal status for `outcome` and report it
    fn conclude(&self, node: &Node, outcome: ItemOutcome) -> ItemOutcome {
        let status = outcome.status();
        if let Err(err) = node.state().transition(status) {
            return ItemOutcome::Failed(err.into());
        }

        let message = match &outcome {
            ItemOutcome::Completed => "Finished".to_string(),
            ItemOutcome::Skipped(reason) => format!("Skipped: {reason}"),
            ItemOutcome::Failed(err) => err.to_string(),
            ItemOutcome::Cancelled => "Cancelled".to_string(),
        };
        debug!(entity = node.name(), %status, %message, "Entity done");
        self.progress.report(
            ProgressUpdate::new(ProgressKind::EntityFinished, message)
                .with_entity(node.name())
                .with_status(status),
        );
        outcome
    }
}

#[async_trait]
impl<'a> SequenceRunner for RunScope<'a> {
    async fn run_sequence(&self, sequence: &SequenceTree) -> ItemOutcome {
        let root = sequence.root();
        if let Err(err) = sequence.reset(root) {
            return ItemOutcome::Failed(ExecutionError::failed(err.to_string()));
        }

        let scope = RunScope::new(self.engine, self.progress, self.token, self.run.child());
        debug!(run_id = %scope.run.id, parent = %self.run.id, "Running trigger sequence");
        scope.execute_node(sequence, root).await
    }
}
