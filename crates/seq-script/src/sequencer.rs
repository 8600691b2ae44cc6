//! Sequencer facade
//!
//! Owns the active sequence and the engine, and enforces that only one run is
//! in flight at a time.

use seq_core::{CancellationToken, ProgressSink};
use seq_model::{SequenceTree, TreeError, ValidationReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::executor::{Engine, EngineConfig, RunReport};

/// Sequencer errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SequenceError {
    #[error("A sequence is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Result type for sequencer operations
pub type SequenceResult<T> = Result<T, SequenceError>;

/// Clears the running flag when a run ends, even if its future is dropped
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The active sequence and the engine that runs it
pub struct Sequencer {
    tree: SequenceTree,
    engine: Engine,
    running: AtomicBool,
}

impl Sequencer {
    pub fn new(tree: SequenceTree, config: EngineConfig) -> Self {
        Self::with_engine(tree, Engine::new(config))
    }

    pub fn with_engine(tree: SequenceTree, engine: Engine) -> Self {
        Self {
            tree,
            engine,
            running: AtomicBool::new(false),
        }
    }

    pub fn tree(&self) -> &SequenceTree {
        &self.tree
    }

    /// Edit the sequence. Exclusive access means no run can be in flight.
    pub fn tree_mut(&mut self) -> &mut SequenceTree {
        &mut self.tree
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run the sequence to completion.
    ///
    /// Fails with [`SequenceError::AlreadyRunning`] while another run started
    /// from this sequencer is still in flight.
    #[instrument(skip_all)]
    pub async fn start(
        &self,
        progress: &dyn ProgressSink,
        token: &CancellationToken,
    ) -> SequenceResult<RunReport> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("Refusing to start: a run is already in flight");
            return Err(SequenceError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        Ok(self.engine.run(&self.tree, progress, token).await)
    }

    /// Validate the whole sequence
    pub fn validate(&self) -> SequenceResult<ValidationReport> {
        Ok(self.tree.validate_all()?)
    }

    /// Independent deep copy of the sequence, ready to run or edit
    pub fn clone_template(&self) -> SequenceTree {
        self.tree.duplicate()
    }

    /// Advisory estimate of the whole sequence
    pub fn estimate(&self) -> SequenceResult<Duration> {
        Ok(self.tree.total_estimated_duration()?)
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("tree", &self.tree)
            .field("engine", &self.engine)
            .field("running", &self.is_running())
            .finish()
    }
}
