//! Cooperative cancellation
//!
//! A single [`CancellationToken`] is shared by every entity taking part in a
//! run. Cancellation is cooperative: the engine checks the token between
//! entities, and long-running items may `select!` on [`CancellationToken::cancelled`]
//! while awaiting a mediator.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle used to request and observe cancellation of a run
#[derive(Debug, Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once cancellation has been requested
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
