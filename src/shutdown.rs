//! Graceful shutdown coordination using cancellation tokens.
//!
//! Stop is cooperative: triggering the controller stops ingestion and
//! dispatch, while in-flight chunk downloads run to completion or failure.
//! Either outcome keeps the checkpoint invariant intact.

use tokio_util::sync::CancellationToken;

/// Controller for coordinating graceful shutdown across tasks.
#[derive(Clone)]
pub struct ShutdownController {
    token: CancellationToken,
}

impl ShutdownController {
    /// Create a new shutdown controller.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Trigger shutdown, notifying all waiting tasks.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Check if shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Get a future that completes when shutdown is triggered.
    /// Use this in `tokio::select!` to check for shutdown.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
