// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cancellation and Shutdown Coordination
//!
//! The cancellation token defined here is the single cooperative-cancellation
//! primitive of the harvester. One root token belongs to the service (flipped
//! by signal handlers); the ETL manager derives one fresh token per harvest
//! run (flipped by `POST /abort`). Harvest code never blocks on cancellation:
//! it polls [`CancellationToken::is_cancelled`] at its suspension points
//! (record hand-off, batch append, batch flush) and tears down from there.
//!
//! The [`ShutdownCoordinator`] wraps the root token with a grace period so
//! the driver can wait for an in-flight harvest to persist its state before
//! the process exits.
//!
//! ## Usage
//!
//! ```rust
//! use harvester_bootstrap::shutdown::ShutdownCoordinator;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let coordinator = ShutdownCoordinator::new(Duration::from_secs(10));
//!     let token = coordinator.token();
//!
//!     tokio::spawn(async move {
//!         loop {
//!             if token.is_cancelled() {
//!                 // persist state, close loaders
//!                 break;
//!             }
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!         }
//!     });
//!
//!     coordinator.initiate_shutdown();
//!     coordinator.wait_for_shutdown().await;
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Default grace period for graceful shutdown (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 10;

/// Cooperative cancellation token.
///
/// Cloneable and cheap to pass into tasks. Cancellation is sticky: once
/// cancelled, a token stays cancelled, and tasks that have already completed
/// are unaffected. A child token observes its parent's cancellation but can
/// also be cancelled independently, which is how a single harvest run is
/// aborted without shutting the service down.
#[derive(Clone)]
pub struct CancellationToken {
    /// Cancellation flag for this token
    cancelled: Arc<AtomicBool>,
    /// Notification for async waiters
    notify: Arc<Notify>,
    /// Flags of every ancestor, checked alongside our own
    ancestors: Vec<Arc<AtomicBool>>,
}

impl CancellationToken {
    /// Create a new root token
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            ancestors: Vec::new(),
        }
    }

    /// Derive a child token.
    ///
    /// The child reports cancelled when it or any ancestor was cancelled.
    /// Cancelling the child leaves its ancestors untouched.
    pub fn child(&self) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(self.cancelled.clone());
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
            ancestors,
        }
    }

    /// Cancel this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check whether this token or an ancestor was cancelled (non-blocking)
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.ancestors.iter().any(|flag| flag.load(Ordering::SeqCst))
    }

    /// Wait until this token is cancelled.
    ///
    /// Ancestor cancellation is observed on the next poll; the harvester's
    /// suspension points are frequent enough that no cross-token
    /// notification plumbing is needed.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(Duration::from_millis(50)), if !self.ancestors.is_empty() => {}
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinates graceful shutdown of the whole service.
///
/// Owns the root cancellation token and enforces a grace period between
/// shutdown initiation and forced exit.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    /// Root cancellation token
    token: CancellationToken,

    /// Grace period before forced shutdown
    grace_period: Duration,

    /// Shutdown initiated flag
    shutdown_initiated: Arc<AtomicBool>,

    /// Notification for shutdown completion
    shutdown_complete: Arc<Notify>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator with the given grace period
    pub fn new(grace_period: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace_period,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(Notify::new()),
        }
    }

    /// Get the root cancellation token
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check whether shutdown has been initiated
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Initiate graceful shutdown: flips the initiated flag once and cancels
    /// the root token.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("initiating graceful shutdown (grace period: {:?})", self.grace_period);
            self.token.cancel();
        }
    }

    /// Wait for shutdown to complete or for the grace period to expire.
    ///
    /// Returns `true` if shutdown completed within the grace period.
    pub async fn wait_for_shutdown(&self) -> bool {
        if !self.is_shutting_down() {
            tracing::warn!("wait_for_shutdown called but shutdown not initiated");
            return true;
        }

        tokio::select! {
            _ = self.shutdown_complete.notified() => {
                tracing::info!("shutdown completed gracefully");
                true
            }
            _ = tokio::time::sleep(self.grace_period) => {
                tracing::warn!("shutdown grace period expired, forcing shutdown");
                false
            }
        }
    }

    /// Signal that cleanup finished and waiters may proceed
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.notify_waiters();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_starts_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_token_cancel_is_sticky() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_child_observes_parent_cancellation() {
        let parent = CancellationToken::new();
        let child = parent.child();

        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_child_cancel_leaves_parent_untouched() {
        let parent = CancellationToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancellationToken::new();
        let token_clone = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token_clone.cancel();
        });

        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_cancelled_wakes_on_parent() {
        let parent = CancellationToken::new();
        let child = parent.child();

        tokio::spawn({
            let parent = parent.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                parent.cancel();
            }
        });

        child.cancelled().await;
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_coordinator_initiate() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        assert!(!coordinator.is_shutting_down());

        coordinator.initiate_shutdown();
        assert!(coordinator.is_shutting_down());
        assert!(coordinator.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_coordinator_completes_within_grace() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
        coordinator.initiate_shutdown();

        let coordinator_clone = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            coordinator_clone.complete_shutdown();
        });

        assert!(coordinator.wait_for_shutdown().await);
    }

    #[tokio::test]
    async fn test_coordinator_grace_period_expires() {
        let coordinator = ShutdownCoordinator::new(Duration::from_millis(30));
        coordinator.initiate_shutdown();
        assert!(!coordinator.wait_for_shutdown().await);
    }
}
