// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Signal Handling
//!
//! Translates process signals into graceful shutdown. A long-running
//! harvester deployment is stopped with SIGTERM (orchestrators) or SIGINT
//! (operators); both paths initiate the same coordinated shutdown so an
//! in-flight harvest gets to persist its state before the process exits.

use std::future::Future;
use std::pin::Pin;

/// Callback invoked when a shutdown signal arrives
pub type ShutdownCallback = Box<dyn FnOnce() + Send + 'static>;

/// System signal handling trait.
///
/// Abstracts platform signal delivery so the driver wiring is testable with
/// a manual trigger.
pub trait SystemSignals: Send + Sync {
    /// Wait for a shutdown signal (SIGTERM, SIGINT, SIGHUP on Unix) and
    /// invoke the callback once.
    fn wait_for_signal(&self, on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Unix signal handler using `tokio::signal`
#[cfg(unix)]
pub struct UnixSignalHandler;

#[cfg(unix)]
impl UnixSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(unix)]
impl Default for UnixSignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl SystemSignals for UnixSignalHandler {
    fn wait_for_signal(&self, on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to register SIGTERM handler: {}", e);
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to register SIGINT handler: {}", e);
                    return;
                }
            };
            let mut sighup = match signal(SignalKind::hangup()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("failed to register SIGHUP handler: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
                _ = sighup.recv() => tracing::info!("received SIGHUP"),
            }

            on_shutdown();
        })
    }
}

/// Fallback handler for non-Unix platforms: Ctrl+C only
#[cfg(not(unix))]
pub struct UnixSignalHandler;

#[cfg(not(unix))]
impl UnixSignalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(unix))]
impl SystemSignals for UnixSignalHandler {
    fn wait_for_signal(&self, on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for ctrl-c: {}", e);
                return;
            }
            tracing::info!("received ctrl-c");
            on_shutdown();
        })
    }
}

/// Manual trigger for tests and embedded use
pub struct ManualSignal {
    notify: std::sync::Arc<tokio::sync::Notify>,
}

impl ManualSignal {
    pub fn new() -> Self {
        Self {
            notify: std::sync::Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Fire the signal, releasing one waiter
    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

impl Default for ManualSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSignals for ManualSignal {
    fn wait_for_signal(&self, on_shutdown: ShutdownCallback) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        let notify = self.notify.clone();
        Box::pin(async move {
            notify.notified().await;
            on_shutdown();
        })
    }
}
