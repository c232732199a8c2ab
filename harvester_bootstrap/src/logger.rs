// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Logger
//!
//! Covers the window between process start and the installation of the
//! tracing subscriber. Configuration loading and the subscriber setup
//! itself can fail before any tracing layer exists, and those failures
//! must still reach the operator, so the driver logs this phase through
//! [`StderrLogger`]: synchronous, unbuffered, one line per message,
//! prefixed with the deployment module so multi-deployment hosts can tell
//! the lines apart.
//!
//! Once `init_logging` has installed the subscriber the service logs
//! through `tracing` and this logger falls silent; it is a bridge for the
//! bootstrap phase, not a general logging facade.

use std::sync::Mutex;

/// Severity of a bootstrap message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapLevel {
    /// Fatal: the process is about to exit non-zero
    Error,
    /// Degraded but continuing
    Warn,
    /// Bootstrap progress
    Info,
}

impl BootstrapLevel {
    fn as_str(self) -> &'static str {
        match self {
            BootstrapLevel::Error => "ERROR",
            BootstrapLevel::Warn => "WARN",
            BootstrapLevel::Info => "INFO",
        }
    }
}

/// Sink for bootstrap-phase messages.
pub trait BootstrapLogger: Send + Sync {
    fn log(&self, level: BootstrapLevel, message: &str);

    /// Fatal errors; the process exits non-zero right after
    fn error(&self, message: &str) {
        self.log(BootstrapLevel::Error, message);
    }

    /// Non-fatal issues that may affect operation
    fn warn(&self, message: &str) {
        self.log(BootstrapLevel::Warn, message);
    }

    /// Bootstrap progress messages
    fn info(&self, message: &str) {
        self.log(BootstrapLevel::Info, message);
    }
}

/// Writes bootstrap messages straight to stderr.
///
/// Unbuffered on purpose: if the process dies during bootstrap, everything
/// logged so far has already left the process.
pub struct StderrLogger {
    module: String,
}

impl StderrLogger {
    /// Logger prefixed with the deployment module name
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
        }
    }
}

impl BootstrapLogger for StderrLogger {
    fn log(&self, level: BootstrapLevel, message: &str) {
        eprintln!("[{} bootstrap] {:5} {}", self.module, level.as_str(), message);
    }
}

/// Test double that records every message.
#[derive(Default)]
pub struct CapturingLogger {
    messages: Mutex<Vec<(BootstrapLevel, String)>>,
}

impl CapturingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(level, message)` pairs, in order
    pub fn messages(&self) -> Vec<(BootstrapLevel, String)> {
        self.messages.lock().expect("bootstrap log mutex poisoned").clone()
    }

    /// Whether any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|(_, m)| m.contains(needle))
    }
}

impl BootstrapLogger for CapturingLogger {
    fn log(&self, level: BootstrapLevel, message: &str) {
        self.messages
            .lock()
            .expect("bootstrap log mutex poisoned")
            .push((level, message.to_string()));
    }
}
