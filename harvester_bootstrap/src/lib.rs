// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Harvester Bootstrap
//!
//! Entry-point concerns for the metadata harvester service, kept apart from
//! both the domain and the application layers:
//!
//! - **Cancellation tokens** - the cooperative cancellation primitive shared
//!   by the harvest orchestrator, loaders, and the REST surface
//! - **Shutdown coordination** - grace period enforcement around service exit
//! - **Signal handling** - SIGINT/SIGTERM translation into shutdown
//! - **Exit codes** - the driver program's process exit contract
//! - **Bootstrap logging** - synchronous stderr output for the window
//!   before the tracing subscriber is installed
//!
//! Nothing in this crate knows about pipelines, documents, or sinks; the
//! application crate wires these primitives into the ETL lifecycle.

pub mod exit_code;
pub mod logger;
pub mod shutdown;
pub mod signals;

pub use exit_code::ExitCode;
pub use logger::{BootstrapLevel, BootstrapLogger, CapturingLogger, StderrLogger};
pub use shutdown::{CancellationToken, ShutdownCoordinator};
pub use signals::{ShutdownCallback, SystemSignals, UnixSignalHandler};
