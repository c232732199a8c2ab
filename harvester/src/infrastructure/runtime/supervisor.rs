// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Supervision
//!
//! Thin wrapper around `tokio::spawn` that keeps harvest tasks from failing
//! silently: every task logs its start and outcome, and joining maps panics
//! and runtime cancellation into typed errors. The manager spawns at most
//! one orchestrator task per harvest; under concurrent harvesting the
//! orchestrator fans out one supervised worker per enabled pipeline and
//! joins them all.

use tokio::task::JoinHandle;
use tracing::{debug, error};

use harvester_domain::HarvestError;

/// Result type alias for application operations
pub type AppResult<T> = Result<T, HarvestError>;

/// Spawns a supervised task: start and outcome are logged, and the returned
/// handle must be awaited by the caller.
pub fn spawn_supervised<F, T>(name: &'static str, fut: F) -> JoinHandle<AppResult<T>>
where
    F: std::future::Future<Output = AppResult<T>> + Send + 'static,
    T: Send + 'static,
{
    debug!(task = name, "task starting");

    tokio::spawn(async move {
        let result = fut.await;

        match &result {
            Ok(_) => debug!(task = name, "task completed"),
            Err(e) if e.is_cancelled() => debug!(task = name, "task cancelled"),
            Err(e) => error!(task = name, error = %e, "task failed"),
        }

        result
    })
}

/// Awaits a supervised handle, converting panics and runtime cancellation
/// into typed errors so no failure is lost.
pub async fn join_supervised<T>(handle: JoinHandle<AppResult<T>>) -> AppResult<T> {
    match handle.await {
        Ok(task_result) => task_result,
        Err(e) if e.is_panic() => Err(HarvestError::internal(format!("task panicked: {}", e))),
        Err(e) if e.is_cancelled() => Err(HarvestError::cancelled("task cancelled by runtime")),
        Err(e) => Err(HarvestError::internal(format!("task join failed: {}", e))),
    }
}
