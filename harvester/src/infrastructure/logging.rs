// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Logging
//!
//! Tracing setup plus the log retrieval behind `GET /log`. Two layers: a
//! console layer filtered by `RUST_LOG` (default `info`), and a daily
//! rolling file layer under the configured log directory
//! (`harvester.log.YYYY-MM-DD`). The file layer is what the REST surface
//! reads back, filtered by date, target class, and level.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use harvester_domain::HarvestError;

/// Base name of the rolling log files
pub const LOG_FILE_PREFIX: &str = "harvester.log";

/// Installs the global tracing subscriber. The returned guard must be held
/// for the process lifetime or buffered file output is lost.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard, HarvestError> {
    std::fs::create_dir_all(log_dir)
        .map_err(|e| HarvestError::io_error(format!("failed to create '{}': {}", log_dir.display(), e)))?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .map_err(|e| HarvestError::internal(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(guard)
}

/// Filter for log retrieval.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// `YYYY-MM-DD`; defaults to today
    pub date: Option<String>,
    /// Substring match against the log line's target
    pub class: Option<String>,
    /// Level name, e.g. `INFO`, `warn`
    pub level: Option<String>,
}

/// Path of the log file a query refers to
fn log_file_for(log_dir: &Path, date: &str) -> PathBuf {
    log_dir.join(format!("{}.{}", LOG_FILE_PREFIX, date))
}

/// Reads the requested day's log file and applies the query filters
/// line-wise. A missing file yields an empty result.
pub async fn read_log(log_dir: &Path, query: &LogQuery) -> Result<String, HarvestError> {
    let date = match &query.date {
        Some(date) => date.clone(),
        None => chrono::Utc::now().format("%Y-%m-%d").to_string(),
    };

    let path = log_file_for(log_dir, &date);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => {
            return Err(HarvestError::io_error(format!(
                "failed to read '{}': {}",
                path.display(),
                e
            )))
        }
    };

    let level = query.level.as_ref().map(|l| l.to_uppercase());

    let filtered: Vec<&str> = content
        .lines()
        .filter(|line| match &level {
            Some(level) => line.contains(level.as_str()),
            None => true,
        })
        .filter(|line| match &query.class {
            Some(class) => line.contains(class.as_str()),
            None => true,
        })
        .collect();

    Ok(filtered.join("\n"))
}
