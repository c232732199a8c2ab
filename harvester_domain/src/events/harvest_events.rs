// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Harvest Lifecycle Events
//!
//! The manager emits one started and one finished event per harvest run.
//! These are observer hooks for metrics and logging only; control flow
//! between the REST surface and the core goes through direct calls, never
//! through events.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Emitted when the manager enters `HARVESTING`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestStartedEvent {
    /// Unix epoch milliseconds
    pub timestamp: i64,
    /// Combined hash of all enabled pipelines at start, if known
    pub combined_hash: Option<String>,
    /// Total expected documents across enabled pipelines; `-1` if unknown
    pub max_document_count: i64,
}

impl HarvestStartedEvent {
    pub fn new(combined_hash: Option<String>, max_document_count: i64) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            combined_hash,
            max_document_count,
        }
    }
}

/// Emitted when the manager returns to `IDLE` after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestFinishedEvent {
    /// Unix epoch milliseconds
    pub timestamp: i64,
    /// Whether every enabled pipeline finished its run successfully
    pub succeeded: bool,
    /// Combined hash at completion, if known
    pub combined_hash: Option<String>,
}

impl HarvestFinishedEvent {
    pub fn new(succeeded: bool, combined_hash: Option<String>) -> Self {
        Self {
            timestamp: Utc::now().timestamp_millis(),
            succeeded,
            combined_hash,
        }
    }
}

/// Observer hook for harvest lifecycle events. Callbacks run on the
/// orchestrator task and must return quickly.
pub trait HarvestEventListener: Send + Sync {
    fn on_harvest_started(&self, _event: &HarvestStartedEvent) {}
    fn on_harvest_finished(&self, _event: &HarvestFinishedEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_started_event_carries_hash_and_count() {
        let event = HarvestStartedEvent::new(Some("abc".into()), 1000);
        assert_eq!(event.combined_hash.as_deref(), Some("abc"));
        assert_eq!(event.max_document_count, 1000);
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_finished_event_serializes() {
        let event = HarvestFinishedEvent::new(true, None);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["succeeded"], true);
        assert!(json["combined_hash"].is_null());
    }
}
