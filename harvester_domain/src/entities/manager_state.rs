// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Persisted Manager State
//!
//! The record written to `cache/<module>/state.json` after each harvest and
//! read back at startup. Layout:
//!
//! ```json
//! {
//!   "overallInfo": {
//!     "name": "<ManagerName>",
//!     "stateHistory": [ {"timestamp": <ms>, "value": "<state>"} ],
//!     "healthHistory": [ {"timestamp": <ms>, "value": "<health>"} ],
//!     "harvestedCount": <int>,
//!     "maxDocumentCount": <int>,
//!     "versionHash": "<hex or null>"
//!   },
//!   "etlInfos": { "<pipelineName>": { … same shape … } }
//! }
//! ```
//!
//! For the overall record, `versionHash` holds the last combined hash.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{EtlHealth, EtlState};
use crate::value_objects::TimestampedHistory;

/// Persisted audit record of one pipeline, or of the manager overall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlInfo {
    pub name: String,

    #[serde(rename = "stateHistory", default)]
    pub state_history: TimestampedHistory<EtlState>,

    #[serde(rename = "healthHistory", default)]
    pub health_history: TimestampedHistory<EtlHealth>,

    #[serde(rename = "harvestedCount")]
    pub harvested_count: u64,

    /// `-1` signals an unknown document count
    #[serde(rename = "maxDocumentCount")]
    pub max_document_count: i64,

    #[serde(rename = "versionHash")]
    pub version_hash: Option<String>,
}

impl EtlInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state_history: TimestampedHistory::new(),
            health_history: TimestampedHistory::new(),
            harvested_count: 0,
            max_document_count: -1,
            version_hash: None,
        }
    }
}

/// Full persisted manager state.
///
/// `etlInfos` is a `BTreeMap` so the serialized file is stable across runs
/// and diffs cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerState {
    #[serde(rename = "overallInfo")]
    pub overall: EtlInfo,

    #[serde(rename = "etlInfos", default)]
    pub etls: BTreeMap<String, EtlInfo>,
}

impl ManagerState {
    pub fn new(manager_name: impl Into<String>) -> Self {
        Self {
            overall: EtlInfo::new(manager_name),
            etls: BTreeMap::new(),
        }
    }

    /// Last combined hash of a successful harvest, if any
    pub fn last_combined_hash(&self) -> Option<&str> {
        self.overall.version_hash.as_deref()
    }
}
