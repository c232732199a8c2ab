// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence round-trip: a save-then-load reproduces the combined hash,
//! per-pipeline histories, and counts; the file layout matches the
//! documented shape and writes are atomic.

mod common;

use std::sync::Arc;

use common::{counting_pipeline, manager_in, CountingSink, VecExtractor};
use harvester_domain::EtlState;

#[tokio::test]
async fn test_state_file_shape() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _registry) = manager_in(dir.path(), "shape");

    let (sink, _) = CountingSink::new(512);
    manager
        .register(counting_pipeline("Alpha", VecExtractor::new(4, "hashA"), sink, 4096))
        .unwrap();

    let manager = Arc::new(manager);
    manager.init().await.unwrap();
    manager.clone().harvest().await.unwrap();
    manager.join_harvest().await.unwrap();

    let raw = std::fs::read(dir.path().join("shape/state.json")).unwrap();
    let json: serde_json::Value = serde_json::from_slice(&raw).unwrap();

    let overall = &json["overallInfo"];
    assert_eq!(overall["name"], "shape");
    assert!(overall["versionHash"].is_string());
    assert!(overall["stateHistory"].is_array());
    assert!(overall["stateHistory"][0]["timestamp"].is_i64());
    assert!(overall["stateHistory"][0]["value"].is_string());

    let alpha = &json["etlInfos"]["Alpha"];
    assert_eq!(alpha["harvestedCount"], 4);
    assert_eq!(alpha["maxDocumentCount"], 4);
    assert_eq!(alpha["versionHash"], "hashA");

    // No leftover temp file from the atomic replace.
    assert!(!dir.path().join("shape/state.json.tmp").exists());
}

#[tokio::test]
async fn test_round_trip_restores_hash_histories_and_counts() {
    let dir = tempfile::tempdir().unwrap();

    let persisted_hash;
    let persisted_states: Vec<EtlState>;
    {
        let (mut manager, _registry) = manager_in(dir.path(), "roundtrip");
        let (sink, _) = CountingSink::new(512);
        manager
            .register(counting_pipeline("Alpha", VecExtractor::new(4, "hashA"), sink, 4096))
            .unwrap();

        let manager = Arc::new(manager);
        manager.init().await.unwrap();
        manager.clone().harvest().await.unwrap();
        manager.join_harvest().await.unwrap();

        persisted_hash = manager.last_combined_hash().unwrap();
        persisted_states = manager
            .monitor_by_name("Alpha")
            .unwrap()
            .snapshot()
            .state_history
            .iter()
            .map(|e| e.value)
            .collect();
    }

    // A fresh manager over the same cache restores everything.
    let (mut manager, _registry) = manager_in(dir.path(), "roundtrip");
    let (sink, _) = CountingSink::new(512);
    manager
        .register(counting_pipeline("Alpha", VecExtractor::new(4, "hashA"), sink, 4096))
        .unwrap();

    let manager = Arc::new(manager);
    manager.init().await.unwrap();

    assert_eq!(manager.last_combined_hash().unwrap(), persisted_hash);

    let monitor = manager.monitor_by_name("Alpha").unwrap();
    assert_eq!(monitor.harvested_count(), 4);
    assert_eq!(monitor.max_document_count(), 4);
    assert_eq!(monitor.version_hash().as_deref(), Some("hashA"));

    // The restored history contains the previous run's trail.
    let restored: Vec<EtlState> = monitor.snapshot().state_history.iter().map(|e| e.value).collect();
    for state in &persisted_states {
        assert!(restored.contains(state), "missing {} in {:?}", state, restored);
    }

    // And nothing is outdated after the restore.
    assert!(!manager.has_outdated_etls().await.unwrap());
}

#[tokio::test]
async fn test_missing_state_file_is_a_fresh_deployment() {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, _registry) = manager_in(dir.path(), "fresh");
    let (sink, _) = CountingSink::new(512);
    manager
        .register(counting_pipeline("Alpha", VecExtractor::new(2, "h"), sink, 4096))
        .unwrap();

    let manager = Arc::new(manager);
    manager.init().await.unwrap();

    assert_eq!(manager.last_combined_hash(), None);
    assert!(manager.has_outdated_etls().await.unwrap());
}
