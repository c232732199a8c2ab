// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! REST surface contract: status views, config snapshot and set, the
//! outdated probe, and the status-code mapping for preconditions and
//! malformed queries.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::util::ServiceExt;

use common::{counting_pipeline, manager_in, CountingSink, VecExtractor};
use harvester::presentation::{router, AppState};
use harvester_domain::value_objects::Parameter;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn test_state(module: &str, record_count: usize) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let (mut manager, registry) = manager_in(dir.path(), module);

    registry.register(Parameter::password("submission", "password", "secret").unwrap());

    let (sink, _) = CountingSink::new(1024);
    manager
        .register(counting_pipeline(
            "RestSource",
            VecExtractor::new(record_count, "hashRest"),
            sink,
            16384,
        ))
        .unwrap();

    let manager = Arc::new(manager);
    manager.init().await.unwrap();

    let state = AppState {
        manager,
        registry,
        log_dir: dir.path().join("logs"),
    };
    (state, dir)
}

#[tokio::test]
async fn test_status_text_renders_pipeline_lines() {
    let (state, _dir) = test_state("resttext", 3).await;
    let app = router(state);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("resttext"));
    assert!(text.contains("State:     IDLE"));
    assert!(text.contains("RestSource"));
}

#[tokio::test]
async fn test_status_json_view() {
    let (state, _dir) = test_state("restjson", 3).await;
    let app = router(state);

    let response = app
        .oneshot(Request::builder().uri("/.json").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["repository"], "restjson");
    assert_eq!(json["state"], "IDLE");
    assert_eq!(json["health"], "OK");
    assert_eq!(json["maxDocumentCount"], 3);
    assert_eq!(json["etls"][0], "RestSource");
}

#[tokio::test]
async fn test_etl_view_and_malformed_queries() {
    let (state, _dir) = test_state("restetl", 2).await;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/etl?name=RestSource").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "RestSource");
    assert_eq!(json["versionHash"], "hashRest");
    assert!(json["stateHistory"].is_array());

    // Missing name: 400.
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/etl").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown name: 400.
    let response = app
        .oneshot(Request::builder().uri("/etl?name=Nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_outdated_probe() {
    let (state, _dir) = test_state("restoutdated", 2).await;
    let app = router(state);

    let response = app
        .oneshot(Request::builder().uri("/outdated").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["outdated"], true);
}

#[tokio::test]
async fn test_config_snapshot_masks_passwords_and_set_round_trips() {
    let (state, _dir) = test_state("restconfig", 1).await;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/config").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    let entries = json.as_array().unwrap();
    let password = entries
        .iter()
        .find(|e| e["key"] == "submission.password")
        .expect("password parameter listed");
    assert_eq!(password["value"], "*****");

    // Setting a parameter over REST.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/config")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"key": "harvester.forceharvest", "value": "true"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // A rejected value is a 400 and leaves the old value in place.
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/config")
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"key": "harvester.forceharvest", "value": "maybe"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_harvest_runs_and_second_post_reports_no_changes() {
    let (state, _dir) = test_state("restharvest", 5).await;
    let manager = state.manager.clone();
    let app = router(state);

    let response = app
        .clone()
        .oneshot(Request::builder().method("POST").uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    manager.join_harvest().await.unwrap();

    // Nothing changed: the second POST is a 200 with a skip diagnostic.
    let response = app
        .oneshot(Request::builder().method("POST").uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "skipped");
}

#[tokio::test]
async fn test_abort_without_harvest_is_a_skip() {
    let (state, _dir) = test_state("restabort", 1).await;
    let app = router(state);

    let response = app
        .oneshot(Request::builder().method("POST").uri("/abort").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "skipped");
}

#[tokio::test]
async fn test_log_endpoint_returns_filtered_lines() {
    let (state, dir) = test_state("restlog", 1).await;
    let log_dir = dir.path().join("logs");
    tokio::fs::create_dir_all(&log_dir).await.unwrap();
    tokio::fs::write(
        log_dir.join("harvester.log.2026-08-01"),
        "ts  INFO harvester: started\nts  WARN harvester: batch retried\n",
    )
    .await
    .unwrap();

    let app = router(state);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/log?date=2026-08-01&level=warn")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("batch retried"));
}
