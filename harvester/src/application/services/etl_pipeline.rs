// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # ETL Pipeline
//!
//! One pipeline per source: a state machine that owns its extractor,
//! transformer, and loader. The run lifecycle is
//!
//! ```text
//! IDLE ──prepare──► QUEUED ──harvest──► HARVESTING ──► DONE | FAILED | ABORTED ──settle──► IDLE
//! ```
//!
//! ## Observability split
//!
//! The pipeline itself is owned exclusively by the manager and is locked
//! for the duration of a run. Everything the REST surface needs to see
//! meanwhile - state, histories, counts, version hash - lives in the shared
//! [`EtlMonitor`], which uses atomics and small locks and never blocks on a
//! running harvest. The monitor also serves as the loader's cancellation
//! gate: once the state leaves `HARVESTING`, the loader stops draining at
//! its next suspension point.
//!
//! ## Failure classification
//!
//! A run failure is classified by phase - extraction, transformation, or
//! loading - and recorded in the health history. Cooperative cancellation
//! records no health change; the run ends `ABORTED`.

use async_stream::stream;
use chrono::Utc;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use harvester_bootstrap::shutdown::CancellationToken;
use harvester_domain::services::loader::{HarvestGate, LoadReport, Loader, LoaderContext};
use harvester_domain::services::{Extractor, Transformer};
use harvester_domain::value_objects::sanitize_name;
use harvester_domain::{EtlHealth, EtlInfo, EtlState, HarvestError, TimestampedHistory};

/// Fallback pipeline name when sanitization leaves nothing
const FALLBACK_NAME: &str = "etl";

/// Default charset label recorded in loader contexts
pub const DEFAULT_CHARSET: &str = "utf-8";

/// Shared, lock-light view of one pipeline's observable state.
pub struct EtlMonitor {
    name: RwLock<String>,
    state: RwLock<EtlState>,
    state_history: Mutex<TimestampedHistory<EtlState>>,
    health_history: Mutex<TimestampedHistory<EtlHealth>>,
    harvested_count: AtomicU64,
    max_document_count: AtomicI64,
    version_hash: RwLock<Option<String>>,
    /// Version hash at the end of the last successful run
    last_harvested_hash: RwLock<Option<String>>,
    enabled: AtomicBool,
}

impl EtlMonitor {
    fn new(name: String) -> Arc<Self> {
        let monitor = Self {
            name: RwLock::new(name),
            state: RwLock::new(EtlState::Initializing),
            state_history: Mutex::new(TimestampedHistory::new()),
            health_history: Mutex::new(TimestampedHistory::new()),
            harvested_count: AtomicU64::new(0),
            max_document_count: AtomicI64::new(-1),
            version_hash: RwLock::new(None),
            last_harvested_hash: RwLock::new(None),
            enabled: AtomicBool::new(true),
        };
        monitor.state_history.lock().append(EtlState::Initializing);
        Arc::new(monitor)
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub(crate) fn rename(&self, name: String) {
        *self.name.write() = name;
    }

    pub fn state(&self) -> EtlState {
        *self.state.read()
    }

    /// Records a state transition, rejecting illegal edges.
    pub(crate) fn transition(&self, next: EtlState) -> Result<(), HarvestError> {
        let mut state = self.state.write();
        if !state.can_transition_to(next) {
            return Err(HarvestError::internal(format!(
                "pipeline '{}' cannot move from {} to {}",
                self.name(),
                *state,
                next
            )));
        }
        if *state != next {
            debug!(pipeline = %self.name(), from = %*state, to = %next, "state transition");
            *state = next;
            self.state_history.lock().append(next);
        }
        Ok(())
    }

    /// Latest recorded health; OK when nothing was recorded yet
    pub fn health(&self) -> EtlHealth {
        self.health_history
            .lock()
            .latest_value()
            .copied()
            .unwrap_or(EtlHealth::Ok)
    }

    pub(crate) fn record_health(&self, health: EtlHealth) {
        self.health_history.lock().append(health);
    }

    pub fn harvested_count(&self) -> u64 {
        self.harvested_count.load(Ordering::SeqCst)
    }

    /// Counts one source record as processed, regardless of loader outcome.
    pub fn increment_harvested_documents(&self) {
        self.harvested_count.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_harvested_count(&self) {
        self.harvested_count.store(0, Ordering::SeqCst);
    }

    pub fn max_document_count(&self) -> i64 {
        self.max_document_count.load(Ordering::SeqCst)
    }

    pub fn version_hash(&self) -> Option<String> {
        self.version_hash.read().clone()
    }

    pub fn last_harvested_hash(&self) -> Option<String> {
        self.last_harvested_hash.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Enables or disables the pipeline. A disabled pipeline is skipped by
    /// every aggregate operation.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        let current = self.state();
        if !enabled && current == EtlState::Idle {
            let _ = self.transition(EtlState::Disabled);
        } else if enabled && current == EtlState::Disabled {
            let _ = self.transition(EtlState::Idle);
        }
    }

    /// Requests a cooperative abort; legal in QUEUED or HARVESTING.
    pub fn request_abort(&self) -> bool {
        let current = self.state();
        if current.accepts_abort() {
            self.transition(EtlState::Aborting).is_ok()
        } else {
            false
        }
    }

    /// Collapses a run-terminal state back to IDLE.
    pub(crate) fn settle(&self) {
        if self.state().is_terminal_for_run() {
            let _ = self.transition(EtlState::Idle);
        }
    }

    /// Snapshot for persistence and REST views.
    pub fn snapshot(&self) -> EtlInfo {
        EtlInfo {
            name: self.name(),
            state_history: self.state_history.lock().clone(),
            health_history: self.health_history.lock().clone(),
            harvested_count: self.harvested_count(),
            max_document_count: self.max_document_count(),
            version_hash: self.version_hash(),
        }
    }

    /// Restores persisted audit state. Histories are merged so the restart
    /// itself stays visible in the trail; the persisted hash counts as the
    /// last successfully harvested one.
    pub(crate) fn restore(&self, info: &EtlInfo) {
        self.state_history.lock().merge_sorted(&info.state_history);
        self.health_history.lock().merge_sorted(&info.health_history);
        self.harvested_count.store(info.harvested_count, Ordering::SeqCst);
        self.max_document_count.store(info.max_document_count, Ordering::SeqCst);
        *self.version_hash.write() = info.version_hash.clone();
        *self.last_harvested_hash.write() = info.version_hash.clone();
    }
}

impl HarvestGate for EtlMonitor {
    fn keep_loading(&self) -> bool {
        self.state() == EtlState::Harvesting
    }
}

/// One ETL pipeline: state machine plus its extractor, transformer, loader.
pub struct EtlPipeline {
    monitor: Arc<EtlMonitor>,
    charset: String,
    extractor: Box<dyn Extractor>,
    transformer: Box<dyn Transformer>,
    loader: Box<dyn Loader>,
}

impl EtlPipeline {
    /// Creates a pipeline. The name is sanitized to `[a-zA-Z0-9]+`;
    /// duplicate handling happens at manager registration.
    pub fn new(
        name: &str,
        extractor: Box<dyn Extractor>,
        transformer: Box<dyn Transformer>,
        loader: Box<dyn Loader>,
    ) -> Self {
        let mut sanitized = sanitize_name(name);
        if sanitized.is_empty() {
            sanitized = FALLBACK_NAME.to_string();
        }
        if sanitized != name {
            warn!(requested = name, effective = %sanitized, "pipeline name sanitized");
        }

        Self {
            monitor: EtlMonitor::new(sanitized),
            charset: DEFAULT_CHARSET.to_string(),
            extractor,
            transformer,
            loader,
        }
    }

    /// Overrides the charset label recorded in loader contexts
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn name(&self) -> String {
        self.monitor.name()
    }

    pub fn monitor(&self) -> Arc<EtlMonitor> {
        self.monitor.clone()
    }

    /// INITIALIZING → IDLE; probes the source once for hash and count.
    pub async fn init(&mut self) -> Result<(), HarvestError> {
        match self.update().await {
            Ok(()) => self.monitor.transition(EtlState::Idle),
            Err(e) => {
                self.monitor.record_health(EtlHealth::InitializationFailed);
                Err(e)
            }
        }
    }

    /// Re-queries the extractor for a fresh version hash and document count
    /// without loading documents.
    pub async fn update(&mut self) -> Result<(), HarvestError> {
        let descriptor = self.extractor.describe().await?;
        *self.monitor.version_hash.write() = descriptor.version_hash;
        self.monitor
            .max_document_count
            .store(descriptor.max_document_count, Ordering::SeqCst);
        Ok(())
    }

    /// Current version hash, `None` if unknown
    pub fn get_hash(&self) -> Option<String> {
        self.monitor.version_hash()
    }

    /// Whether this source has unharvested changes.
    pub fn is_outdated(&self) -> bool {
        let max = self.monitor.max_document_count();
        let incomplete = max < 0 || self.monitor.harvested_count() < max as u64;

        let hash_changed = match (self.monitor.version_hash(), self.monitor.last_harvested_hash()) {
            (Some(current), Some(last)) => current != last,
            _ => true,
        };

        incomplete || hash_changed
    }

    /// IDLE → QUEUED. Fails with a precondition when the pipeline is
    /// disabled or nothing changed; idempotent when already QUEUED.
    pub async fn prepare_harvest(&mut self, force: bool) -> Result<(), HarvestError> {
        let name = self.name();
        let state = self.monitor.state();

        if state == EtlState::Queued {
            return Ok(());
        }
        if !self.monitor.is_enabled() || state == EtlState::Disabled {
            return Err(HarvestError::precondition(format!("pipeline '{}' is disabled", name)));
        }
        if state != EtlState::Idle {
            return Err(HarvestError::busy(format!(
                "pipeline '{}' is {} and cannot be queued",
                name, state
            )));
        }

        self.update().await?;

        if !force && !self.is_outdated() {
            return Err(HarvestError::precondition(format!(
                "no changes detected for pipeline '{}'",
                name
            )));
        }

        self.monitor.transition(EtlState::Queued)
    }

    /// QUEUED → HARVESTING → {DONE, FAILED, ABORTED}. Drives the record
    /// stream through the transformer into the loader, finalizing the
    /// loader exactly once regardless of outcome.
    pub async fn harvest(&mut self, token: &CancellationToken) -> Result<(), HarvestError> {
        let name = self.name();

        if self.monitor.state() == EtlState::Aborting || token.is_cancelled() {
            if self.monitor.state() != EtlState::Aborting {
                let _ = self.monitor.transition(EtlState::Aborting);
            }
            self.monitor.transition(EtlState::Aborted)?;
            return Err(HarvestError::cancelled(format!("pipeline '{}' aborted before start", name)));
        }

        self.monitor.transition(EtlState::Harvesting)?;
        self.monitor.reset_harvested_count();
        info!(pipeline = %name, max = self.monitor.max_document_count(), "harvest starting");

        let context = LoaderContext::new(
            name.clone(),
            self.charset.clone(),
            self.monitor.version_hash(),
            Utc::now().timestamp_millis(),
        );

        let outcome = self.run(&name, &context, token).await;
        self.conclude(&name, outcome)
    }

    /// The streaming run: init loader, extract, transform, load, clear.
    async fn run(
        &mut self,
        name: &str,
        context: &LoaderContext,
        token: &CancellationToken,
    ) -> Result<LoadReport, HarvestError> {
        let Self {
            monitor,
            extractor,
            transformer,
            loader,
            ..
        } = self;

        if let Err(e) = loader.init(context).await {
            return Err(HarvestError::loading(name, e.to_string()));
        }

        let load_result = match extractor.extract().await {
            Err(e) => Err(HarvestError::extraction(name, e.to_string())),
            Ok(mut records) => {
                let stream_monitor = monitor.clone();
                let stream_token = token.clone();
                let stream_name = name.to_string();

                let documents = stream! {
                    while let Some(item) = records.next().await {
                        // Suspension point: state and token before hand-off.
                        if stream_token.is_cancelled() || stream_monitor.state() != EtlState::Harvesting {
                            yield Err(HarvestError::cancelled(format!(
                                "pipeline '{}' abort observed",
                                stream_name
                            )));
                            break;
                        }

                        match item {
                            Err(e) => {
                                yield Err(HarvestError::extraction(&stream_name, e.to_string()));
                                break;
                            }
                            Ok(record) => {
                                stream_monitor.increment_harvested_documents();
                                match transformer.transform(record) {
                                    Ok(document) => yield Ok(document),
                                    Err(e) => {
                                        yield Err(HarvestError::transformation(&stream_name, e.to_string()));
                                        break;
                                    }
                                }
                            }
                        }
                    }
                };

                let gate: &EtlMonitor = &**monitor;
                loader.load(documents.boxed(), gate).await
            }
        };

        // The loader is finalized exactly once, whatever happened above.
        let clear_result = loader.clear().await;

        let report = match (load_result, clear_result) {
            (Err(e), _) => return Err(e),
            (Ok(_), Err(e)) => return Err(HarvestError::loading(name, e.to_string())),
            (Ok(_), Ok(final_report)) => final_report,
        };

        if token.is_cancelled() || monitor.state() == EtlState::Aborting {
            return Err(HarvestError::cancelled(format!("pipeline '{}' aborted", name)));
        }

        if monitor.harvested_count() == 0 {
            return Err(HarvestError::extraction(
                name,
                "the source yielded no records although entries were expected",
            ));
        }

        if report.nothing_loaded() {
            return Err(HarvestError::loading(
                name,
                format!("no documents loaded out of {} received", report.received),
            ));
        }

        Ok(report)
    }

    /// Classifies the run outcome into health and terminal state.
    fn conclude(&self, name: &str, outcome: Result<LoadReport, HarvestError>) -> Result<(), HarvestError> {
        match outcome {
            Ok(report) => {
                *self.monitor.last_harvested_hash.write() = self.monitor.version_hash();
                self.monitor.record_health(EtlHealth::Ok);
                self.monitor.transition(EtlState::Done)?;
                info!(
                    pipeline = %name,
                    received = report.received,
                    loaded = report.loaded,
                    "harvest finished"
                );
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                // Abort carries no health change.
                if self.monitor.state() != EtlState::Aborting {
                    let _ = self.monitor.transition(EtlState::Aborting);
                }
                self.monitor.transition(EtlState::Aborted)?;
                info!(pipeline = %name, "harvest aborted");
                Err(e)
            }
            Err(e) => {
                let health = EtlHealth::from_error(&e).unwrap_or(EtlHealth::HarvestFailed);
                self.monitor.record_health(health);
                self.monitor.transition(EtlState::Failed)?;
                warn!(pipeline = %name, health = %health, error = %e, "harvest failed");
                Err(e)
            }
        }
    }

    /// Requests a cooperative abort of a queued or running harvest.
    pub fn abort_harvest(&self) -> bool {
        self.monitor.request_abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use harvester_domain::services::extractor::{RecordStream, SourceDescriptor};
    use harvester_domain::services::loader::DocumentStream;
    use harvester_domain::services::IdentityTransformer;
    use harvester_domain::{DocumentEnvelope, RawRecord};
    use serde_json::json;

    struct VecExtractor {
        records: Vec<RawRecord>,
        hash: Option<String>,
    }

    impl VecExtractor {
        fn new(count: usize, hash: &str) -> Self {
            Self {
                records: (0..count)
                    .map(|i| RawRecord::new(format!("r{}", i), json!({"n": i})))
                    .collect(),
                hash: Some(hash.to_string()),
            }
        }
    }

    #[async_trait]
    impl Extractor for VecExtractor {
        async fn describe(&mut self) -> Result<SourceDescriptor, HarvestError> {
            Ok(SourceDescriptor::new(self.hash.clone(), self.records.len() as i64))
        }

        async fn extract(&mut self) -> Result<RecordStream<'_>, HarvestError> {
            let records = self.records.clone();
            Ok(stream::iter(records.into_iter().map(Ok)).boxed())
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loaded: u64,
        cleared: u32,
    }

    #[async_trait]
    impl Loader for CountingLoader {
        async fn init(&mut self, _ctx: &LoaderContext) -> Result<(), HarvestError> {
            self.loaded = 0;
            Ok(())
        }

        async fn load(
            &mut self,
            mut documents: DocumentStream<'_>,
            gate: &dyn HarvestGate,
        ) -> Result<LoadReport, HarvestError> {
            let mut received = 0;
            while gate.keep_loading() {
                let Some(item) = documents.next().await else { break };
                let document: Option<DocumentEnvelope> = item?;
                received += 1;
                if document.is_some() {
                    self.loaded += 1;
                }
            }
            Ok(LoadReport {
                received,
                loaded: self.loaded,
            })
        }

        async fn clear(&mut self) -> Result<LoadReport, HarvestError> {
            self.cleared += 1;
            Ok(LoadReport {
                received: self.loaded,
                loaded: self.loaded,
            })
        }
    }

    fn pipeline_with(count: usize, hash: &str) -> EtlPipeline {
        EtlPipeline::new(
            "Test Pipeline!",
            Box::new(VecExtractor::new(count, hash)),
            Box::new(IdentityTransformer),
            Box::new(CountingLoader::default()),
        )
    }

    #[test]
    fn test_name_is_sanitized() {
        let pipeline = pipeline_with(1, "h");
        assert_eq!(pipeline.name(), "TestPipeline");

        let unnamed = EtlPipeline::new(
            "!!!",
            Box::new(VecExtractor::new(0, "h")),
            Box::new(IdentityTransformer),
            Box::new(CountingLoader::default()),
        );
        assert_eq!(unnamed.name(), "etl");
    }

    #[tokio::test]
    async fn test_happy_run_walks_the_state_machine() {
        let mut pipeline = pipeline_with(3, "hash1");
        let monitor = pipeline.monitor();

        pipeline.init().await.unwrap();
        assert_eq!(monitor.state(), EtlState::Idle);

        pipeline.prepare_harvest(false).await.unwrap();
        assert_eq!(monitor.state(), EtlState::Queued);

        let token = CancellationToken::new();
        pipeline.harvest(&token).await.unwrap();
        assert_eq!(monitor.state(), EtlState::Done);
        assert_eq!(monitor.health(), EtlHealth::Ok);
        assert_eq!(monitor.harvested_count(), 3);

        monitor.settle();
        assert_eq!(monitor.state(), EtlState::Idle);

        let states: Vec<EtlState> = monitor.snapshot().state_history.iter().map(|e| e.value).collect();
        assert_eq!(
            states,
            vec![
                EtlState::Initializing,
                EtlState::Idle,
                EtlState::Queued,
                EtlState::Harvesting,
                EtlState::Done,
                EtlState::Idle
            ]
        );
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent_in_queued() {
        let mut pipeline = pipeline_with(2, "h");
        pipeline.init().await.unwrap();
        pipeline.prepare_harvest(false).await.unwrap();
        pipeline.prepare_harvest(false).await.unwrap();
        assert_eq!(pipeline.monitor().state(), EtlState::Queued);
    }

    #[tokio::test]
    async fn test_disabled_pipeline_short_circuits() {
        let mut pipeline = pipeline_with(2, "h");
        pipeline.init().await.unwrap();
        pipeline.monitor().set_enabled(false);

        let err = pipeline.prepare_harvest(true).await.unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(pipeline.monitor().state(), EtlState::Disabled);
    }

    #[tokio::test]
    async fn test_no_changes_precondition_and_force_override() {
        let mut pipeline = pipeline_with(2, "stable");
        let monitor = pipeline.monitor();
        pipeline.init().await.unwrap();

        // First run harvests everything.
        pipeline.prepare_harvest(false).await.unwrap();
        pipeline.harvest(&CancellationToken::new()).await.unwrap();
        monitor.settle();

        // Nothing changed: prepare is a precondition failure...
        let err = pipeline.prepare_harvest(false).await.unwrap_err();
        assert!(err.is_precondition());
        assert_eq!(monitor.state(), EtlState::Idle);

        // ...unless forced.
        pipeline.prepare_harvest(true).await.unwrap();
        assert_eq!(monitor.state(), EtlState::Queued);
    }

    #[tokio::test]
    async fn test_empty_source_fails_extraction() {
        let mut pipeline = pipeline_with(0, "h");
        let monitor = pipeline.monitor();
        pipeline.init().await.unwrap();
        // Empty source means no changes can be detected; force the run.
        pipeline.prepare_harvest(true).await.unwrap();

        let err = pipeline.harvest(&CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("TestPipeline"));
        assert_eq!(monitor.state(), EtlState::Failed);
        assert_eq!(monitor.health(), EtlHealth::ExtractionFailed);
    }

    #[tokio::test]
    async fn test_abort_before_start_ends_aborted_without_health_change() {
        let mut pipeline = pipeline_with(5, "h");
        let monitor = pipeline.monitor();
        pipeline.init().await.unwrap();
        pipeline.prepare_harvest(false).await.unwrap();

        assert!(monitor.request_abort());
        let err = pipeline.harvest(&CancellationToken::new()).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(monitor.state(), EtlState::Aborted);
        assert_eq!(monitor.health(), EtlHealth::Ok);
    }

    struct FailingTransformer;

    impl Transformer for FailingTransformer {
        fn transform(&self, _record: RawRecord) -> Result<Option<DocumentEnvelope>, HarvestError> {
            Err(HarvestError::internal("mapping broke"))
        }
    }

    #[tokio::test]
    async fn test_transformer_failure_sets_transformation_health() {
        let mut pipeline = EtlPipeline::new(
            "transforms",
            Box::new(VecExtractor::new(3, "h")),
            Box::new(FailingTransformer),
            Box::new(CountingLoader::default()),
        );
        let monitor = pipeline.monitor();
        pipeline.init().await.unwrap();
        pipeline.prepare_harvest(false).await.unwrap();

        pipeline.harvest(&CancellationToken::new()).await.unwrap_err();
        assert_eq!(monitor.state(), EtlState::Failed);
        assert_eq!(monitor.health(), EtlHealth::TransformationFailed);
    }
}
