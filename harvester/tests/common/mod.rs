// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures for the integration tests: scripted extractors, a
//! counting batch sink, and a recording event listener.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use harvester::application::services::{EtlManager, EtlPipeline};
use harvester::infrastructure::config::ParameterRegistry;
use harvester::infrastructure::loaders::{BatchSink, BatchingLoader};
use harvester::infrastructure::persistence::StateRepository;
use harvester_bootstrap::shutdown::CancellationToken;
use harvester_domain::services::extractor::{Extractor, RecordStream, SourceDescriptor};
use harvester_domain::services::loader::LoaderContext;
use harvester_domain::services::IdentityTransformer;
use harvester_domain::value_objects::Parameter;
use harvester_domain::{
    DocumentEnvelope, HarvestError, HarvestEventListener, HarvestFinishedEvent, HarvestStartedEvent, RawRecord,
};

/// Extractor yielding a scripted record list with a fixed version hash.
pub struct VecExtractor {
    records: Vec<RawRecord>,
    hash: Option<String>,
    /// Delay between records, to give aborts a window
    pub yield_delay: Duration,
}

impl VecExtractor {
    pub fn new(count: usize, hash: &str) -> Self {
        Self {
            records: (0..count)
                .map(|i| RawRecord::new(format!("record-{}", i), json!({"n": i})))
                .collect(),
            hash: Some(hash.to_string()),
            yield_delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.yield_delay = delay;
        self
    }

    /// Extractor over explicit records
    pub fn from_records(records: Vec<RawRecord>, hash: &str) -> Self {
        Self {
            records,
            hash: Some(hash.to_string()),
            yield_delay: Duration::ZERO,
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
        let delay = self.yield_delay;
        Ok(stream::iter(records.into_iter().map(Ok))
            .then(move |item| async move {
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }
}

/// Counters shared between a [`CountingSink`] and the test body.
#[derive(Default)]
pub struct SinkCounters {
    pub flushes: AtomicU64,
    pub documents: AtomicU64,
}

impl SinkCounters {
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn documents(&self) -> u64 {
        self.documents.load(Ordering::SeqCst)
    }
}

/// Batch sink with a fixed per-document size and observable counters.
pub struct CountingSink {
    pub counters: Arc<SinkCounters>,
    pub entry_size: usize,
    /// Delay per flushed batch, to give aborts a window
    pub flush_delay: Duration,
}

impl CountingSink {
    pub fn new(entry_size: usize) -> (Self, Arc<SinkCounters>) {
        let counters = Arc::new(SinkCounters::default());
        (
            Self {
                counters: counters.clone(),
                entry_size,
                flush_delay: Duration::ZERO,
            },
            counters,
        )
    }
}

#[async_trait]
impl BatchSink for CountingSink {
    async fn open(&mut self, _ctx: &LoaderContext) -> Result<(), HarvestError> {
        Ok(())
    }

    fn entry_size(&self, _document: &DocumentEnvelope) -> Result<usize, HarvestError> {
        Ok(self.entry_size)
    }

    async fn load_batch(&mut self, documents: Vec<DocumentEnvelope>) -> Result<(), HarvestError> {
        if self.flush_delay > Duration::ZERO {
            tokio::time::sleep(self.flush_delay).await;
        }
        self.counters.flushes.fetch_add(1, Ordering::SeqCst);
        self.counters
            .documents
            .fetch_add(documents.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self, _any_loaded: bool) -> Result<(), HarvestError> {
        Ok(())
    }
}

/// Event listener recording every emitted event.
#[derive(Default)]
pub struct RecordingListener {
    pub started: Mutex<Vec<HarvestStartedEvent>>,
    pub finished: Mutex<Vec<HarvestFinishedEvent>>,
}

impl HarvestEventListener for RecordingListener {
    fn on_harvest_started(&self, event: &HarvestStartedEvent) {
        self.started.lock().push(event.clone());
    }

    fn on_harvest_finished(&self, event: &HarvestFinishedEvent) {
        self.finished.lock().push(event.clone());
    }
}

/// Standard batch-size parameter for tests
pub fn batch_size_param(bytes: i64) -> Arc<Parameter> {
    Parameter::non_negative_int("submission", "batchSize", bytes).unwrap()
}

/// Builds a pipeline over a scripted extractor and a counting sink.
pub fn counting_pipeline(
    name: &str,
    extractor: VecExtractor,
    sink: CountingSink,
    max_batch_bytes: i64,
) -> EtlPipeline {
    EtlPipeline::new(
        name,
        Box::new(extractor),
        Box::new(IdentityTransformer),
        Box::new(BatchingLoader::new(sink, batch_size_param(max_batch_bytes))),
    )
}

/// Manager over a temp-dir state cache. Returns the registry alongside so
/// tests can flip parameters.
pub fn manager_in(cache_dir: &std::path::Path, module: &str) -> (EtlManager, Arc<ParameterRegistry>) {
    let registry = Arc::new(ParameterRegistry::new());
    let repository = StateRepository::new(cache_dir, module);
    let manager = EtlManager::new(module, repository, &registry, CancellationToken::new()).unwrap();
    (manager, registry)
}
