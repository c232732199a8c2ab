// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Batching Loader Core
//!
//! Assembles size-bounded batches over the lazy document stream and drives
//! a [`BatchSink`] - the adapter that knows how bytes reach the concrete
//! sink. The batch is bounded by bytes, not item count; the adapter decides
//! what one document costs (the bulk adapter counts its wire lines, the
//! disk adapter the encoded body).
//!
//! ## Assembly rules
//!
//! For each document:
//!
//! 1. If the batch is empty and the document alone exceeds the bound, the
//!    run fails with `DocumentTooLarge`.
//! 2. If appending would exceed the bound, the current batch is flushed
//!    first, then a new one starts.
//! 3. The document is inserted into the in-flight batch map, keyed by its
//!    sink id; a duplicate id replaces the earlier entry.
//!
//! The owning pipeline's [`HarvestGate`] is polled before dequeuing each
//! document and before every flush. Once the gate closes, the drain stops
//! and the residual batch is *dropped*, never flushed - an abort must not
//! push further batches at the sink.
//!
//! `clear` finalizes exactly once per run: it flushes the residual batch
//! (unless the run was aborted), closes the adapter, and reports the final
//! counts. The batch map is cleared on flush regardless of outcome; failed
//! batches are not replayed here - the owning pipeline decides whether the
//! run fails.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use harvester_domain::services::loader::{DocumentStream, HarvestGate, LoadReport, Loader, LoaderContext};
use harvester_domain::value_objects::Parameter;
use harvester_domain::{DocumentEnvelope, HarvestError};

/// Adapter-side contract of the batching loader.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Opens the sink for one run; validates adapter preconditions.
    async fn open(&mut self, ctx: &LoaderContext) -> Result<(), HarvestError>;

    /// Cost of one document in the sink's own encoding, in bytes.
    fn entry_size(&self, document: &DocumentEnvelope) -> Result<usize, HarvestError>;

    /// Pushes one assembled batch at the sink.
    async fn load_batch(&mut self, documents: Vec<DocumentEnvelope>) -> Result<(), HarvestError>;

    /// Releases sink handles. `any_loaded` is false when the whole run
    /// loaded nothing.
    async fn close(&mut self, any_loaded: bool) -> Result<(), HarvestError>;
}

/// In-flight batch: a size-tracked map from sink document id to document.
#[derive(Default)]
pub struct DocumentBatch {
    order: Vec<String>,
    entries: HashMap<String, (DocumentEnvelope, usize)>,
    bytes: usize,
}

impl DocumentBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Inserts a document with its adapter-specific size. A duplicate id
    /// replaces the earlier entry and its size contribution.
    pub fn insert(&mut self, document: DocumentEnvelope, size: usize) {
        let id = document.id.clone();
        match self.entries.insert(id.clone(), (document, size)) {
            Some((_, previous_size)) => {
                self.bytes = self.bytes - previous_size + size;
            }
            None => {
                self.order.push(id);
                self.bytes += size;
            }
        }
    }

    /// Drains the batch in insertion order, leaving it empty.
    pub fn take(&mut self) -> Vec<DocumentEnvelope> {
        let mut documents = Vec::with_capacity(self.order.len());
        for id in self.order.drain(..) {
            if let Some((document, _)) = self.entries.remove(&id) {
                documents.push(document);
            }
        }
        self.bytes = 0;
        documents
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
        self.bytes = 0;
    }
}

/// Size-bounded batching loader over an adapter sink.
pub struct BatchingLoader<S> {
    sink: S,
    max_batch_size_param: Arc<Parameter>,
    max_batch_bytes: usize,
    batch: DocumentBatch,
    pipeline: String,
    received: u64,
    loaded: u64,
    flushes: u64,
    abort_observed: bool,
}

impl<S: BatchSink> BatchingLoader<S> {
    /// `max_batch_size` is read from the registry at every `init`, so a
    /// runtime `set` applies to the next run.
    pub fn new(sink: S, max_batch_size: Arc<Parameter>) -> Self {
        Self {
            sink,
            max_batch_size_param: max_batch_size,
            max_batch_bytes: 0,
            batch: DocumentBatch::new(),
            pipeline: String::new(),
            received: 0,
            loaded: 0,
            flushes: 0,
            abort_observed: false,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Completed flushes this run
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    fn report(&self) -> LoadReport {
        LoadReport {
            received: self.received,
            loaded: self.loaded,
        }
    }

    async fn flush(&mut self) -> Result<(), HarvestError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        // The map is cleared regardless of the outcome; failed batches are
        // not replayed by the loader.
        let documents = self.batch.take();
        let count = documents.len() as u64;

        match self.sink.load_batch(documents).await {
            Ok(()) => {
                self.loaded += count;
                self.flushes += 1;
                info!(
                    pipeline = %self.pipeline,
                    batch = self.flushes,
                    documents = count,
                    total = self.loaded,
                    "flushed batch"
                );
                Ok(())
            }
            Err(e) => Err(HarvestError::loader(format!(
                "batch of {} documents failed: {}",
                count, e
            ))),
        }
    }
}

#[async_trait]
impl<S: BatchSink> Loader for BatchingLoader<S> {
    async fn init(&mut self, ctx: &LoaderContext) -> Result<(), HarvestError> {
        let max = self.max_batch_size_param.int_value();
        if max <= 0 {
            return Err(HarvestError::invalid_config(format!(
                "parameter '{}' must be positive, got {}",
                self.max_batch_size_param.composite_key(),
                max
            )));
        }

        self.max_batch_bytes = max as usize;
        self.pipeline = ctx.pipeline.clone();
        self.batch.clear();
        self.received = 0;
        self.loaded = 0;
        self.flushes = 0;
        self.abort_observed = false;

        self.sink.open(ctx).await
    }

    async fn load(
        &mut self,
        mut documents: DocumentStream<'_>,
        gate: &dyn HarvestGate,
    ) -> Result<LoadReport, HarvestError> {
        loop {
            // Suspension point: check the pipeline state before dequeuing.
            if !gate.keep_loading() {
                self.abort_observed = true;
                debug!(pipeline = %self.pipeline, "gate closed, stopping drain");
                break;
            }

            let item = match documents.next().await {
                Some(item) => item,
                None => break,
            };
            let maybe_document = item?;
            self.received += 1;

            let document = match maybe_document {
                Some(document) => document,
                // Source entry that produced no document.
                None => continue,
            };

            let size = self.sink.entry_size(&document)?;

            if !self.batch.is_empty() && self.batch.bytes() + size > self.max_batch_bytes {
                // Suspension point: check again before flushing.
                if !gate.keep_loading() {
                    self.abort_observed = true;
                    break;
                }
                self.flush().await?;
            }

            // The batch is empty here, either freshly or after the flush; a
            // document that alone exceeds the bound can never be loaded.
            if size > self.max_batch_bytes {
                return Err(HarvestError::DocumentTooLarge {
                    document_id: document.id,
                    size,
                    max: self.max_batch_bytes,
                });
            }

            self.batch.insert(document, size);
        }

        Ok(self.report())
    }

    async fn clear(&mut self) -> Result<LoadReport, HarvestError> {
        let flush_result = if self.abort_observed {
            let dropped = self.batch.len();
            self.batch.clear();
            if dropped > 0 {
                debug!(pipeline = %self.pipeline, dropped, "dropped residual batch after abort");
            }
            Ok(())
        } else {
            self.flush().await
        };

        let any_loaded = self.loaded > 0;
        let close_result = self.sink.close(any_loaded).await;

        flush_result?;
        close_result?;
        Ok(self.report())
    }
}
