// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Loader Port
//!
//! A loader drains the transformed document stream of one harvest run into
//! a sink. The framework's loaders batch by byte size; this trait only pins
//! down the lifecycle the pipeline relies on:
//!
//! - `init` once per run, before the first document
//! - `load` consumes the stream, polling the [`HarvestGate`] between
//!   documents so an abort stops the drain at the next suspension point
//! - `clear` exactly once per run, even when the run failed or was aborted;
//!   it releases handles and never throws for control flow

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::entities::DocumentEnvelope;
use crate::error::HarvestError;

/// Lazy sequence of transformed documents. `None` items are source entries
/// that produced no document; they count as received but are not loaded.
pub type DocumentStream<'a> = BoxStream<'a, Result<Option<DocumentEnvelope>, HarvestError>>;

/// Shared view of the owning pipeline, polled by loaders for cooperative
/// cancellation. Returns `false` once the pipeline has left its harvesting
/// state.
pub trait HarvestGate: Send + Sync {
    fn keep_loading(&self) -> bool;
}

/// Gate that never stops; for tests and one-shot tooling.
pub struct OpenGate;

impl HarvestGate for OpenGate {
    fn keep_loading(&self) -> bool {
        true
    }
}

/// Per-run context handed to `init`.
#[derive(Debug, Clone)]
pub struct LoaderContext {
    /// Sanitized name of the owning pipeline
    pub pipeline: String,
    /// Charset label of the pipeline's documents
    pub charset: String,
    /// Version hash of the source at harvest start, if known
    pub source_hash: Option<String>,
    /// Harvest start time, unix epoch milliseconds
    pub harvest_started_at: i64,
}

impl LoaderContext {
    pub fn new(
        pipeline: impl Into<String>,
        charset: impl Into<String>,
        source_hash: Option<String>,
        harvest_started_at: i64,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            charset: charset.into(),
            source_hash,
            harvest_started_at,
        }
    }
}

/// Outcome of one `load` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Stream items received, including `None` placeholders
    pub received: u64,
    /// Documents actually handed to the sink
    pub loaded: u64,
}

impl LoadReport {
    /// The failure signature of a sink that swallowed every document: input
    /// arrived, nothing was loaded.
    pub fn nothing_loaded(&self) -> bool {
        self.received > 0 && self.loaded == 0
    }
}

/// Sink-side port of a pipeline.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Prepares the loader for one run; validates sink preconditions.
    async fn init(&mut self, ctx: &LoaderContext) -> Result<(), HarvestError>;

    /// Drains the document stream into the sink.
    async fn load(
        &mut self,
        documents: DocumentStream<'_>,
        gate: &dyn HarvestGate,
    ) -> Result<LoadReport, HarvestError>;

    /// Finalizes the run: flushes or discards residual work and releases
    /// handles. Called exactly once per run, on success, failure, and abort
    /// alike. Returns the final report; the only error surfaced here is a
    /// failed residual flush.
    async fn clear(&mut self) -> Result<LoadReport, HarvestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_report_nothing_loaded() {
        assert!(!LoadReport { received: 0, loaded: 0 }.nothing_loaded());
        assert!(LoadReport { received: 5, loaded: 0 }.nothing_loaded());
        assert!(!LoadReport { received: 5, loaded: 5 }.nothing_loaded());
    }

    #[test]
    fn test_open_gate_never_stops() {
        assert!(OpenGate.keep_loading());
    }
}
