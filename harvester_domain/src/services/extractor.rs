// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Extractor Port
//!
//! An extractor connects one pipeline to its third-party source. It serves
//! two operations:
//!
//! - [`Extractor::describe`]: cheap metadata probe - the source's current
//!   version hash and document count, used for change detection without
//!   loading documents
//! - [`Extractor::extract`]: the lazy record stream consumed by one harvest
//!   run
//!
//! Implementations live in per-source deployments; the framework only ships
//! test fixtures and a generic file-based extractor.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::entities::RawRecord;
use crate::error::HarvestError;

/// Result of a source metadata probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Content hash of the source, `None` when the source cannot provide one
    pub version_hash: Option<String>,
    /// Total extractable documents; `-1` when unknown
    pub max_document_count: i64,
}

impl SourceDescriptor {
    pub fn new(version_hash: Option<String>, max_document_count: i64) -> Self {
        Self {
            version_hash,
            max_document_count,
        }
    }

    /// Descriptor of a source whose size and hash are unknown
    pub fn unknown() -> Self {
        Self {
            version_hash: None,
            max_document_count: -1,
        }
    }
}

/// Lazy sequence of raw records produced by one extraction
pub type RecordStream<'a> = BoxStream<'a, Result<RawRecord, HarvestError>>;

/// Source-side port of a pipeline.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Probes the source for its current version hash and document count
    /// without extracting documents.
    async fn describe(&mut self) -> Result<SourceDescriptor, HarvestError>;

    /// Opens the record stream for one harvest run. Records are yielded in
    /// source order.
    async fn extract(&mut self) -> Result<RecordStream<'_>, HarvestError>;
}
