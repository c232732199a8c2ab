// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Disk Loader
//!
//! Streams each run's documents into `<saveDir>/<pipelineName>.json`:
//!
//! ```json
//! {"harvestDate": <epochMs>, "sourceHash": "<hex>", "documents": [ … ]}
//! ```
//!
//! Documents are written as they are flushed, never materialized as one
//! array in memory. If a run loads nothing, the empty file is deleted on
//! close.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use harvester_domain::services::loader::LoaderContext;
use harvester_domain::value_objects::Parameter;
use harvester_domain::{DocumentEnvelope, HarvestError};

use crate::infrastructure::persistence::StreamingDocumentWriter;

use super::batch::{BatchSink, BatchingLoader};

/// Sink adapter writing one streaming JSON dump per run.
pub struct DiskSink {
    save_dir: Arc<Parameter>,
    writer: Option<StreamingDocumentWriter>,
}

impl DiskSink {
    /// `save_dir` is a text parameter naming the dump directory, read at
    /// every `open`.
    pub fn new(save_dir: Arc<Parameter>) -> Self {
        Self {
            save_dir,
            writer: None,
        }
    }

    /// Target file of the current run, when open
    pub fn target(&self) -> Option<PathBuf> {
        self.writer.as_ref().map(|w| w.path().to_path_buf())
    }
}

#[async_trait]
impl BatchSink for DiskSink {
    async fn open(&mut self, ctx: &LoaderContext) -> Result<(), HarvestError> {
        let save_dir = self.save_dir.string_value();
        if save_dir.is_empty() {
            return Err(HarvestError::precondition(format!(
                "parameter '{}' is empty, nowhere to save documents",
                self.save_dir.composite_key()
            )));
        }

        let path = PathBuf::from(save_dir).join(format!("{}.json", ctx.pipeline));
        let writer =
            StreamingDocumentWriter::create(&path, ctx.harvest_started_at, ctx.source_hash.as_deref()).await?;
        self.writer = Some(writer);
        Ok(())
    }

    fn entry_size(&self, document: &DocumentEnvelope) -> Result<usize, HarvestError> {
        // Encoded body plus the separating comma.
        Ok(document.body_bytes()?.len() + 1)
    }

    async fn load_batch(&mut self, documents: Vec<DocumentEnvelope>) -> Result<(), HarvestError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| HarvestError::internal("disk sink received a batch before open"))?;

        for document in &documents {
            writer.write_document(&document.body).await?;
        }
        Ok(())
    }

    async fn close(&mut self, any_loaded: bool) -> Result<(), HarvestError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => return Ok(()),
        };

        if any_loaded {
            let path = writer.path().to_path_buf();
            let written = writer.finish().await?;
            info!(file = %path.display(), documents = written, "closed document dump");
        } else {
            writer.discard().await?;
        }
        Ok(())
    }
}

/// Batching disk loader over a save-directory parameter.
pub fn disk_loader(save_dir: Arc<Parameter>, max_batch_size: Arc<Parameter>) -> BatchingLoader<DiskSink> {
    BatchingLoader::new(DiskSink::new(save_dir), max_batch_size)
}
