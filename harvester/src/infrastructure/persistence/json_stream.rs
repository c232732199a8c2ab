// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Streaming JSON Document Dumps
//!
//! The disk loader writes one JSON object per pipeline run:
//!
//! ```json
//! {"harvestDate": <epochMs>, "sourceHash": "<hex>", "documents": [ <doc>, … ]}
//! ```
//!
//! Documents are streamed into the array one at a time - the dump is never
//! materialized in memory. The writer owns the file handle; `finish` closes
//! the array and object, `discard` deletes the file (used when a run loaded
//! nothing).

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};

use harvester_domain::HarvestError;

/// Incremental writer for one document dump file.
pub struct StreamingDocumentWriter {
    writer: BufWriter<tokio::fs::File>,
    path: PathBuf,
    documents_written: u64,
}

impl StreamingDocumentWriter {
    /// Creates the dump file and writes the header up to the open of the
    /// `documents` array.
    pub async fn create(
        path: &Path,
        harvest_date_ms: i64,
        source_hash: Option<&str>,
    ) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::io_error(format!("failed to create '{}': {}", parent.display(), e)))?;
        }

        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to create '{}': {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);

        let mut header = format!("{{\"harvestDate\":{}", harvest_date_ms);
        if let Some(hash) = source_hash {
            header.push_str(",\"sourceHash\":");
            header.push_str(&serde_json::to_string(hash)?);
        }
        header.push_str(",\"documents\":[");
        writer.write_all(header.as_bytes()).await.map_err(HarvestError::from)?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            documents_written: 0,
        })
    }

    /// Streams one document into the array.
    pub async fn write_document(&mut self, body: &Value) -> Result<(), HarvestError> {
        if self.documents_written > 0 {
            self.writer.write_all(b",").await.map_err(HarvestError::from)?;
        }
        let encoded = serde_json::to_vec(body)?;
        self.writer.write_all(&encoded).await.map_err(HarvestError::from)?;
        self.documents_written += 1;
        Ok(())
    }

    /// Closes the array and object and flushes the file. Returns how many
    /// documents were written.
    pub async fn finish(mut self) -> Result<u64, HarvestError> {
        self.writer.write_all(b"]}").await.map_err(HarvestError::from)?;
        self.writer.flush().await.map_err(HarvestError::from)?;
        self.writer
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to sync '{}': {}", self.path.display(), e)))?;
        Ok(self.documents_written)
    }

    /// Drops the writer and deletes the file.
    pub async fn discard(self) -> Result<(), HarvestError> {
        let path = self.path.clone();
        drop(self.writer);
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to remove '{}': {}", path.display(), e)))
    }

    pub fn documents_written(&self) -> u64 {
        self.documents_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read-back shape of a dump file; for tooling and tests.
#[derive(Debug, Deserialize)]
pub struct DocumentDump {
    #[serde(rename = "harvestDate")]
    pub harvest_date: i64,
    #[serde(rename = "sourceHash")]
    pub source_hash: Option<String>,
    pub documents: Vec<Value>,
}

impl DocumentDump {
    pub async fn read(path: &Path) -> Result<Self, HarvestError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to read '{}': {}", path.display(), e)))?;
        serde_json::from_slice(&bytes).map_err(HarvestError::from)
    }
}
