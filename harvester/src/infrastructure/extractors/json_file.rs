// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # JSON Directory Extractor
//!
//! Treats a directory of `*.json` files as a source: one file per record,
//! the file stem as the source id. The version hash digests every file's
//! name, size, and modification time, so touching any record marks the
//! source outdated without reading file contents.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use harvester_domain::services::digest;
use harvester_domain::services::extractor::{Extractor, RecordStream, SourceDescriptor};
use harvester_domain::{HarvestError, RawRecord};

/// Extractor over a directory of JSON record files.
pub struct JsonFileExtractor {
    directory: PathBuf,
}

impl JsonFileExtractor {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Record files in stable (name) order with their fingerprint inputs.
    async fn list_records(&self) -> Result<Vec<(String, PathBuf, u64, u128)>, HarvestError> {
        let mut entries = tokio::fs::read_dir(&self.directory).await.map_err(|e| {
            HarvestError::io_error(format!("failed to list '{}': {}", self.directory.display(), e))
        })?;

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HarvestError::io_error(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };

            let metadata = entry
                .metadata()
                .await
                .map_err(|e| HarvestError::io_error(e.to_string()))?;
            let modified = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis())
                .unwrap_or(0);

            records.push((stem, path, metadata.len(), modified));
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}

#[async_trait]
impl Extractor for JsonFileExtractor {
    async fn describe(&mut self) -> Result<SourceDescriptor, HarvestError> {
        let records = self.list_records().await?;

        let mut fingerprint = String::new();
        for (stem, _, len, modified) in &records {
            fingerprint.push_str(&format!("{}:{}:{};", stem, len, modified));
        }

        Ok(SourceDescriptor::new(
            Some(digest::sha1_hex(&fingerprint)),
            records.len() as i64,
        ))
    }

    async fn extract(&mut self) -> Result<RecordStream<'_>, HarvestError> {
        let records = self.list_records().await?;

        let stream = try_stream! {
            for (stem, path, _, _) in records {
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| HarvestError::io_error(format!("failed to read '{}': {}", path.display(), e)))?;
                let payload = serde_json::from_slice(&bytes)?;
                yield RawRecord::new(stem, payload);
            }
        };

        Ok(stream.boxed())
    }
}
