// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Atomic File Operations
//!
//! State files are replaced atomically: the new content is written to a
//! sibling `.tmp` file, synced to disk, and renamed over the target.
//! Readers observe either the previous or the new content, never a partial
//! write. The directory merge moves a cache tree into place file by file,
//! replacing on collision.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use harvester_domain::HarvestError;

/// Sibling temp path used during an atomic replace
fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

/// Atomically replaces `target` with `bytes`: write temp, fsync, rename.
///
/// Parent directories are created as needed.
pub async fn replace_atomically(target: &Path, bytes: &[u8]) -> Result<(), HarvestError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to create '{}': {}", parent.display(), e)))?;
    }

    let temp = temp_path(target);

    let mut file = tokio::fs::File::create(&temp)
        .await
        .map_err(|e| HarvestError::io_error(format!("failed to create '{}': {}", temp.display(), e)))?;
    file.write_all(bytes)
        .await
        .map_err(|e| HarvestError::io_error(format!("failed to write '{}': {}", temp.display(), e)))?;
    file.sync_all()
        .await
        .map_err(|e| HarvestError::io_error(format!("failed to sync '{}': {}", temp.display(), e)))?;
    drop(file);

    tokio::fs::rename(&temp, target).await.map_err(|e| {
        HarvestError::io_error(format!(
            "failed to rename '{}' over '{}': {}",
            temp.display(),
            target.display(),
            e
        ))
    })
}

/// Reads a whole file; a missing file is `None`, not an error.
pub async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, HarvestError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HarvestError::io_error(format!(
            "failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Recursively moves the contents of `source` into `destination`, replacing
/// files on collision and removing `source` afterwards. Used when a
/// module's cache directory is renamed.
pub async fn merge_directories(source: &Path, destination: &Path) -> Result<(), HarvestError> {
    merge_dir_inner(source.to_path_buf(), destination.to_path_buf()).await?;
    tokio::fs::remove_dir_all(source)
        .await
        .map_err(|e| HarvestError::io_error(format!("failed to remove '{}': {}", source.display(), e)))
}

fn merge_dir_inner(
    source: PathBuf,
    destination: PathBuf,
) -> futures::future::BoxFuture<'static, Result<(), HarvestError>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(&destination)
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to create '{}': {}", destination.display(), e)))?;

        let mut entries = tokio::fs::read_dir(&source)
            .await
            .map_err(|e| HarvestError::io_error(format!("failed to list '{}': {}", source.display(), e)))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| HarvestError::io_error(e.to_string()))?
        {
            let from = entry.path();
            let to = destination.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| HarvestError::io_error(e.to_string()))?;

            if file_type.is_dir() {
                merge_dir_inner(from, to).await?;
            } else {
                // rename replaces an existing destination file
                tokio::fs::rename(&from, &to).await.map_err(|e| {
                    HarvestError::io_error(format!(
                        "failed to move '{}' to '{}': {}",
                        from.display(),
                        to.display(),
                        e
                    ))
                })?;
            }
        }

        Ok(())
    })
}
