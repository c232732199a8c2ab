// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Manager State Repository
//!
//! Persists the full [`ManagerState`] - last combined hash, manager state
//! history, and every pipeline's histories and counts - to
//! `cache/<module>/state.json` through an atomic replace. A missing file on
//! load is a fresh deployment, not an error.

use std::path::{Path, PathBuf};
use tracing::debug;

use harvester_domain::ManagerState;
use harvester_domain::HarvestError;

use super::atomic_file;

/// JSON-file-backed repository for the persisted manager state.
#[derive(Debug, Clone)]
pub struct StateRepository {
    path: PathBuf,
}

impl StateRepository {
    /// Repository rooted at `<cache_dir>/<module>/state.json`
    pub fn new(cache_dir: &Path, module_name: &str) -> Self {
        Self {
            path: cache_dir.join(module_name).join("state.json"),
        }
    }

    /// Repository at an explicit file path
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the state via temp-file-and-rename.
    pub async fn save(&self, state: &ManagerState) -> Result<(), HarvestError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        atomic_file::replace_atomically(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), "persisted manager state");
        Ok(())
    }

    /// Reads the state back; `None` when no state has been persisted yet.
    pub async fn load(&self) -> Result<Option<ManagerState>, HarvestError> {
        match atomic_file::read_optional(&self.path).await? {
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }
}
