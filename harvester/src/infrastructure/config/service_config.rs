// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Configuration
//!
//! Static deployment settings, distinct from the runtime parameter registry:
//! where the service listens, where it caches state, where it logs, and
//! where the disk loader writes. Loaded from an optional `harvester.toml`
//! with `HARVESTER_*` environment overrides, e.g. `HARVESTER_LISTEN_ADDRESS`
//! overrides `listen_address`.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use harvester_domain::HarvestError;

fn default_module_name() -> String {
    "harvester".to_string()
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("harvested")
}

/// Static service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Deployment name; also the subdirectory of the state cache
    #[serde(default = "default_module_name")]
    pub module_name: String,

    /// Socket address of the REST surface
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Root of the persisted state cache (`<cache_dir>/<module>/state.json`)
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory of the rolling log files served by `GET /log`
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Directory the disk loader writes document dumps into
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            module_name: default_module_name(),
            listen_address: default_listen_address(),
            cache_dir: default_cache_dir(),
            log_dir: default_log_dir(),
            save_dir: default_save_dir(),
        }
    }
}

impl ServiceConfig {
    /// Loads configuration from an optional TOML file plus environment
    /// overrides. A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self, HarvestError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        } else {
            builder = builder.add_source(File::with_name("harvester").required(false));
        }

        builder = builder.add_source(Environment::with_prefix("HARVESTER"));

        let settings = builder
            .build()
            .map_err(|e| HarvestError::invalid_config(format!("failed to load configuration: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| HarvestError::invalid_config(format!("invalid configuration: {}", e)))
    }

    /// Path of the persisted manager state file
    pub fn state_file(&self) -> PathBuf {
        self.cache_dir.join(&self.module_name).join("state.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.module_name, "harvester");
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert_eq!(config.state_file(), PathBuf::from("cache/harvester/state.json"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvester.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "module_name = \"oaipmh\"").unwrap();
        writeln!(file, "listen_address = \"127.0.0.1:9090\"").unwrap();

        let config = ServiceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.module_name, "oaipmh");
        assert_eq!(config.listen_address, "127.0.0.1:9090");
        // Unset fields keep their defaults
        assert_eq!(config.save_dir, PathBuf::from("harvested"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = ServiceConfig::load(Some(Path::new("/nonexistent/harvester.toml")));
        assert!(result.is_err());
    }
}
