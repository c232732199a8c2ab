// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Parameter Registry
//!
//! The runtime-tunable configuration of a deployment: a mapping from
//! composite key (`lower(category).lower(key)`) to a shared, typed
//! [`Parameter`] cell, in insertion order.
//!
//! ## Registration semantics
//!
//! Registering a parameter whose composite key already exists returns the
//! existing cell and discards the new one, so independent components that
//! declare the same parameter end up sharing a single cell. Unregistering
//! clears the cell's registered flag and removes it from the mapping.
//!
//! ## Environment overlay
//!
//! At startup, every registered parameter probes
//! `GERDI_HARVESTER_<CATEGORY>_<KEY>`; a present variable is applied through
//! the normal `set` path and the outcome is logged. A rejected value leaves
//! the default in place.
//!
//! ## Thread model
//!
//! Single writer (the host), many readers. The vector of cells is behind a
//! `parking_lot::RwLock`; each cell guards its own value, so a snapshot is
//! atomic per parameter without blocking a running harvest.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use harvester_domain::value_objects::Parameter;
use harvester_domain::HarvestError;

/// Ordered registry of typed configuration parameters.
#[derive(Default)]
pub struct ParameterRegistry {
    entries: RwLock<Vec<Arc<Parameter>>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers a parameter.
    ///
    /// If a parameter with the same composite key already exists, the
    /// existing cell is returned and `parameter` is discarded; otherwise
    /// `parameter` is installed, marked registered, and returned.
    pub fn register(&self, parameter: Arc<Parameter>) -> Arc<Parameter> {
        let mut entries = self.entries.write();
        let composite = parameter.composite_key();

        if let Some(existing) = entries.iter().find(|p| p.composite_key() == composite) {
            return existing.clone();
        }

        parameter.set_registered(true);
        entries.push(parameter.clone());
        parameter
    }

    /// Removes a parameter and clears its registered flag.
    pub fn unregister(&self, parameter: &Arc<Parameter>) {
        let composite = parameter.composite_key();
        let mut entries = self.entries.write();
        if let Some(index) = entries.iter().position(|p| p.composite_key() == composite) {
            let removed = entries.remove(index);
            removed.set_registered(false);
        }
    }

    /// Looks up a parameter by composite key.
    pub fn get(&self, composite_key: &str) -> Option<Arc<Parameter>> {
        self.entries
            .read()
            .iter()
            .find(|p| p.composite_key() == composite_key)
            .cloned()
    }

    /// Parses and commits a new value for a registered parameter.
    ///
    /// Returns a human-readable success line. On failure the old value is
    /// preserved and the error names the parameter, the rejected string,
    /// and the parser diagnostic.
    pub fn set(&self, composite_key: &str, raw: &str) -> Result<String, HarvestError> {
        let parameter = self
            .get(composite_key)
            .ok_or_else(|| HarvestError::not_found(format!("unknown parameter '{}'", composite_key)))?;

        let value = parameter.set_from_string(raw)?;
        Ok(format!("Parameter '{}' set to '{}'", composite_key, value.display()))
    }

    /// Applies `GERDI_HARVESTER_<CATEGORY>_<KEY>` overrides to every
    /// registered parameter, logging each outcome.
    pub fn overlay_from_environment(&self) {
        let parameters: Vec<Arc<Parameter>> = self.entries.read().clone();

        for parameter in parameters {
            let env_key = parameter.env_key();
            let raw = match std::env::var(&env_key) {
                Ok(raw) => raw,
                Err(_) => continue,
            };

            match parameter.set_from_string(&raw) {
                Ok(value) => info!(
                    parameter = %parameter.composite_key(),
                    variable = %env_key,
                    value = %value.display(),
                    "applied environment override"
                ),
                Err(e) => warn!(
                    parameter = %parameter.composite_key(),
                    variable = %env_key,
                    error = %e,
                    "rejected environment override"
                ),
            }
        }
    }

    /// Ordered `(composite key, display value)` pairs for external
    /// inspection. Passwords render masked.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .read()
            .iter()
            .map(|p| (p.composite_key(), p.display_value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
