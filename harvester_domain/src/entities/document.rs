// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Documents
//!
//! Two shapes travel through a pipeline:
//!
//! - [`RawRecord`] - what an extractor yields: a source identifier plus an
//!   opaque JSON payload in the source's own schema
//! - [`DocumentEnvelope`] - what a transformer hands to the loader: the
//!   canonical document body plus the sink document id, which is the SHA-1
//!   of the source identifier
//!
//! The body stays `serde_json::Value` so the bulk loader's repair pass can
//! null out a rejected field by key, without reflection or per-type
//! descriptor machinery.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarvestError;
use crate::services::digest;

/// One record as produced by an extractor, before transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Identifier of the record within its source
    pub source_id: String,
    /// Source-schema payload
    pub payload: Value,
}

impl RawRecord {
    pub fn new(source_id: impl Into<String>, payload: Value) -> Self {
        Self {
            source_id: source_id.into(),
            payload,
        }
    }
}

/// One transformed document on its way into a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEnvelope {
    /// Sink document id: SHA-1 hex of the source id
    pub id: String,
    /// Identifier of the record within its source
    pub source_id: String,
    /// Canonical document body
    pub body: Value,
}

impl DocumentEnvelope {
    /// Wraps a transformed body, deriving the sink id from the source id.
    pub fn new(source_id: impl Into<String>, body: Value) -> Self {
        let source_id = source_id.into();
        Self {
            id: digest::sha1_hex(&source_id),
            source_id,
            body,
        }
    }

    /// Serialized body as compact JSON bytes.
    pub fn body_bytes(&self) -> Result<Vec<u8>, HarvestError> {
        serde_json::to_vec(&self.body).map_err(HarvestError::from)
    }

    /// Nulls out a top-level field of the body.
    ///
    /// Returns `true` when the field existed and was set to `null`. Used by
    /// the bulk loader's repair pass for documents the sink rejected with a
    /// field-level parse error.
    pub fn null_field(&mut self, field: &str) -> bool {
        match self.body.as_object_mut() {
            Some(map) => match map.get_mut(field) {
                Some(slot) => {
                    *slot = Value::Null;
                    true
                }
                None => false,
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_id_is_sha1_of_source_id() {
        let doc = DocumentEnvelope::new("record-1", json!({"title": "t"}));
        assert_eq!(doc.id, digest::sha1_hex("record-1"));
        assert_eq!(doc.id.len(), 40);
    }

    #[test]
    fn test_null_field_present() {
        let mut doc = DocumentEnvelope::new("r", json!({"geoLocations": [1, 2], "title": "t"}));
        assert!(doc.null_field("geoLocations"));
        assert_eq!(doc.body["geoLocations"], Value::Null);
        assert_eq!(doc.body["title"], json!("t"));
    }

    #[test]
    fn test_null_field_missing_or_non_object() {
        let mut doc = DocumentEnvelope::new("r", json!({"title": "t"}));
        assert!(!doc.null_field("absent"));

        let mut scalar = DocumentEnvelope::new("r", json!("not an object"));
        assert!(!scalar.null_field("anything"));
    }

    #[test]
    fn test_body_bytes_is_compact_json() {
        let doc = DocumentEnvelope::new("r", json!({"a": 1}));
        assert_eq!(doc.body_bytes().unwrap(), br#"{"a":1}"#.to_vec());
    }
}
