// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Transformer Port
//!
//! Maps one raw source record to at most one canonical document.
//! Transformation is CPU-bound, so the trait stays synchronous; the pipeline
//! interleaves it with the async extract and load sides.

use crate::entities::{DocumentEnvelope, RawRecord};
use crate::error::HarvestError;

/// Record-to-document mapping of a pipeline.
pub trait Transformer: Send + Sync {
    /// Transforms a record.
    ///
    /// `Ok(None)` means the source entry exists but produces no document
    /// (for example, a deleted or filtered record); the pipeline still
    /// counts it as processed.
    fn transform(&self, record: RawRecord) -> Result<Option<DocumentEnvelope>, HarvestError>;
}

/// Passes the payload through unchanged, deriving the document id from the
/// source id. Useful for sources that already emit the canonical shape, and
/// for tests.
pub struct IdentityTransformer;

impl Transformer for IdentityTransformer {
    fn transform(&self, record: RawRecord) -> Result<Option<DocumentEnvelope>, HarvestError> {
        Ok(Some(DocumentEnvelope::new(record.source_id, record.payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_transformer_wraps_payload() {
        let record = RawRecord::new("r1", json!({"title": "t"}));
        let doc = IdentityTransformer.transform(record).unwrap().unwrap();
        assert_eq!(doc.source_id, "r1");
        assert_eq!(doc.body, json!({"title": "t"}));
    }
}
