// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error enum for the harvester domain. Each variant
//! represents one failure mode of the ETL lifecycle and carries enough
//! context to be rendered at the REST boundary or classified into pipeline
//! health.
//!
//! ## Categories
//!
//! - **Configuration**: `InvalidConfiguration`, `InvalidName`,
//!   `InvalidParameterValue` - rejected at startup or on a runtime `set`
//! - **Preconditions**: `PreconditionFailed`, `Busy` - the service is
//!   healthy, the request just cannot proceed right now
//! - **Phase failures**: `ExtractionFailed`, `TransformationFailed`,
//!   `LoadingFailed` - carry the pipeline name; they fail one pipeline's run
//!   without aborting its peers
//! - **Loader adapter**: `LoaderError`, `DocumentTooLarge` - sink-level
//!   failures surfaced through the batching loader
//! - **Cancellation**: `Cancelled` - cooperative abort, distinguished from
//!   failure so health is left untouched
//! - **Infrastructure**: `IoError`, `SerializationError`, `NotFound`,
//!   `InternalError`

use thiserror::Error;

/// Domain-specific errors for the harvester framework.
///
/// Variants are cloneable strings rather than wrapped sources so they can be
/// recorded in histories and rendered over REST without lifetime concerns;
/// the original cause is folded into the message at the point of conversion.
#[derive(Error, Debug, Clone)]
pub enum HarvestError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Parameter '{parameter}' rejected value '{rejected}': {reason}")]
    InvalidParameterValue {
        parameter: String,
        rejected: String,
        reason: String,
    },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Busy: {0}")]
    Busy(String),

    #[error("Extraction failed for '{pipeline}': {message}")]
    ExtractionFailed { pipeline: String, message: String },

    #[error("Transformation failed for '{pipeline}': {message}")]
    TransformationFailed { pipeline: String, message: String },

    #[error("Loading failed for '{pipeline}': {message}")]
    LoadingFailed { pipeline: String, message: String },

    #[error("Loader error: {0}")]
    LoaderError(String),

    #[error("Document '{document_id}' is {size} bytes which exceeds the maximum batch size of {max} bytes")]
    DocumentTooLarge {
        document_id: String,
        size: usize,
        max: usize,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl HarvestError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new invalid-name error
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        Self::InvalidName(msg.into())
    }

    /// Creates a new precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    /// Creates a new busy error
    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    /// Creates a new extraction-phase error
    pub fn extraction(pipeline: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            pipeline: pipeline.into(),
            message: msg.into(),
        }
    }

    /// Creates a new transformation-phase error
    pub fn transformation(pipeline: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::TransformationFailed {
            pipeline: pipeline.into(),
            message: msg.into(),
        }
    }

    /// Creates a new loading-phase error
    pub fn loading(pipeline: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::LoadingFailed {
            pipeline: pipeline.into(),
            message: msg.into(),
        }
    }

    /// Creates a new loader adapter error
    pub fn loader(msg: impl Into<String>) -> Self {
        Self::LoaderError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks whether this error is a cooperative cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HarvestError::Cancelled(_))
    }

    /// Checks whether this error is a precondition (the service is healthy)
    pub fn is_precondition(&self) -> bool {
        matches!(self, HarvestError::PreconditionFailed(_) | HarvestError::Busy(_))
    }

    /// Checks whether this error indicates a retry-able condition
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::IoError(_) | HarvestError::LoaderError(_) | HarvestError::Busy(_)
        )
    }

    /// Gets the error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            HarvestError::InvalidConfiguration(_) => "configuration",
            HarvestError::InvalidName(_) => "configuration",
            HarvestError::InvalidParameterValue { .. } => "configuration",
            HarvestError::PreconditionFailed(_) => "precondition",
            HarvestError::Busy(_) => "precondition",
            HarvestError::ExtractionFailed { .. } => "extraction",
            HarvestError::TransformationFailed { .. } => "transformation",
            HarvestError::LoadingFailed { .. } => "loading",
            HarvestError::LoaderError(_) => "loader",
            HarvestError::DocumentTooLarge { .. } => "loader",
            HarvestError::Cancelled(_) => "cancellation",
            HarvestError::IoError(_) => "io",
            HarvestError::SerializationError(_) => "serialization",
            HarvestError::NotFound(_) => "lookup",
            HarvestError::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        HarvestError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(err: serde_json::Error) -> Self {
        HarvestError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_errors_name_the_pipeline() {
        let err = HarvestError::extraction("oaipmh", "endpoint returned 404");
        assert!(err.to_string().contains("oaipmh"));
        assert_eq!(err.category(), "extraction");

        let err = HarvestError::loading("oaipmh", "sink rejected batch");
        assert!(err.to_string().contains("oaipmh"));
        assert_eq!(err.category(), "loading");
    }

    #[test]
    fn test_cancellation_is_distinct_from_failure() {
        let err = HarvestError::cancelled("abort requested");
        assert!(err.is_cancelled());
        assert!(!err.is_precondition());
        assert_eq!(err.category(), "cancellation");
    }

    #[test]
    fn test_precondition_predicates() {
        assert!(HarvestError::precondition("no changes").is_precondition());
        assert!(HarvestError::busy("harvest in flight").is_precondition());
        assert!(!HarvestError::internal("broken").is_precondition());
    }

    #[test]
    fn test_document_too_large_message() {
        let err = HarvestError::DocumentTooLarge {
            document_id: "abc123".into(),
            size: 20480,
            max: 16384,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("abc123"));
        assert!(rendered.contains("20480"));
        assert!(rendered.contains("16384"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing state file");
        let err: HarvestError = io.into();
        assert_eq!(err.category(), "io");
        assert!(err.is_recoverable());
    }
}
