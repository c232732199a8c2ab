// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Health
//!
//! Health is recorded per run and combined across pipelines for the
//! aggregate view. Combination priority:
//!
//! `INITIALIZATION_FAILED > HARVEST_FAILED > any single phase failure > OK`
//!
//! Two *distinct* phase failures across pipelines collapse to
//! `HARVEST_FAILED`, since no single phase explains the aggregate anymore.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HarvestError;

/// Health classification of one pipeline run, or of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EtlHealth {
    Ok,
    InitializationFailed,
    ExtractionFailed,
    TransformationFailed,
    LoadingFailed,
    HarvestFailed,
}

impl EtlHealth {
    /// Whether this value is a single-phase failure
    fn is_phase_failure(self) -> bool {
        matches!(
            self,
            EtlHealth::ExtractionFailed | EtlHealth::TransformationFailed | EtlHealth::LoadingFailed
        )
    }

    /// Combines two health values by priority.
    pub fn combine(self, other: EtlHealth) -> EtlHealth {
        use EtlHealth::*;

        if self == other {
            return self;
        }
        if self == InitializationFailed || other == InitializationFailed {
            return InitializationFailed;
        }
        if self == Ok {
            return other;
        }
        if other == Ok {
            return self;
        }
        // Distinct non-OK values below initialization severity: either one is
        // already HARVEST_FAILED, or two different phases failed.
        debug_assert!(
            self == HarvestFailed || other == HarvestFailed || (self.is_phase_failure() && other.is_phase_failure())
        );
        HarvestFailed
    }

    /// Folds many health values into the aggregate view. An empty set is OK.
    pub fn combine_all<I: IntoIterator<Item = EtlHealth>>(values: I) -> EtlHealth {
        values.into_iter().fold(EtlHealth::Ok, EtlHealth::combine)
    }

    /// Classifies a run failure into health. Cancellation carries no health
    /// change and maps to `None`.
    pub fn from_error(error: &HarvestError) -> Option<EtlHealth> {
        match error {
            HarvestError::Cancelled(_) => None,
            HarvestError::ExtractionFailed { .. } => Some(EtlHealth::ExtractionFailed),
            HarvestError::TransformationFailed { .. } => Some(EtlHealth::TransformationFailed),
            HarvestError::LoadingFailed { .. }
            | HarvestError::LoaderError(_)
            | HarvestError::DocumentTooLarge { .. } => Some(EtlHealth::LoadingFailed),
            _ => Some(EtlHealth::HarvestFailed),
        }
    }

    /// Stable string form, matching the persisted representation
    pub fn as_str(self) -> &'static str {
        match self {
            EtlHealth::Ok => "OK",
            EtlHealth::InitializationFailed => "INITIALIZATION_FAILED",
            EtlHealth::ExtractionFailed => "EXTRACTION_FAILED",
            EtlHealth::TransformationFailed => "TRANSFORMATION_FAILED",
            EtlHealth::LoadingFailed => "LOADING_FAILED",
            EtlHealth::HarvestFailed => "HARVEST_FAILED",
        }
    }
}

impl fmt::Display for EtlHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for EtlHealth {
    fn default() -> Self {
        EtlHealth::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_identity() {
        assert_eq!(EtlHealth::Ok.combine(EtlHealth::LoadingFailed), EtlHealth::LoadingFailed);
        assert_eq!(EtlHealth::ExtractionFailed.combine(EtlHealth::Ok), EtlHealth::ExtractionFailed);
        assert_eq!(EtlHealth::Ok.combine(EtlHealth::Ok), EtlHealth::Ok);
    }

    #[test]
    fn test_initialization_failure_dominates() {
        assert_eq!(
            EtlHealth::InitializationFailed.combine(EtlHealth::HarvestFailed),
            EtlHealth::InitializationFailed
        );
        assert_eq!(
            EtlHealth::LoadingFailed.combine(EtlHealth::InitializationFailed),
            EtlHealth::InitializationFailed
        );
    }

    #[test]
    fn test_distinct_phase_failures_collapse() {
        assert_eq!(
            EtlHealth::ExtractionFailed.combine(EtlHealth::LoadingFailed),
            EtlHealth::HarvestFailed
        );
        assert_eq!(
            EtlHealth::TransformationFailed.combine(EtlHealth::ExtractionFailed),
            EtlHealth::HarvestFailed
        );
    }

    #[test]
    fn test_same_phase_failure_is_kept() {
        assert_eq!(
            EtlHealth::LoadingFailed.combine(EtlHealth::LoadingFailed),
            EtlHealth::LoadingFailed
        );
    }

    #[test]
    fn test_combine_all() {
        assert_eq!(EtlHealth::combine_all([]), EtlHealth::Ok);
        assert_eq!(
            EtlHealth::combine_all([EtlHealth::Ok, EtlHealth::Ok]),
            EtlHealth::Ok
        );
        assert_eq!(
            EtlHealth::combine_all([EtlHealth::Ok, EtlHealth::ExtractionFailed, EtlHealth::LoadingFailed]),
            EtlHealth::HarvestFailed
        );
    }

    #[test]
    fn test_from_error_classification() {
        let err = HarvestError::extraction("p", "boom");
        assert_eq!(EtlHealth::from_error(&err), Some(EtlHealth::ExtractionFailed));

        let err = HarvestError::DocumentTooLarge {
            document_id: "d".into(),
            size: 2,
            max: 1,
        };
        assert_eq!(EtlHealth::from_error(&err), Some(EtlHealth::LoadingFailed));

        let err = HarvestError::cancelled("abort");
        assert_eq!(EtlHealth::from_error(&err), None);

        let err = HarvestError::internal("bug");
        assert_eq!(EtlHealth::from_error(&err), Some(EtlHealth::HarvestFailed));
    }
}
