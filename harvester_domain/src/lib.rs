// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metadata Harvester Domain Layer
//!
//! Pure business logic for the harvester framework: no runtime, no I/O, no
//! logging backend. The application crate composes these pieces into running
//! pipelines.
//!
//! ## Contents
//!
//! - **Errors** - the [`HarvestError`] taxonomy shared by every layer
//! - **Entities** - ETL state and health machines, documents, the persisted
//!   manager state record
//! - **Value objects** - typed configuration parameters and bounded
//!   timestamped histories
//! - **Services** - SHA-1 digests plus the extractor/transformer/loader port
//!   traits that per-source deployments implement
//! - **Events** - harvest lifecycle notifications for observer hooks
//!
//! ## Design
//!
//! ETL phases are small interfaces composed by the pipeline, not an
//! inheritance tree: an extractor yields a lazy record stream, a transformer
//! maps one record to at most one document, and a loader drains a document
//! stream into a sink. Parameters are a tagged variant with per-variant
//! parsing rather than a subclass per type.

pub mod entities;
pub mod error;
pub mod events;
pub mod services;
pub mod value_objects;

pub use entities::{
    DocumentEnvelope, EtlHealth, EtlInfo, EtlState, ManagerState, RawRecord,
};
pub use error::HarvestError;
pub use events::{HarvestEventListener, HarvestFinishedEvent, HarvestStartedEvent};
pub use services::{
    DocumentStream, Extractor, HarvestGate, LoadReport, Loader, LoaderContext, RecordStream,
    SourceDescriptor, Transformer,
};
pub use value_objects::{Parameter, ParameterKind, ParameterValue, TimestampedEntry, TimestampedHistory};
