// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metadata Harvester
//!
//! A long-running service that periodically extracts records from a
//! third-party source, transforms them into a canonical document shape, and
//! loads them into a downstream sink - an HTTP search index or a file on
//! disk. Deployed once per source: the deployment registers its pipelines at
//! startup and an operator drives them over REST.
//!
//! ## Layers
//!
//! - **Application** - the ETL lifecycle engine: per-pipeline state machines
//!   ([`application::services::EtlPipeline`]) and the aggregate orchestrator
//!   ([`application::services::EtlManager`])
//! - **Infrastructure** - the parameter registry, persistence (atomic JSON
//!   state files, streaming document dumps), the batching loaders (disk and
//!   HTTP bulk), supervised task runtime, and logging
//! - **Presentation** - the axum REST surface
//!
//! The domain crate supplies the state machines, typed parameters, digests,
//! and the extractor/transformer/loader port traits; the bootstrap crate
//! supplies cancellation tokens, signals, and exit codes.

pub mod application;
pub mod infrastructure;
pub mod presentation;
