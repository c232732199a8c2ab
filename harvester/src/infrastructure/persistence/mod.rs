// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Persistence: atomic file replacement, streaming JSON document dumps, and
//! the manager state repository.

pub mod atomic_file;
pub mod json_stream;
pub mod state_repository;

pub use json_stream::{DocumentDump, StreamingDocumentWriter};
pub use state_repository::StateRepository;
