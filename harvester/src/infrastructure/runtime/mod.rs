// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Runtime: supervised task spawning for the harvest orchestrator and
//! per-pipeline workers.

pub mod supervisor;

pub use supervisor::{join_supervised, spawn_supervised, AppResult};
