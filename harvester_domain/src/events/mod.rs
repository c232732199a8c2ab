// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Harvest lifecycle events.

pub mod harvest_events;

pub use harvest_events::{HarvestEventListener, HarvestFinishedEvent, HarvestStartedEvent};
