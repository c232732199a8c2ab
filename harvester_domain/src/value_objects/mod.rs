// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Value objects: typed configuration parameters and bounded timestamped
//! histories.

pub mod parameter;
pub mod timestamped_history;

pub use parameter::{
    is_valid_name, sanitize_name, AllowedValuesProvider, Parameter, ParameterKind, ParameterValue,
};
pub use timestamped_history::{TimestampedEntry, TimestampedHistory};
