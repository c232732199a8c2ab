// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! The driver program's process exit contract:
//!
//! - **0**: normal shutdown
//! - **1**: unrecoverable initialization error
//! - **2**: configuration error

use std::fmt;

/// Exit codes for the harvester driver program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Normal shutdown (0)
    #[default]
    Success = 0,

    /// Unrecoverable initialization error (1)
    /// - pipeline initialization failed
    /// - cache directory not writable
    /// - REST listener could not bind
    InitError = 1,

    /// Configuration error (2)
    /// - invalid parameter name or value
    /// - malformed configuration file
    /// - missing required configuration
    ConfigError = 2,
}

impl ExitCode {
    /// Convert to i32 for use with `std::process::exit`
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map an error to an exit code by inspecting its rendered message.
    ///
    /// Anything that reads as a configuration problem exits 2; every other
    /// startup failure exits 1.
    pub fn from_error(error: &dyn std::error::Error) -> Self {
        let message = error.to_string().to_lowercase();
        if message.contains("config") || message.contains("parameter") || message.contains("invalid name") {
            ExitCode::ConfigError
        } else {
            ExitCode::InitError
        }
    }

    /// Human-readable description of this exit code
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Normal shutdown",
            ExitCode::InitError => "Unrecoverable initialization error",
            ExitCode::ConfigError => "Configuration error",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Success)
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_i32())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code.as_i32()
    }
}
