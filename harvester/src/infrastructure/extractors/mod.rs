// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Generic extractors shipped with the framework. Real deployments bring
//! their own source-specific extractor; the JSON directory extractor covers
//! file-drop deployments and smoke tests.

pub mod json_file;

pub use json_file::JsonFileExtractor;
