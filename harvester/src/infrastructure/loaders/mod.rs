// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Loader subsystem: size-bounded batch assembly over the document stream,
//! with a disk adapter (streaming JSON dump) and an HTTP bulk adapter
//! (per-item failure isolation with a repair pass).

pub mod batch;
pub mod disk_loader;
pub mod http_bulk_loader;

pub use batch::{BatchSink, BatchingLoader, DocumentBatch};
pub use disk_loader::{disk_loader, DiskSink};
pub use http_bulk_loader::{
    http_bulk_loader, normalize_bulk_url, BulkResponse, BulkTransport, HttpBulkSink, ReqwestTransport,
};
