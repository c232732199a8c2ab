// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Bulk Loader
//!
//! Pushes batches at a search index's bulk endpoint. Each document becomes
//! two newline-terminated lines:
//!
//! ```text
//! {"index":{"_id":"<documentId>"}}
//! <docJson>
//! ```
//!
//! The concatenated body is POSTed as `application/json`, optionally with
//! `Authorization: Basic <base64(user:pass)>`. A non-2xx response or a
//! request timeout raises a loader error for the whole batch.
//!
//! ## Per-item failure isolation
//!
//! When the sink flags per-item errors, the adapter runs a repair pass: for
//! every failed item whose error reason names an unparseable field, that
//! field is nulled on the submitted document and the repaired documents are
//! reissued as one follow-up batch. Non-repairable items are logged; the
//! call still succeeds as long as something in the batch made it in.
//!
//! ## URL normalization
//!
//! A configured URL that lacks the bulk-endpoint path suffix gets it
//! appended; the query string stays where it is, and an already-suffixed
//! URL is left alone. The suffix is backend-specific and lives in one
//! place, [`BULK_SUFFIX`].

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use harvester_domain::services::loader::LoaderContext;
use harvester_domain::value_objects::Parameter;
use harvester_domain::{DocumentEnvelope, HarvestError};

use super::batch::{BatchSink, BatchingLoader};

/// Path suffix of the sink's bulk endpoint
pub const BULK_SUFFIX: &str = "_bulk";

/// Matches sink error reasons that name an unparseable field, e.g.
/// `failed to parse field [geoLocations]`.
static FIELD_ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:failed to parse|cannot parse)(?: field)?\s*\[?"?([A-Za-z0-9_.]+)"?\]?"#)
        .expect("literal field-error regex")
});

/// Parsed bulk response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItem {
    pub index: BulkItemStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemStatus {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub reason: String,
}

/// Wire seam of the bulk adapter, so tests can script sink responses.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    async fn post(
        &self,
        url: &Url,
        body: String,
        basic_auth: Option<&str>,
        timeout: Duration,
    ) -> Result<BulkResponse, HarvestError>;
}

/// Production transport over `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| HarvestError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BulkTransport for ReqwestTransport {
    async fn post(
        &self,
        url: &Url,
        body: String,
        basic_auth: Option<&str>,
        timeout: Duration,
    ) -> Result<BulkResponse, HarvestError> {
        let mut request = self
            .client
            .post(url.clone())
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(auth) = basic_auth {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HarvestError::loader(format!("bulk request to '{}' timed out", url))
            } else {
                HarvestError::loader(format!("bulk request to '{}' failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::loader(format!(
                "bulk endpoint '{}' answered {}",
                url, status
            )));
        }

        response
            .json::<BulkResponse>()
            .await
            .map_err(|e| HarvestError::loader(format!("unreadable bulk response: {}", e)))
    }
}

/// Appends the bulk suffix when missing; never double-appends, and leaves
/// the query string untouched.
pub fn normalize_bulk_url(url: &Url) -> Result<Url, HarvestError> {
    let trimmed = url.path().trim_end_matches('/');
    if trimmed.ends_with(&format!("/{}", BULK_SUFFIX)) {
        return Ok(url.clone());
    }

    let mut normalized = url.clone();
    {
        let mut segments = normalized
            .path_segments_mut()
            .map_err(|_| HarvestError::invalid_config(format!("'{}' cannot carry a bulk path", url)))?;
        segments.pop_if_empty();
        segments.push(BULK_SUFFIX);
    }
    Ok(normalized)
}

/// Sink adapter for an HTTP bulk endpoint.
pub struct HttpBulkSink {
    url_param: Arc<Parameter>,
    user_param: Arc<Parameter>,
    password_param: Arc<Parameter>,
    timeout_param: Arc<Parameter>,
    transport: Box<dyn BulkTransport>,
    bulk_url: Option<Url>,
    basic_auth: Option<String>,
    timeout: Duration,
}

impl HttpBulkSink {
    pub fn new(
        url_param: Arc<Parameter>,
        user_param: Arc<Parameter>,
        password_param: Arc<Parameter>,
        timeout_param: Arc<Parameter>,
        transport: Box<dyn BulkTransport>,
    ) -> Self {
        Self {
            url_param,
            user_param,
            password_param,
            timeout_param,
            transport,
            bulk_url: None,
            basic_auth: None,
            timeout: Duration::from_secs(30),
        }
    }

    fn metadata_line(id: &str) -> String {
        format!("{{\"index\":{{\"_id\":\"{}\"}}}}", id)
    }

    fn serialize_batch(documents: &[DocumentEnvelope]) -> Result<String, HarvestError> {
        let mut body = String::new();
        for document in documents {
            body.push_str(&Self::metadata_line(&document.id));
            body.push('\n');
            body.push_str(&serde_json::to_string(&document.body)?);
            body.push('\n');
        }
        Ok(body)
    }

    /// Submits one batch; on per-item field errors runs a single repair pass
    /// over the failed documents.
    async fn submit(&mut self, documents: Vec<DocumentEnvelope>, allow_repair: bool) -> Result<(), HarvestError> {
        let url = self
            .bulk_url
            .clone()
            .ok_or_else(|| HarvestError::internal("bulk sink received a batch before open"))?;

        let body = Self::serialize_batch(&documents)?;
        let response = self
            .transport
            .post(&url, body, self.basic_auth.as_deref(), self.timeout)
            .await?;

        if !response.errors {
            return Ok(());
        }

        let mut by_id: HashMap<String, DocumentEnvelope> =
            documents.into_iter().map(|d| (d.id.clone(), d)).collect();

        let mut repaired = Vec::new();
        let mut errored = 0usize;
        let mut unrepairable = 0usize;

        for item in &response.items {
            let error = match &item.index.error {
                Some(error) => error,
                None => continue,
            };
            errored += 1;

            let document = match by_id.remove(&item.index.id) {
                Some(document) => document,
                None => continue,
            };

            let field = FIELD_ERROR_RE
                .captures(&error.reason)
                .and_then(|captures| captures.get(1))
                .map(|m| m.as_str().to_string());

            match field {
                Some(field) if allow_repair => {
                    let mut document = document;
                    if document.null_field(&field) {
                        info!(
                            document = %document.id,
                            field = %field,
                            "nulling unparseable field for repair pass"
                        );
                        repaired.push(document);
                    } else {
                        unrepairable += 1;
                        warn!(
                            document = %document.id,
                            reason = %error.reason,
                            "sink rejected document; named field not present"
                        );
                    }
                }
                _ => {
                    unrepairable += 1;
                    warn!(
                        document = %document.id,
                        reason = %error.reason,
                        "sink rejected document; not repairable"
                    );
                }
            }
        }

        let succeeded = response.items.len().saturating_sub(errored);

        if !repaired.is_empty() {
            let count = repaired.len();
            info!(documents = count, "reissuing repaired documents");
            Box::pin(self.submit(repaired, false)).await?;
            return Ok(());
        }

        if succeeded == 0 && unrepairable > 0 {
            return Err(HarvestError::loader(format!(
                "every document in the batch was rejected ({} items)",
                unrepairable
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl BatchSink for HttpBulkSink {
    async fn open(&mut self, _ctx: &LoaderContext) -> Result<(), HarvestError> {
        let url = self.url_param.url_value().ok_or_else(|| {
            HarvestError::precondition(format!(
                "parameter '{}' is not configured, nowhere to submit documents",
                self.url_param.composite_key()
            ))
        })?;

        self.bulk_url = Some(normalize_bulk_url(&url)?);

        let user = self.user_param.string_value();
        self.basic_auth = if user.is_empty() {
            None
        } else {
            let credentials = format!("{}:{}", user, self.password_param.string_value());
            Some(format!("Basic {}", BASE64.encode(credentials)))
        };

        let timeout_secs = self.timeout_param.int_value().max(1) as u64;
        self.timeout = Duration::from_secs(timeout_secs);
        Ok(())
    }

    fn entry_size(&self, document: &DocumentEnvelope) -> Result<usize, HarvestError> {
        // Metadata line + payload line, each newline-terminated.
        Ok(Self::metadata_line(&document.id).len() + document.body_bytes()?.len() + 2)
    }

    async fn load_batch(&mut self, documents: Vec<DocumentEnvelope>) -> Result<(), HarvestError> {
        self.submit(documents, true).await
    }

    async fn close(&mut self, _any_loaded: bool) -> Result<(), HarvestError> {
        self.bulk_url = None;
        Ok(())
    }
}

/// Batching HTTP bulk loader over the standard submission parameters.
pub fn http_bulk_loader(
    url_param: Arc<Parameter>,
    user_param: Arc<Parameter>,
    password_param: Arc<Parameter>,
    timeout_param: Arc<Parameter>,
    max_batch_size: Arc<Parameter>,
    transport: Box<dyn BulkTransport>,
) -> BatchingLoader<HttpBulkSink> {
    BatchingLoader::new(
        HttpBulkSink::new(url_param, user_param, password_param, timeout_param, transport),
        max_batch_size,
    )
}
