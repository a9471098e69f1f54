//! Raw part PUTs against signed URLs.

use async_trait::async_trait;
use blobflow_core::{PartTransport, TransferError, TransferResult};
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use tracing::warn;

use crate::classify::{classify_response, transport_error};

/// Uploads part payloads with plain HTTP PUT.
///
/// Signed URLs carry their own authorization in the query string, so no
/// credentials are attached here. A 403 means the URL's window has closed
/// and is reported as [`TransferError::ExpiredUrl`] so the pipeline can
/// refresh its pool.
#[derive(Debug, Clone, Default)]
pub struct HttpPartTransport {
    http: Client,
}

impl HttpPartTransport {
    /// Wrap an existing client, sharing its connection pool.
    #[must_use]
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PartTransport for HttpPartTransport {
    async fn put_part(&self, part_number: u32, url: &str, payload: Bytes) -> TransferResult<()> {
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            warn!(part = part_number, "signed URL rejected the PUT with 403");
            return Err(TransferError::ExpiredUrl { part_number });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }
        Ok(())
    }
}
