//! HTTP client for the signed-URL issuing service.

use std::fmt;

use anyhow::Context;
use async_trait::async_trait;
use blobflow_core::{SignedUrlService, TransferResult};
use blobflow_model::{CompletionRequest, ObjectDescriptor, SignedUrlRequest, SignedUrlResponse};
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::classify::{classify_response, transport_error};

/// Client for the service that mints signed part-upload URLs and finalizes
/// transfers.
///
/// Batch requests go to
/// `GET {base_url}/buckets/{bucket}/objects/{object}/signedupload` with
/// `firstPart`, `parts`, `minutesExpiration` and (after the first batch)
/// `uploadKey` query parameters; completion POSTs to the same path with the
/// upload key and user metadata as a JSON body.
#[derive(Clone, TypedBuilder)]
pub struct SignedUrlClient {
    /// Service base URL, e.g. `https://storage.example.com/v2`.
    #[builder(setter(into))]
    base_url: String,

    /// Bearer token attached to every request, when the service requires
    /// one.
    #[builder(default, setter(strip_option, into))]
    bearer_token: Option<String>,

    /// Underlying HTTP client; share one across clients to reuse
    /// connections.
    #[builder(default)]
    http: Client,
}

impl SignedUrlClient {
    fn object_url(&self, bucket_key: &str, object_key: &str) -> String {
        format!(
            "{}/buckets/{bucket_key}/objects/{object_key}/signedupload",
            self.base_url.trim_end_matches('/')
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl SignedUrlService for SignedUrlClient {
    async fn signed_part_urls(
        &self,
        request: &SignedUrlRequest,
    ) -> TransferResult<SignedUrlResponse> {
        let mut builder = self
            .http
            .get(self.object_url(&request.bucket_key, &request.object_key))
            .query(&[
                ("firstPart", request.first_part.to_string()),
                ("parts", request.parts.to_string()),
                ("minutesExpiration", request.minutes_expiration.to_string()),
            ]);
        if let Some(key) = &request.upload_key {
            builder = builder.query(&[("uploadKey", key.as_str())]);
        }

        debug!(
            bucket = %request.bucket_key,
            object = %request.object_key,
            first_part = request.first_part,
            parts = request.parts,
            "requesting signed URL batch"
        );

        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }

        let signed = response
            .json::<SignedUrlResponse>()
            .await
            .context("decoding signed URL batch response")?;
        Ok(signed)
    }

    async fn complete_upload(
        &self,
        request: &CompletionRequest,
    ) -> TransferResult<ObjectDescriptor> {
        let body = json!({
            "uploadKey": request.upload_key,
            "userMetadata": request.user_metadata,
        });

        debug!(
            bucket = %request.bucket_key,
            object = %request.object_key,
            "finalizing transfer"
        );

        let response = self
            .authorized(
                self.http
                    .post(self.object_url(&request.bucket_key, &request.object_key))
                    .json(&body),
            )
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_response(status, &body));
        }

        let descriptor = response
            .json::<ObjectDescriptor>()
            .await
            .context("decoding completion response")?;
        Ok(descriptor)
    }
}

// Manual impl keeps the bearer token out of logs.
impl fmt::Debug for SignedUrlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedUrlClient")
            .field("base_url", &self.base_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}
