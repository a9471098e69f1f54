//! Collaborator contracts and single-part upload with expiry detection.

use std::sync::Arc;

use async_trait::async_trait;
use blobflow_model::{Chunk, CompletionRequest, ObjectDescriptor, SignedUrlRequest, SignedUrlResponse};
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::ResiliencyConfig;
use crate::error::{TransferError, TransferResult};
use crate::resilience::{BreakerRegistry, EndpointClass, with_retries};

/// The signed-URL issuing service: batches of part URLs plus the
/// completion call.
///
/// Implementations classify their own failures: timeouts, 5xx and
/// throttling become [`TransferError::Transient`]; other 4xx become
/// [`TransferError::NonRetryable`]. The retry/circuit-breaker wrapping is
/// applied by the pipeline, not by implementations.
#[async_trait]
pub trait SignedUrlService: Send + Sync {
    /// Request a batch of signed part-upload URLs.
    async fn signed_part_urls(&self, request: &SignedUrlRequest)
    -> TransferResult<SignedUrlResponse>;

    /// Finalize the transfer, attaching opaque user metadata.
    async fn complete_upload(&self, request: &CompletionRequest)
    -> TransferResult<ObjectDescriptor>;
}

/// The raw byte transport: one HTTP PUT of a part's payload against its
/// signed URL.
///
/// Implementations report expiry (403) as
/// [`TransferError::ExpiredUrl`] carrying `part_number`, timeouts/5xx as
/// [`TransferError::Transient`], and other 4xx as
/// [`TransferError::NonRetryable`].
#[async_trait]
pub trait PartTransport: Send + Sync {
    /// PUT `payload` to `url`.
    async fn put_part(&self, part_number: u32, url: &str, payload: Bytes) -> TransferResult<()>;
}

/// Outcome of uploading one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOutcome {
    /// The part was stored; the cursor may advance.
    Uploaded,
    /// The signed URL expired (403). The cursor must not advance; the
    /// pool must be discarded and refilled starting at this part.
    Expired,
}

/// Uploads single parts under the resiliency policy.
///
/// A part upload is a pure function of `(chunk, url)`: all shared state
/// (pool, cursor) stays with the session's coordinator, which is what makes
/// concurrent part uploads safe.
#[derive(Debug, Clone)]
pub struct PartUploader {
    transport: Arc<dyn PartTransport>,
    breakers: Arc<BreakerRegistry>,
    policy: ResiliencyConfig,
}

impl PartUploader {
    /// Create an uploader over `transport`, drawing breakers from the
    /// shared registry.
    #[must_use]
    pub fn new(
        transport: Arc<dyn PartTransport>,
        breakers: Arc<BreakerRegistry>,
        policy: ResiliencyConfig,
    ) -> Self {
        Self {
            transport,
            breakers,
            policy,
        }
    }

    /// Transmit one part to its signed URL.
    ///
    /// Transient failures are retried per the policy; exhausting the budget
    /// aborts the transfer. Expiry is reported as
    /// [`PartOutcome::Expired`] without touching the retry budget.
    pub async fn upload_part(&self, chunk: &Chunk, url: &str) -> TransferResult<PartOutcome> {
        let breaker = self.breakers.breaker(EndpointClass::PartUpload);
        let result = with_retries(&breaker, &self.policy, || {
            self.transport
                .put_part(chunk.part_number, url, chunk.payload.clone())
        })
        .await;

        match result {
            Ok(()) => {
                debug!(
                    part = chunk.part_number,
                    bytes = chunk.len(),
                    "part uploaded"
                );
                Ok(PartOutcome::Uploaded)
            }
            Err(TransferError::ExpiredUrl { part_number }) => {
                warn!(part = part_number, "signed URL expired mid-transfer");
                Ok(PartOutcome::Expired)
            }
            Err(err) => Err(err),
        }
    }
}

impl std::fmt::Debug for dyn PartTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PartTransport")
    }
}

impl std::fmt::Debug for dyn SignedUrlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SignedUrlService")
    }
}
