//! Transfer orchestration: the upload pipeline from plan to completion.

use std::sync::Arc;

use blobflow_model::{Chunk, CompletionRequest, ObjectDescriptor, SignedPartBatch};
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::error::{TransferError, TransferResult};
use crate::planner::{self, ChunkPlan};
use crate::resilience::{BreakerRegistry, EndpointClass, with_retries};
use crate::session::UploadSession;
use crate::source::ChunkSource;
use crate::uploader::{PartOutcome, PartTransport, PartUploader, SignedUrlService};

/// The upload pipeline: plans chunks, drives the session manager and part
/// uploader until every part is confirmed, then fires the completion call
/// exactly once.
///
/// The client is cheap to clone via its `Arc`ed collaborators and can run
/// any number of transfers; all of them share the injected breaker
/// registry, so a failing dependency trips one breaker for the whole
/// process.
#[derive(Debug)]
pub struct TransferClient {
    config: TransferConfig,
    signer: Arc<dyn SignedUrlService>,
    transport: Arc<dyn PartTransport>,
    breakers: Arc<BreakerRegistry>,
}

impl TransferClient {
    /// Create a client over the two collaborator contracts.
    ///
    /// Fails with [`TransferError::InvalidConfiguration`] when the config
    /// violates protocol constraints (chunk size below the 5 MiB minimum,
    /// zero batch size or concurrency, out-of-range expiration).
    pub fn new(
        config: TransferConfig,
        signer: Arc<dyn SignedUrlService>,
        transport: Arc<dyn PartTransport>,
        breakers: Arc<BreakerRegistry>,
    ) -> TransferResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            signer,
            transport,
            breakers,
        })
    }

    /// Upload `source` as `bucket_key/object_key`, returning the finished
    /// object descriptor.
    ///
    /// Fatal errors abort the whole transfer with no partial completion; a
    /// caller must start a new session to resume. Cancellation before
    /// completion leaves no remote artifact.
    pub async fn upload<S: ChunkSource>(
        &self,
        bucket_key: &str,
        object_key: &str,
        mut source: S,
        user_metadata: serde_json::Map<String, serde_json::Value>,
        cancel: &CancelToken,
    ) -> TransferResult<ObjectDescriptor> {
        let plan = planner::plan(source.len(), self.config.chunk_size)?;
        let mut session = UploadSession::new(bucket_key, object_key, plan.total_parts());

        info!(
            bucket = %bucket_key,
            object = %object_key,
            size = plan.file_size(),
            parts = plan.total_parts(),
            concurrency = self.config.concurrency,
            "starting transfer"
        );

        self.run_parts(&plan, &mut session, &mut source, cancel)
            .await?;

        let descriptor = self
            .complete(&session, bucket_key, object_key, user_metadata)
            .await?;

        if descriptor.size != plan.file_size() {
            return Err(TransferError::ProtocolInvariant(format!(
                "completed object reports {} bytes, expected {}",
                descriptor.size,
                plan.file_size()
            )));
        }

        info!(
            bucket = %bucket_key,
            object = %object_key,
            object_id = %descriptor.object_id,
            size = descriptor.size,
            "transfer complete"
        );
        Ok(descriptor)
    }

    /// Drive part uploads until every part of the plan is confirmed.
    ///
    /// The session (pool + cursor) is mutated only here, by this single
    /// owner; the spawned uploads are pure functions of `(chunk, url)`.
    /// Batch refills only happen while nothing is in flight, so a part is
    /// never dispatched twice concurrently.
    async fn run_parts<S: ChunkSource>(
        &self,
        plan: &ChunkPlan,
        session: &mut UploadSession,
        source: &mut S,
        cancel: &CancelToken,
    ) -> TransferResult<()> {
        let uploader = PartUploader::new(
            self.transport.clone(),
            self.breakers.clone(),
            self.config.resiliency.clone(),
        );
        let mut inflight: JoinSet<(u32, TransferResult<PartOutcome>)> = JoinSet::new();
        // Set when a PUT reported expiry: stop dispatching and let the
        // in-flight parts resolve before refilling the pool.
        let mut draining = false;

        loop {
            if cancel.is_canceled() {
                inflight.abort_all();
                return Err(TransferError::Canceled);
            }

            while !draining && inflight.len() < self.config.concurrency {
                let Some((part_number, url)) = session.take_next() else {
                    break;
                };
                let range = plan.range_of(part_number).ok_or_else(|| {
                    TransferError::ProtocolInvariant(format!(
                        "pooled URL for part {part_number} outside the plan"
                    ))
                })?;
                let payload = source.read_range(range).await?;
                let chunk = Chunk {
                    part_number,
                    range,
                    payload,
                };
                let uploader = uploader.clone();
                inflight.spawn(async move {
                    let outcome = uploader.upload_part(&chunk, &url).await;
                    (chunk.part_number, outcome)
                });
            }

            if inflight.is_empty() {
                draining = false;
                if session.is_complete() {
                    return Ok(());
                }
                // Cancellation must also interrupt a refill stuck in its
                // retry loop; the session is only mutated once the batch
                // arrived, so dropping the refill future is safe.
                tokio::select! {
                    refilled = self.refill(session) => refilled?,
                    () = cancel.canceled() => return Err(TransferError::Canceled),
                }
                continue;
            }

            tokio::select! {
                joined = inflight.join_next() => {
                    let Some(joined) = joined else { continue };
                    let (part_number, outcome) = joined
                        .map_err(|e| TransferError::Internal(anyhow::Error::new(e)))?;
                    match outcome? {
                        PartOutcome::Uploaded => {
                            session.confirm_part(part_number)?;
                        }
                        PartOutcome::Expired => {
                            debug!(part = part_number, "discarding pool after expiry");
                            session.invalidate_pool();
                            draining = true;
                        }
                    }
                }
                () = cancel.canceled() => {
                    inflight.abort_all();
                    return Err(TransferError::Canceled);
                }
            }
        }
    }

    /// Fetch the next signed batch and absorb it into the session pool.
    async fn refill(&self, session: &mut UploadSession) -> TransferResult<()> {
        let request = session
            .refill_request(self.config.batch_size, self.config.expiration_minutes)
            .ok_or_else(|| {
                TransferError::ProtocolInvariant("batch refill requested after completion".into())
            })?;

        let breaker = self.breakers.breaker(EndpointClass::SignedUrls);
        let response = with_retries(&breaker, &self.config.resiliency, || {
            self.signer.signed_part_urls(&request)
        })
        .await?;

        if response.urls.len() != request.parts as usize {
            return Err(TransferError::ProtocolInvariant(format!(
                "requested {} signed URLs, service returned {}",
                request.parts,
                response.urls.len()
            )));
        }

        let batch = SignedPartBatch {
            upload_key: response.upload_key,
            first_part: request.first_part,
            urls: response.urls,
            expires_at: Utc::now()
                + chrono::Duration::minutes(i64::from(request.minutes_expiration)),
        };
        session.absorb_batch(batch)
    }

    /// Fire the completion call, exactly once, after the last confirmation.
    async fn complete(
        &self,
        session: &UploadSession,
        bucket_key: &str,
        object_key: &str,
        user_metadata: serde_json::Map<String, serde_json::Value>,
    ) -> TransferResult<ObjectDescriptor> {
        let remaining = session.remaining_parts();
        if remaining > 0 {
            return Err(TransferError::IncompleteTransfer { remaining });
        }
        let upload_key = session.upload_key().ok_or_else(|| {
            TransferError::ProtocolInvariant(
                "completing a transfer that never acquired an upload key".into(),
            )
        })?;

        let request = CompletionRequest {
            bucket_key: bucket_key.to_owned(),
            object_key: object_key.to_owned(),
            upload_key: upload_key.to_owned(),
            user_metadata,
        };

        let breaker = self.breakers.breaker(EndpointClass::Completion);
        with_retries(&breaker, &self.config.resiliency, || {
            self.signer.complete_upload(&request)
        })
        .await
    }
}
