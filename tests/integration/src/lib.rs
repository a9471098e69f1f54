//! End-to-end tests for the blobflow upload pipeline.
//!
//! The remote side is replaced with in-process stubs implementing the
//! [`SignedUrlService`] and [`PartTransport`] contracts, scripted to
//! inject expiry, transient failures, and latency. Every remote
//! interaction is appended to a shared event log so tests can assert on
//! ordering (for instance, that completion fires only after the last
//! part confirmation).

use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blobflow_core::{
    BreakerRegistry, PartTransport, ResiliencyConfig, SignedUrlService, TransferClient,
    TransferConfig, TransferError, TransferResult,
};
use blobflow_model::{
    CompletionRequest, ObjectDescriptor, SignedUrlRequest, SignedUrlResponse,
};
use bytes::Bytes;
use parking_lot::Mutex;
use rand::RngExt;

/// Minimum part size, used to build payloads of an exact part count.
pub const MIB: usize = 1024 * 1024;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// One remote interaction, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A signed URL batch was issued.
    Batch {
        /// First part the batch covers.
        first_part: u32,
        /// URLs in the batch.
        parts: u32,
        /// The upload key the request carried, if any.
        upload_key: Option<String>,
    },
    /// A part PUT was accepted.
    Put {
        /// The stored part.
        part: u32,
        /// Payload size in bytes.
        bytes: usize,
    },
    /// A part PUT was rejected with expiry.
    Expired {
        /// The rejected part.
        part: u32,
    },
    /// The completion call was accepted.
    Complete,
}

/// Shared, ordered record of every remote interaction.
pub type EventLog = Arc<Mutex<Vec<Event>>>;

/// Count the events matching `pred`.
pub fn count_events(log: &EventLog, pred: impl Fn(&Event) -> bool) -> usize {
    log.lock().iter().filter(|e| pred(e)).count()
}

/// Signed-URL service stub.
///
/// Mints `stub-key` on the first batch of a transfer and echoes the
/// requested key back on later ones, the way the real service does.
#[derive(Debug)]
pub struct StubSigner {
    log: EventLog,
    /// Leading `signed_part_urls` calls that fail with 503 before the
    /// stub starts succeeding.
    pub fail_batches: AtomicUsize,
    /// Leading `complete_upload` calls that fail with 503.
    pub fail_completions: AtomicUsize,
    /// Size reported back in the completion descriptor.
    pub object_size: u64,
    batch_calls: AtomicUsize,
    completion_calls: AtomicUsize,
}

impl StubSigner {
    /// Create a signer reporting `object_size` at completion.
    #[must_use]
    pub fn new(log: EventLog, object_size: u64) -> Self {
        Self {
            log,
            fail_batches: AtomicUsize::new(0),
            fail_completions: AtomicUsize::new(0),
            object_size,
            batch_calls: AtomicUsize::new(0),
            completion_calls: AtomicUsize::new(0),
        }
    }

    /// Total `signed_part_urls` calls, including failed ones.
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Total `complete_upload` calls, including failed ones.
    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignedUrlService for StubSigner {
    async fn signed_part_urls(
        &self,
        request: &SignedUrlRequest,
    ) -> TransferResult<SignedUrlResponse> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_batches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransferError::transient_status(503, "batch unavailable"));
        }

        self.log.lock().push(Event::Batch {
            first_part: request.first_part,
            parts: request.parts,
            upload_key: request.upload_key.clone(),
        });

        Ok(SignedUrlResponse {
            upload_key: request
                .upload_key
                .clone()
                .unwrap_or_else(|| "stub-key".to_owned()),
            urls: (0..request.parts)
                .map(|i| format!("https://stub/part/{}", request.first_part + i))
                .collect(),
        })
    }

    async fn complete_upload(
        &self,
        request: &CompletionRequest,
    ) -> TransferResult<ObjectDescriptor> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_completions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransferError::transient_status(503, "completion unavailable"));
        }

        self.log.lock().push(Event::Complete);
        Ok(ObjectDescriptor {
            bucket_key: request.bucket_key.clone(),
            object_key: request.object_key.clone(),
            object_id: format!("{}/{}", request.bucket_key, request.object_key),
            size: self.object_size,
            content_type: Some("application/octet-stream".to_owned()),
            sha1: None,
            location: None,
        })
    }
}

/// Part transport stub with expiry, failure, and latency injection.
#[derive(Debug)]
pub struct StubTransport {
    log: EventLog,
    /// Every Nth PUT (by global call index) is rejected with 403.
    /// Zero disables injection.
    pub expire_every: usize,
    /// Leading PUT calls that fail with 503 before the stub starts
    /// accepting.
    pub fail_puts: AtomicUsize,
    /// Upper bound for a random per-PUT delay, in milliseconds. The
    /// actual delay is drawn from `[bound/2, bound]` so a nonzero bound
    /// always yields real overlap between concurrent PUTs.
    pub max_latency_ms: u64,
    calls: AtomicUsize,
    inflight: AtomicUsize,
    max_inflight: AtomicUsize,
}

impl StubTransport {
    /// Create a transport with no injected faults.
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            expire_every: 0,
            fail_puts: AtomicUsize::new(0),
            max_latency_ms: 0,
            calls: AtomicUsize::new(0),
            inflight: AtomicUsize::new(0),
            max_inflight: AtomicUsize::new(0),
        }
    }

    /// Total PUT calls, including rejected ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// High-water mark of concurrent PUTs.
    pub fn max_inflight(&self) -> usize {
        self.max_inflight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PartTransport for StubTransport {
    async fn put_part(&self, part_number: u32, _url: &str, payload: Bytes) -> TransferResult<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let concurrent = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(concurrent, Ordering::SeqCst);

        if self.max_latency_ms > 0 {
            let delay = rand::rng().random_range(self.max_latency_ms / 2..=self.max_latency_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inflight.fetch_sub(1, Ordering::SeqCst);

        if self
            .fail_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransferError::transient_status(503, "put unavailable"));
        }

        if self.expire_every > 0 && call % self.expire_every == 0 {
            self.log.lock().push(Event::Expired { part: part_number });
            return Err(TransferError::ExpiredUrl { part_number });
        }

        self.log.lock().push(Event::Put {
            part: part_number,
            bytes: payload.len(),
        });
        Ok(())
    }
}

/// Resiliency policy with millisecond intervals so breaker tests run fast.
#[must_use]
pub fn fast_resiliency() -> ResiliencyConfig {
    ResiliencyConfig {
        retry_count: 3,
        backoff_interval: Duration::from_millis(1),
        circuit_breaker_interval: Duration::from_millis(60),
    }
}

/// Build a client over the stubs.
pub fn test_client(
    signer: Arc<StubSigner>,
    transport: Arc<StubTransport>,
    config: TransferConfig,
) -> TransferClient {
    init_tracing();
    let breakers = Arc::new(BreakerRegistry::new(config.resiliency.clone()));
    TransferClient::new(config, signer, transport, breakers).expect("test config is valid")
}

mod test_pipeline;
