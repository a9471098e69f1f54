//! Resilient large-object upload pipeline.
//!
//! This crate implements the transfer core: splitting a byte stream into
//! size-bounded parts, acquiring and refilling batches of signed part-URLs
//! under a shared upload key, recovering from URL expiry mid-transfer, and
//! wrapping every remote call in a retry/backoff/circuit-breaker policy.
//!
//! # Architecture
//!
//! ```text
//! TransferClient (orchestrator, sequential or bounded-parallel)
//!        |
//!        +-- ChunkPlan          (partitions [0, file_size) into parts)
//!        +-- UploadSession      (upload key, cursor, FIFO URL pool)
//!        +-- PartUploader       (one part PUT, expiry detection)
//!        |
//!        v
//! resilience (retry combinator + per-endpoint circuit breakers)
//!        |
//!        v
//! SignedUrlService / PartTransport (collaborator contracts)
//! ```
//!
//! The remote side is abstracted behind [`SignedUrlService`] and
//! [`PartTransport`]; `blobflow-http` provides reqwest-backed
//! implementations, and tests inject in-process stubs.

pub mod cancel;
pub mod config;
pub mod error;
pub mod planner;
pub mod resilience;
pub mod session;
pub mod source;
pub mod transfer;
pub mod uploader;

pub use cancel::CancelToken;
pub use config::{ResiliencyConfig, TransferConfig, MIN_CHUNK_SIZE};
pub use error::{TransferError, TransferResult};
pub use planner::ChunkPlan;
pub use resilience::{BreakerRegistry, CircuitBreaker, CircuitState, EndpointClass};
pub use session::UploadSession;
pub use source::{BytesSource, ChunkSource, FileSource};
pub use transfer::TransferClient;
pub use uploader::{PartOutcome, PartTransport, PartUploader, SignedUrlService};
