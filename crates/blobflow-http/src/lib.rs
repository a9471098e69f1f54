//! reqwest-backed implementations of the upload pipeline's collaborator
//! contracts.
//!
//! [`SignedUrlClient`] talks to the signed-URL issuing service (batch
//! requests and the completion call); [`HttpPartTransport`] PUTs part
//! payloads against the signed URLs. Both classify their failures onto the
//! pipeline's error taxonomy so the retry and circuit-breaker layer in
//! `blobflow-core` can act on them.

mod classify;
mod signer;
mod transport;

pub use signer::SignedUrlClient;
pub use transport::HttpPartTransport;
