//! Wire and data types for the blobflow resilient upload client.
//!
//! This crate holds the plain serializable types exchanged with the
//! signed-URL issuing service, plus the in-memory chunk types the pipeline
//! passes between its components. It carries no behavior beyond small
//! accessors; all pipeline logic lives in `blobflow-core`.

pub mod input;
pub mod output;
pub mod types;

pub use input::{CompletionRequest, SignedUrlRequest};
pub use output::{ObjectDescriptor, SignedUrlResponse};
pub use types::{ByteRange, Chunk, SignedPartBatch};
