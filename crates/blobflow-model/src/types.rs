//! Shared types used across the upload pipeline.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A half-open byte range `[start, end)` within the source payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteRange {
    /// First byte of the range (inclusive).
    pub start: u64,
    /// One past the last byte of the range (exclusive).
    pub end: u64,
}

impl ByteRange {
    /// Create a new range. `start` must not exceed `end`.
    #[must_use]
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "byte range start must not exceed end");
        Self { start, end }
    }

    /// Length of the range in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range covers zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One independently uploaded part of the source payload.
///
/// Part numbers are contiguous and 1-based; the ranges of all chunks of a
/// transfer exactly partition `[0, file_size)`.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based part number.
    pub part_number: u32,
    /// The byte range this chunk covers.
    pub range: ByteRange,
    /// The chunk payload.
    pub payload: Bytes,
}

impl Chunk {
    /// Size of the chunk payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the chunk carries no bytes (only legal for a zero-length
    /// single-part transfer).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A batch of signed part-URLs issued under one upload key.
///
/// URLs align 1:1, in order, with ascending part numbers starting at
/// `first_part`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPartBatch {
    /// The upload key the batch was issued under.
    pub upload_key: String,
    /// Part number of the first URL in `urls`.
    pub first_part: u32,
    /// Ordered signed URLs, one per part.
    pub urls: Vec<String>,
    /// When the URLs in this batch stop being accepted.
    pub expires_at: DateTime<Utc>,
}

impl SignedPartBatch {
    /// Part number of the last URL in the batch.
    #[must_use]
    pub fn last_part(&self) -> u32 {
        self.first_part + self.urls.len() as u32 - 1
    }
}
