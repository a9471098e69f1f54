//! Chunk planning: partition a byte stream into ordered, size-bounded parts.

use blobflow_model::ByteRange;

use crate::config::MIN_CHUNK_SIZE;
use crate::error::{TransferError, TransferResult};

/// The ordered part layout of one transfer.
///
/// Part numbers are contiguous and 1-based; the ranges exactly partition
/// `[0, file_size)` with no gaps or overlaps. A zero-length source still
/// yields exactly one zero-length part, which keeps the downstream protocol
/// symmetric: every transfer has at least one part.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
    total_parts: u32,
}

/// Plan the part layout for a source of `file_size` bytes.
///
/// All parts except the last are exactly `chunk_size` bytes; the last part
/// is the remainder. Rejects chunk sizes below the protocol minimum with
/// [`TransferError::InvalidConfiguration`].
pub fn plan(file_size: u64, chunk_size: u64) -> TransferResult<ChunkPlan> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidConfiguration(
            "chunk size must be positive".to_owned(),
        ));
    }
    if chunk_size < MIN_CHUNK_SIZE {
        return Err(TransferError::InvalidConfiguration(format!(
            "chunk size {chunk_size} is below the protocol minimum of {MIN_CHUNK_SIZE} bytes"
        )));
    }

    let total_parts = if file_size == 0 {
        1
    } else {
        u32::try_from(file_size.div_ceil(chunk_size)).map_err(|_| {
            TransferError::InvalidConfiguration(format!(
                "{file_size} bytes at {chunk_size} per part exceeds the part number range"
            ))
        })?
    };

    Ok(ChunkPlan {
        file_size,
        chunk_size,
        total_parts,
    })
}

impl ChunkPlan {
    /// Total size of the source in bytes.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Number of parts in the plan (always at least 1).
    #[must_use]
    pub fn total_parts(&self) -> u32 {
        self.total_parts
    }

    /// Byte range of the given 1-based part, or `None` if the part number
    /// is outside the plan.
    #[must_use]
    pub fn range_of(&self, part_number: u32) -> Option<ByteRange> {
        if part_number == 0 || part_number > self.total_parts {
            return None;
        }
        let start = u64::from(part_number - 1) * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        Some(ByteRange::new(start, end))
    }

    /// Iterate `(part_number, range)` pairs in ascending part order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, ByteRange)> + '_ {
        (1..=self.total_parts).map(|part| {
            let range = self
                .range_of(part)
                .unwrap_or_else(|| ByteRange::new(self.file_size, self.file_size));
            (part, range)
        })
    }
}
