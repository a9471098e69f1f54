//! Chunk sources: where the bytes of a transfer come from.

use anyhow::Context;
use async_trait::async_trait;
use blobflow_model::ByteRange;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::error::{TransferError, TransferResult};

/// A random-access source of transfer payload bytes.
///
/// The pipeline reads one part's range at a time, in the order the
/// coordinator dispatches parts; implementations only need to support
/// sequential-with-rewind access (expiry recovery re-reads the failed
/// part's range).
#[async_trait]
pub trait ChunkSource: Send {
    /// Total size of the source in bytes.
    fn len(&self) -> u64;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read exactly the bytes of `range`.
    async fn read_range(&mut self, range: ByteRange) -> TransferResult<Bytes>;
}

/// An in-memory source.
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    /// Wrap an in-memory buffer as a source.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ChunkSource for BytesSource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&mut self, range: ByteRange) -> TransferResult<Bytes> {
        let start = usize::try_from(range.start)
            .map_err(|_| TransferError::ProtocolInvariant("range start out of bounds".into()))?;
        let end = usize::try_from(range.end)
            .map_err(|_| TransferError::ProtocolInvariant("range end out of bounds".into()))?;
        if end > self.data.len() || start > end {
            return Err(TransferError::ProtocolInvariant(format!(
                "range [{start}, {end}) outside source of {} bytes",
                self.data.len()
            )));
        }
        Ok(self.data.slice(start..end))
    }
}

/// A file-backed source that seeks and reads one part's range at a time,
/// so large files are never held in memory whole.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Open a file as a chunk source.
    pub async fn open(path: impl AsRef<std::path::Path>) -> TransferResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .await
            .with_context(|| format!("cannot open {}", path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("cannot stat {}", path.display()))?
            .len();
        Ok(Self { file, len })
    }
}

#[async_trait]
impl ChunkSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_range(&mut self, range: ByteRange) -> TransferResult<Bytes> {
        if range.end > self.len {
            return Err(TransferError::ProtocolInvariant(format!(
                "range [{}, {}) outside file of {} bytes",
                range.start, range.end, self.len
            )));
        }
        self.file
            .seek(SeekFrom::Start(range.start))
            .await
            .context("seek failed")?;

        let len = usize::try_from(range.len())
            .map_err(|_| TransferError::ProtocolInvariant("chunk too large for memory".into()))?;
        let mut buf = vec![0u8; len];
        self.file
            .read_exact(&mut buf)
            .await
            .context("short read from source file")?;
        Ok(Bytes::from(buf))
    }
}
