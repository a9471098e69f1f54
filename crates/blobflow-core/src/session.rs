//! Upload session state: upload key, part cursor, and the FIFO pool of
//! unconsumed signed URLs.

use std::collections::{BTreeSet, VecDeque};

use blobflow_model::{SignedPartBatch, SignedUrlRequest};
use tracing::debug;

use crate::error::{TransferError, TransferResult};

/// State of one multipart transfer.
///
/// The session is owned by a single coordinator (task or caller); all pool
/// and cursor mutation goes through it, which is what keeps part
/// confirmation single-writer under bounded parallelism.
///
/// Invariants upheld here:
/// - the pool never retains URLs for already-confirmed parts,
/// - each part is confirmed at most once,
/// - the cursor only advances over a contiguous prefix of confirmed parts,
///   so a refill always starts at the lowest unconfirmed part.
#[derive(Debug)]
pub struct UploadSession {
    bucket_key: String,
    object_key: String,
    total_parts: u32,
    upload_key: Option<String>,
    /// Last part of the contiguous confirmed prefix; 0 before any confirm.
    cursor: u32,
    confirmed: BTreeSet<u32>,
    pool: VecDeque<(u32, String)>,
}

impl UploadSession {
    /// Start a session for a transfer of `total_parts` parts.
    #[must_use]
    pub fn new(
        bucket_key: impl Into<String>,
        object_key: impl Into<String>,
        total_parts: u32,
    ) -> Self {
        Self {
            bucket_key: bucket_key.into(),
            object_key: object_key.into(),
            total_parts,
            upload_key: None,
            cursor: 0,
            confirmed: BTreeSet::new(),
            pool: VecDeque::new(),
        }
    }

    /// The upload key minted by the service, once the first batch arrived.
    #[must_use]
    pub fn upload_key(&self) -> Option<&str> {
        self.upload_key.as_deref()
    }

    /// Last part of the contiguous confirmed prefix (0 before any confirm).
    #[must_use]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Number of parts not yet confirmed.
    #[must_use]
    pub fn remaining_parts(&self) -> u32 {
        self.total_parts - self.confirmed.len() as u32
    }

    /// Whether every part has been confirmed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.remaining_parts() == 0
    }

    /// Build the next batch request, or `None` when no parts remain.
    ///
    /// The request starts at the lowest unconfirmed part — the part after
    /// the cursor in the normal path, or the failed part itself right after
    /// an expiry (the cursor never advanced past it) — and never asks for
    /// more parts than remain.
    #[must_use]
    pub fn refill_request(
        &self,
        max_batch: u32,
        expiration_minutes: u32,
    ) -> Option<SignedUrlRequest> {
        if self.is_complete() {
            return None;
        }
        let first_part = self.cursor + 1;
        let parts = max_batch.min(self.remaining_parts());
        Some(SignedUrlRequest {
            bucket_key: self.bucket_key.clone(),
            object_key: self.object_key.clone(),
            first_part,
            parts,
            upload_key: self.upload_key.clone(),
            minutes_expiration: expiration_minutes,
        })
    }

    /// Absorb a signed batch into the pool.
    ///
    /// The first batch establishes the upload key; every later batch must
    /// carry the same key. The batch must start exactly at the lowest
    /// unconfirmed part.
    pub fn absorb_batch(&mut self, batch: SignedPartBatch) -> TransferResult<()> {
        if batch.urls.is_empty() {
            return Err(TransferError::ProtocolInvariant(
                "service returned an empty URL batch".to_owned(),
            ));
        }
        if batch.first_part != self.cursor + 1 {
            return Err(TransferError::ProtocolInvariant(format!(
                "batch starts at part {} but the lowest unconfirmed part is {}",
                batch.first_part,
                self.cursor + 1
            )));
        }
        if batch.last_part() > self.total_parts {
            return Err(TransferError::ProtocolInvariant(format!(
                "batch covers parts up to {} but the transfer has {}",
                batch.last_part(),
                self.total_parts
            )));
        }

        match &self.upload_key {
            None => self.upload_key = Some(batch.upload_key.clone()),
            Some(key) if *key != batch.upload_key => {
                return Err(TransferError::ProtocolInvariant(format!(
                    "upload key changed mid-transfer: {key} -> {}",
                    batch.upload_key
                )));
            }
            Some(_) => {}
        }

        debug!(
            bucket = %self.bucket_key,
            object = %self.object_key,
            first_part = batch.first_part,
            urls = batch.urls.len(),
            expires_at = %batch.expires_at,
            "absorbed signed URL batch"
        );

        for (offset, url) in batch.urls.into_iter().enumerate() {
            self.pool.push_back((batch.first_part + offset as u32, url));
        }
        Ok(())
    }

    /// Take the next unconsumed `(part, url)` pair from the pool.
    ///
    /// URLs for parts confirmed since the batch was issued (out-of-order
    /// confirmation under parallelism) are discarded, never handed out.
    pub fn take_next(&mut self) -> Option<(u32, String)> {
        while let Some((part, url)) = self.pool.pop_front() {
            if !self.confirmed.contains(&part) {
                return Some((part, url));
            }
        }
        None
    }

    /// Record a part's successful upload, advancing the cursor over the
    /// contiguous confirmed prefix. Confirming a part twice, or a part
    /// outside the plan, is a protocol invariant violation.
    pub fn confirm_part(&mut self, part_number: u32) -> TransferResult<()> {
        if part_number == 0 || part_number > self.total_parts {
            return Err(TransferError::ProtocolInvariant(format!(
                "confirmed part {part_number} outside plan of {} parts",
                self.total_parts
            )));
        }
        if !self.confirmed.insert(part_number) {
            return Err(TransferError::ProtocolInvariant(format!(
                "part {part_number} confirmed twice"
            )));
        }
        while self.confirmed.contains(&(self.cursor + 1)) {
            self.cursor += 1;
        }
        self.pool.retain(|(part, _)| *part != part_number);

        debug!(
            bucket = %self.bucket_key,
            object = %self.object_key,
            part = part_number,
            confirmed = self.confirmed.len(),
            total = self.total_parts,
            "part confirmed"
        );
        Ok(())
    }

    /// Discard every pooled URL. Called when a PUT reports expiry: the
    /// remaining URLs of the batch are assumed stale, and the next refill
    /// restarts at the failed part.
    pub fn invalidate_pool(&mut self) {
        if !self.pool.is_empty() {
            debug!(
                bucket = %self.bucket_key,
                object = %self.object_key,
                discarded = self.pool.len(),
                "discarding stale URL pool"
            );
        }
        self.pool.clear();
    }

    /// Whether the pool currently holds any unconsumed URLs.
    #[must_use]
    pub fn pool_is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
