//! Request types sent to the signed-URL issuing service.

use serde::{Deserialize, Serialize};

/// Request for a batch of signed part-upload URLs.
///
/// The first request of a transfer carries no `upload_key`; the service
/// mints one, and every later request of the same transfer must reuse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlRequest {
    /// Bucket holding the target object.
    pub bucket_key: String,
    /// Key of the target object.
    pub object_key: String,
    /// 1-based part number the first returned URL must cover.
    pub first_part: u32,
    /// Number of URLs requested; never more than the parts remaining.
    pub parts: u32,
    /// Upload key from the first batch of this transfer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_key: Option<String>,
    /// Requested URL lifetime in minutes.
    pub minutes_expiration: u32,
}

/// Request to finalize a transfer once every part has been confirmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Bucket holding the target object.
    pub bucket_key: String,
    /// Key of the target object.
    pub object_key: String,
    /// Upload key correlating all parts of this transfer.
    pub upload_key: String,
    /// Opaque user metadata, forwarded uninterpreted.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub user_metadata: serde_json::Map<String, serde_json::Value>,
}
