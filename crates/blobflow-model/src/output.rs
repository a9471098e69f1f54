//! Response types returned by the signed-URL issuing service.

use serde::{Deserialize, Serialize};

/// Response to a [`SignedUrlRequest`](crate::input::SignedUrlRequest).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    /// The upload key for this transfer. Minted on the first request and
    /// echoed back on every later one.
    pub upload_key: String,
    /// Ordered signed URLs, one per requested part.
    pub urls: Vec<String>,
}

/// Descriptor of the finished object, returned by the completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    /// Bucket the object landed in.
    pub bucket_key: String,
    /// Key of the finished object.
    pub object_key: String,
    /// Service-assigned object identifier.
    pub object_id: String,
    /// Total object size in bytes.
    pub size: u64,
    /// Content type recorded with the object, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// SHA-1 of the object contents, when the service computes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    /// Download location for the finished object, if the service reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
