//! Mapping HTTP failures onto the transfer error taxonomy.
//!
//! The policy: timeouts, connection failures, 408, 429 and every 5xx are
//! transient and eligible for retry; any other 4xx is a terminal rejection
//! (bad credentials or a bad request will not improve on retry). 403 on a
//! part PUT is special-cased by the transport as URL expiry.

use blobflow_core::TransferError;
use reqwest::StatusCode;

/// Classify a non-2xx response from the service or a signed URL.
pub(crate) fn classify_response(status: StatusCode, body: &str) -> TransferError {
    let message = if body.is_empty() {
        status.to_string()
    } else {
        body.chars().take(256).collect()
    };
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        TransferError::transient_status(status.as_u16(), message)
    } else {
        TransferError::NonRetryable {
            status: status.as_u16(),
            message,
        }
    }
}

/// Wrap a network-level failure (connect refused, timeout, reset) as
/// transient. These never carry a status code.
pub(crate) fn transport_error(err: reqwest::Error) -> TransferError {
    TransferError::transient(err.to_string())
}
