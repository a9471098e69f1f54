//! Error types for the upload pipeline.
//!
//! Every fatal condition aborts the transfer; there is no silent partial
//! completion. A caller that hits a fatal error must start a new session to
//! resume.

use crate::resilience::EndpointClass;

/// Error type for transfer operations.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A remote call failed in a way worth retrying (timeout, 5xx,
    /// throttling). Retried per the resiliency policy before aborting.
    #[error("transient remote failure: {message}")]
    Transient {
        /// Human-readable failure description.
        message: String,
        /// HTTP status, when the failure carried one.
        status: Option<u16>,
    },

    /// A part PUT was rejected with 403: the signed URL has expired.
    /// Triggers a pool refresh at the failed part; never counted against
    /// the retry budget.
    #[error("signed URL for part {part_number} expired")]
    ExpiredUrl {
        /// The part whose URL expired.
        part_number: u32,
    },

    /// A remote call was rejected with a non-throttling 4xx. Propagated
    /// immediately, without retry.
    #[error("remote call rejected with status {status}: {message}")]
    NonRetryable {
        /// The HTTP status code.
        status: u16,
        /// Human-readable rejection description.
        message: String,
    },

    /// The circuit breaker for an endpoint class is open; the call was
    /// rejected without a network attempt. Distinct from remote errors so
    /// callers can tell "dependency is down" from "this call failed".
    #[error("circuit breaker open for {endpoint}")]
    CircuitOpen {
        /// The endpoint class whose breaker is open.
        endpoint: EndpointClass,
    },

    /// Completion was attempted while parts were still outstanding.
    #[error("completion requested with {remaining} parts outstanding")]
    IncompleteTransfer {
        /// Number of parts not yet confirmed.
        remaining: u32,
    },

    /// Internal consistency violation (duplicate or missing part index,
    /// mismatched upload key). Always fatal, never retried; signals a bug.
    #[error("protocol invariant violated: {0}")]
    ProtocolInvariant(String),

    /// The supplied configuration is unusable (e.g. chunk size below the
    /// protocol minimum).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The transfer-scoped cancellation signal fired.
    #[error("transfer canceled")]
    Canceled,

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TransferError {
    /// Build a transient error without a status code (timeouts, connection
    /// resets).
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            status: None,
        }
    }

    /// Build a transient error carrying the HTTP status that caused it.
    #[must_use]
    pub fn transient_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Whether this error should be retried under the resiliency policy.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// Convenience result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;
