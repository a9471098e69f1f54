//! Resiliency policy engine: retry with linear backoff plus per-endpoint
//! circuit breakers.
//!
//! Every outbound remote call of the pipeline goes through
//! [`retry::with_retries`], which consults the circuit breaker for the
//! call's endpoint class before each attempt. Breaker state is shared
//! process-wide per endpoint class (not per transfer) and is owned by an
//! injectable [`BreakerRegistry`], never a hidden singleton, so tests can
//! instantiate isolated breakers.

mod breaker;
mod retry;

pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use retry::with_retries;

/// The class of remote endpoint a call targets.
///
/// Each class has its own circuit breaker: a failing signed-URL service
/// must not poison direct part PUTs, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointClass {
    /// Signed part-URL batch requests.
    SignedUrls,
    /// Raw part PUTs against signed URLs.
    PartUpload,
    /// The transfer completion call.
    Completion,
}

impl std::fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedUrls => f.write_str("signed-urls"),
            Self::PartUpload => f.write_str("part-upload"),
            Self::Completion => f.write_str("completion"),
        }
    }
}
