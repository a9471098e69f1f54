//! Structured retry combinator with linear backoff.

use tracing::warn;

use super::breaker::CircuitBreaker;
use crate::config::ResiliencyConfig;
use crate::error::TransferResult;

/// Run `op`, retrying transient failures under the resiliency policy.
///
/// Before each attempt the breaker is consulted; while it is open the call
/// fails fast with `CircuitOpen` and no network attempt is made. A
/// transient failure is recorded against the breaker, then retried after a
/// linear backoff of `backoff_interval * attempt_number`, up to
/// `retry_count` attempts in total. The attempt cap equals the breaker's
/// failure threshold, so exhausting the budget and tripping the circuit
/// coincide; the last transient error is surfaced to the caller, which
/// treats it as fatal for the transfer.
///
/// Non-transient errors (URL expiry, non-throttling 4xx, protocol
/// violations) bypass both the retry budget and the failure counter and
/// propagate immediately.
pub async fn with_retries<T, F, Fut>(
    breaker: &CircuitBreaker,
    policy: &ResiliencyConfig,
    mut op: F,
) -> TransferResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TransferResult<T>>,
{
    let max_attempts = policy.retry_count.max(1);
    let mut attempt: u32 = 0;

    loop {
        breaker.try_acquire()?;
        attempt += 1;

        match op().await {
            Ok(value) => {
                breaker.record_success();
                return Ok(value);
            }
            Err(err) if err.is_transient() => {
                breaker.record_failure();
                if attempt >= max_attempts {
                    warn!(
                        attempts = attempt,
                        error = %err,
                        "retry budget exhausted, failing call"
                    );
                    return Err(err);
                }
                let backoff = policy.backoff_interval * attempt;
                warn!(
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "transient remote failure, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
