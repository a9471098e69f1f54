//! Lock-free circuit breaker with Closed/Open/HalfOpen states.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;

use super::EndpointClass;
use crate::config::ResiliencyConfig;
use crate::error::{TransferError, TransferResult};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls fail immediately without a network attempt.
    Open,
    /// The first call after the open interval is admitted as a probe.
    HalfOpen,
}

impl From<u32> for CircuitState {
    fn from(v: u32) -> Self {
        match v {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// Thread-safe circuit breaker for one endpoint class.
///
/// State transitions use atomics; the Open -> HalfOpen handoff is a CAS so
/// exactly one concurrent caller wins the probe slot. Within one trip cycle
/// the transitions are monotonic: Closed -> Open -> HalfOpen -> (Closed on
/// probe success | Open on probe failure).
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: EndpointClass,
    state: AtomicU32,
    consecutive_failures: AtomicU32,
    tripped_at_ms: AtomicU64,
    failure_threshold: u32,
    open_interval: Duration,
}

impl CircuitBreaker {
    /// Create a breaker for `endpoint` from the resiliency policy. The
    /// failure threshold is the policy's retry count; the open interval is
    /// the policy's circuit-breaker interval.
    #[must_use]
    pub fn new(endpoint: EndpointClass, policy: &ResiliencyConfig) -> Self {
        Self {
            endpoint,
            state: AtomicU32::new(CircuitState::Closed as u32),
            consecutive_failures: AtomicU32::new(0),
            tripped_at_ms: AtomicU64::new(0),
            failure_threshold: policy.retry_count.max(1),
            open_interval: policy.circuit_breaker_interval,
        }
    }

    /// Current breaker state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Ask permission to attempt a call.
    ///
    /// Returns [`TransferError::CircuitOpen`] while the breaker is open and
    /// the cooldown has not elapsed. After the cooldown, exactly one caller
    /// is admitted as the half-open probe; the rest keep failing fast until
    /// the probe resolves.
    pub fn try_acquire(&self) -> TransferResult<()> {
        match self.state() {
            CircuitState::Closed => Ok(()),
            // A probe is already in flight; everyone else keeps failing
            // fast until it resolves.
            CircuitState::HalfOpen => Err(TransferError::CircuitOpen {
                endpoint: self.endpoint,
            }),
            CircuitState::Open => {
                let tripped = self.tripped_at_ms.load(Ordering::Acquire);
                let elapsed = now_epoch_ms().saturating_sub(tripped);
                if elapsed < self.open_interval.as_millis() as u64 {
                    return Err(TransferError::CircuitOpen {
                        endpoint: self.endpoint,
                    });
                }
                // CAS: only one caller wins the Open -> HalfOpen transition
                // and proceeds as the probe.
                if self
                    .state
                    .compare_exchange(
                        CircuitState::Open as u32,
                        CircuitState::HalfOpen as u32,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    tracing::debug!(endpoint = %self.endpoint, "circuit half-open, admitting probe");
                    Ok(())
                } else {
                    Err(TransferError::CircuitOpen {
                        endpoint: self.endpoint,
                    })
                }
            }
        }
    }

    /// Record a successful call. A half-open probe success closes the
    /// circuit; any success resets the failure counter.
    pub fn record_success(&self) {
        if self.state() == CircuitState::HalfOpen {
            self.state
                .store(CircuitState::Closed as u32, Ordering::Release);
            tracing::debug!(endpoint = %self.endpoint, "probe succeeded, circuit closed");
        }
        self.consecutive_failures.store(0, Ordering::Release);
    }

    /// Record a failed call. A half-open probe failure reopens the circuit
    /// and restarts the interval; in the closed state, reaching the failure
    /// threshold trips the circuit.
    pub fn record_failure(&self) {
        if self.state() == CircuitState::HalfOpen {
            self.trip();
            return;
        }
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        // Do not re-stamp the trip time while already Open; that would
        // starve the cooldown timer.
        if failures >= self.failure_threshold && self.state() != CircuitState::Open {
            self.trip();
        }
    }

    fn trip(&self) {
        self.state
            .store(CircuitState::Open as u32, Ordering::Release);
        self.tripped_at_ms.store(now_epoch_ms(), Ordering::Release);
        tracing::warn!(
            endpoint = %self.endpoint,
            open_interval_ms = self.open_interval.as_millis() as u64,
            "circuit breaker tripped open"
        );
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Process-wide registry of circuit breakers, one per endpoint class.
///
/// Concurrent transfers share one registry, so a persistently failing
/// dependency trips the breaker for all of them. Tests construct their own
/// registries to get isolated breakers.
#[derive(Debug)]
pub struct BreakerRegistry {
    policy: ResiliencyConfig,
    breakers: DashMap<EndpointClass, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Create an empty registry using `policy` for every breaker it mints.
    #[must_use]
    pub fn new(policy: ResiliencyConfig) -> Self {
        Self {
            policy,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for the given endpoint class.
    #[must_use]
    pub fn breaker(&self, endpoint: EndpointClass) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(endpoint)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(endpoint, &self.policy)))
            .clone()
    }
}
