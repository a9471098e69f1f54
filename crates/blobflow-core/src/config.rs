//! Transfer and resiliency configuration.
//!
//! Configuration is supplied by the surrounding layer as plain structs.
//! Defaults match the remote protocol's constraints (5 MiB minimum part
//! size, 25 URLs per batch). Values can also be loaded from environment
//! variables via `from_env`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{TransferError, TransferResult};

/// Minimum part size the remote protocol accepts for all parts except the
/// last one.
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Retry, backoff, and circuit-breaker policy for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ResiliencyConfig {
    /// Maximum attempts for a transiently failing call; also the number of
    /// consecutive failures that trips the circuit breaker.
    #[builder(default = 3)]
    pub retry_count: u32,

    /// Base wait between attempts; attempt `n` waits `backoff_interval * n`.
    #[builder(default = Duration::from_secs(10))]
    pub backoff_interval: Duration,

    /// How long an open circuit rejects calls before admitting a probe.
    #[builder(default = Duration::from_secs(5))]
    pub circuit_breaker_interval: Duration,
}

impl Default for ResiliencyConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            backoff_interval: Duration::from_secs(10),
            circuit_breaker_interval: Duration::from_secs(5),
        }
    }
}

/// Configuration for one transfer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct TransferConfig {
    /// Part size in bytes. All parts except the last are exactly this size.
    #[builder(default = MIN_CHUNK_SIZE)]
    pub chunk_size: u64,

    /// Maximum signed URLs requested per batch.
    #[builder(default = 25)]
    pub batch_size: u32,

    /// Maximum part uploads in flight at once. `1` is the sequential
    /// reference mode.
    #[builder(default = 1)]
    pub concurrency: usize,

    /// Requested signed-URL lifetime in minutes (the service caps this
    /// at 60).
    #[builder(default = 10)]
    pub expiration_minutes: u32,

    /// Retry/backoff/circuit-breaker policy for every remote call.
    #[builder(default)]
    pub resiliency: ResiliencyConfig,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: MIN_CHUNK_SIZE,
            batch_size: 25,
            concurrency: 1,
            expiration_minutes: 10,
            resiliency: ResiliencyConfig::default(),
        }
    }
}

impl TransferConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `BLOBFLOW_CHUNK_SIZE` | `5242880` |
    /// | `BLOBFLOW_BATCH_SIZE` | `25` |
    /// | `BLOBFLOW_CONCURRENCY` | `1` |
    /// | `BLOBFLOW_EXPIRATION_MINUTES` | `10` |
    /// | `BLOBFLOW_RETRY_COUNT` | `3` |
    /// | `BLOBFLOW_BACKOFF_SECS` | `10` |
    /// | `BLOBFLOW_CIRCUIT_BREAKER_SECS` | `5` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_parse::<u64>("BLOBFLOW_CHUNK_SIZE") {
            config.chunk_size = n;
        }
        if let Some(n) = env_parse::<u32>("BLOBFLOW_BATCH_SIZE") {
            config.batch_size = n;
        }
        if let Some(n) = env_parse::<usize>("BLOBFLOW_CONCURRENCY") {
            config.concurrency = n;
        }
        if let Some(n) = env_parse::<u32>("BLOBFLOW_EXPIRATION_MINUTES") {
            config.expiration_minutes = n;
        }
        if let Some(n) = env_parse::<u32>("BLOBFLOW_RETRY_COUNT") {
            config.resiliency.retry_count = n;
        }
        if let Some(n) = env_parse::<u64>("BLOBFLOW_BACKOFF_SECS") {
            config.resiliency.backoff_interval = Duration::from_secs(n);
        }
        if let Some(n) = env_parse::<u64>("BLOBFLOW_CIRCUIT_BREAKER_SECS") {
            config.resiliency.circuit_breaker_interval = Duration::from_secs(n);
        }

        config
    }

    /// Validate the configuration against protocol constraints.
    pub fn validate(&self) -> TransferResult<()> {
        if self.chunk_size < MIN_CHUNK_SIZE {
            return Err(TransferError::InvalidConfiguration(format!(
                "chunk size {} is below the protocol minimum of {MIN_CHUNK_SIZE} bytes",
                self.chunk_size
            )));
        }
        if self.batch_size == 0 {
            return Err(TransferError::InvalidConfiguration(
                "batch size must be at least 1".to_owned(),
            ));
        }
        if self.concurrency == 0 {
            return Err(TransferError::InvalidConfiguration(
                "concurrency must be at least 1".to_owned(),
            ));
        }
        if self.expiration_minutes == 0 || self.expiration_minutes > 60 {
            return Err(TransferError::InvalidConfiguration(format!(
                "signed URL expiration must be between 1 and 60 minutes, got {}",
                self.expiration_minutes
            )));
        }
        Ok(())
    }
}

/// Parse an environment variable, ignoring unset or malformed values.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
