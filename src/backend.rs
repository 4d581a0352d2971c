//! Prover backend capability
//!
//! The proving system itself is external. The proof generator only depends on
//! [`ProverBackend`], which turns the parameters of one of the three protocol
//! circuits into an opaque proof blob. [`RetryingProver`] layers the
//! timeout/retry policy from [`ProverOptions`] over any backend.

use std::future::Future;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ProvingError;

/// The protocol circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitId {
    ShieldedTransfer,
    ViewingKey,
    EmergencyAccess,
}

impl CircuitId {
    pub const ALL: [CircuitId; 3] = [
        CircuitId::ShieldedTransfer,
        CircuitId::ViewingKey,
        CircuitId::EmergencyAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitId::ShieldedTransfer => "shielded_transfer",
            CircuitId::ViewingKey => "viewing_key",
            CircuitId::EmergencyAccess => "emergency_access",
        }
    }

    /// Number of public inputs the circuit declares.
    pub fn public_input_count(&self) -> usize {
        match self {
            CircuitId::ShieldedTransfer => 3,
            CircuitId::ViewingKey => 2,
            CircuitId::EmergencyAccess => 3,
        }
    }
}

impl std::fmt::Display for CircuitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces raw proof bytes for the protocol circuits.
#[async_trait]
pub trait ProverBackend: Send + Sync {
    async fn prove_shielded_transfer(
        &self,
        nullifier: B256,
        commitment: B256,
        amount: U256,
    ) -> Result<Vec<u8>, ProvingError>;

    async fn prove_viewing_key_grant(
        &self,
        owner: Address,
        viewing_key: B256,
    ) -> Result<Vec<u8>, ProvingError>;

    async fn prove_emergency_access(
        &self,
        owner: Address,
        contact: Address,
        access_level: u8,
    ) -> Result<Vec<u8>, ProvingError>;
}

#[async_trait]
impl<B: ProverBackend + ?Sized> ProverBackend for std::sync::Arc<B> {
    async fn prove_shielded_transfer(
        &self,
        nullifier: B256,
        commitment: B256,
        amount: U256,
    ) -> Result<Vec<u8>, ProvingError> {
        (**self).prove_shielded_transfer(nullifier, commitment, amount).await
    }

    async fn prove_viewing_key_grant(
        &self,
        owner: Address,
        viewing_key: B256,
    ) -> Result<Vec<u8>, ProvingError> {
        (**self).prove_viewing_key_grant(owner, viewing_key).await
    }

    async fn prove_emergency_access(
        &self,
        owner: Address,
        contact: Address,
        access_level: u8,
    ) -> Result<Vec<u8>, ProvingError> {
        (**self).prove_emergency_access(owner, contact, access_level).await
    }
}

/// Timeout and retry policy for proof generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverOptions {
    /// Wall-clock limit for a single attempt
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,

    /// Re-attempts after a transient failure (0 = single attempt)
    pub max_retries: u32,

    /// Pause between attempts
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
}

impl Default for ProverOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl ProverOptions {
    /// Load options from `LEGACY_ZK_PROVER_*` environment variables, falling
    /// back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ms = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        Self {
            timeout: ms("LEGACY_ZK_PROVER_TIMEOUT_MS").unwrap_or(defaults.timeout),
            max_retries: std::env::var("LEGACY_ZK_PROVER_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay: ms("LEGACY_ZK_PROVER_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Applies [`ProverOptions`] to an inner backend.
///
/// Every attempt runs under `timeout`. Timeouts and transient failures are
/// retried up to `max_retries` times with `retry_delay` in between; any other
/// failure is returned immediately.
pub struct RetryingProver<B> {
    inner: B,
    options: ProverOptions,
}

impl<B: ProverBackend> RetryingProver<B> {
    pub fn new(inner: B, options: ProverOptions) -> Self {
        Self { inner, options }
    }

    pub fn options(&self) -> &ProverOptions {
        &self.options
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn run<F, Fut>(&self, circuit: CircuitId, attempt_fn: F) -> Result<Vec<u8>, ProvingError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<Vec<u8>, ProvingError>> + Send,
    {
        let start = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            let outcome = match tokio::time::timeout(self.options.timeout, attempt_fn()).await {
                Ok(result) => result,
                Err(_) => Err(ProvingError::Timeout(self.options.timeout)),
            };

            match outcome {
                Ok(bytes) => {
                    debug!(
                        "{} proof produced after {} attempt(s) in {:?}",
                        circuit,
                        attempt + 1,
                        start.elapsed()
                    );
                    return Ok(bytes);
                }
                Err(err) if err.is_transient() && attempt < self.options.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} proof attempt {} failed ({}), retrying in {:?}",
                        circuit, attempt, err, self.options.retry_delay
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<B: ProverBackend> ProverBackend for RetryingProver<B> {
    async fn prove_shielded_transfer(
        &self,
        nullifier: B256,
        commitment: B256,
        amount: U256,
    ) -> Result<Vec<u8>, ProvingError> {
        self.run(CircuitId::ShieldedTransfer, || {
            self.inner.prove_shielded_transfer(nullifier, commitment, amount)
        })
        .await
    }

    async fn prove_viewing_key_grant(
        &self,
        owner: Address,
        viewing_key: B256,
    ) -> Result<Vec<u8>, ProvingError> {
        self.run(CircuitId::ViewingKey, || {
            self.inner.prove_viewing_key_grant(owner, viewing_key)
        })
        .await
    }

    async fn prove_emergency_access(
        &self,
        owner: Address,
        contact: Address,
        access_level: u8,
    ) -> Result<Vec<u8>, ProvingError> {
        self.run(CircuitId::EmergencyAccess, || {
            self.inner.prove_emergency_access(owner, contact, access_level)
        })
        .await
    }
}
