//! In-tree prover backends
//!
//! Neither backend here is a zero-knowledge proving system. They produce a
//! 128-byte transcript commitment that binds the circuit id and the encoded
//! inputs (and, for [`TranscriptProver`], the proving key), which is enough
//! to drive the orchestration layer end to end. A real proving engine plugs
//! in through [`ProverBackend`].

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use rand::RngCore;
use tokio::task::AbortHandle;
use tracing::info;

use crate::artifacts::{ArtifactCache, ArtifactPaths, CircuitArtifacts};
use crate::backend::{CircuitId, ProverBackend};
use crate::encoding::{FieldElement, ToFieldElement};
use crate::error::{CircuitLoadError, ProvingError};

/// Size of the proof blobs produced by the in-tree backends.
pub const TRANSCRIPT_PROOF_BYTES: usize = 128;

const DETERMINISTIC_KEY_CONTEXT: &str = "legacy-zk deterministic prover v1";

fn encode_inputs(inputs: &[&dyn ToFieldElement]) -> Result<Vec<FieldElement>, ProvingError> {
    inputs
        .iter()
        .map(|input| {
            input
                .to_field_element()
                .map_err(|e| ProvingError::Failed(format!("Input encoding failed: {}", e)))
        })
        .collect()
}

fn transcript_bytes(
    key: &[u8; 32],
    circuit: CircuitId,
    inputs: &[FieldElement],
    blinding: Option<&[u8; 32]>,
) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new_keyed(key);
    hasher.update(circuit.as_str().as_bytes());
    for input in inputs {
        hasher.update(input.as_bytes());
    }
    if let Some(blinding) = blinding {
        hasher.update(blinding);
    }

    let mut out = vec![0u8; TRANSCRIPT_PROOF_BYTES];
    hasher.finalize_xof().fill(&mut out);
    out
}

/// Cancels a blocking job when the awaiting future is dropped, e.g. by a
/// timeout. A job still queued never starts; a running one sees `cancelled`.
struct CancelOnDrop {
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.abort.abort();
    }
}

/// Run `job` on the blocking pool, tied to the lifetime of the caller.
async fn run_blocking<T, F>(job: F) -> Result<T, ProvingError>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Result<T, ProvingError> + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let handle = tokio::task::spawn_blocking(move || job(&flag));
    let _guard = CancelOnDrop {
        cancelled,
        abort: handle.abort_handle(),
    };

    handle
        .await
        .map_err(|e| ProvingError::Worker(format!("Task join error: {}", e)))?
}

/// Artifact-backed backend with a random blinding per proof.
///
/// Artifacts are loaded on first use and cached for the lifetime of the
/// prover; call [`TranscriptProver::preload`] to surface a missing or corrupt
/// artifact at startup instead.
#[derive(Debug, Clone)]
pub struct TranscriptProver {
    artifacts: ArtifactCache,
}

impl TranscriptProver {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            artifacts: ArtifactCache::new(paths),
        }
    }

    /// Prover over artifacts that are already in memory.
    pub fn from_artifacts(artifacts: CircuitArtifacts) -> Self {
        Self {
            artifacts: ArtifactCache::with_artifacts(artifacts),
        }
    }

    /// Load artifacts now rather than on the first proof.
    pub fn preload(&self) -> Result<(), CircuitLoadError> {
        self.artifacts.get().map(|_| ())
    }

    /// Check if artifacts are loaded
    pub fn is_loaded(&self) -> bool {
        self.artifacts.is_loaded()
    }

    async fn prove(&self, circuit: CircuitId, inputs: Vec<FieldElement>) -> Result<Vec<u8>, ProvingError> {
        let cache = self.artifacts.clone();
        let start = Instant::now();

        // Artifact IO and hashing stay off the async runtime
        let proof = run_blocking(move |cancelled| {
            let artifacts = cache.get()?;
            if artifacts.description().circuit(circuit).is_none() {
                return Err(CircuitLoadError::UnknownCircuit(circuit.as_str().to_string()).into());
            }
            if cancelled.load(Ordering::SeqCst) {
                return Err(ProvingError::Cancelled);
            }

            let mut blinding = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut blinding);
            Ok(transcript_bytes(artifacts.key_digest(), circuit, &inputs, Some(&blinding)))
        })
        .await?;

        info!(
            "{} transcript proof generated in {}ms",
            circuit,
            start.elapsed().as_millis()
        );
        Ok(proof)
    }
}

#[async_trait]
impl ProverBackend for TranscriptProver {
    async fn prove_shielded_transfer(
        &self,
        nullifier: B256,
        commitment: B256,
        amount: U256,
    ) -> Result<Vec<u8>, ProvingError> {
        let inputs = encode_inputs(&[&nullifier, &commitment, &amount])?;
        self.prove(CircuitId::ShieldedTransfer, inputs).await
    }

    async fn prove_viewing_key_grant(
        &self,
        owner: Address,
        viewing_key: B256,
    ) -> Result<Vec<u8>, ProvingError> {
        let inputs = encode_inputs(&[&owner, &viewing_key])?;
        self.prove(CircuitId::ViewingKey, inputs).await
    }

    async fn prove_emergency_access(
        &self,
        owner: Address,
        contact: Address,
        access_level: u8,
    ) -> Result<Vec<u8>, ProvingError> {
        let inputs = encode_inputs(&[&owner, &contact, &access_level])?;
        self.prove(CircuitId::EmergencyAccess, inputs).await
    }
}

/// Test double: identical inputs always give identical bytes.
///
/// It can be told to fail transiently a fixed number of times, fail
/// permanently, or sleep before answering, to exercise retry and timeout
/// handling.
#[derive(Debug, Default)]
pub struct DeterministicProver {
    transient_failures: AtomicU32,
    permanent_failure: bool,
    latency: Option<Duration>,
    calls: AtomicU32,
}

impl DeterministicProver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` calls with [`ProvingError::Transient`].
    pub fn failing_transiently(self, times: u32) -> Self {
        self.transient_failures.store(times, Ordering::SeqCst);
        self
    }

    /// Fail every call with [`ProvingError::Failed`].
    pub fn failing_permanently(mut self) -> Self {
        self.permanent_failure = true;
        self
    }

    /// Sleep this long before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn prove(&self, circuit: CircuitId, inputs: Vec<FieldElement>) -> Result<Vec<u8>, ProvingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.permanent_failure {
            return Err(ProvingError::Failed("configured to fail".to_string()));
        }
        let consumed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if consumed.is_ok() {
            return Err(ProvingError::Transient("configured transient failure".to_string()));
        }

        let key = blake3::derive_key(DETERMINISTIC_KEY_CONTEXT, b"");
        Ok(transcript_bytes(&key, circuit, &inputs, None))
    }
}

#[async_trait]
impl ProverBackend for DeterministicProver {
    async fn prove_shielded_transfer(
        &self,
        nullifier: B256,
        commitment: B256,
        amount: U256,
    ) -> Result<Vec<u8>, ProvingError> {
        let inputs = encode_inputs(&[&nullifier, &commitment, &amount])?;
        self.prove(CircuitId::ShieldedTransfer, inputs).await
    }

    async fn prove_viewing_key_grant(
        &self,
        owner: Address,
        viewing_key: B256,
    ) -> Result<Vec<u8>, ProvingError> {
        let inputs = encode_inputs(&[&owner, &viewing_key])?;
        self.prove(CircuitId::ViewingKey, inputs).await
    }

    async fn prove_emergency_access(
        &self,
        owner: Address,
        contact: Address,
        access_level: u8,
    ) -> Result<Vec<u8>, ProvingError> {
        let inputs = encode_inputs(&[&owner, &contact, &access_level])?;
        self.prove(CircuitId::EmergencyAccess, inputs).await
    }
}
