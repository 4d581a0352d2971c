//! Verifier contract client
//!
//! Posts proof records to the on-chain verifier and queries its verification
//! entry point. The client keeps no acceptance state of its own: the
//! contract's nullifier and commitment sets decide replays and double spends.
//! Chain calls are never retried here.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use tracing::{debug, error, info};

use crate::error::SubmissionError;
use crate::types::Proof;

sol! {
    #[sol(rpc)]
    interface ILegacyProofVerifier {
        function generateProof(bytes32 proofId, bytes32[] publicInputs, bytes proof) external;

        function verifyProof(bytes32 proofId, bytes32[] publicInputs, bytes proof) external view returns (bool);
    }
}

/// Verifier contract connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Verifier contract address
    pub contract_address: Address,
    /// Chain ID
    pub chain_id: u64,
    /// Interval between receipt polls while awaiting confirmation
    #[serde(default = "default_confirmation_poll")]
    pub confirmation_poll: Duration,
}

fn default_confirmation_poll() -> Duration {
    Duration::from_secs(2)
}

impl VerifierConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Option<Self> {
        let rpc_url = std::env::var("LEGACY_ZK_RPC_URL").ok()?;
        let contract_address = std::env::var("LEGACY_ZK_VERIFIER_ADDRESS")
            .ok()
            .and_then(|s| s.parse().ok())?;
        let chain_id = std::env::var("LEGACY_ZK_CHAIN_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(324);

        Some(Self {
            rpc_url,
            contract_address,
            chain_id,
            confirmation_poll: default_confirmation_poll(),
        })
    }
}

/// Account that signs and pays for submissions.
#[derive(Debug, Clone)]
pub struct SignerIdentity {
    signer: PrivateKeySigner,
}

impl SignerIdentity {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Parse a hex private key.
    pub fn from_private_key(key: &str) -> Result<Self, SubmissionError> {
        let signer: PrivateKeySigner = key
            .parse()
            .map_err(|e| SubmissionError::Config(format!("Invalid private key: {}", e)))?;
        Ok(Self::new(signer))
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

/// Arguments shared by both verifier entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofCall {
    pub proof_id: B256,
    pub public_inputs: Vec<B256>,
    pub proof: Bytes,
}

impl From<&Proof> for ProofCall {
    fn from(proof: &Proof) -> Self {
        Self {
            proof_id: proof.proof_id,
            public_inputs: proof.public_input_words(),
            proof: proof.proof.clone(),
        }
    }
}

/// A sent, not yet confirmed, submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionHandle {
    pub tx_hash: B256,
    pub proof_id: B256,
}

/// Settled outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Chain-facing seam of the verifier contract.
#[async_trait]
pub trait VerifierContract: Send + Sync {
    /// Send `generateProof` and return the transaction hash.
    async fn send_generate_proof(
        &self,
        call: &ProofCall,
        signer: &SignerIdentity,
    ) -> Result<B256, SubmissionError>;

    /// Call `verifyProof` without sending a transaction.
    async fn call_verify_proof(
        &self,
        call: &ProofCall,
        signer: &SignerIdentity,
    ) -> Result<bool, SubmissionError>;

    /// Wait until `tx_hash` is mined.
    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Confirmation, SubmissionError>;
}

/// Submits proofs to and queries a [`VerifierContract`].
pub struct SubmissionClient<C> {
    contract: C,
}

impl<C: VerifierContract> SubmissionClient<C> {
    pub fn new(contract: C) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// Send `proof` to `generateProof`. Returns once the transaction is
    /// accepted by the node; use [`SubmissionClient::confirm`] to await
    /// settlement.
    pub async fn submit<P: AsRef<Proof>>(
        &self,
        proof: &P,
        signer: &SignerIdentity,
    ) -> Result<TransactionHandle, SubmissionError> {
        let proof = proof.as_ref();
        let call = ProofCall::from(proof);

        info!(
            "Submitting proof {} from {} ({} public inputs)",
            proof.proof_id,
            signer.address(),
            call.public_inputs.len()
        );

        let tx_hash = self
            .contract
            .send_generate_proof(&call, signer)
            .await
            .map_err(|e| {
                error!("Submission of proof {} failed: {}", proof.proof_id, e);
                e
            })?;

        info!("Proof {} submitted in tx {}", proof.proof_id, tx_hash);
        Ok(TransactionHandle {
            tx_hash,
            proof_id: proof.proof_id,
        })
    }

    /// Ask the contract whether `proof` verifies. `Ok(false)` is a rejection,
    /// not an error.
    pub async fn verify<P: AsRef<Proof>>(
        &self,
        proof: &P,
        signer: &SignerIdentity,
    ) -> Result<bool, SubmissionError> {
        let proof = proof.as_ref();
        let accepted = self
            .contract
            .call_verify_proof(&ProofCall::from(proof), signer)
            .await?;
        debug!("Proof {} verification result: {}", proof.proof_id, accepted);
        Ok(accepted)
    }

    /// Await the transaction behind `handle`. A mined but reverted
    /// transaction is a [`SubmissionError::TransactionFailed`].
    pub async fn confirm(&self, handle: &TransactionHandle) -> Result<Confirmation, SubmissionError> {
        let confirmation = self.contract.wait_for_receipt(handle.tx_hash).await?;
        if !confirmation.success {
            error!("Proof {} tx {} reverted", handle.proof_id, handle.tx_hash);
            return Err(SubmissionError::TransactionFailed {
                tx_hash: handle.tx_hash.to_string(),
            });
        }

        info!(
            "Proof {} confirmed in tx {} (block {})",
            handle.proof_id,
            handle.tx_hash,
            confirmation.block_number.unwrap_or(0)
        );
        Ok(confirmation)
    }
}

/// [`VerifierContract`] over JSON-RPC.
pub struct AlloyVerifierContract {
    config: VerifierConfig,
}

impl AlloyVerifierContract {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }
}

/// Splits node error responses into contract reverts and everything else.
/// Only code 3, a payload carrying revert data or an `execution reverted`
/// message counts as a revert.
fn map_contract_error(err: alloy::contract::Error) -> SubmissionError {
    if let alloy::contract::Error::TransportError(transport) = &err {
        if let Some(payload) = transport.as_error_resp() {
            let message = payload.message.to_string();
            let is_revert = payload.code == 3
                || payload.as_revert_data().is_some()
                || message.starts_with("execution reverted");
            if !is_revert {
                return SubmissionError::Transport(format!("RPC error {}: {}", payload.code, message));
            }

            let reason = message
                .strip_prefix("execution reverted")
                .map(|rest| rest.trim_start_matches(':').trim())
                .unwrap_or(message.as_str());
            return SubmissionError::Reverted {
                reason: (!reason.is_empty()).then(|| reason.to_string()),
            };
        }
    }
    SubmissionError::Transport(err.to_string())
}

#[async_trait]
impl VerifierContract for AlloyVerifierContract {
    async fn send_generate_proof(
        &self,
        call: &ProofCall,
        signer: &SignerIdentity,
    ) -> Result<B256, SubmissionError> {
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(EthereumWallet::from(signer.signer().clone()))
            .on_http(
                self.config
                    .rpc_url
                    .parse()
                    .map_err(|e| SubmissionError::Config(format!("Invalid RPC URL: {}", e)))?,
            );

        let contract = ILegacyProofVerifier::new(self.config.contract_address, &provider);
        let builder = contract.generateProof(call.proof_id, call.public_inputs.clone(), call.proof.clone());
        let pending = builder
            .send()
            .await
            .map_err(map_contract_error)?;

        Ok(*pending.tx_hash())
    }

    async fn call_verify_proof(
        &self,
        call: &ProofCall,
        signer: &SignerIdentity,
    ) -> Result<bool, SubmissionError> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| SubmissionError::Config(format!("Invalid RPC URL: {}", e)))?,
        );

        let contract = ILegacyProofVerifier::new(self.config.contract_address, &provider);
        let result = contract
            .verifyProof(call.proof_id, call.public_inputs.clone(), call.proof.clone())
            .from(signer.address())
            .call()
            .await
            .map_err(map_contract_error)?;

        Ok(result._0)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Confirmation, SubmissionError> {
        let provider = ProviderBuilder::new().on_http(
            self.config
                .rpc_url
                .parse()
                .map_err(|e| SubmissionError::Config(format!("Invalid RPC URL: {}", e)))?,
        );

        loop {
            let receipt = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| SubmissionError::Transport(format!("Failed to get receipt: {}", e)))?;

            if let Some(receipt) = receipt {
                return Ok(Confirmation {
                    tx_hash,
                    block_number: receipt.block_number,
                    success: receipt.status(),
                });
            }

            debug!("Tx {} not yet mined", tx_hash);
            tokio::time::sleep(self.config.confirmation_poll).await;
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    accepted: HashSet<B256>,
    spent_nullifiers: HashSet<B256>,
    invalid: HashSet<B256>,
    receipts: HashMap<B256, Confirmation>,
    block: u64,
    offline: bool,
}

/// In-process stand-in for the verifier contract.
///
/// Reverts on a repeated proof id and, when nullifier tracking is on, on a
/// repeated first public input. Proofs marked with
/// [`InMemoryVerifierContract::mark_invalid`] fail verification.
#[derive(Debug, Default)]
pub struct InMemoryVerifierContract {
    track_nullifiers: bool,
    state: Mutex<LedgerState>,
}

impl InMemoryVerifierContract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat public input 0 as a nullifier that may be spent only once.
    pub fn tracking_nullifiers(mut self) -> Self {
        self.track_nullifiers = true;
        self
    }

    pub fn mark_invalid(&self, proof_id: B256) {
        self.state.lock().invalid.insert(proof_id);
    }

    /// Make every call fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn accepted_count(&self) -> usize {
        self.state.lock().accepted.len()
    }

    fn is_valid(state: &LedgerState, call: &ProofCall) -> bool {
        !call.proof.is_empty() && !state.invalid.contains(&call.proof_id)
    }
}

#[async_trait]
impl VerifierContract for InMemoryVerifierContract {
    async fn send_generate_proof(
        &self,
        call: &ProofCall,
        signer: &SignerIdentity,
    ) -> Result<B256, SubmissionError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(SubmissionError::Transport("connection refused".to_string()));
        }
        if state.accepted.contains(&call.proof_id) {
            return Err(SubmissionError::Reverted {
                reason: Some("proof already submitted".to_string()),
            });
        }
        let nullifier = call.public_inputs.first().copied();
        if self.track_nullifiers {
            if let Some(nullifier) = nullifier {
                if state.spent_nullifiers.contains(&nullifier) {
                    return Err(SubmissionError::Reverted {
                        reason: Some("nullifier already spent".to_string()),
                    });
                }
            }
        }
        if !Self::is_valid(&state, call) {
            return Err(SubmissionError::Reverted {
                reason: Some("invalid proof".to_string()),
            });
        }

        state.accepted.insert(call.proof_id);
        if self.track_nullifiers {
            if let Some(nullifier) = nullifier {
                state.spent_nullifiers.insert(nullifier);
            }
        }
        state.block += 1;

        let mut hasher = Keccak256::new();
        hasher.update(call.proof_id);
        hasher.update(signer.address());
        hasher.update(state.block.to_be_bytes());
        let tx_hash = B256::from_slice(&hasher.finalize());

        let confirmation = Confirmation {
            tx_hash,
            block_number: Some(state.block),
            success: true,
        };
        state.receipts.insert(tx_hash, confirmation);
        Ok(tx_hash)
    }

    async fn call_verify_proof(
        &self,
        call: &ProofCall,
        _signer: &SignerIdentity,
    ) -> Result<bool, SubmissionError> {
        let state = self.state.lock();
        if state.offline {
            return Err(SubmissionError::Transport("connection refused".to_string()));
        }
        Ok(Self::is_valid(&state, call))
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<Confirmation, SubmissionError> {
        let state = self.state.lock();
        if state.offline {
            return Err(SubmissionError::Transport("connection refused".to_string()));
        }
        state
            .receipts
            .get(&tx_hash)
            .copied()
            .ok_or_else(|| SubmissionError::Transport(format!("Unknown transaction {}", tx_hash)))
    }
}
