//! # Legacy zero-knowledge proof client
//!
//! Off-chain side of the Legacy digital-inheritance protocol. Asset holders
//! keep vaults whose contents pass to heirs under conditions that are proven
//! without revealing amounts or identities. This crate builds those proofs,
//! drives them through the on-chain verifier contract, and carries the
//! protocol token's unit, pricing, fee and vesting arithmetic.
//!
//! ## Proof kinds
//!
//! | Proof | Public inputs (in order) | Proof id over |
//! |-------|--------------------------|---------------|
//! | Shielded transfer | nullifier, commitment, amount | nullifier ‖ commitment ‖ amount |
//! | Viewing key grant | owner, viewing key | owner ‖ viewing key |
//! | Emergency access | owner, contact, access level | owner ‖ contact ‖ access level |
//!
//! Public inputs are 32-byte, big-endian, zero-left-padded field elements.
//! Proof ids are Keccak-256 over the *unpadded* concatenation (see
//! [`encoding`]). Both orderings are part of the verifier contract's ABI.
//!
//! ## Pipeline
//!
//! ```text
//! params ──► ProofGenerator ──► ProverBackend ──► proof bytes
//!                 │                                   │
//!                 └──── proof id, public inputs ◄─────┘
//!                                 │
//!                                 ▼
//!                    SubmissionClient ──► verifier contract
//! ```
//!
//! The prover backend is a capability: [`transcript::TranscriptProver`] and
//! [`transcript::DeterministicProver`] ship in-tree, and a real proving
//! engine implements [`backend::ProverBackend`]. [`backend::RetryingProver`]
//! adds the timeout and retry policy.
//!
//! Double-spend and replay protection live entirely in the verifier
//! contract. Nothing in this crate remembers nullifiers.
//!
//! ## Usage Example
//!
//! ```ignore
//! use legacy_zk::{
//!     ArtifactPaths, ProofGenerator, ProverOptions, RetryingProver, SignerIdentity,
//!     SubmissionClient, TranscriptProver, AlloyVerifierContract, VerifierConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let prover = TranscriptProver::new(ArtifactPaths::from_env());
//!     prover.preload()?;
//!
//!     let generator = ProofGenerator::new(RetryingProver::new(prover, ProverOptions::from_env()));
//!     let proof = generator
//!         .generate_shielded_transfer_proof(nullifier, commitment, amount)
//!         .await?;
//!
//!     let config = VerifierConfig::from_env().ok_or("verifier not configured")?;
//!     let client = SubmissionClient::new(AlloyVerifierContract::new(config));
//!     let signer = SignerIdentity::from_private_key(&key)?;
//!
//!     let handle = client.submit(&proof, &signer).await?;
//!     client.confirm(&handle).await?;
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod backend;
pub mod client;
pub mod encoding;
pub mod error;
pub mod prover;
pub mod token;
pub mod transcript;
pub mod types;
pub mod verifier;
pub mod vesting;

pub use artifacts::{ArtifactCache, ArtifactPaths, CircuitArtifacts, CircuitDescription};
pub use backend::{CircuitId, ProverBackend, ProverOptions, RetryingProver};
pub use client::{
    AlloyVerifierContract, Confirmation, InMemoryVerifierContract, SignerIdentity, SubmissionClient,
    TransactionHandle, VerifierConfig, VerifierContract,
};
pub use encoding::{CanonicalBytes, FieldElement, ToFieldElement};
pub use error::{
    CircuitLoadError, EncodingError, InvalidParameterError, LegacyZkError, ProvingError, Result,
    SubmissionError, TokenError,
};
pub use prover::{GeneratorConfig, ProofGenerator};
pub use token::{BasisPoints, TokenConfig, TokenEconomics};
pub use transcript::{DeterministicProver, TranscriptProver};
pub use types::{EmergencyAccessProof, Proof, ShieldedTransferProof, VerificationResult, ViewingKeyProof};
pub use verifier::ProofVerifier;
pub use vesting::{RemainderPolicy, VestingEntry, VestingSchedule};

/// Re-export chain primitive types for convenience
pub use alloy::primitives::{Address, Bytes, B256, U256};
