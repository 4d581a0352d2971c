use std::time::Instant;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::ProverBackend;
use crate::encoding::{proof_id, FieldElement, ToFieldElement};
use crate::error::{EncodingError, InvalidParameterError, Result};
use crate::token::TokenConfig;
use crate::types::{EmergencyAccessProof, Proof, ShieldedTransferProof, ViewingKeyProof};

/// Parameter bounds enforced before proving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Largest transfer amount, in token units
    pub max_amount: U256,

    /// Highest emergency access tier
    pub max_access_level: u8,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_amount: TokenConfig::legacy().total_supply,
            max_access_level: 3,
        }
    }
}

/// Builds the three proof kinds on top of a [`ProverBackend`].
///
/// Generation does no chain IO. Given a deterministic backend, the same
/// parameters always produce the same record; the proof id and public inputs
/// are deterministic regardless of the backend. Duplicate nullifiers are not
/// detected here: the verifier contract's nullifier set is authoritative.
pub struct ProofGenerator<B> {
    backend: B,
    config: GeneratorConfig,
}

impl<B: ProverBackend> ProofGenerator<B> {
    /// Create a new proof generator
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, GeneratorConfig::default())
    }

    pub fn with_config(backend: B, config: GeneratorConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Prove a transfer spending `nullifier` into a new note `commitment`.
    ///
    /// Public inputs: `[nullifier, commitment, amount]`.
    pub async fn generate_shielded_transfer_proof(
        &self,
        nullifier: B256,
        commitment: B256,
        amount: U256,
    ) -> Result<ShieldedTransferProof> {
        require_nonzero_word(nullifier, "nullifier")?;
        require_nonzero_word(commitment, "commitment")?;
        if amount.is_zero() || amount > self.config.max_amount {
            return Err(InvalidParameterError::AmountOutOfBounds {
                amount: amount.to_string(),
                max: self.config.max_amount.to_string(),
            }
            .into());
        }

        let public_inputs = encode_public_inputs(&[&nullifier, &commitment, &amount])?;
        let id = proof_id(&[&nullifier, &commitment, &amount]);

        debug!("Generating shielded transfer proof {}", id);
        let start = Instant::now();
        let proof = self
            .backend
            .prove_shielded_transfer(nullifier, commitment, amount)
            .await?;
        info!(
            "Shielded transfer proof {} generated in {}ms ({} bytes)",
            id,
            start.elapsed().as_millis(),
            proof.len()
        );

        Ok(ShieldedTransferProof {
            proof: Proof {
                proof_id: id,
                public_inputs,
                proof: Bytes::from(proof),
            },
            nullifier,
            commitment,
            amount,
        })
    }

    /// Prove possession of `viewing_key` for `owner`.
    ///
    /// Public inputs: `[owner, viewing_key]`.
    pub async fn generate_viewing_key_proof(
        &self,
        owner: Address,
        viewing_key: B256,
    ) -> Result<ViewingKeyProof> {
        require_nonzero_address(owner, "owner")?;
        require_nonzero_word(viewing_key, "viewing key")?;

        let public_inputs = encode_public_inputs(&[&owner, &viewing_key])?;
        let id = proof_id(&[&owner, &viewing_key]);

        debug!("Generating viewing key proof {} for {}", id, owner);
        let start = Instant::now();
        let proof = self
            .backend
            .prove_viewing_key_grant(owner, viewing_key)
            .await?;
        info!(
            "Viewing key proof {} generated in {}ms",
            id,
            start.elapsed().as_millis()
        );

        Ok(ViewingKeyProof {
            proof: Proof {
                proof_id: id,
                public_inputs,
                proof: Bytes::from(proof),
            },
            owner,
            viewing_key,
        })
    }

    /// Prove that `contact` may act for `owner` at `access_level`.
    ///
    /// Public inputs: `[owner, contact, access_level]`.
    pub async fn generate_emergency_access_proof(
        &self,
        owner: Address,
        contact: Address,
        access_level: u8,
    ) -> Result<EmergencyAccessProof> {
        require_nonzero_address(owner, "owner")?;
        require_nonzero_address(contact, "contact")?;
        if access_level == 0 || access_level > self.config.max_access_level {
            return Err(InvalidParameterError::AccessLevelOutOfRange {
                level: access_level,
                max: self.config.max_access_level,
            }
            .into());
        }

        let public_inputs = encode_public_inputs(&[&owner, &contact, &access_level])?;
        let id = proof_id(&[&owner, &contact, &access_level]);

        debug!(
            "Generating emergency access proof {} for {} -> {} (level {})",
            id, owner, contact, access_level
        );
        let start = Instant::now();
        let proof = self
            .backend
            .prove_emergency_access(owner, contact, access_level)
            .await?;
        info!(
            "Emergency access proof {} generated in {}ms",
            id,
            start.elapsed().as_millis()
        );

        Ok(EmergencyAccessProof {
            proof: Proof {
                proof_id: id,
                public_inputs,
                proof: Bytes::from(proof),
            },
            owner,
            contact,
            access_level,
        })
    }
}

pub(crate) fn encode_public_inputs(
    fields: &[&dyn ToFieldElement],
) -> std::result::Result<Vec<FieldElement>, EncodingError> {
    fields.iter().map(|field| field.to_field_element()).collect()
}

fn require_nonzero_word(value: B256, name: &'static str) -> std::result::Result<(), InvalidParameterError> {
    if value.is_zero() {
        return Err(InvalidParameterError::ZeroIdentifier(name));
    }
    Ok(())
}

fn require_nonzero_address(
    value: Address,
    name: &'static str,
) -> std::result::Result<(), InvalidParameterError> {
    if value.is_zero() {
        return Err(InvalidParameterError::ZeroIdentifier(name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LegacyZkError;
    use crate::transcript::DeterministicProver;

    fn generator() -> ProofGenerator<DeterministicProver> {
        ProofGenerator::new(DeterministicProver::new())
    }

    #[tokio::test]
    async fn test_shielded_transfer_public_inputs() {
        let nullifier = B256::repeat_byte(0x11);
        let commitment = B256::repeat_byte(0x22);
        let amount = U256::from(1_000_000u64);

        let proof = generator()
            .generate_shielded_transfer_proof(nullifier, commitment, amount)
            .await
            .expect("Failed to generate proof");

        assert_eq!(
            proof.proof.public_inputs,
            vec![
                FieldElement::from(nullifier),
                FieldElement::from(commitment),
                amount.to_field_element().unwrap(),
            ]
        );
        assert_eq!(proof.proof.proof_id, proof_id(&[&nullifier, &commitment, &amount]));
        assert!(!proof.proof.proof.is_empty());
    }

    #[tokio::test]
    async fn test_emergency_access_public_inputs() {
        let owner = Address::repeat_byte(0x01);
        let contact = Address::repeat_byte(0x02);

        let proof = generator()
            .generate_emergency_access_proof(owner, contact, 2)
            .await
            .unwrap();

        assert_eq!(proof.proof.public_inputs.len(), 3);
        assert_eq!(proof.proof.public_inputs[2].as_bytes()[31], 2);
        assert_eq!(proof.access_level, 2);
    }

    #[tokio::test]
    async fn test_rejects_zero_identifiers() {
        let gen = generator();
        let err = gen
            .generate_shielded_transfer_proof(B256::ZERO, B256::repeat_byte(1), U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LegacyZkError::InvalidParameter(InvalidParameterError::ZeroIdentifier("nullifier"))
        ));

        let err = gen
            .generate_viewing_key_proof(Address::repeat_byte(1), B256::ZERO)
            .await
            .unwrap_err();
        assert!(err.is_user_error());

        let err = gen
            .generate_emergency_access_proof(Address::repeat_byte(1), Address::ZERO, 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LegacyZkError::InvalidParameter(InvalidParameterError::ZeroIdentifier("contact"))
        ));
        // Nothing reached the backend
        assert_eq!(gen.backend().calls(), 0);
    }

    #[tokio::test]
    async fn test_amount_bounds() {
        let config = GeneratorConfig {
            max_amount: U256::from(100u64),
            max_access_level: 3,
        };
        let gen = ProofGenerator::with_config(DeterministicProver::new(), config);
        let (n, c) = (B256::repeat_byte(1), B256::repeat_byte(2));

        assert!(gen.generate_shielded_transfer_proof(n, c, U256::from(100u64)).await.is_ok());
        assert!(gen.generate_shielded_transfer_proof(n, c, U256::from(1u64)).await.is_ok());
        for bad in [U256::ZERO, U256::from(101u64)] {
            let err = gen.generate_shielded_transfer_proof(n, c, bad).await.unwrap_err();
            assert!(matches!(
                err,
                LegacyZkError::InvalidParameter(InvalidParameterError::AmountOutOfBounds { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_access_level_bounds() {
        let gen = generator();
        let (owner, contact) = (Address::repeat_byte(1), Address::repeat_byte(2));
        assert!(gen.generate_emergency_access_proof(owner, contact, 3).await.is_ok());
        for bad in [0u8, 4] {
            let err = gen
                .generate_emergency_access_proof(owner, contact, bad)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                LegacyZkError::InvalidParameter(InvalidParameterError::AccessLevelOutOfRange { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let gen = ProofGenerator::new(DeterministicProver::new().failing_permanently());
        let err = gen
            .generate_viewing_key_proof(Address::repeat_byte(1), B256::repeat_byte(2))
            .await
            .unwrap_err();
        assert!(matches!(err, LegacyZkError::Proving(_)));
        assert!(!err.is_user_error());
    }

    #[tokio::test]
    async fn test_missing_artifacts_report_circuit_load() {
        use crate::artifacts::ArtifactPaths;
        use crate::error::CircuitLoadError;
        use crate::transcript::TranscriptProver;

        let gen = ProofGenerator::new(TranscriptProver::new(ArtifactPaths::new(
            "/missing/circuits.json",
            "/missing/proving.key",
        )));
        let err = gen
            .generate_emergency_access_proof(Address::repeat_byte(1), Address::repeat_byte(2), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LegacyZkError::CircuitLoad(CircuitLoadError::Missing { .. })));
        assert!(!err.is_user_error());
    }

    #[tokio::test]
    async fn test_proof_ids_differ_by_kind_fields() {
        let gen = generator();
        let owner = Address::repeat_byte(1);
        let a = gen
            .generate_emergency_access_proof(owner, Address::repeat_byte(2), 1)
            .await
            .unwrap();
        let b = gen
            .generate_emergency_access_proof(owner, Address::repeat_byte(2), 2)
            .await
            .unwrap();
        assert_ne!(a.proof.proof_id, b.proof.proof_id);
    }
}
