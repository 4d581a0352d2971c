//! Off-chain consistency checks
//!
//! [`ProofVerifier`] recomputes a record's public-input vector and proof id
//! from its semantic fields and compares them with what the record carries.
//! It catches tampered or reordered records before they are sent on-chain.
//! It does not check the proof bytes against a verifying key and knows
//! nothing about spent nullifiers; both are the verifier contract's job.

use alloy::primitives::B256;
use tracing::warn;

use crate::encoding::{proof_id, CanonicalBytes, FieldElement, ToFieldElement};
use crate::prover::encode_public_inputs;
use crate::types::{EmergencyAccessProof, Proof, ShieldedTransferProof, VerificationResult, ViewingKeyProof};

#[derive(Debug, Default, Clone)]
pub struct ProofVerifier;

impl ProofVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn check_shielded_transfer(&self, record: &ShieldedTransferProof) -> VerificationResult {
        self.check(
            "shielded transfer",
            &record.proof,
            &[&record.nullifier, &record.commitment, &record.amount],
            &[&record.nullifier, &record.commitment, &record.amount],
        )
    }

    pub fn check_viewing_key(&self, record: &ViewingKeyProof) -> VerificationResult {
        self.check(
            "viewing key",
            &record.proof,
            &[&record.owner, &record.viewing_key],
            &[&record.owner, &record.viewing_key],
        )
    }

    pub fn check_emergency_access(&self, record: &EmergencyAccessProof) -> VerificationResult {
        self.check(
            "emergency access",
            &record.proof,
            &[&record.owner, &record.contact, &record.access_level],
            &[&record.owner, &record.contact, &record.access_level],
        )
    }

    fn check(
        &self,
        kind: &str,
        proof: &Proof,
        padded: &[&dyn ToFieldElement],
        canonical: &[&dyn CanonicalBytes],
    ) -> VerificationResult {
        let result = Self::compare(proof, padded, canonical);
        if let Some(reason) = &result.error {
            warn!("{} proof {} failed consistency check: {}", kind, proof.proof_id, reason);
        }
        result
    }

    fn compare(
        proof: &Proof,
        padded: &[&dyn ToFieldElement],
        canonical: &[&dyn CanonicalBytes],
    ) -> VerificationResult {
        if proof.proof.is_empty() {
            return VerificationResult::invalid("proof bytes are empty");
        }

        let expected_inputs: Vec<FieldElement> = match encode_public_inputs(padded) {
            Ok(inputs) => inputs,
            Err(e) => return VerificationResult::invalid(format!("encoding failed: {}", e)),
        };
        if proof.public_inputs.len() != expected_inputs.len() {
            return VerificationResult::invalid(format!(
                "expected {} public inputs, found {}",
                expected_inputs.len(),
                proof.public_inputs.len()
            ));
        }
        if let Some(index) = proof
            .public_inputs
            .iter()
            .zip(&expected_inputs)
            .position(|(found, expected)| found != expected)
        {
            return VerificationResult::invalid(format!("public input {} does not match", index));
        }

        let expected_id: B256 = proof_id(canonical);
        if proof.proof_id != expected_id {
            return VerificationResult::invalid(format!(
                "proof id mismatch: expected {}, found {}",
                expected_id, proof.proof_id
            ));
        }

        VerificationResult::valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prover::ProofGenerator;
    use crate::transcript::DeterministicProver;
    use alloy::primitives::{Address, U256};

    #[tokio::test]
    async fn test_generated_records_pass() {
        let gen = ProofGenerator::new(DeterministicProver::new());
        let verifier = ProofVerifier::new();

        let transfer = gen
            .generate_shielded_transfer_proof(B256::repeat_byte(1), B256::repeat_byte(2), U256::from(9u64))
            .await
            .unwrap();
        assert_eq!(verifier.check_shielded_transfer(&transfer), VerificationResult::valid());

        let grant = gen
            .generate_emergency_access_proof(Address::repeat_byte(3), Address::repeat_byte(4), 1)
            .await
            .unwrap();
        assert!(verifier.check_emergency_access(&grant).is_valid);
    }

    #[tokio::test]
    async fn test_swapped_inputs_rejected() {
        let gen = ProofGenerator::new(DeterministicProver::new());
        let mut record = gen
            .generate_viewing_key_proof(Address::repeat_byte(5), B256::repeat_byte(6))
            .await
            .unwrap();
        record.proof.public_inputs.swap(0, 1);

        let result = ProofVerifier::new().check_viewing_key(&record);
        assert!(!result.is_valid);
        assert_eq!(result.error.as_deref(), Some("public input 0 does not match"));
    }

    #[tokio::test]
    async fn test_tampered_amount_rejected() {
        let gen = ProofGenerator::new(DeterministicProver::new());
        let mut record = gen
            .generate_shielded_transfer_proof(B256::repeat_byte(1), B256::repeat_byte(2), U256::from(9u64))
            .await
            .unwrap();
        record.amount = U256::from(10u64);

        assert!(!ProofVerifier::new().check_shielded_transfer(&record).is_valid);
    }

    #[tokio::test]
    async fn test_empty_proof_rejected() {
        let gen = ProofGenerator::new(DeterministicProver::new());
        let mut record = gen
            .generate_viewing_key_proof(Address::repeat_byte(5), B256::repeat_byte(6))
            .await
            .unwrap();
        record.proof.proof = Default::default();

        let result = ProofVerifier::new().check_viewing_key(&record);
        assert_eq!(result, VerificationResult::invalid("proof bytes are empty"));
    }
}
