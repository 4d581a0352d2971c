use std::fmt;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::encoding::FieldElement;

/// Fields shared by every proof kind.
///
/// `proof_id` hashes the semantic parameters only, so two proofs for the same
/// logical request share an id even when the proof bytes differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub proof_id: B256,

    /// Order matches the circuit's public-input declaration order.
    pub public_inputs: Vec<FieldElement>,

    /// Opaque blob produced by the prover backend
    pub proof: Bytes,
}

impl Proof {
    /// Public inputs in the `bytes32[]` form the verifier contract takes.
    pub fn public_input_words(&self) -> Vec<B256> {
        self.public_inputs.iter().map(|input| input.to_b256()).collect()
    }

    /// Get the size of the proof in bytes
    pub fn size(&self) -> usize {
        self.proof.len()
    }
}

/// Transfer from a spent note to a newly created note of hidden amount.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldedTransferProof {
    #[serde(flatten)]
    pub proof: Proof,
    pub nullifier: B256,
    pub commitment: B256,
    pub amount: U256,
}

/// Proves possession of the viewing key for `owner`'s vault.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewingKeyProof {
    #[serde(flatten)]
    pub proof: Proof,
    pub owner: Address,
    pub viewing_key: B256,
}

/// Authorizes `contact` to act for `owner` at `access_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyAccessProof {
    #[serde(flatten)]
    pub proof: Proof,
    pub owner: Address,
    pub contact: Address,
    pub access_level: u8,
}

impl AsRef<Proof> for ShieldedTransferProof {
    fn as_ref(&self) -> &Proof {
        &self.proof
    }
}

impl AsRef<Proof> for ViewingKeyProof {
    fn as_ref(&self) -> &Proof {
        &self.proof
    }
}

impl AsRef<Proof> for EmergencyAccessProof {
    fn as_ref(&self) -> &Proof {
        &self.proof
    }
}

impl AsRef<Proof> for Proof {
    fn as_ref(&self) -> &Proof {
        self
    }
}

// Amount and viewing key stay out of logs.
impl fmt::Debug for ShieldedTransferProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShieldedTransferProof")
            .field("proof_id", &self.proof.proof_id)
            .field("nullifier", &self.nullifier)
            .field("commitment", &self.commitment)
            .field("amount", &"<redacted>")
            .field("proof_len", &self.proof.size())
            .finish()
    }
}

impl fmt::Debug for ViewingKeyProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewingKeyProof")
            .field("proof_id", &self.proof.proof_id)
            .field("owner", &self.owner)
            .field("viewing_key", &"<redacted>")
            .field("proof_len", &self.proof.size())
            .finish()
    }
}

/// Outcome of an off-chain consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub error: Option<String>,
}

impl VerificationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_transfer() -> ShieldedTransferProof {
        ShieldedTransferProof {
            proof: Proof {
                proof_id: B256::repeat_byte(9),
                public_inputs: vec![FieldElement::from_bytes([1u8; 32])],
                proof: Bytes::from(vec![7u8; 128]),
            },
            nullifier: B256::repeat_byte(1),
            commitment: B256::repeat_byte(2),
            amount: U256::from(424242u64),
        }
    }

    #[test]
    fn test_debug_redacts_amount() {
        let rendered = format!("{:?}", sample_transfer());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("424242"));
    }

    #[test]
    fn test_serde_flattens_base_fields() {
        let transfer = sample_transfer();
        let json = serde_json::to_value(&transfer).unwrap();
        assert!(json.get("proof_id").is_some());
        assert!(json.get("public_inputs").is_some());
        assert!(json.get("nullifier").is_some());

        let back: ShieldedTransferProof = serde_json::from_value(json).unwrap();
        assert_eq!(back, transfer);
    }

    #[test]
    fn test_public_input_words() {
        let transfer = sample_transfer();
        let words = transfer.as_ref().public_input_words();
        assert_eq!(words, vec![B256::repeat_byte(1)]);
        assert_eq!(transfer.proof.size(), 128);
    }
}
