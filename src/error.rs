use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// A value could not be canonicalized into a 32-byte field element.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Value does not fit in 32 bytes: {0}")]
    Overflow(String),

    #[error("Byte string of {0} bytes exceeds field element width")]
    Oversize(usize),

    #[error("Malformed numeric value: {0}")]
    Malformed(String),
}

/// Caller input rejected before any proving work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidParameterError {
    #[error("{0} must not be zero")]
    ZeroIdentifier(&'static str),

    #[error("Amount {amount} outside protocol bounds [1, {max}]")]
    AmountOutOfBounds { amount: String, max: String },

    #[error("Access level {level} outside protocol tiers [1, {max}]")]
    AccessLevelOutOfRange { level: u8, max: u8 },
}

/// Circuit description or proving key could not be loaded.
#[derive(Error, Debug, Clone)]
pub enum CircuitLoadError {
    #[error("Artifact not found at {path}: {reason}")]
    Missing { path: PathBuf, reason: String },

    #[error("Malformed circuit description: {0}")]
    MalformedDescription(String),

    #[error("Circuit {0} is not defined in the circuit description")]
    UnknownCircuit(String),

    #[error("Circuit {circuit} declares {found} public inputs, expected {expected}")]
    PublicInputMismatch {
        circuit: String,
        expected: usize,
        found: usize,
    },

    #[error("Proving key is empty")]
    EmptyProvingKey,

    #[error("Proving key digest mismatch: expected {expected}, found {found}")]
    DigestMismatch { expected: String, found: String },
}

/// Failure inside the prover backend.
#[derive(Error, Debug, Clone)]
pub enum ProvingError {
    #[error("Proof generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transient prover failure: {0}")]
    Transient(String),

    #[error("Proof generation failed: {0}")]
    Failed(String),

    #[error("Prover worker failed: {0}")]
    Worker(String),

    #[error("Proof generation abandoned by caller")]
    Cancelled,

    #[error("Circuit artifacts unavailable: {0}")]
    CircuitLoad(#[from] CircuitLoadError),
}

impl ProvingError {
    /// Whether the retry loop may attempt the operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProvingError::Timeout(_) | ProvingError::Transient(_))
    }
}

/// Chain call to the verifier contract failed.
#[derive(Error, Debug, Clone)]
pub enum SubmissionError {
    #[error("Invalid verifier configuration: {0}")]
    Config(String),

    #[error("Chain transport error: {0}")]
    Transport(String),

    #[error("Contract reverted: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Reverted { reason: Option<String> },

    #[error("Transaction {tx_hash} reverted on-chain")]
    TransactionFailed { tx_hash: String },
}

impl SubmissionError {
    /// Revert reason reported by the chain, if any.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            SubmissionError::Reverted { reason } => reason.as_deref(),
            _ => None,
        }
    }
}

/// Token arithmetic rejected its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Malformed token amount: {0:?}")]
    MalformedAmount(String),

    #[error("Amount {amount:?} has more than {decimals} fractional digits")]
    TooManyDecimals { amount: String, decimals: u8 },

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Fee rate {0} bps exceeds 10000 bps")]
    InvalidFeeRate(u32),

    #[error("Invalid vesting parameters: {0}")]
    InvalidVesting(String),

    #[error("Invalid token configuration: {0}")]
    InvalidConfig(String),
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum LegacyZkError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),

    #[error(transparent)]
    CircuitLoad(#[from] CircuitLoadError),

    #[error(transparent)]
    Proving(ProvingError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl LegacyZkError {
    /// True for problems with caller-supplied input, false for infrastructure failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            LegacyZkError::Encoding(_) | LegacyZkError::InvalidParameter(_) | LegacyZkError::Token(_)
        )
    }
}

// Artifact failures are reported as `CircuitLoad` whether they surface at
// preload or on the first proof.
impl From<ProvingError> for LegacyZkError {
    fn from(err: ProvingError) -> Self {
        match err {
            ProvingError::CircuitLoad(load) => LegacyZkError::CircuitLoad(load),
            other => LegacyZkError::Proving(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LegacyZkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProvingError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(ProvingError::Transient("busy".into()).is_transient());
        assert!(!ProvingError::Failed("bad witness".into()).is_transient());
        assert!(!ProvingError::CircuitLoad(CircuitLoadError::EmptyProvingKey).is_transient());
    }

    #[test]
    fn test_artifact_failure_flattens_to_circuit_load() {
        let err = LegacyZkError::from(ProvingError::CircuitLoad(CircuitLoadError::EmptyProvingKey));
        assert!(matches!(err, LegacyZkError::CircuitLoad(CircuitLoadError::EmptyProvingKey)));
        assert!(!err.is_user_error());

        let err = LegacyZkError::from(ProvingError::Cancelled);
        assert!(matches!(err, LegacyZkError::Proving(ProvingError::Cancelled)));
    }

    #[test]
    fn test_user_error_split() {
        let user: LegacyZkError = InvalidParameterError::ZeroIdentifier("nullifier").into();
        assert!(user.is_user_error());

        let infra: LegacyZkError = SubmissionError::Transport("connection refused".into()).into();
        assert!(!infra.is_user_error());
    }

    #[test]
    fn test_revert_reason_display() {
        let err = SubmissionError::Reverted {
            reason: Some("nullifier already spent".into()),
        };
        assert_eq!(err.revert_reason(), Some("nullifier already spent"));
        assert_eq!(err.to_string(), "Contract reverted: nullifier already spent");

        let bare = SubmissionError::Reverted { reason: None };
        assert_eq!(bare.to_string(), "Contract reverted: no reason given");
    }
}
