//! Field element encoding
//!
//! Two representations of the same semantic value are used by the proof
//! pipeline and must not be mixed up:
//!
//! - **Padded** ([`ToFieldElement`]): the value left-padded with zero bytes to
//!   32 bytes, big-endian. This is what goes into a proof's public-input
//!   vector and what the verifier contract receives as `bytes32`.
//! - **Canonical** ([`CanonicalBytes`]): the unpadded bytes of the value.
//!   Proof ids hash the concatenation of these, never the padded form.
//!
//! ```text
//! Address 0xab..cd       padded:    0x000000000000000000000000ab..cd (32 bytes)
//!                        canonical: 0xab..cd                         (20 bytes)
//! U256 1000              padded:    0x00..03e8                       (32 bytes)
//!                        canonical: 0x03e8                           (2 bytes)
//! ```

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::EncodingError;

/// Width of a public input in bytes.
pub const FIELD_ELEMENT_BYTES: usize = 32;

/// A 32-byte, big-endian, zero-left-padded public input.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FieldElement(#[serde(with = "hex_bytes32")] [u8; FIELD_ELEMENT_BYTES]);

impl FieldElement {
    pub const ZERO: FieldElement = FieldElement([0u8; FIELD_ELEMENT_BYTES]);

    pub const fn from_bytes(bytes: [u8; FIELD_ELEMENT_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FIELD_ELEMENT_BYTES] {
        &self.0
    }

    pub fn to_b256(self) -> B256 {
        B256::from(self.0)
    }

    /// Interpret the element as an unsigned integer.
    pub fn to_u256(self) -> U256 {
        U256::from_be_bytes(self.0)
    }
}

impl From<B256> for FieldElement {
    fn from(word: B256) -> Self {
        Self(word.0)
    }
}

impl From<FieldElement> for B256 {
    fn from(element: FieldElement) -> Self {
        element.to_b256()
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self)
    }
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let raw = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        if raw.len() != 32 {
            return Err(serde::de::Error::custom("Expected 32 bytes"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&raw);
        Ok(arr)
    }
}

/// Padded public-input encoding.
pub trait ToFieldElement {
    fn to_field_element(&self) -> Result<FieldElement, EncodingError>;
}

/// Unpadded encoding used when hashing semantic fields into a proof id.
pub trait CanonicalBytes {
    fn canonical_bytes(&self) -> Vec<u8>;
}

/// Left-pad `bytes` to 32 bytes. Fails if the slice is wider than a field element.
pub fn encode_bytes(bytes: &[u8]) -> Result<FieldElement, EncodingError> {
    if bytes.len() > FIELD_ELEMENT_BYTES {
        return Err(EncodingError::Oversize(bytes.len()));
    }
    let mut out = [0u8; FIELD_ELEMENT_BYTES];
    out[FIELD_ELEMENT_BYTES - bytes.len()..].copy_from_slice(bytes);
    Ok(FieldElement(out))
}

/// Encode an arbitrary-width big-endian unsigned integer.
///
/// Leading zero bytes do not count against the width, so a 40-byte input whose
/// value fits in 32 bytes is accepted.
pub fn encode_be_bytes(bytes: &[u8]) -> Result<FieldElement, EncodingError> {
    let significant = strip_leading_zeros(bytes);
    if significant.len() > FIELD_ELEMENT_BYTES {
        return Err(EncodingError::Overflow(format!(
            "0x{} needs {} bytes",
            hex::encode(significant),
            significant.len()
        )));
    }
    encode_bytes(significant)
}

/// Encode a base-10 unsigned integer string.
pub fn encode_decimal(value: &str) -> Result<FieldElement, EncodingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EncodingError::Malformed(value.to_string()));
    }
    let parsed = U256::from_str_radix(trimmed, 10)
        .map_err(|_| EncodingError::Overflow(trimmed.to_string()))?;
    parsed.to_field_element()
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Minimal big-endian bytes of an unsigned integer; zero is a single `0x00`.
fn minimal_be(bytes: &[u8]) -> Vec<u8> {
    let significant = strip_leading_zeros(bytes);
    if significant.is_empty() {
        vec![0u8]
    } else {
        significant.to_vec()
    }
}

impl ToFieldElement for Address {
    fn to_field_element(&self) -> Result<FieldElement, EncodingError> {
        encode_bytes(self.as_slice())
    }
}

impl CanonicalBytes for Address {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl ToFieldElement for B256 {
    fn to_field_element(&self) -> Result<FieldElement, EncodingError> {
        Ok(FieldElement(self.0))
    }
}

impl CanonicalBytes for B256 {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl ToFieldElement for U256 {
    fn to_field_element(&self) -> Result<FieldElement, EncodingError> {
        Ok(FieldElement(self.to_be_bytes::<32>()))
    }
}

impl CanonicalBytes for U256 {
    fn canonical_bytes(&self) -> Vec<u8> {
        minimal_be(&self.to_be_bytes::<32>())
    }
}

impl ToFieldElement for [u8] {
    fn to_field_element(&self) -> Result<FieldElement, EncodingError> {
        encode_bytes(self)
    }
}

impl CanonicalBytes for [u8] {
    fn canonical_bytes(&self) -> Vec<u8> {
        self.to_vec()
    }
}

macro_rules! impl_uint {
    ($($t:ty),*) => {
        $(
            impl ToFieldElement for $t {
                fn to_field_element(&self) -> Result<FieldElement, EncodingError> {
                    encode_bytes(&self.to_be_bytes())
                }
            }

            impl CanonicalBytes for $t {
                fn canonical_bytes(&self) -> Vec<u8> {
                    minimal_be(&self.to_be_bytes())
                }
            }
        )*
    };
}

impl_uint!(u8, u16, u32, u64, u128);

/// Keccak-256 over the concatenated canonical bytes of `fields`, in order.
pub fn proof_id(fields: &[&dyn CanonicalBytes]) -> B256 {
    let mut hasher = Keccak256::new();
    for field in fields {
        hasher.update(field.canonical_bytes());
    }
    B256::from_slice(&hasher.finalize())
}
