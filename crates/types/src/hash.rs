//! 32-byte hashes and the keccak primitive.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Errors from parsing hex-encoded primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// The input was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// The decoded byte length did not match the type.
    #[error("expected {expected} bytes, got {actual}")]
    BadLength { expected: usize, actual: usize },
}

impl From<hex::FromHexError> for HexError {
    fn from(e: hex::FromHexError) -> Self {
        HexError::InvalidHex(e.to_string())
    }
}

/// A 32-byte hash (keccak-256 output, storage slot key or value).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash(pub [u8; 32]);

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> Hash {
    let digest = Keccak256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hash(out)
}

impl Hash {
    /// The all-zeroes hash.
    pub const ZERO: Self = Hash([0u8; 32]);

    /// Build a hash from a byte slice, left-padding short input with
    /// zeroes. Input longer than 32 bytes keeps the low-order end.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        if bytes.len() >= 32 {
            out.copy_from_slice(&bytes[bytes.len() - 32..]);
        } else {
            out[32 - bytes.len()..].copy_from_slice(bytes);
        }
        Hash(out)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True for the all-zeroes hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// The low 60 bits of the hash as a signed seed: the first 15 hex
    /// nibbles of the canonical hex form, parsed as a base-16 integer.
    ///
    /// Both the committee draw and the proposer reshuffle seed their
    /// shuffles from this value, so the exact nibble count is part of
    /// the consensus protocol.
    pub fn seed60(&self) -> i64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[..8]);
        (u64::from_be_bytes(buf) >> 4) as i64
    }

    /// Lowercase hex with `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)?;
        if bytes.len() != 32 {
            return Err(HexError::BadLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(Hash(out))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Hash {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(D::Error::custom)
    }
}

impl rlp::Encodable for Hash {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Hash {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            if bytes.len() != 32 {
                return Err(rlp::DecoderError::RlpInvalidLength);
            }
            Ok(Hash::from_slice(bytes))
        })
    }
}
