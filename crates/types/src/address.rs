//! 20-byte account / validator addresses.

use crate::hash::HexError;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 20-byte account identifier.
///
/// Addresses order lexicographically on their raw bytes; the validator
/// list of a council is kept sorted under this order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The all-zeroes address, used as "no address" in reward slots.
    pub const ZERO: Self = Address([0u8; 20]);

    /// Build an address from a byte slice, left-padding short input
    /// with zeroes. Input longer than 20 bytes keeps the low-order end.
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut out = [0u8; 20];
        if bytes.len() >= 20 {
            out.copy_from_slice(&bytes[bytes.len() - 20..]);
        } else {
            out[20 - bytes.len()..].copy_from_slice(bytes);
        }
        Address(out)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the all-zeroes address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// 64-bit digest of the address: the low 8 bytes of the 32-byte
    /// left-padded form, interpreted big-endian. Used only as a
    /// tie-breaker / debug key, never for consensus decisions.
    pub fn low64(&self) -> i64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.0[12..20]);
        i64::from_be_bytes(buf)
    }

    /// Lowercase hex with `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)?;
        if bytes.len() != 20 {
            return Err(HexError::BadLength {
                expected: 20,
                actual: bytes.len(),
            });
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl FromStr for Address {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(D::Error::custom)
    }
}

impl rlp::Encodable for Address {
    fn rlp_append(&self, s: &mut rlp::RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl rlp::Decodable for Address {
    fn decode(rlp: &rlp::Rlp) -> Result<Self, rlp::DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            if bytes.len() != 20 {
                return Err(rlp::DecoderError::RlpInvalidLength);
            }
            Ok(Address::from_slice(bytes))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let addr = Address::from_slice(&[0xab; 20]);
        let parsed = Address::from_hex(&addr.to_hex()).unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        assert!(matches!(
            Address::from_hex("0xabcd"),
            Err(HexError::BadLength {
                expected: 20,
                actual: 2
            })
        ));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Address::from_slice(&[1]);
        let b = Address::from_slice(&[2]);
        assert!(a < b);

        let mut hi = [0u8; 20];
        hi[0] = 1;
        assert!(b < Address(hi));
    }

    #[test]
    fn low64_reads_trailing_bytes() {
        let mut bytes = [0u8; 20];
        bytes[19] = 7;
        assert_eq!(Address(bytes).low64(), 7);
    }
}
