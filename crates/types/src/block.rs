//! Block headers and the consensus extra field.
//!
//! The full block/header data structures live in the node; this crate
//! models only the fields the validator-set subsystem reads: number,
//! parent hash, round, and the extra blob carrying the committee list,
//! the proposer seal and the committed seals.

use crate::{keccak256, Address, Hash};
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};

/// Message code appended to a block hash before committed-seal
/// signing. Historical wire constant; do not change.
pub const COMMIT_MSG_CODE: u8 = 2;

/// The digest a committee member signs to commit a block.
pub fn prepare_committed_seal(block_hash: Hash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(33);
    buf.extend_from_slice(block_hash.as_bytes());
    buf.push(COMMIT_MSG_CODE);
    buf
}

/// Errors from decoding the consensus extra blob.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtraError {
    #[error("malformed consensus extra: {0}")]
    Malformed(String),
}

impl From<DecoderError> for ExtraError {
    fn from(e: DecoderError) -> Self {
        ExtraError::Malformed(e.to_string())
    }
}

/// Consensus payload embedded in a header's extra field: the committee
/// the proposer claims, the proposer's own seal over the header, and
/// one committed seal per committing committee member.
///
/// Committed seals are appended after sealing, so their order need not
/// match committee order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsensusExtra {
    pub validators: Vec<Address>,
    pub seal: Vec<u8>,
    pub committed_seals: Vec<Vec<u8>>,
}

impl ConsensusExtra {
    /// RLP-encode for embedding into a header.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(3);
        s.append_list(&self.validators);
        s.append(&self.seal);
        s.begin_list(self.committed_seals.len());
        for seal in &self.committed_seals {
            s.append(seal);
        }
        s.out().to_vec()
    }

    /// Decode the extra blob of a header.
    pub fn extract(header: &Header) -> Result<Self, ExtraError> {
        Self::from_bytes(&header.extra)
    }

    /// Decode from raw RLP bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExtraError> {
        let rlp = Rlp::new(bytes);
        if !rlp.is_list() || rlp.item_count()? != 3 {
            return Err(ExtraError::Malformed("expected a 3-item list".into()));
        }
        let validators = rlp.list_at::<Address>(0)?;
        let seal: Vec<u8> = rlp.val_at(1)?;
        let seals_rlp = rlp.at(2)?;
        let mut committed_seals = Vec::with_capacity(seals_rlp.item_count()?);
        for item in seals_rlp.iter() {
            committed_seals.push(item.as_val::<Vec<u8>>()?);
        }
        Ok(Self {
            validators,
            seal,
            committed_seals,
        })
    }

    /// Copy with the proposer seal and committed seals stripped, the
    /// form covered by the block hash.
    fn sealless(&self) -> Self {
        Self {
            validators: self.validators.clone(),
            seal: Vec::new(),
            committed_seals: Vec::new(),
        }
    }
}

/// The slice of a block header this subsystem consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub number: u64,
    pub parent_hash: Hash,
    pub round: u8,
    /// RLP-encoded [`ConsensusExtra`].
    #[serde(with = "serde_bytes_hex")]
    pub extra: Vec<u8>,
}

impl Header {
    /// Block hash: keccak over the header with seals stripped from the
    /// extra field, so that sealing does not change the digest being
    /// sealed. Falls back to hashing the raw extra when the blob does
    /// not decode.
    pub fn hash(&self) -> Hash {
        let extra = match ConsensusExtra::from_bytes(&self.extra) {
            Ok(extra) => extra.sealless().to_bytes(),
            Err(_) => self.extra.clone(),
        };
        let mut s = RlpStream::new_list(4);
        s.append(&self.parent_hash);
        s.append(&self.number);
        s.append(&self.round);
        s.append(&extra);
        keccak256(&s.out())
    }
}

/// A block as seen by this subsystem: the header plus transaction
/// hashes for RPC output. Transaction bodies are out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub tx_hashes: Vec<Hash>,
}

impl Block {
    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

/// Hex serde for raw byte blobs in JSON output.
mod serde_bytes_hex {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}
