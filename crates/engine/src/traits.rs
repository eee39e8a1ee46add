//! Seams to external collaborators.

use crate::error::ApiError;
use council_types::{Address, Block, Hash, Header, ProposerPolicy};
use council_valset::{CouncilData, WeightedCouncil};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Read access to chain storage and chain-head tracking.
pub trait ChainReader: Send + Sync {
    fn current_header(&self) -> Option<Header>;
    fn header_by_number(&self, number: u64) -> Option<Header>;
    fn header_by_hash(&self, hash: Hash) -> Option<Header>;
    fn block_by_number(&self, number: u64) -> Option<Block>;
    fn block_by_hash(&self, hash: Hash) -> Option<Block>;

    /// The proposer that sealed block `number`. Fed by chain-head
    /// tracking; used as the "last proposer" input of recomputation.
    fn proposer_at(&self, number: u64) -> Address;
}

/// Validator-set history: the persisted snapshot machinery.
pub trait SnapshotSource: Send + Sync {
    /// The validator-set snapshot in effect at `header`.
    fn snapshot(&self, header: &Header) -> Result<Snapshot, ApiError>;
}

/// Recovery of signer addresses from seals. Wraps the node's
/// signature scheme (ecrecover in production, simpler schemes in
/// tests).
pub trait SealRecoverer: Send + Sync {
    /// Address that produced the proposer seal of `header`.
    fn recover_proposer(&self, header: &Header) -> Result<Address, ApiError>;

    /// Address that signed `digest` to produce `seal`.
    fn recover_committed_seal(&self, digest: &[u8], seal: &[u8]) -> Result<Address, ApiError>;
}

/// A validator-set snapshot bound to a block.
#[derive(Clone)]
pub struct Snapshot {
    pub number: u64,
    pub hash: Hash,
    pub council: Arc<WeightedCouncil>,
}

impl Snapshot {
    /// Serializable dump of this snapshot.
    pub fn to_blob(&self) -> SnapshotBlob {
        SnapshotBlob {
            number: self.number,
            hash: self.hash,
            policy: self.council.policy(),
            committee_size: self.council.sub_group_size(),
            council: self.council.council_data(),
        }
    }
}

/// Wire form of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBlob {
    pub number: u64,
    pub hash: Hash,
    pub policy: ProposerPolicy,
    pub committee_size: u64,
    pub council: CouncilData,
}
