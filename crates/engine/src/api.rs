//! Transport-agnostic bodies of the consensus RPC namespace.

use crate::error::ApiError;
use crate::traits::{ChainReader, SealRecoverer, SnapshotBlob, SnapshotSource};
use crate::validation::{consensus_info, validate_consensus_info, ConsensusInfo, ValidationResult};
use council_types::{Address, Block, ChainParams, ConsensusExtra, Hash, Header};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

/// Cap on `get_block_with_consensus_info_by_number_range` spans.
const MAX_RANGE_BLOCKS: i64 = 50;

/// A block reference in an RPC request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    Latest,
    Pending,
    Number(u64),
}

impl FromStr for BlockId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(BlockId::Latest),
            "pending" => Ok(BlockId::Pending),
            _ => {
                let parsed = if let Some(hex) = s.strip_prefix("0x") {
                    u64::from_str_radix(hex, 16)
                } else {
                    s.parse::<u64>()
                };
                parsed
                    .map(BlockId::Number)
                    .map_err(|_| format!("invalid block number {s:?}"))
            }
        }
    }
}

/// A block joined with its consensus information, the RPC output of
/// the `…WithConsensusInfo` family. Transactions are reported as
/// hashes; bodies live in the chain namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockWithConsensusInfo {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    pub round: u8,
    pub proposer: Address,
    pub origin_proposer: Address,
    pub committee: Vec<Address>,
    pub committee_from_extra: Vec<Address>,
    pub committee_seal_from_extra: Vec<Address>,
    pub round_proposers: Vec<Address>,
    pub round_committees: Vec<Vec<Address>>,
    pub transactions: Vec<Hash>,
}

impl BlockWithConsensusInfo {
    fn assemble(block: &Block, info: ConsensusInfo) -> Self {
        Self {
            number: block.number(),
            hash: block.hash(),
            parent_hash: block.header.parent_hash,
            round: info.round,
            proposer: info.proposer,
            origin_proposer: info.origin_proposer,
            committee: info.committee,
            committee_from_extra: info.validators_from_extra,
            committee_seal_from_extra: info.committee_from_extra_seal,
            round_proposers: info.round_proposers,
            round_committees: info.round_committees,
            transactions: block.tx_hashes.clone(),
        }
    }
}

/// The consensus RPC surface.
pub struct ConsensusApi {
    chain: Arc<dyn ChainReader>,
    snapshots: Arc<dyn SnapshotSource>,
    recoverer: Arc<dyn SealRecoverer>,
    params: ChainParams,
    /// Authorization candidates this node votes on.
    candidates: RwLock<HashMap<Address, bool>>,
}

impl ConsensusApi {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        snapshots: Arc<dyn SnapshotSource>,
        recoverer: Arc<dyn SealRecoverer>,
        params: ChainParams,
    ) -> Self {
        Self {
            chain,
            snapshots,
            recoverer,
            params,
            candidates: RwLock::new(HashMap::new()),
        }
    }

    fn header_for(&self, number: Option<BlockId>) -> Result<Header, ApiError> {
        match number {
            None | Some(BlockId::Latest) => {
                self.chain.current_header().ok_or(ApiError::UnknownBlock)
            }
            Some(BlockId::Pending) => Err(ApiError::PendingNotAllowed),
            Some(BlockId::Number(n)) => {
                self.chain.header_by_number(n).ok_or(ApiError::UnknownBlock)
            }
        }
    }

    fn block_for(&self, number: Option<BlockId>) -> Result<Block, ApiError> {
        match number {
            None => Err(ApiError::NoBlockNumber),
            Some(BlockId::Pending) => Err(ApiError::PendingNotAllowed),
            Some(BlockId::Latest) => {
                let header = self.chain.current_header().ok_or(ApiError::UnknownBlock)?;
                self.chain
                    .block_by_number(header.number)
                    .ok_or_else(|| ApiError::NoBlockExist(format!("block number: {}", header.number)))
            }
            Some(BlockId::Number(n)) => self
                .chain
                .block_by_number(n)
                .ok_or_else(|| ApiError::NoBlockExist(format!("block number: {n}"))),
        }
    }

    // ── snapshots & validators ─────────────────────────────────────

    pub fn get_snapshot(&self, number: Option<BlockId>) -> Result<SnapshotBlob, ApiError> {
        let header = self.header_for(number)?;
        Ok(self.snapshots.snapshot(&header)?.to_blob())
    }

    pub fn get_snapshot_at_hash(&self, hash: Hash) -> Result<SnapshotBlob, ApiError> {
        let header = self.chain.header_by_hash(hash).ok_or(ApiError::UnknownBlock)?;
        Ok(self.snapshots.snapshot(&header)?.to_blob())
    }

    pub fn get_validators(&self, number: Option<BlockId>) -> Result<Vec<Address>, ApiError> {
        let header = self.header_for(number)?;
        Ok(self.snapshots.snapshot(&header)?.to_blob().council.validators)
    }

    pub fn get_validators_at_hash(&self, hash: Hash) -> Result<Vec<Address>, ApiError> {
        let header = self.chain.header_by_hash(hash).ok_or(ApiError::UnknownBlock)?;
        Ok(self.snapshots.snapshot(&header)?.to_blob().council.validators)
    }

    // ── candidates ─────────────────────────────────────────────────

    /// Candidates this node currently tries to push through, with the
    /// direction of the vote.
    pub fn candidates(&self) -> HashMap<Address, bool> {
        self.candidates.read().clone()
    }

    /// Start voting `auth` on `address`.
    pub fn propose(&self, address: Address, auth: bool) {
        self.candidates.write().insert(address, auth);
    }

    /// Stop voting on `address`.
    pub fn discard(&self, address: Address) {
        self.candidates.write().remove(&address);
    }

    // ── council & committee ────────────────────────────────────────

    pub fn get_council(&self, number: Option<BlockId>) -> Result<Vec<Address>, ApiError> {
        let header = match self.header_for(number) {
            Ok(header) => header,
            Err(ApiError::UnknownBlock) => {
                let asked = match number {
                    Some(BlockId::Number(n)) => format!("block number: {n}"),
                    _ => "latest".to_string(),
                };
                return Err(ApiError::NoBlockExist(asked));
            }
            Err(e) => return Err(e),
        };
        let snap = self
            .snapshots
            .snapshot(&header)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        Ok(snap.to_blob().council.validators)
    }

    pub fn get_council_size(&self, number: Option<BlockId>) -> Result<usize, ApiError> {
        Ok(self.get_council(number)?.len())
    }

    /// Committee recorded in the block's extra field.
    pub fn get_committee(&self, number: Option<BlockId>) -> Result<Vec<Address>, ApiError> {
        let header = match self.header_for(number) {
            Ok(header) => header,
            Err(ApiError::UnknownBlock) => {
                let asked = match number {
                    Some(BlockId::Number(n)) => format!("block number: {n}"),
                    _ => "latest".to_string(),
                };
                return Err(ApiError::NoBlockExist(asked));
            }
            Err(e) => return Err(e),
        };
        let extra = ConsensusExtra::extract(&header)?;
        Ok(extra.validators)
    }

    pub fn get_committee_size(&self, number: Option<BlockId>) -> Result<usize, ApiError> {
        Ok(self.get_committee(number)?.len())
    }

    // ── validation & consensus info ────────────────────────────────

    pub fn validate_block(&self, number: Option<BlockId>) -> Result<ValidationResult, ApiError> {
        let block = self.block_for(number)?;
        validate_consensus_info(
            self.chain.as_ref(),
            self.snapshots.as_ref(),
            self.recoverer.as_ref(),
            &block,
        )
    }

    pub fn get_block_with_consensus_info_by_number(
        &self,
        number: Option<BlockId>,
    ) -> Result<BlockWithConsensusInfo, ApiError> {
        let block = self.block_for(number)?;
        let info = consensus_info(
            self.chain.as_ref(),
            self.snapshots.as_ref(),
            self.recoverer.as_ref(),
            &block,
        )
        .map_err(|e| match e {
            ApiError::ExtractConsensusExtra => e,
            other => ApiError::Internal(other.to_string()),
        })?;
        Ok(BlockWithConsensusInfo::assemble(&block, info))
    }

    /// Consensus info for every block in `start..=end`, keyed by hex
    /// block number. A block that fails to produce its info degrades
    /// to `null` instead of failing the whole range.
    pub fn get_block_with_consensus_info_by_number_range(
        &self,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<BTreeMap<String, Option<BlockWithConsensusInfo>>, ApiError> {
        let (Some(start), Some(end)) = (start, end) else {
            return Err(ApiError::RangeNil);
        };
        if start < 0 {
            return Err(ApiError::StartNotPositive);
        }
        let latest = self
            .chain
            .current_header()
            .map(|h| h.number as i64)
            .unwrap_or(0);
        if end > latest {
            return Err(ApiError::EndLargerThanLatest);
        }
        if start > end {
            return Err(ApiError::StartLargerThanEnd);
        }
        if end - start > MAX_RANGE_BLOCKS {
            return Err(ApiError::RequestedBlocksTooLarge);
        }

        let mut blocks = BTreeMap::new();
        for number in start..=end {
            let key = format!("0x{number:x}");
            match self.get_block_with_consensus_info_by_number(Some(BlockId::Number(number as u64)))
            {
                Ok(info) => {
                    blocks.insert(key, Some(info));
                }
                Err(e) => {
                    warn!(number, error = %e, "consensus info failed for block in range");
                    blocks.insert(key, None);
                }
            }
        }
        Ok(blocks)
    }

    pub fn get_block_with_consensus_info_by_hash(
        &self,
        hash: Hash,
    ) -> Result<BlockWithConsensusInfo, ApiError> {
        let block = self
            .chain
            .block_by_hash(hash)
            .ok_or_else(|| ApiError::NoBlockExist(format!("block hash: {hash}")))?;
        let info = consensus_info(
            self.chain.as_ref(),
            self.snapshots.as_ref(),
            self.recoverer.as_ref(),
            &block,
        )
        .map_err(|e| match e {
            ApiError::ExtractConsensusExtra => e,
            other => ApiError::Internal(other.to_string()),
        })?;
        Ok(BlockWithConsensusInfo::assemble(&block, info))
    }

    /// Consensus round timeout in milliseconds.
    pub fn get_timeout(&self) -> u64 {
        self.params.round_timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Snapshot;
    use council_types::ProposerPolicy;
    use council_valset::WeightedCouncil;

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte])
    }

    struct EmptyChain;

    impl ChainReader for EmptyChain {
        fn current_header(&self) -> Option<Header> {
            None
        }
        fn header_by_number(&self, _number: u64) -> Option<Header> {
            None
        }
        fn header_by_hash(&self, _hash: Hash) -> Option<Header> {
            None
        }
        fn block_by_number(&self, _number: u64) -> Option<Block> {
            None
        }
        fn block_by_hash(&self, _hash: Hash) -> Option<Block> {
            None
        }
        fn proposer_at(&self, _number: u64) -> Address {
            Address::ZERO
        }
    }

    struct EmptySnapshots;

    impl SnapshotSource for EmptySnapshots {
        fn snapshot(&self, header: &Header) -> Result<Snapshot, ApiError> {
            let council = WeightedCouncil::new(
                &[],
                None,
                None,
                None,
                ProposerPolicy::WeightedRandom,
                21,
                header.number,
                0,
                ChainParams::default(),
            )
            .map_err(|e| ApiError::Internal(e.to_string()))?;
            Ok(Snapshot {
                number: header.number,
                hash: header.hash(),
                council: Arc::new(council),
            })
        }
    }

    struct NoSeals;

    impl SealRecoverer for NoSeals {
        fn recover_proposer(&self, _header: &Header) -> Result<Address, ApiError> {
            Ok(Address::ZERO)
        }
        fn recover_committed_seal(
            &self,
            _digest: &[u8],
            _seal: &[u8],
        ) -> Result<Address, ApiError> {
            Ok(Address::ZERO)
        }
    }

    fn api() -> ConsensusApi {
        ConsensusApi::new(
            Arc::new(EmptyChain),
            Arc::new(EmptySnapshots),
            Arc::new(NoSeals),
            ChainParams::default(),
        )
    }

    #[test]
    fn block_id_parsing() {
        assert_eq!("latest".parse::<BlockId>().unwrap(), BlockId::Latest);
        assert_eq!("pending".parse::<BlockId>().unwrap(), BlockId::Pending);
        assert_eq!("17".parse::<BlockId>().unwrap(), BlockId::Number(17));
        assert_eq!("0x11".parse::<BlockId>().unwrap(), BlockId::Number(17));
        assert!("first".parse::<BlockId>().is_err());
    }

    #[test]
    fn candidate_bookkeeping() {
        let api = api();
        assert!(api.candidates().is_empty());

        api.propose(addr(1), true);
        api.propose(addr(2), false);
        let candidates = api.candidates();
        assert_eq!(candidates.get(&addr(1)), Some(&true));
        assert_eq!(candidates.get(&addr(2)), Some(&false));

        api.discard(addr(1));
        assert!(!api.candidates().contains_key(&addr(1)));
    }

    #[test]
    fn pending_is_rejected_everywhere() {
        let api = api();
        assert_eq!(
            api.get_snapshot(Some(BlockId::Pending)).unwrap_err(),
            ApiError::PendingNotAllowed
        );
        assert_eq!(
            api.get_council(Some(BlockId::Pending)).unwrap_err(),
            ApiError::PendingNotAllowed
        );
        assert_eq!(
            api.get_committee(Some(BlockId::Pending)).unwrap_err(),
            ApiError::PendingNotAllowed
        );
        assert_eq!(
            api.validate_block(Some(BlockId::Pending)).unwrap_err(),
            ApiError::PendingNotAllowed
        );
        assert_eq!(
            api.get_block_with_consensus_info_by_number(Some(BlockId::Pending))
                .unwrap_err(),
            ApiError::PendingNotAllowed
        );
    }

    #[test]
    fn validate_requires_a_block_number() {
        let api = api();
        assert_eq!(api.validate_block(None).unwrap_err(), ApiError::NoBlockNumber);
        assert_eq!(
            api.get_block_with_consensus_info_by_number(None).unwrap_err(),
            ApiError::NoBlockNumber
        );
    }

    #[test]
    fn range_rejects_nil_and_negative_start() {
        let api = api();
        assert_eq!(
            api.get_block_with_consensus_info_by_number_range(None, Some(5))
                .unwrap_err(),
            ApiError::RangeNil
        );
        assert_eq!(
            api.get_block_with_consensus_info_by_number_range(Some(-1), Some(5))
                .unwrap_err(),
            ApiError::StartNotPositive
        );
    }

    #[test]
    fn timeout_comes_from_chain_params() {
        let api = api();
        assert_eq!(api.get_timeout(), ChainParams::default().round_timeout_ms);
    }
}
