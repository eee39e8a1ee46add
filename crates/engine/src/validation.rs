//! Pure recomputation of consensus answers for a sealed block.

use crate::error::ApiError;
use crate::traits::{ChainReader, SealRecoverer, SnapshotSource};
use council_types::{prepare_committed_seal, Address, Block, ConsensusExtra, View};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Rounds covered by the per-round proposer/committee table in
/// [`consensus_info`].
pub const MAX_ROUND: u64 = 11;

/// Outcome of recomputing a block's consensus information and
/// comparing it with what the block claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub block_number: u64,
    pub round: u8,
    /// Recomputed proposer.
    pub proposer: Address,
    /// Proposer recovered from the block's seal.
    pub proposer_from_block: Address,
    pub is_valid_proposer: bool,
    /// Recomputed committee.
    pub committee: Vec<Address>,
    /// Signers recovered from the committed seals.
    pub committee_sealed_from_block: Vec<Address>,
    /// Committee the block's extra field claims.
    pub committee_from_block: Vec<Address>,
    pub is_valid_committee: bool,
    pub is_valid_seal: bool,
}

/// Consensus information for RPC output: the validated fields plus the
/// round-0 proposer and the full per-round table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusInfo {
    pub proposer: Address,
    /// Proposer of round 0 at the same height.
    pub origin_proposer: Address,
    pub round_proposers: Vec<Address>,
    pub round_committees: Vec<Vec<Address>>,
    pub committee: Vec<Address>,
    pub committee_from_extra_seal: Vec<Address>,
    pub validators_from_extra: Vec<Address>,
    pub round: u8,
}

/// Recompute proposer, committee and committed-seal signers for a
/// sealed block against the parent snapshot, and compare with the
/// block's own claims.
pub fn validate_consensus_info(
    chain: &dyn ChainReader,
    snapshots: &dyn SnapshotSource,
    recoverer: &dyn SealRecoverer,
    block: &Block,
) -> Result<ValidationResult, ApiError> {
    let block_number = block.number();
    if block_number == 0 {
        return Ok(ValidationResult::default());
    }

    let round = block.header.round;
    let view = View::new(block_number, round as u64);

    let parent = chain
        .header_by_hash(block.header.parent_hash)
        .ok_or(ApiError::UnknownBlock)?;
    let snap = snapshots.snapshot(&parent)?;

    let proposer_from_block = recoverer.recover_proposer(&block.header)?;

    let last_proposer = chain.proposer_at(block_number - 1);
    let recomputed = snap.council.copy();
    recomputed.calc_proposer(last_proposer, round as u64);
    let proposer = recomputed
        .get_proposer()
        .map(|p| p.address())
        .ok_or_else(|| ApiError::Internal("proposer selection yielded nothing".into()))?;

    let committee: Vec<Address> = snap
        .council
        .sub_list_with_proposer(block.header.parent_hash, proposer, view)
        .iter()
        .map(|v| v.address())
        .collect();

    let extra = ConsensusExtra::extract(&block.header)?;
    let digest = prepare_committed_seal(block.hash());

    let mut committee_sealed_from_block = Vec::with_capacity(extra.committed_seals.len());
    let mut seal_err = false;
    for seal in &extra.committed_seals {
        let addr = recoverer.recover_committed_seal(&digest, seal)?;
        if !committee.contains(&addr) {
            warn!(signer = %addr, block_number, "committed seal from outside the committee");
            seal_err = true;
        }
        committee_sealed_from_block.push(addr);
    }

    Ok(ValidationResult {
        block_number,
        round,
        proposer,
        proposer_from_block,
        is_valid_proposer: proposer_from_block == proposer,
        is_valid_committee: committee == extra.validators,
        committee,
        committee_sealed_from_block,
        committee_from_block: extra.validators,
        is_valid_seal: !seal_err,
    })
}

/// Consensus information for a block, including the proposer and
/// committee every round `0..MAX_ROUND` would have had. Committee
/// tails (slots 2 and up) are sorted for stable display.
pub fn consensus_info(
    chain: &dyn ChainReader,
    snapshots: &dyn SnapshotSource,
    recoverer: &dyn SealRecoverer,
    block: &Block,
) -> Result<ConsensusInfo, ApiError> {
    let block_number = block.number();
    if block_number == 0 {
        return Ok(ConsensusInfo::default());
    }

    let round = block.header.round;
    let view = View::new(block_number, round as u64);
    let parent_hash = block.header.parent_hash;

    let parent = chain
        .header_by_hash(parent_hash)
        .ok_or(ApiError::UnknownBlock)?;
    let snap = snapshots.snapshot(&parent)?;

    let proposer = recoverer.recover_proposer(&block.header)?;
    let last_proposer = chain.proposer_at(block_number - 1);

    let origin = snap.council.copy();
    origin.calc_proposer(last_proposer, 0);
    let origin_proposer = origin
        .get_proposer()
        .map(|p| p.address())
        .unwrap_or(Address::ZERO);

    let mut round_proposers = Vec::with_capacity(MAX_ROUND as usize);
    let mut round_committees = Vec::with_capacity(MAX_ROUND as usize);
    for i in 0..MAX_ROUND {
        let vs = snap.council.copy();
        vs.calc_proposer(last_proposer, i);
        round_proposers.push(
            vs.get_proposer()
                .map(|p| p.address())
                .unwrap_or(Address::ZERO),
        );

        let mut committee: Vec<Address> = vs
            .sub_list(parent_hash, view)
            .iter()
            .map(|v| v.address())
            .collect();
        sort_tail(&mut committee);
        round_committees.push(committee);
    }

    let mut committee: Vec<Address> = snap
        .council
        .sub_list_with_proposer(parent_hash, proposer, view)
        .iter()
        .map(|v| v.address())
        .collect();
    sort_tail(&mut committee);

    let extra = ConsensusExtra::extract(&block.header)?;
    let digest = prepare_committed_seal(block.hash());
    let mut committee_from_extra_seal = Vec::with_capacity(extra.committed_seals.len());
    for seal in &extra.committed_seals {
        let addr = recoverer.recover_committed_seal(&digest, seal)?;
        if !committee.contains(&addr) {
            warn!(signer = %addr, block_number, "committed seal signer not in the committee");
        }
        committee_from_extra_seal.push(addr);
    }
    committee_from_extra_seal.sort();

    let mut validators_from_extra = extra.validators;
    sort_tail(&mut validators_from_extra);

    Ok(ConsensusInfo {
        proposer,
        origin_proposer,
        round_proposers,
        round_committees,
        committee,
        committee_from_extra_seal,
        validators_from_extra,
        round,
    })
}

/// Sort everything after the proposer / next-proposer slots.
fn sort_tail(addrs: &mut [Address]) {
    if addrs.len() > 2 {
        addrs[2..].sort();
    }
}
