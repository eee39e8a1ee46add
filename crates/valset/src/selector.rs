//! Proposer selection over a council snapshot.
//!
//! Both selectors are pure functions of the locked council core, so a
//! caller holding the read lock observes one consistent snapshot for
//! the whole computation.

use crate::council::CouncilCore;
use crate::validator::WeightedValidator;
use council_types::{Address, ChainParams};
use std::sync::Arc;
use tracing::warn;

/// Weighted round-robin over the shuffled proposer sequence.
///
/// The sequence was already shuffled weight-proportionally at refresh
/// time, so selection is a plain rotation: the picker walks the
/// sequence as `(block number + round)` advances past the last
/// refresh boundary. `last_proposer` is unused in weighted mode; the
/// rotation is purely round-driven.
pub(crate) fn weighted_random_proposer(
    core: &CouncilCore,
    params: &ChainParams,
    _last_proposer: Address,
    round: u64,
) -> Option<Arc<WeightedValidator>> {
    let num_proposers = core.proposers.len() as u64;
    if num_proposers == 0 {
        warn!("no available proposers");
        return None;
    }

    let base = params.calc_proposer_block_number(core.block_num + 1);
    let picker = (core.block_num + round - base) % num_proposers;
    Some(core.proposers[picker as usize].clone())
}

/// Liveness fallback when the proposer sequence is unusable: rotate
/// the validator list itself, starting from the last proposer's slot.
pub(crate) fn round_robin_proposer(
    core: &CouncilCore,
    last_proposer: Address,
    round: u64,
) -> Option<Arc<WeightedValidator>> {
    if core.validators.is_empty() {
        return None;
    }

    let seed = if last_proposer.is_zero() {
        round
    } else {
        let offset = core
            .validators
            .iter()
            .position(|v| v.address() == last_proposer)
            .unwrap_or(0) as u64;
        offset + round
    };
    let pick = seed % core.validators.len() as u64;
    Some(core.validators[pick as usize].clone())
}
