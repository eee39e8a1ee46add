//! Chain parameters consumed by the validator-set subsystem.

use serde::{Deserialize, Serialize};

/// Default interval, in blocks, between proposer-sequence refreshes.
pub const DEFAULT_PROPOSER_UPDATE_INTERVAL: u64 = 3600;

/// Default committee target size.
pub const DEFAULT_COMMITTEE_SIZE: u64 = 21;

/// Default consensus round timeout in milliseconds.
pub const DEFAULT_ROUND_TIMEOUT_MS: u64 = 10_000;

/// Proposer selection policy. Only the weighted-random policy is
/// defined; the slot exists so snapshots can carry the policy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposerPolicy {
    WeightedRandom,
}

/// Static chain parameters relevant to proposer and committee
/// scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Blocks between proposer-sequence refreshes.
    pub proposer_update_interval: u64,
    /// Target committee size.
    pub committee_size: u64,
    /// Consensus round timeout in milliseconds.
    pub round_timeout_ms: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            proposer_update_interval: DEFAULT_PROPOSER_UPDATE_INTERVAL,
            committee_size: DEFAULT_COMMITTEE_SIZE,
            round_timeout_ms: DEFAULT_ROUND_TIMEOUT_MS,
        }
    }
}

impl ChainParams {
    /// The block at which the proposer sequence in effect for block
    /// `num` was computed: the largest multiple of the update interval
    /// not exceeding `num - 1`.
    pub fn calc_proposer_block_number(&self, num: u64) -> u64 {
        let prev = num.saturating_sub(1);
        prev - prev % self.proposer_update_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposer_block_number_floors_to_interval() {
        let params = ChainParams {
            proposer_update_interval: 10,
            ..Default::default()
        };
        assert_eq!(params.calc_proposer_block_number(1), 0);
        assert_eq!(params.calc_proposer_block_number(10), 0);
        assert_eq!(params.calc_proposer_block_number(11), 10);
        assert_eq!(params.calc_proposer_block_number(25), 20);
        assert_eq!(params.calc_proposer_block_number(0), 0);
    }
}
