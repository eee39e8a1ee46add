//! Staking snapshots consumed by the weight refresh.

use crate::Address;
use serde::{Deserialize, Serialize};

/// A staking snapshot for one block: three aligned columns (node
/// address, reward address, staked amount) plus the Gini switch.
///
/// `gini` starts at -1.0 ("not computed") and is overwritten in place
/// by the refresh when `use_gini` is set, so a stored snapshot always
/// reflects the coefficient that actually shaped the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingInfo {
    pub block_num: u64,
    pub council_node_addrs: Vec<Address>,
    pub council_reward_addrs: Vec<Address>,
    pub council_staking_amounts: Vec<u64>,
    pub use_gini: bool,
    pub gini: f64,
}

impl StakingInfo {
    /// Build a snapshot with an uncomputed Gini coefficient.
    pub fn new(
        block_num: u64,
        council_node_addrs: Vec<Address>,
        council_reward_addrs: Vec<Address>,
        council_staking_amounts: Vec<u64>,
        use_gini: bool,
    ) -> Self {
        Self {
            block_num,
            council_node_addrs,
            council_reward_addrs,
            council_staking_amounts,
            use_gini,
            gini: -1.0,
        }
    }

    /// Index of a council entry by node address.
    pub fn index_by_node_address(&self, addr: Address) -> Option<usize> {
        self.council_node_addrs.iter().position(|a| *a == addr)
    }
}

/// Gini coefficient of a set of staking amounts, rounded to two
/// decimals. Returns 0.0 for an empty or all-zero input.
pub fn gini_coefficient(amounts: &[f64]) -> f64 {
    if amounts.is_empty() {
        return 0.0;
    }
    let mut sorted = amounts.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("staking amounts are finite"));

    let mut sum_of_absolute_differences = 0.0;
    let mut sub_sum = 0.0;
    for (i, x) in sorted.iter().enumerate() {
        sum_of_absolute_differences += x * i as f64 - sub_sum;
        sub_sum += x;
    }
    if sub_sum == 0.0 {
        return 0.0;
    }
    let result = sum_of_absolute_differences / sub_sum / sorted.len() as f64;
    (result * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte])
    }

    #[test]
    fn index_lookup() {
        let info = StakingInfo::new(
            10,
            vec![addr(1), addr(2)],
            vec![addr(11), addr(12)],
            vec![100, 200],
            false,
        );
        assert_eq!(info.index_by_node_address(addr(2)), Some(1));
        assert_eq!(info.index_by_node_address(addr(3)), None);
    }

    #[test]
    fn gini_of_equal_stakes_is_zero() {
        assert_eq!(gini_coefficient(&[5.0, 5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn gini_of_skewed_stakes() {
        // sorted [1, 1, 1000, 1000]:
        //   sum of absolute differences = 3996, total = 2002
        //   3996 / 2002 / 4 = 0.499…, rounded to 0.5
        assert_eq!(gini_coefficient(&[1000.0, 1000.0, 1.0, 1.0]), 0.5);
    }

    #[test]
    fn gini_of_degenerate_inputs() {
        assert_eq!(gini_coefficient(&[]), 0.0);
        assert_eq!(gini_coefficient(&[0.0, 0.0]), 0.0);
    }
}
