//! A single weighted validator.

use arc_swap::ArcSwap;
use council_types::Address;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Voting power assigned to every validator until the governance
/// formula for deriving it from staked balance ships. See
/// [`VotingPowerCalculator`].
pub const DEFAULT_VOTING_POWER: u64 = 1000;

/// Seam for the future stake-derived voting power formula. The
/// council consults this when it has no explicit voting powers to
/// install, so a governance implementation can slot in without
/// touching the council itself.
pub trait VotingPowerCalculator: Send + Sync {
    /// Voting power for a validator with the given staked amount.
    fn voting_power_of(&self, staking_amount: u64) -> u64;
}

/// Current behavior: a flat voting power regardless of stake.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatVotingPower;

impl VotingPowerCalculator for FlatVotingPower {
    fn voting_power_of(&self, _staking_amount: u64) -> u64 {
        DEFAULT_VOTING_POWER
    }
}

/// A council member: immutable identity, atomically replaceable
/// reward address, atomically updated weight.
///
/// The atomic cells matter: a refresh rewrites weight and reward
/// address while readers iterate the validator list, and a torn read
/// would make downstream seal verification diverge between nodes.
pub struct WeightedValidator {
    address: Address,
    reward_address: ArcSwap<Address>,
    voting_power: u64,
    weight: AtomicU64,
}

impl WeightedValidator {
    pub fn new(
        address: Address,
        reward_address: Address,
        voting_power: u64,
        weight: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            address,
            reward_address: ArcSwap::from_pointee(reward_address),
            voting_power,
            weight: AtomicU64::new(weight),
        })
    }

    /// The validator's identity. Primary key within a council.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Last stored reward address; `Address::ZERO` when unset.
    pub fn reward_address(&self) -> Address {
        **self.reward_address.load()
    }

    /// Replace the reward address. Last writer wins.
    pub fn set_reward_address(&self, reward_address: Address) {
        self.reward_address.store(Arc::new(reward_address));
    }

    pub fn voting_power(&self) -> u64 {
        self.voting_power
    }

    pub fn weight(&self) -> u64 {
        self.weight.load(Ordering::Acquire)
    }

    pub fn store_weight(&self, weight: u64) {
        self.weight.store(weight, Ordering::Release);
    }

    /// 64-bit digest of the identity, for tie-breaking and debug keys.
    pub fn digest64(&self) -> i64 {
        self.address.low64()
    }

    /// Field-by-field equality. Two handles to the same validator are
    /// always deep-equal; handles from a [`copy`] of a council are
    /// deep-equal until one side mutates.
    ///
    /// [`copy`]: crate::WeightedCouncil::copy
    pub fn deep_eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.reward_address() == other.reward_address()
            && self.voting_power == other.voting_power
            && self.weight() == other.weight()
    }

    /// A detached clone: a new validator carrying the current values
    /// of this one. Subsequent atomic updates are not shared.
    pub fn clone_detached(&self) -> Arc<Self> {
        Self::new(
            self.address,
            self.reward_address(),
            self.voting_power,
            self.weight(),
        )
    }
}

impl fmt::Display for WeightedValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl fmt::Debug for WeightedValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeightedValidator")
            .field("address", &self.address)
            .field("reward_address", &self.reward_address())
            .field("voting_power", &self.voting_power)
            .field("weight", &self.weight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte])
    }

    #[test]
    fn reward_address_replace_is_visible() {
        let val = WeightedValidator::new(addr(1), Address::ZERO, DEFAULT_VOTING_POWER, 0);
        assert_eq!(val.reward_address(), Address::ZERO);
        val.set_reward_address(addr(9));
        assert_eq!(val.reward_address(), addr(9));
    }

    #[test]
    fn weight_store_load() {
        let val = WeightedValidator::new(addr(1), Address::ZERO, DEFAULT_VOTING_POWER, 3);
        assert_eq!(val.weight(), 3);
        val.store_weight(77);
        assert_eq!(val.weight(), 77);
    }

    #[test]
    fn deep_eq_tracks_mutable_fields() {
        let a = WeightedValidator::new(addr(1), addr(2), DEFAULT_VOTING_POWER, 5);
        let b = a.clone_detached();
        assert!(a.deep_eq(&b));
        b.store_weight(6);
        assert!(!a.deep_eq(&b));
    }

    #[test]
    fn flat_voting_power_ignores_stake() {
        let calc = FlatVotingPower;
        assert_eq!(calc.voting_power_of(0), DEFAULT_VOTING_POWER);
        assert_eq!(calc.voting_power_of(u64::MAX), DEFAULT_VOTING_POWER);
    }
}
