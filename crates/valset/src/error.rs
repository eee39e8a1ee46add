//! Council errors.

use council_types::Address;

/// Errors from council construction and refresh.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouncilError {
    /// Refresh requires at least one validator.
    #[error("no validator")]
    NoValidator,

    /// No staking snapshot for the target block; the prior proposer
    /// sequence stays in effect.
    #[error("skip refreshing proposers due to no staking info")]
    SkipRefreshNoStakingInfo,

    /// Construction received misaligned columns.
    #[error(
        "incomplete council data: {addrs} addresses, {rewards} rewards, \
         {voting_powers} voting powers, {weights} weights"
    )]
    IncompleteCouncilData {
        addrs: usize,
        rewards: usize,
        voting_powers: usize,
        weights: usize,
    },

    /// Construction received the same address twice.
    #[error("duplicate validator {0}")]
    DuplicateValidator(Address),
}
