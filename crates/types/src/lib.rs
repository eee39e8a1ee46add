//! Core types for the weighted council consensus subsystem.
//!
//! This crate provides the foundational types used throughout the
//! validator-set management implementation:
//!
//! - **Primitives**: `Address`, `Hash`, hex round-trips
//! - **Block plumbing**: `Header`, `Block`, the consensus extra field
//!   and the committed-seal digest
//! - **Staking**: `StakingInfo` snapshots and the Gini coefficient
//! - **Chain parameters**: proposer update interval, committee size,
//!   round timeout
//! - **Deterministic randomness**: the portable LCG that drives every
//!   consensus shuffle
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not
//! depend on any other workspace crates, making it the foundation layer.
//! Everything here is deterministic: two nodes constructing the same
//! values from the same inputs must agree byte-for-byte, because the
//! committee and proposer schedules are derived from them.

mod address;
mod block;
mod hash;
mod params;
mod rng;
mod staking;
mod view;

pub use address::Address;
pub use block::{
    prepare_committed_seal, Block, ConsensusExtra, ExtraError, Header, COMMIT_MSG_CODE,
};
pub use hash::{keccak256, Hash, HexError};
pub use params::{
    ChainParams, ProposerPolicy, DEFAULT_COMMITTEE_SIZE, DEFAULT_PROPOSER_UPDATE_INTERVAL,
    DEFAULT_ROUND_TIMEOUT_MS,
};
pub use rng::DeterministicRng;
pub use staking::{gini_coefficient, StakingInfo};
pub use view::View;
