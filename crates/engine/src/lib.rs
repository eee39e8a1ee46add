//! Validation facade and consensus API.
//!
//! The engine crate sits between the weighted council and the outside
//! world. It owns:
//!
//! - the seams to external collaborators ([`ChainReader`],
//!   [`SnapshotSource`], [`SealRecoverer`]): block storage, snapshot
//!   persistence and the signature scheme live in the node, not here;
//! - the pure validation facade ([`validate_consensus_info`],
//!   [`consensus_info`]) that recomputes proposer, committee and
//!   committed-seal signers for a sealed block and compares them with
//!   what the block claims;
//! - the transport-agnostic [`ConsensusApi`] whose methods are the
//!   bodies of the node's consensus RPC namespace.
//!
//! Everything here is synchronous and deterministic; the only
//! lock is the candidate map's.

mod api;
mod error;
mod traits;
mod validation;

pub use api::{BlockId, BlockWithConsensusInfo, ConsensusApi};
pub use error::ApiError;
pub use traits::{ChainReader, SealRecoverer, Snapshot, SnapshotBlob, SnapshotSource};
pub use validation::{
    consensus_info, validate_consensus_info, ConsensusInfo, ValidationResult, MAX_ROUND,
};

pub use council_valset::StakingSource;
