//! Public error kinds of the consensus API.
//!
//! Internal failures collapse into these kinds before leaving the
//! engine; the RPC layer maps them onto status codes without looking
//! inside.

use council_types::ExtraError;
use council_valset::CouncilError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Header lookup failed.
    #[error("unknown block")]
    UnknownBlock,

    /// The pending block has no settled consensus information.
    #[error("pending is not allowed")]
    PendingNotAllowed,

    #[error("start block number should be positive")]
    StartNotPositive,

    #[error("end block number should be smaller than the latest block number")]
    EndLargerThanLatest,

    #[error("start should be smaller than end")]
    StartLargerThanEnd,

    #[error("number of requested blocks should be smaller than 50")]
    RequestedBlocksTooLarge,

    #[error("range values should not be nil")]
    RangeNil,

    /// Header extras did not decode.
    #[error("extract consensus extra from block header of the given block number")]
    ExtractConsensusExtra,

    #[error("the block does not exist ({0})")]
    NoBlockExist(String),

    #[error("block number is not assigned")]
    NoBlockNumber,

    /// Invariant failure that callers cannot act on.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ExtraError> for ApiError {
    fn from(_: ExtraError) -> Self {
        ApiError::ExtractConsensusExtra
    }
}

impl From<CouncilError> for ApiError {
    fn from(e: CouncilError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
