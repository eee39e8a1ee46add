//! State-layer errors.

/// Errors from state objects and the staged revision.
///
/// `Clone` because the first backend error is memoized on the object
/// and returned again at commit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("account does not exist")]
    AccountDoesNotExist,

    /// Code can only be installed on a program account.
    #[error("not a program account")]
    NotProgramAccount,

    /// `revert_to_snapshot` was handed an id that was never issued or
    /// was already reverted past.
    #[error("revision id {0} cannot be reverted")]
    InvalidRevision(usize),

    /// Storage/trie backend failure.
    #[error("backend error: {0}")]
    Backend(String),

    /// Account or slot encoding failure.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl From<rlp::DecoderError> for StateError {
    fn from(e: rlp::DecoderError) -> Self {
        StateError::Encoding(e.to_string())
    }
}
