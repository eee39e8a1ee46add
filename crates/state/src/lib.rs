//! Per-account staging buffers for the execution layer.
//!
//! A [`StagedState`] is one state-DB revision: a cache of
//! [`StateObject`]s staging balance, nonce, code and storage-slot
//! changes, a [`Journal`] recording every mutation so any prefix can
//! be rolled back, and a commit path that flushes storage tries and
//! serialized accounts through the [`StateBackend`] seam.
//!
//! The revert semantics matter to consensus: post-state hashes are
//! recomputed deterministically from these buffers, so an incomplete
//! undo diverges the chain. Every mutation primitive appends its undo
//! record *before* applying the change.
//!
//! Backend errors never panic the execution path; the first one is
//! memoized on the object and surfaced when the revision commits.

mod account;
mod backend;
mod error;
mod journal;
mod object;
mod staged;

pub use account::{
    empty_code_hash, Account, AccountKey, AccountSerializer, ProgramAccount,
};
pub use backend::{MemoryBackend, StateBackend, StorageTrie};
pub use error::StateError;
pub use journal::Journal;
pub use object::{EncodedAccount, StateObject, RIPEMD_PRECOMPILE};
pub use staged::StagedState;
