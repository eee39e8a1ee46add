//! The mutation journal.
//!
//! Every staging mutation appends its undo record here before the
//! change is applied, so reverting to a snapshot is a reverse replay
//! of the tail. The journal also flattens into the dirty set used for
//! empty-account clearing at finalization.

use crate::object::StateObject;
use council_types::{Address, Hash};
use std::collections::HashMap;

/// One undoable mutation.
#[derive(Debug, Clone)]
pub(crate) enum JournalEntry {
    /// An object was created; undo removes it entirely.
    CreateObject { address: Address },
    BalanceChange { address: Address, prev: u128 },
    NonceChange { address: Address, prev: u64 },
    CodeChange {
        address: Address,
        prev_hash: Hash,
        prev_code: Option<Vec<u8>>,
    },
    StorageChange {
        address: Address,
        key: Hash,
        prev: Hash,
    },
    SuicideChange {
        address: Address,
        prev: bool,
        prev_balance: u128,
    },
    TouchChange { address: Address },
}

impl JournalEntry {
    fn address(&self) -> Address {
        match self {
            JournalEntry::CreateObject { address }
            | JournalEntry::BalanceChange { address, .. }
            | JournalEntry::NonceChange { address, .. }
            | JournalEntry::CodeChange { address, .. }
            | JournalEntry::StorageChange { address, .. }
            | JournalEntry::SuicideChange { address, .. }
            | JournalEntry::TouchChange { address } => *address,
        }
    }

    fn undo(self, objects: &mut HashMap<Address, StateObject>) {
        match self {
            JournalEntry::CreateObject { address } => {
                objects.remove(&address);
            }
            JournalEntry::BalanceChange { address, prev } => {
                if let Some(obj) = objects.get_mut(&address) {
                    obj.account_mut().set_balance(prev);
                }
            }
            JournalEntry::NonceChange { address, prev } => {
                if let Some(obj) = objects.get_mut(&address) {
                    obj.account_mut().set_nonce(prev);
                }
            }
            JournalEntry::CodeChange {
                address,
                prev_hash,
                prev_code,
            } => {
                if let Some(obj) = objects.get_mut(&address) {
                    obj.restore_code(prev_hash, prev_code);
                }
            }
            JournalEntry::StorageChange { address, key, prev } => {
                if let Some(obj) = objects.get_mut(&address) {
                    obj.set_state_raw(key, prev);
                }
            }
            JournalEntry::SuicideChange {
                address,
                prev,
                prev_balance,
            } => {
                if let Some(obj) = objects.get_mut(&address) {
                    obj.restore_suicided(prev);
                    obj.account_mut().set_balance(prev_balance);
                }
            }
            JournalEntry::TouchChange { .. } => {}
        }
    }
}

/// Append-only undo log plus the flattened dirty set.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    dirties: HashMap<Address, usize>,
}

impl Journal {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Addresses touched since the journal was last cleared.
    pub fn dirty_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.dirties.keys().copied()
    }

    /// Explicitly mark an address dirty without an undoable entry.
    /// Exists for the ripemd-precompile touch quirk.
    pub fn mark_dirty(&mut self, address: Address) {
        *self.dirties.entry(address).or_default() += 1;
    }

    pub(crate) fn append(&mut self, entry: JournalEntry) {
        self.mark_dirty(entry.address());
        self.entries.push(entry);
    }

    /// Undo every entry recorded at or after `snapshot`.
    pub(crate) fn revert(
        &mut self,
        objects: &mut HashMap<Address, StateObject>,
        snapshot: usize,
    ) {
        while self.entries.len() > snapshot {
            let entry = self.entries.pop().expect("length checked above");
            let address = entry.address();
            entry.undo(objects);

            if let Some(count) = self.dirties.get_mut(&address) {
                *count -= 1;
                if *count == 0 {
                    self.dirties.remove(&address);
                }
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.dirties.clear();
    }
}
