//! One state-DB revision: the object cache plus its journal.

use crate::account::Account;
use crate::backend::StateBackend;
use crate::error::StateError;
use crate::journal::{Journal, JournalEntry};
use crate::object::StateObject;
use council_types::{keccak256, Address, Hash};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A mutable state revision. Owned by a single thread while mutating;
/// readers elsewhere work on [`deep_copy`](Self::deep_copy) clones.
pub struct StagedState {
    backend: Arc<dyn StateBackend>,
    objects: HashMap<Address, StateObject>,
    journal: Journal,
    /// Issued snapshots as `(revision id, journal length)`.
    valid_revisions: Vec<(usize, usize)>,
    next_revision_id: usize,
}

impl StagedState {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self {
            backend,
            objects: HashMap::new(),
            journal: Journal::default(),
            valid_revisions: Vec::new(),
            next_revision_id: 0,
        }
    }

    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }

    /// The staged object for `addr`, if one exists and is live.
    pub fn object(&self, addr: Address) -> Option<&StateObject> {
        self.objects.get(&addr).filter(|obj| !obj.is_deleted())
    }

    pub fn exists(&self, addr: Address) -> bool {
        self.object(addr).is_some()
    }

    /// The staged account, or `AccountDoesNotExist`.
    pub fn get_account(&self, addr: Address) -> Result<&Account, StateError> {
        self.object(addr)
            .map(StateObject::account)
            .ok_or(StateError::AccountDoesNotExist)
    }

    /// Stage an externally-owned account if nothing exists for `addr`.
    fn ensure_object(&mut self, addr: Address) {
        self.ensure_object_with(addr, Account::eoa);
    }

    fn ensure_object_with(&mut self, addr: Address, make: impl FnOnce() -> Account) {
        if !self.objects.contains_key(&addr) {
            self.journal
                .append(JournalEntry::CreateObject { address: addr });
            self.objects.insert(addr, StateObject::new(addr, make()));
        }
    }

    /// Stage a fresh program account. No-op if the address already has
    /// an object.
    pub fn create_program_account(&mut self, addr: Address) {
        self.ensure_object_with(addr, Account::program);
    }

    fn object_entry(&mut self, addr: Address) -> &mut StateObject {
        self.ensure_object(addr);
        self.objects
            .get_mut(&addr)
            .expect("object staged just above")
    }

    // ── reads ──────────────────────────────────────────────────────

    pub fn balance(&self, addr: Address) -> u128 {
        self.object(addr).map(StateObject::balance).unwrap_or(0)
    }

    pub fn nonce(&self, addr: Address) -> u64 {
        self.object(addr).map(StateObject::nonce).unwrap_or(0)
    }

    pub fn get_state(&mut self, addr: Address, key: Hash) -> Hash {
        if self.object(addr).is_none() {
            return Hash::ZERO;
        }
        let backend = self.backend.clone();
        self.object_entry(addr).get_state(backend.as_ref(), key)
    }

    // ── journaled mutations ────────────────────────────────────────

    pub fn add_balance(&mut self, addr: Address, amount: u128) {
        self.ensure_object(addr);
        let obj = self.objects.get_mut(&addr).expect("object staged above");
        obj.add_balance(&mut self.journal, amount);
    }

    pub fn sub_balance(&mut self, addr: Address, amount: u128) {
        self.ensure_object(addr);
        let obj = self.objects.get_mut(&addr).expect("object staged above");
        obj.sub_balance(&mut self.journal, amount);
    }

    pub fn set_balance(&mut self, addr: Address, amount: u128) {
        self.ensure_object(addr);
        let obj = self.objects.get_mut(&addr).expect("object staged above");
        obj.set_balance(&mut self.journal, amount);
    }

    pub fn inc_nonce(&mut self, addr: Address) {
        self.ensure_object(addr);
        let obj = self.objects.get_mut(&addr).expect("object staged above");
        obj.inc_nonce(&mut self.journal);
    }

    pub fn set_nonce(&mut self, addr: Address, nonce: u64) {
        self.ensure_object(addr);
        let obj = self.objects.get_mut(&addr).expect("object staged above");
        obj.set_nonce(&mut self.journal, nonce);
    }

    pub fn set_state(&mut self, addr: Address, key: Hash, value: Hash) {
        self.ensure_object(addr);
        let backend = self.backend.clone();
        let obj = self.objects.get_mut(&addr).expect("object staged above");
        obj.set_state(backend.as_ref(), &mut self.journal, key, value);
    }

    pub fn set_code(
        &mut self,
        addr: Address,
        code_hash: Hash,
        code: Vec<u8>,
    ) -> Result<(), StateError> {
        let backend = self.backend.clone();
        let obj = self
            .objects
            .get_mut(&addr)
            .ok_or(StateError::AccountDoesNotExist)?;
        obj.set_code(backend.as_ref(), &mut self.journal, code_hash, code)
    }

    /// Self-destruct `addr`: journaled, balance zeroed, object removed
    /// from the trie at commit. Returns `false` for absent accounts.
    pub fn suicide(&mut self, addr: Address) -> bool {
        let Some(obj) = self.objects.get_mut(&addr).filter(|o| !o.is_deleted()) else {
            return false;
        };
        self.journal.append(JournalEntry::SuicideChange {
            address: addr,
            prev: obj.is_suicided(),
            prev_balance: obj.balance(),
        });
        obj.mark_suicided();
        obj.account_mut().set_balance(0);
        true
    }

    // ── snapshots ──────────────────────────────────────────────────

    /// Issue a snapshot of the current journal position.
    pub fn snapshot(&mut self) -> usize {
        let id = self.next_revision_id;
        self.next_revision_id += 1;
        self.valid_revisions.push((id, self.journal.len()));
        id
    }

    /// Undo every mutation staged after `revision_id` was issued.
    pub fn revert_to_snapshot(&mut self, revision_id: usize) -> Result<(), StateError> {
        let idx = self
            .valid_revisions
            .iter()
            .position(|(id, _)| *id >= revision_id)
            .filter(|&idx| self.valid_revisions[idx].0 == revision_id)
            .ok_or(StateError::InvalidRevision(revision_id))?;
        let (_, journal_len) = self.valid_revisions[idx];

        self.journal.revert(&mut self.objects, journal_len);
        self.valid_revisions.truncate(idx);
        Ok(())
    }

    // ── finalization ───────────────────────────────────────────────

    /// Apply end-of-transition clearing: suicided objects and, when
    /// `delete_empty_objects` is set, touched empty accounts are
    /// removed from the revision.
    pub fn finalize(&mut self, delete_empty_objects: bool) {
        let dirty: Vec<Address> = self.journal.dirty_addresses().collect();
        for addr in dirty {
            if let Some(obj) = self.objects.get_mut(&addr) {
                if obj.is_suicided() || (delete_empty_objects && obj.empty()) {
                    obj.mark_deleted();
                }
            }
        }
        self.journal.clear();
        self.valid_revisions.clear();
    }

    /// Flush every live object: storage tries first, then the
    /// serialized account under its trie hash key. Deleted objects are
    /// removed from the backend. The first memoized backend error
    /// aborts the commit.
    pub fn commit(&mut self, delete_empty_objects: bool) -> Result<(), StateError> {
        self.finalize(delete_empty_objects);

        let addresses: Vec<Address> = self.objects.keys().copied().collect();
        for addr in addresses {
            let backend = self.backend.clone();
            if self.objects.get(&addr).is_some_and(StateObject::is_deleted) {
                backend.remove_account(keccak256(addr.as_bytes()))?;
                self.objects.remove(&addr);
                continue;
            }
            let obj = self
                .objects
                .get_mut(&addr)
                .expect("address drawn from the map");
            obj.commit_storage_trie(backend.as_ref())?;
            let encoded = obj.encoded();
            backend.write_account(encoded.trie_hash_key, &encoded.data)?;
        }
        debug!(objects = self.objects.len(), "revision committed");
        Ok(())
    }

    /// Copy for readers: objects are deep-copied, the journal is not
    /// carried over.
    pub fn deep_copy(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            objects: self
                .objects
                .iter()
                .map(|(addr, obj)| (*addr, obj.deep_copy()))
                .collect(),
            journal: Journal::default(),
            valid_revisions: Vec::new(),
            next_revision_id: 0,
        }
    }
}
