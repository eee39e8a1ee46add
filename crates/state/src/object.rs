//! A per-account staging buffer.

use crate::account::{empty_code_hash, Account, AccountKey, AccountSerializer};
use crate::backend::{StateBackend, StorageTrie};
use crate::error::StateError;
use crate::journal::{Journal, JournalEntry};
use council_types::{keccak256, Address, Hash};
use rlp::{Rlp, RlpStream};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::error;

/// The ripemd precompile address. Touching it marks it dirty directly
/// in the journal, a historical chain-compatibility quirk that must be
/// preserved verbatim.
pub const RIPEMD_PRECOMPILE: Address = Address([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3,
]);

/// Memoized RLP snapshot of an account, produced once per object for
/// the trie-update pipeline.
#[derive(Debug, Clone)]
pub struct EncodedAccount {
    /// Serialized account.
    pub data: Vec<u8>,
    /// Keccak of the address: the key this account hashes to in the
    /// state trie.
    pub trie_hash_key: Hash,
}

/// An account being modified.
///
/// Obtain one through [`crate::StagedState`], mutate it through the
/// journaled primitives, and let the staged revision commit or revert
/// it. Mutators take the owning revision's [`Journal`] so every change
/// is undoable.
pub struct StateObject {
    address: Address,
    account: Account,

    /// First backend error observed by this object. The consensus
    /// core and VM cannot handle database errors mid-transition, so
    /// the error is remembered here and surfaced at commit.
    db_err: Option<StateError>,

    /// Storage trie, opened on first access.
    storage_trie: Option<Box<dyn StorageTrie>>,
    /// Contract bytecode, loaded on first access.
    code: Option<Vec<u8>>,

    /// Read-through cache over trie slots plus pending writes.
    cached_storage: HashMap<Hash, Hash>,
    /// Pending writes awaiting flush.
    dirty_storage: HashMap<Hash, Hash>,

    dirty_code: bool,
    suicided: bool,
    deleted: bool,

    encoded: OnceLock<EncodedAccount>,
}

impl StateObject {
    pub fn new(address: Address, account: Account) -> Self {
        Self {
            address,
            account,
            db_err: None,
            storage_trie: None,
            code: None,
            cached_storage: HashMap::new(),
            dirty_storage: HashMap::new(),
            dirty_code: false,
            suicided: false,
            deleted: false,
            encoded: OnceLock::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub(crate) fn account_mut(&mut self) -> &mut Account {
        self.invalidate_encoding();
        &mut self.account
    }

    pub fn balance(&self) -> u128 {
        self.account.balance()
    }

    pub fn nonce(&self) -> u64 {
        self.account.nonce()
    }

    pub fn account_key(&self) -> &AccountKey {
        self.account.key()
    }

    pub fn update_key(&mut self, key: AccountKey, block_num: u64) {
        self.invalidate_encoding();
        self.account.update_key(key, block_num);
    }

    /// Empty in the account-clearing sense.
    pub fn empty(&self) -> bool {
        self.account.empty()
    }

    pub fn is_suicided(&self) -> bool {
        self.suicided
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// First memoized backend error, if any.
    pub fn error(&self) -> Option<&StateError> {
        self.db_err.as_ref()
    }

    /// Remember the first error; later ones are dropped.
    fn set_error(&mut self, err: StateError) {
        if self.db_err.is_none() {
            self.db_err = Some(err);
        }
    }

    // ── balance ────────────────────────────────────────────────────

    /// Credit `amount`. A zero credit still touches the account so
    /// empty-account clearing can observe it.
    pub fn add_balance(&mut self, journal: &mut Journal, amount: u128) {
        if amount == 0 {
            if self.empty() {
                self.touch(journal);
            }
            return;
        }
        self.set_balance(journal, self.balance() + amount);
    }

    /// Debit `amount`. The caller has already checked funds. A zero
    /// debit still touches the account so empty-account clearing can
    /// observe it.
    pub fn sub_balance(&mut self, journal: &mut Journal, amount: u128) {
        if amount == 0 {
            if self.empty() {
                self.touch(journal);
            }
            return;
        }
        self.set_balance(journal, self.balance().saturating_sub(amount));
    }

    pub fn set_balance(&mut self, journal: &mut Journal, amount: u128) {
        journal.append(JournalEntry::BalanceChange {
            address: self.address,
            prev: self.balance(),
        });
        self.invalidate_encoding();
        self.account.set_balance(amount);
    }

    // ── nonce ──────────────────────────────────────────────────────

    pub fn inc_nonce(&mut self, journal: &mut Journal) {
        let nonce = self.nonce();
        journal.append(JournalEntry::NonceChange {
            address: self.address,
            prev: nonce,
        });
        self.invalidate_encoding();
        self.account.set_nonce(nonce + 1);
    }

    pub fn set_nonce(&mut self, journal: &mut Journal, nonce: u64) {
        journal.append(JournalEntry::NonceChange {
            address: self.address,
            prev: self.nonce(),
        });
        self.invalidate_encoding();
        self.account.set_nonce(nonce);
    }

    // ── code ───────────────────────────────────────────────────────

    /// Code hash; the empty-code hash for accounts without bytecode.
    pub fn code_hash(&self) -> Hash {
        self.account
            .as_program()
            .map(|p| p.code_hash())
            .unwrap_or_else(empty_code_hash)
    }

    /// Bytecode, loaded from the backend on first access and memoized.
    pub fn code(&mut self, backend: &dyn StateBackend) -> Option<&[u8]> {
        if self.code.is_some() {
            return self.code.as_deref();
        }
        let code_hash = self.code_hash();
        if code_hash == empty_code_hash() {
            return None;
        }
        match backend.contract_code(code_hash) {
            Ok(code) => {
                self.code = Some(code);
                self.code.as_deref()
            }
            Err(e) => {
                self.set_error(StateError::Backend(format!(
                    "can't load code hash {code_hash}: {e}"
                )));
                None
            }
        }
    }

    /// Install new code. Only program accounts carry code.
    pub fn set_code(
        &mut self,
        backend: &dyn StateBackend,
        journal: &mut Journal,
        code_hash: Hash,
        code: Vec<u8>,
    ) -> Result<(), StateError> {
        if self.account.as_program().is_none() {
            error!(address = %self.address, "set_code called on a non-program account");
            return Err(StateError::NotProgramAccount);
        }
        let prev_hash = self.code_hash();
        let prev_code = self.code(backend).map(<[u8]>::to_vec);
        journal.append(JournalEntry::CodeChange {
            address: self.address,
            prev_hash,
            prev_code,
        });

        self.code = Some(code);
        self.invalidate_encoding();
        if let Some(program) = self.account.as_program_mut() {
            program.set_code_hash(code_hash);
        }
        self.dirty_code = true;
        Ok(())
    }

    pub(crate) fn restore_code(&mut self, code_hash: Hash, code: Option<Vec<u8>>) {
        self.code = code;
        self.invalidate_encoding();
        if let Some(program) = self.account.as_program_mut() {
            program.set_code_hash(code_hash);
        }
    }

    /// Has a non-empty code hash.
    pub fn is_contract_account(&self) -> bool {
        self.account
            .as_program()
            .map(|p| p.code_hash() != empty_code_hash())
            .unwrap_or(false)
    }

    /// Has contract code and has not self-destructed.
    pub fn is_contract_available(&self) -> bool {
        self.is_contract_account() && !self.suicided
    }

    pub fn is_program_account(&self) -> bool {
        self.account.as_program().is_some()
    }

    // ── storage ────────────────────────────────────────────────────

    fn storage_trie(&mut self, backend: &dyn StateBackend) -> &mut dyn StorageTrie {
        if self.storage_trie.is_none() {
            let root = self
                .account
                .as_program()
                .map(|p| p.storage_root())
                .unwrap_or(Hash::ZERO);
            let trie = match backend.open_storage_trie(root) {
                Ok(trie) => trie,
                Err(e) => {
                    self.set_error(StateError::Backend(format!(
                        "can't open storage trie {root}: {e}"
                    )));
                    // Degrade to an empty trie; the memoized error
                    // still fails the commit.
                    backend
                        .open_storage_trie(Hash::ZERO)
                        .expect("opening the empty trie cannot fail")
                }
            };
            self.storage_trie = Some(trie);
        }
        self.storage_trie
            .as_deref_mut()
            .expect("initialized just above")
    }

    /// Value of a storage slot: pending writes and cached reads first,
    /// then the trie.
    pub fn get_state(&mut self, backend: &dyn StateBackend, key: Hash) -> Hash {
        if let Some(value) = self.cached_storage.get(&key) {
            return *value;
        }
        let loaded = match self.storage_trie(backend).try_get(key.as_bytes()) {
            Ok(enc) => enc,
            Err(e) => {
                self.set_error(e);
                return Hash::ZERO;
            }
        };
        let mut value = Hash::ZERO;
        if let Some(enc) = loaded {
            if !enc.is_empty() {
                match Rlp::new(&enc).data() {
                    Ok(content) => value = Hash::from_slice(content),
                    Err(e) => self.set_error(StateError::from(e)),
                }
            }
        }
        self.cached_storage.insert(key, value);
        value
    }

    /// Stage a storage write.
    pub fn set_state(
        &mut self,
        backend: &dyn StateBackend,
        journal: &mut Journal,
        key: Hash,
        value: Hash,
    ) {
        let prev = self.get_state(backend, key);
        journal.append(JournalEntry::StorageChange {
            address: self.address,
            key,
            prev,
        });
        self.set_state_raw(key, value);
    }

    pub(crate) fn set_state_raw(&mut self, key: Hash, value: Hash) {
        self.cached_storage.insert(key, value);
        self.dirty_storage.insert(key, value);
    }

    /// Flush pending writes into the storage trie. Zero values delete
    /// their slot; others are stored RLP-encoded with leading zero
    /// bytes trimmed. Entries are consumed as they are written.
    fn update_storage_trie(&mut self, backend: &dyn StateBackend) {
        let dirty: Vec<(Hash, Hash)> = self.dirty_storage.drain().collect();
        // Make sure the trie is open before iterating.
        let _ = self.storage_trie(backend);
        for (key, value) in dirty {
            let result = if value.is_zero() {
                self.storage_trie(backend).try_delete(key.as_bytes())
            } else {
                let trimmed: Vec<u8> = value
                    .as_bytes()
                    .iter()
                    .skip_while(|b| **b == 0)
                    .copied()
                    .collect();
                let mut s = RlpStream::new();
                s.append(&trimmed);
                self.storage_trie(backend).try_update(key.as_bytes(), s.out().to_vec())
            };
            if let Err(e) = result {
                self.set_error(e);
            }
        }
    }

    /// Write the storage trie to the backend and record the new root
    /// on the account. Returns the first error this object has seen.
    pub fn commit_storage_trie(&mut self, backend: &dyn StateBackend) -> Result<(), StateError> {
        self.update_storage_trie(backend);
        if let Some(err) = &self.db_err {
            return Err(err.clone());
        }
        if self.account.as_program().is_some() {
            let root = self
                .storage_trie
                .as_deref_mut()
                .expect("update_storage_trie opened the trie")
                .commit()?;
            self.invalidate_encoding();
            if let Some(program) = self.account.as_program_mut() {
                program.set_storage_root(root);
            }
        }
        Ok(())
    }

    // ── lifecycle ──────────────────────────────────────────────────

    /// Mark for removal at the next flush.
    pub fn mark_suicided(&mut self) {
        self.suicided = true;
    }

    pub(crate) fn restore_suicided(&mut self, prev: bool) {
        self.suicided = prev;
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Record a touch. For the ripemd precompile the address also
    /// goes into the dirty set directly.
    pub fn touch(&mut self, journal: &mut Journal) {
        journal.append(JournalEntry::TouchChange {
            address: self.address,
        });
        if self.address == RIPEMD_PRECOMPILE {
            journal.mark_dirty(self.address);
        }
    }

    /// Lazy RLP snapshot of the account, memoized until the next
    /// account mutation. The commit path persists this under
    /// `trie_hash_key`.
    pub fn encoded(&self) -> &EncodedAccount {
        self.encoded.get_or_init(|| EncodedAccount {
            data: AccountSerializer::encode(&self.account),
            trie_hash_key: keccak256(self.address.as_bytes()),
        })
    }

    /// Drop the memoized encoding; the next `encoded()` recomputes it.
    fn invalidate_encoding(&mut self) {
        self.encoded = OnceLock::new();
    }

    /// Structural copy for readers on other threads. The storage trie
    /// is cloned; atomically shared backend state is not duplicated.
    pub fn deep_copy(&self) -> Self {
        Self {
            address: self.address,
            account: self.account.clone(),
            db_err: self.db_err.clone(),
            storage_trie: self.storage_trie.as_ref().map(|t| t.boxed_clone()),
            code: self.code.clone(),
            cached_storage: self.cached_storage.clone(),
            dirty_storage: self.dirty_storage.clone(),
            dirty_code: self.dirty_code,
            suicided: self.suicided,
            deleted: self.deleted,
            encoded: OnceLock::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;

    fn addr(byte: u8) -> Address {
        Address::from_slice(&[byte])
    }

    fn slot(byte: u8) -> Hash {
        Hash::from_slice(&[byte])
    }

    #[test]
    fn storage_commit_round_trip() {
        let backend = MemoryBackend::new();
        let mut journal = Journal::default();
        let mut obj = StateObject::new(addr(1), Account::program());

        obj.set_state(&backend, &mut journal, slot(1), slot(0xaa));
        assert_eq!(obj.get_state(&backend, slot(1)), slot(0xaa));
        obj.commit_storage_trie(&backend).unwrap();

        let root = obj.account().as_program().unwrap().storage_root();
        assert!(!root.is_zero());

        // A fresh object rooted at the committed trie sees the value.
        let mut fresh = StateObject::new(addr(1), Account::program_with(empty_code_hash(), root));
        assert_eq!(fresh.get_state(&backend, slot(1)), slot(0xaa));
        assert_eq!(fresh.get_state(&backend, slot(2)), Hash::ZERO);
    }

    #[test]
    fn zero_write_deletes_the_slot() {
        let backend = MemoryBackend::new();
        let mut journal = Journal::default();
        let mut obj = StateObject::new(addr(1), Account::program());

        obj.set_state(&backend, &mut journal, slot(1), slot(0xbb));
        obj.commit_storage_trie(&backend).unwrap();
        obj.set_state(&backend, &mut journal, slot(1), Hash::ZERO);
        obj.commit_storage_trie(&backend).unwrap();

        let root = obj.account().as_program().unwrap().storage_root();
        assert!(root.is_zero());
        assert_eq!(obj.get_state(&backend, slot(1)), Hash::ZERO);
    }

    #[test]
    fn code_is_lazily_loaded_and_memoized() {
        let backend = MemoryBackend::new();
        let code_hash = backend.insert_code(b"\x60\x60");
        let mut obj = StateObject::new(addr(2), Account::program_with(code_hash, Hash::ZERO));

        assert_eq!(obj.code(&backend), Some(&b"\x60\x60"[..]));
        // Second call hits the memoized copy even if the backend
        // forgets the code.
        assert_eq!(obj.code(&MemoryBackend::new()), Some(&b"\x60\x60"[..]));
    }

    #[test]
    fn missing_code_memoizes_the_error() {
        let backend = MemoryBackend::new();
        let bogus = keccak256(b"no such code");
        let mut obj = StateObject::new(addr(2), Account::program_with(bogus, Hash::ZERO));

        assert_eq!(obj.code(&backend), None);
        assert!(matches!(obj.error(), Some(StateError::Backend(_))));
    }

    #[test]
    fn set_code_requires_a_program_account() {
        let backend = MemoryBackend::new();
        let mut journal = Journal::default();
        let mut obj = StateObject::new(addr(3), Account::eoa());
        let err = obj
            .set_code(&backend, &mut journal, keccak256(b"c"), b"c".to_vec())
            .unwrap_err();
        assert_eq!(err, StateError::NotProgramAccount);
    }

    #[test]
    fn broken_storage_root_fails_the_commit() {
        let backend = MemoryBackend::new();
        let bogus_root = keccak256(b"no such trie");
        let mut obj =
            StateObject::new(addr(4), Account::program_with(empty_code_hash(), bogus_root));

        // Reads degrade to zero, but the error sticks.
        assert_eq!(obj.get_state(&backend, slot(1)), Hash::ZERO);
        assert!(obj.commit_storage_trie(&backend).is_err());
    }

    #[test]
    fn contract_classification() {
        let backend = MemoryBackend::new();
        let code_hash = backend.insert_code(b"\x01");

        let mut obj = StateObject::new(addr(5), Account::program_with(code_hash, Hash::ZERO));
        assert!(obj.is_program_account());
        assert!(obj.is_contract_account());
        assert!(obj.is_contract_available());

        obj.mark_suicided();
        assert!(obj.is_contract_account());
        assert!(!obj.is_contract_available());

        let eoa = StateObject::new(addr(6), Account::eoa());
        assert!(!eoa.is_program_account());
        assert!(!eoa.is_contract_account());
    }

    #[test]
    fn encoded_snapshot_tracks_mutations() {
        let mut journal = Journal::default();
        let mut obj = StateObject::new(addr(7), Account::eoa());
        obj.set_balance(&mut journal, 5);

        let first = obj.encoded().data.clone();
        assert_eq!(obj.encoded().trie_hash_key, keccak256(addr(7).as_bytes()));

        // Mutations drop the memoized snapshot; re-encoding sees the
        // new account state.
        obj.set_balance(&mut journal, 6);
        let second = obj.encoded().data.clone();
        assert_ne!(second, first);
        let decoded = AccountSerializer::decode(&second).unwrap();
        assert_eq!(decoded.balance(), 6);

        obj.inc_nonce(&mut journal);
        assert_ne!(obj.encoded().data, second);
    }

    #[test]
    fn zero_amount_debit_touches_an_empty_account() {
        let mut journal = Journal::default();
        let mut obj = StateObject::new(addr(8), Account::eoa());
        obj.sub_balance(&mut journal, 0);
        assert_eq!(journal.len(), 1);

        // A funded account is not touched by a zero debit.
        let mut journal = Journal::default();
        let mut funded = StateObject::new(addr(9), Account::eoa());
        funded.set_balance(&mut journal, 10);
        let len_after_funding = journal.len();
        funded.sub_balance(&mut journal, 0);
        assert_eq!(journal.len(), len_after_funding);
    }
}
