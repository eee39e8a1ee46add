//! Storage backend seam.
//!
//! The real node backs these traits with its trie database; the
//! in-memory implementation here serves tests and tools. Roots are
//! content hashes, so a committed trie can be reopened by root.

use crate::error::StateError;
use council_types::{keccak256, Hash};
use parking_lot::RwLock;
use rlp::RlpStream;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A single account's storage trie.
pub trait StorageTrie: Send {
    /// Raw bytes stored under `key`, if any.
    fn try_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;

    /// Insert or overwrite `key`.
    fn try_update(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn try_delete(&mut self, key: &[u8]) -> Result<(), StateError>;

    /// Persist the trie and return its new root.
    fn commit(&mut self) -> Result<Hash, StateError>;

    /// Root the current content would commit to.
    fn root(&self) -> Hash;

    /// Clone into an independent trie (for object deep copies).
    fn boxed_clone(&self) -> Box<dyn StorageTrie>;
}

/// Trie, account and code storage for state objects.
pub trait StateBackend: Send + Sync {
    /// Open the storage trie rooted at `root`. `Hash::ZERO` opens an
    /// empty trie.
    fn open_storage_trie(&self, root: Hash) -> Result<Box<dyn StorageTrie>, StateError>;

    /// Bytecode stored under `code_hash`.
    fn contract_code(&self, code_hash: Hash) -> Result<Vec<u8>, StateError>;

    /// Persist a serialized account under its trie hash key
    /// (keccak of the address).
    fn write_account(&self, key: Hash, data: &[u8]) -> Result<(), StateError>;

    /// Remove the account stored under `key`. Removing an absent
    /// account is not an error.
    fn remove_account(&self, key: Hash) -> Result<(), StateError>;
}

#[derive(Default)]
struct MemoryStore {
    tries: RwLock<HashMap<Hash, BTreeMap<Vec<u8>, Vec<u8>>>>,
    accounts: RwLock<HashMap<Hash, Vec<u8>>>,
    code: RwLock<HashMap<Hash, Vec<u8>>>,
}

/// In-memory [`StateBackend`].
#[derive(Clone, Default)]
pub struct MemoryBackend {
    store: Arc<MemoryStore>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytecode and return its hash.
    pub fn insert_code(&self, code: &[u8]) -> Hash {
        let hash = keccak256(code);
        self.store.code.write().insert(hash, code.to_vec());
        hash
    }

    /// Serialized account stored under `key`, if any.
    pub fn account_bytes(&self, key: Hash) -> Option<Vec<u8>> {
        self.store.accounts.read().get(&key).cloned()
    }
}

impl StateBackend for MemoryBackend {
    fn open_storage_trie(&self, root: Hash) -> Result<Box<dyn StorageTrie>, StateError> {
        let slots = if root.is_zero() {
            BTreeMap::new()
        } else {
            self.store
                .tries
                .read()
                .get(&root)
                .cloned()
                .ok_or_else(|| StateError::Backend(format!("unknown storage root {root}")))?
        };
        Ok(Box::new(MemoryTrie {
            slots,
            store: self.store.clone(),
        }))
    }

    fn contract_code(&self, code_hash: Hash) -> Result<Vec<u8>, StateError> {
        self.store
            .code
            .read()
            .get(&code_hash)
            .cloned()
            .ok_or_else(|| StateError::Backend(format!("unknown code hash {code_hash}")))
    }

    fn write_account(&self, key: Hash, data: &[u8]) -> Result<(), StateError> {
        self.store.accounts.write().insert(key, data.to_vec());
        Ok(())
    }

    fn remove_account(&self, key: Hash) -> Result<(), StateError> {
        self.store.accounts.write().remove(&key);
        Ok(())
    }
}

struct MemoryTrie {
    slots: BTreeMap<Vec<u8>, Vec<u8>>,
    store: Arc<MemoryStore>,
}

impl MemoryTrie {
    /// Content hash: keccak over the RLP of the sorted entries. Not a
    /// Merkle trie, but stable and collision-resistant, which is all
    /// the in-memory backend needs.
    fn content_root(&self) -> Hash {
        if self.slots.is_empty() {
            return Hash::ZERO;
        }
        let mut s = RlpStream::new_list(self.slots.len());
        for (key, value) in &self.slots {
            s.begin_list(2);
            s.append(key);
            s.append(value);
        }
        keccak256(&s.out())
    }
}

impl StorageTrie for MemoryTrie {
    fn try_get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.slots.get(key).cloned())
    }

    fn try_update(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StateError> {
        self.slots.insert(key.to_vec(), value);
        Ok(())
    }

    fn try_delete(&mut self, key: &[u8]) -> Result<(), StateError> {
        self.slots.remove(key);
        Ok(())
    }

    fn commit(&mut self) -> Result<Hash, StateError> {
        let root = self.content_root();
        if !root.is_zero() {
            self.store.tries.write().insert(root, self.slots.clone());
        }
        Ok(root)
    }

    fn root(&self) -> Hash {
        self.content_root()
    }

    fn boxed_clone(&self) -> Box<dyn StorageTrie> {
        Box::new(MemoryTrie {
            slots: self.slots.clone(),
            store: self.store.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_trie_reopens_by_root() {
        let backend = MemoryBackend::new();
        let mut trie = backend.open_storage_trie(Hash::ZERO).unwrap();
        trie.try_update(b"slot", vec![1, 2, 3]).unwrap();
        let root = trie.commit().unwrap();

        let reopened = backend.open_storage_trie(root).unwrap();
        assert_eq!(reopened.try_get(b"slot").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn unknown_root_is_an_error() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.open_storage_trie(keccak256(b"nope")),
            Err(StateError::Backend(_))
        ));
    }

    #[test]
    fn account_write_and_remove() {
        let backend = MemoryBackend::new();
        let key = keccak256(b"account");
        backend.write_account(key, &[1, 2, 3]).unwrap();
        assert_eq!(backend.account_bytes(key), Some(vec![1, 2, 3]));

        backend.remove_account(key).unwrap();
        backend.remove_account(key).unwrap();
        assert_eq!(backend.account_bytes(key), None);
    }

    #[test]
    fn code_round_trip() {
        let backend = MemoryBackend::new();
        let hash = backend.insert_code(b"\x60\x00");
        assert_eq!(backend.contract_code(hash).unwrap(), b"\x60\x00".to_vec());
        assert!(backend.contract_code(Hash::ZERO).is_err());
    }

    #[test]
    fn root_is_content_addressed() {
        let backend = MemoryBackend::new();
        let mut a = backend.open_storage_trie(Hash::ZERO).unwrap();
        let mut b = backend.open_storage_trie(Hash::ZERO).unwrap();
        a.try_update(b"k", vec![9]).unwrap();
        b.try_update(b"k", vec![9]).unwrap();
        assert_eq!(a.root(), b.root());

        b.try_delete(b"k").unwrap();
        assert_eq!(b.root(), Hash::ZERO);
    }
}
