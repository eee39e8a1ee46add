//! The account model and its RLP serializer.

use crate::error::StateError;
use council_types::{keccak256, Hash};
use rlp::{Rlp, RlpStream};
use std::sync::OnceLock;

/// Keccak-256 of empty code, the code hash of every account that
/// carries no bytecode.
pub fn empty_code_hash() -> Hash {
    static CELL: OnceLock<Hash> = OnceLock::new();
    *CELL.get_or_init(|| keccak256(&[]))
}

/// Key controlling an account. The legacy variant means "the address
/// was derived from the key"; the explicit variant carries a
/// registered public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountKey {
    Legacy,
    Public(Vec<u8>),
}

impl AccountKey {
    fn tag(&self) -> u8 {
        match self {
            AccountKey::Legacy => 1,
            AccountKey::Public(_) => 2,
        }
    }
}

/// Fields common to every account kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCommon {
    pub nonce: u64,
    pub balance: u128,
    pub key: AccountKey,
}

impl Default for AccountCommon {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: 0,
            key: AccountKey::Legacy,
        }
    }
}

/// A program (contract) account: common fields plus code hash and
/// storage trie root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAccount {
    pub common: AccountCommon,
    code_hash: Hash,
    storage_root: Hash,
}

impl ProgramAccount {
    pub fn code_hash(&self) -> Hash {
        self.code_hash
    }

    pub fn set_code_hash(&mut self, code_hash: Hash) {
        self.code_hash = code_hash;
    }

    pub fn storage_root(&self) -> Hash {
        self.storage_root
    }

    pub fn set_storage_root(&mut self, storage_root: Hash) {
        self.storage_root = storage_root;
    }
}

/// A staged account. Externally-owned accounts never carry code or
/// storage; program accounts do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    ExternallyOwned(AccountCommon),
    Program(ProgramAccount),
}

impl Account {
    /// A fresh externally-owned account.
    pub fn eoa() -> Self {
        Account::ExternallyOwned(AccountCommon::default())
    }

    /// A fresh program account with empty code and storage.
    pub fn program() -> Self {
        Account::Program(ProgramAccount {
            common: AccountCommon::default(),
            code_hash: empty_code_hash(),
            storage_root: Hash::ZERO,
        })
    }

    /// A program account bound to existing code and storage.
    pub fn program_with(code_hash: Hash, storage_root: Hash) -> Self {
        Account::Program(ProgramAccount {
            common: AccountCommon::default(),
            code_hash,
            storage_root,
        })
    }

    fn common(&self) -> &AccountCommon {
        match self {
            Account::ExternallyOwned(common) => common,
            Account::Program(program) => &program.common,
        }
    }

    fn common_mut(&mut self) -> &mut AccountCommon {
        match self {
            Account::ExternallyOwned(common) => common,
            Account::Program(program) => &mut program.common,
        }
    }

    pub fn balance(&self) -> u128 {
        self.common().balance
    }

    pub fn set_balance(&mut self, balance: u128) {
        self.common_mut().balance = balance;
    }

    pub fn nonce(&self) -> u64 {
        self.common().nonce
    }

    pub fn set_nonce(&mut self, nonce: u64) {
        self.common_mut().nonce = nonce;
    }

    pub fn key(&self) -> &AccountKey {
        &self.common().key
    }

    /// Install a new account key. `_block_num` is carried for the
    /// hard-fork-conditional validation rules of the key registry,
    /// which live outside this subsystem.
    pub fn update_key(&mut self, key: AccountKey, _block_num: u64) {
        self.common_mut().key = key;
    }

    pub fn as_program(&self) -> Option<&ProgramAccount> {
        match self {
            Account::Program(program) => Some(program),
            Account::ExternallyOwned(_) => None,
        }
    }

    pub fn as_program_mut(&mut self) -> Option<&mut ProgramAccount> {
        match self {
            Account::Program(program) => Some(program),
            Account::ExternallyOwned(_) => None,
        }
    }

    /// Empty in the account-clearing sense: zero nonce, zero balance,
    /// no code.
    pub fn empty(&self) -> bool {
        let no_code = match self {
            Account::ExternallyOwned(_) => true,
            Account::Program(program) => program.code_hash == empty_code_hash(),
        };
        self.nonce() == 0 && self.balance() == 0 && no_code
    }
}

const EOA_TAG: u8 = 1;
const PROGRAM_TAG: u8 = 2;

/// Type-tagged RLP adapter. The persisted form is
/// `[tag, [fields...]]`, so readers can dispatch on the account kind
/// before decoding the payload.
pub struct AccountSerializer;

impl AccountSerializer {
    pub fn encode(account: &Account) -> Vec<u8> {
        let mut s = RlpStream::new_list(2);
        match account {
            Account::ExternallyOwned(common) => {
                s.append(&EOA_TAG);
                s.begin_list(3);
                append_common(&mut s, common);
            }
            Account::Program(program) => {
                s.append(&PROGRAM_TAG);
                s.begin_list(5);
                append_common(&mut s, &program.common);
                s.append(&program.code_hash);
                s.append(&program.storage_root);
            }
        }
        s.out().to_vec()
    }

    pub fn decode(bytes: &[u8]) -> Result<Account, StateError> {
        let rlp = Rlp::new(bytes);
        let tag: u8 = rlp.val_at(0)?;
        let body = rlp.at(1)?;
        match tag {
            EOA_TAG => Ok(Account::ExternallyOwned(decode_common(&body)?)),
            PROGRAM_TAG => Ok(Account::Program(ProgramAccount {
                common: decode_common(&body)?,
                code_hash: body.val_at(3)?,
                storage_root: body.val_at(4)?,
            })),
            other => Err(StateError::Encoding(format!(
                "unknown account type tag {other}"
            ))),
        }
    }
}

fn append_common(s: &mut RlpStream, common: &AccountCommon) {
    s.append(&common.nonce);
    s.append(&common.balance);
    match &common.key {
        AccountKey::Legacy => {
            let mut key = RlpStream::new_list(2);
            key.append(&common.key.tag());
            key.append(&Vec::<u8>::new());
            s.append_raw(&key.out(), 1);
        }
        AccountKey::Public(bytes) => {
            let mut key = RlpStream::new_list(2);
            key.append(&common.key.tag());
            key.append(bytes);
            s.append_raw(&key.out(), 1);
        }
    }
}

fn decode_common(body: &Rlp<'_>) -> Result<AccountCommon, StateError> {
    let nonce: u64 = body.val_at(0)?;
    let balance: u128 = body.val_at(1)?;
    let key_rlp = body.at(2)?;
    let key_tag: u8 = key_rlp.val_at(0)?;
    let key = match key_tag {
        1 => AccountKey::Legacy,
        2 => AccountKey::Public(key_rlp.val_at(1)?),
        other => return Err(StateError::Encoding(format!("unknown key tag {other}"))),
    };
    Ok(AccountCommon {
        nonce,
        balance,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eoa_round_trip() {
        let mut account = Account::eoa();
        account.set_balance(1_000_000_007);
        account.set_nonce(42);
        let decoded = AccountSerializer::decode(&AccountSerializer::encode(&account)).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn program_round_trip_with_key() {
        let mut account = Account::program_with(keccak256(b"code"), keccak256(b"root"));
        account.set_balance(7);
        account.update_key(AccountKey::Public(vec![4u8; 33]), 10);
        let decoded = AccountSerializer::decode(&AccountSerializer::encode(&account)).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        let mut s = RlpStream::new_list(2);
        s.append(&9u8);
        s.begin_list(0);
        assert!(AccountSerializer::decode(&s.out()).is_err());
    }

    #[test]
    fn emptiness() {
        assert!(Account::eoa().empty());
        assert!(Account::program().empty());

        let mut funded = Account::eoa();
        funded.set_balance(1);
        assert!(!funded.empty());

        let with_code = Account::program_with(keccak256(b"code"), Hash::ZERO);
        assert!(!with_code.empty());
    }
}
