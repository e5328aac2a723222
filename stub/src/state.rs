//! In-memory world state behind a state view handle.
//!
//! A view starts from a committed snapshot of its database and keeps all
//! changes locally until commit. Roots are Merkle roots over accounts; each
//! account commits to its own storage root.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use libevm_interop::{Address, ForkRules, Hash, ProofAccountResult, StorageProof};
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::{StubError, StubResult};
use crate::merkle::{hash_bytes, MerkleTree};

/// Hash of empty code.
pub static EMPTY_CODE_HASH: Lazy<Hash> = Lazy::new(|| hash_bytes(&[]));

/// Addresses `0x01..=0x09`.
pub fn precompiles() -> impl Iterator<Item = Address> {
    (1u8..=9).map(|i| {
        let mut bytes = [0u8; 20];
        bytes[19] = i;
        Address(bytes)
    })
}

pub fn is_precompile(address: &Address) -> bool {
    address.0[..19].iter().all(|b| *b == 0) && (1..=9).contains(&address.0[19])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub nonce: u64,
    #[serde(with = "libevm_interop::codec::hex_big")]
    pub balance: BigUint,
    #[serde(with = "libevm_interop::codec::hex_bytes", default)]
    pub code: Vec<u8>,
    #[serde(default)]
    pub storage: BTreeMap<Hash, Hash>,
}

impl Account {
    /// Zero nonce, zero balance and no code.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance == BigUint::default() && self.code.is_empty()
    }

    pub fn code_hash(&self) -> Hash {
        if self.code.is_empty() {
            *EMPTY_CODE_HASH
        } else {
            hash_bytes(&self.code)
        }
    }

    pub fn storage_tree(&self) -> MerkleTree {
        let mut tree = MerkleTree::new();
        for (key, value) in &self.storage {
            tree.insert(key.as_ref(), value.as_ref());
        }
        tree
    }

    pub fn storage_root(&self) -> Hash {
        self.storage_tree().root()
    }
}

/// Leaf value committed for an account in the account tree.
pub fn account_leaf_value(
    nonce: u64,
    balance: &BigUint,
    code_hash: &Hash,
    storage_root: &Hash,
) -> Vec<u8> {
    let mut value = Vec::with_capacity(8 + 32 + 32 + 32);
    value.extend_from_slice(&nonce.to_be_bytes());
    value.extend_from_slice(code_hash.as_ref());
    value.extend_from_slice(storage_root.as_ref());
    value.extend_from_slice(&balance.to_bytes_be());
    value
}

pub type Accounts = BTreeMap<Address, Account>;

pub fn accounts_tree(accounts: &Accounts) -> MerkleTree {
    let mut tree = MerkleTree::new();
    for (address, account) in accounts {
        let leaf = account_leaf_value(
            account.nonce,
            &account.balance,
            &account.code_hash(),
            &account.storage_root(),
        );
        tree.insert(address.as_ref(), &leaf);
    }
    tree
}

#[derive(Debug, Clone, Default)]
struct AccessList {
    addresses: BTreeSet<Address>,
    slots: BTreeSet<(Address, Hash)>,
}

#[derive(Debug, Clone)]
struct Revision {
    id: i32,
    accounts: Accounts,
    access_list: AccessList,
}

/// A mutable view of the world state.
pub struct StateDb {
    db: Arc<Database>,
    accounts: Accounts,
    access_list: AccessList,
    revisions: Vec<Revision>,
    next_revision: i32,
}

impl StateDb {
    /// Open a view at `root` of `db`. The zero hash opens an empty state.
    pub fn open(db: Arc<Database>, root: Hash) -> StubResult<Self> {
        let accounts = if root.is_zero() {
            Accounts::new()
        } else {
            db.load(&root)?
        };
        Ok(Self {
            db,
            accounts,
            access_list: AccessList::default(),
            revisions: Vec::new(),
            next_revision: 0,
        })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    // ── Lifecycle ──

    /// Drop empty accounts and invalidate snapshots.
    pub fn finalize(&mut self) {
        self.accounts.retain(|_, account| !account.is_empty());
        self.revisions.clear();
    }

    pub fn intermediate_root(&mut self) -> Hash {
        self.finalize();
        accounts_tree(&self.accounts).root()
    }

    pub fn commit(&mut self) -> StubResult<Hash> {
        let root = self.intermediate_root();
        self.db.store(root, self.accounts.clone())?;
        Ok(root)
    }

    // ── Accounts ──

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    fn account_mut(&mut self, address: Address) -> &mut Account {
        self.accounts.entry(address).or_default()
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn is_empty(&self, address: &Address) -> bool {
        self.account(address).is_none_or(Account::is_empty)
    }

    pub fn is_eoa(&self, address: &Address) -> bool {
        if is_precompile(address) {
            return false;
        }
        self.account(address).is_none_or(|a| a.code.is_empty())
    }

    pub fn balance(&self, address: &Address) -> BigUint {
        self.account(address).map(|a| a.balance.clone()).unwrap_or_default()
    }

    pub fn add_balance(&mut self, address: Address, amount: &BigUint) {
        self.account_mut(address).balance += amount;
    }

    pub fn sub_balance(&mut self, address: Address, amount: &BigUint) -> StubResult<()> {
        let current = self.balance(&address);
        if current < *amount {
            return Err(StubError::State(format!(
                "insufficient balance for {}: have {} want {}",
                address, current, amount
            )));
        }
        self.account_mut(address).balance = current - amount;
        Ok(())
    }

    pub fn set_balance(&mut self, address: Address, amount: BigUint) {
        self.account_mut(address).balance = amount;
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.account(address).map_or(0, |a| a.nonce)
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.account_mut(address).nonce = nonce;
    }

    // ── Code ──

    /// Zero for a non-existent account.
    pub fn code_hash(&self, address: &Address) -> Hash {
        self.account(address).map_or(Hash::ZERO, Account::code_hash)
    }

    pub fn code(&self, address: &Address) -> Vec<u8> {
        self.account(address).map(|a| a.code.clone()).unwrap_or_default()
    }

    pub fn set_code(&mut self, address: Address, code: Vec<u8>) {
        self.account_mut(address).code = code;
    }

    // ── Storage ──

    pub fn storage(&self, address: &Address, key: &Hash) -> Hash {
        self.account(address)
            .and_then(|a| a.storage.get(key).copied())
            .unwrap_or(Hash::ZERO)
    }

    /// Write a slot; `None` or zero removes it. Empty accounts are pruned on
    /// finalize, so writes to them are rejected.
    pub fn set_storage(
        &mut self,
        address: Address,
        key: Hash,
        value: Option<Hash>,
    ) -> StubResult<()> {
        if self.is_empty(&address) {
            return Err(StubError::State(format!(
                "cannot write storage of empty account {}",
                address
            )));
        }
        let account = self.account_mut(address);
        match value.filter(|v| !v.is_zero()) {
            Some(value) => {
                account.storage.insert(key, value);
            }
            None => {
                account.storage.remove(&key);
            }
        }
        Ok(())
    }

    // ── Snapshots ──

    pub fn snapshot(&mut self) -> i32 {
        let id = self.next_revision;
        self.next_revision += 1;
        self.revisions.push(Revision {
            id,
            accounts: self.accounts.clone(),
            access_list: self.access_list.clone(),
        });
        id
    }

    /// Restore the state of `id`; it and all later revisions become invalid.
    pub fn revert_to_snapshot(&mut self, id: i32) -> StubResult<()> {
        let index = self
            .revisions
            .iter()
            .position(|r| r.id == id)
            .ok_or(StubError::InvalidRevision(id))?;
        let mut tail = self.revisions.split_off(index);
        let revision = tail.swap_remove(0);
        self.accounts = revision.accounts;
        self.access_list = revision.access_list;
        Ok(())
    }

    // ── Access list ──

    pub fn access_setup(
        &mut self,
        sender: Address,
        destination: Option<Address>,
        coinbase: Address,
        rules: ForkRules,
    ) {
        self.access_list = AccessList::default();
        self.access_list.addresses.insert(sender);
        if let Some(destination) = destination {
            self.access_list.addresses.insert(destination);
        }
        self.access_list.addresses.extend(precompiles());
        if rules.is_shanghai {
            self.access_list.addresses.insert(coinbase);
        }
    }

    /// Whether `address` was warm; it is warm afterwards.
    pub fn access_account(&mut self, address: Address) -> bool {
        !self.access_list.addresses.insert(address)
    }

    /// Whether the slot was warm; slot and account are warm afterwards.
    pub fn access_slot(&mut self, address: Address, slot: Hash) -> bool {
        self.access_list.addresses.insert(address);
        !self.access_list.slots.insert((address, slot))
    }

    // ── Inspection ──

    /// Proof of `address` and `keys` against the committed state at `root`.
    pub fn proof(
        &self,
        address: Address,
        root: Hash,
        keys: &[Hash],
    ) -> StubResult<ProofAccountResult> {
        let accounts = if root.is_zero() { Accounts::new() } else { self.db.load(&root)? };
        let tree = accounts_tree(&accounts);
        let account = accounts.get(&address).cloned();
        let storage_tree = account.as_ref().map(Account::storage_tree).unwrap_or_default();
        let storage_proof = keys
            .iter()
            .map(|key| StorageProof {
                key: *key,
                value: account
                    .as_ref()
                    .and_then(|a| a.storage.get(key).copied())
                    .unwrap_or(Hash::ZERO),
                proof: storage_tree.prove(key.as_ref()).unwrap_or_default(),
            })
            .collect();
        Ok(ProofAccountResult {
            address,
            account_proof: tree.prove(address.as_ref()).unwrap_or_default(),
            balance: account.as_ref().map(|a| a.balance.clone()).unwrap_or_default(),
            code_hash: account.as_ref().map_or(Hash::ZERO, Account::code_hash),
            nonce: account.as_ref().map_or(0, |a| a.nonce),
            storage_hash: storage_tree.root(),
            storage_proof,
        })
    }

    /// JSON dump of the current state. Without preimages, accounts are keyed
    /// by the hash of their address.
    pub fn dump(&self) -> serde_json::Value {
        let preimages = self.db.preimages();
        let mut accounts = serde_json::Map::new();
        for (address, account) in &self.accounts {
            let key = if preimages {
                address.to_string()
            } else {
                hash_bytes(address.as_ref()).to_string()
            };
            let storage: serde_json::Map<String, serde_json::Value> = account
                .storage
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect();
            let mut entry = serde_json::json!({
                "balance": account.balance.to_string(),
                "nonce": account.nonce,
                "root": account.storage_root(),
                "codeHash": account.code_hash(),
                "code": libevm_interop::codec::encode_hex(&account.code),
                "storage": storage,
            });
            if preimages {
                entry["address"] = serde_json::Value::String(address.to_string());
            }
            accounts.insert(key, entry);
        }
        serde_json::json!({
            "root": accounts_tree(&self.accounts).root(),
            "accounts": accounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    fn open() -> StateDb {
        StateDb::open(Arc::new(Database::memory()), Hash::ZERO).unwrap()
    }

    #[test]
    fn test_empty_state_root_is_zero() {
        let mut state = open();
        assert_eq!(state.intermediate_root(), Hash::ZERO);
        assert_eq!(state.commit().unwrap(), Hash::ZERO);
    }

    #[test]
    fn test_commit_and_reopen() {
        let db = Arc::new(Database::memory());
        let mut state = StateDb::open(db.clone(), Hash::ZERO).unwrap();
        state.add_balance(addr(1), &BigUint::from(1234u32));
        let root = state.commit().unwrap();
        assert_ne!(root, Hash::ZERO);

        let reopened = StateDb::open(db, root).unwrap();
        assert_eq!(reopened.balance(&addr(1)), BigUint::from(1234u32));
    }

    #[test]
    fn test_unknown_root_fails() {
        let err = StateDb::open(Arc::new(Database::memory()), Hash([7; 32])).err().unwrap();
        assert!(matches!(err, StubError::MissingRoot(_)));
    }

    #[test]
    fn test_snapshot_revert() {
        let mut state = open();
        state.add_balance(addr(1), &BigUint::from(10u32));
        let id = state.snapshot();
        state.sub_balance(addr(1), &BigUint::from(4u32)).unwrap();
        let later = state.snapshot();
        state.set_nonce(addr(1), 9);
        state.revert_to_snapshot(id).unwrap();
        assert_eq!(state.balance(&addr(1)), BigUint::from(10u32));
        assert_eq!(state.nonce(&addr(1)), 0);
        assert!(state.revert_to_snapshot(later).is_err());
        assert!(state.revert_to_snapshot(id).is_err());
    }

    #[test]
    fn test_sub_balance_underflow() {
        let mut state = open();
        assert!(state.sub_balance(addr(1), &BigUint::from(1u32)).is_err());
    }

    #[test]
    fn test_storage_on_empty_account_rejected() {
        let mut state = open();
        assert!(state.set_storage(addr(1), Hash([1; 32]), Some(Hash([2; 32]))).is_err());
        state.set_nonce(addr(1), 1);
        state.set_storage(addr(1), Hash([1; 32]), Some(Hash([2; 32]))).unwrap();
        assert_eq!(state.storage(&addr(1), &Hash([1; 32])), Hash([2; 32]));
    }

    #[test]
    fn test_zero_and_null_remove_slot() {
        let mut state = open();
        state.set_nonce(addr(1), 1);
        let base = state.intermediate_root();
        let key = Hash([1; 32]);
        state.set_storage(addr(1), key, Some(Hash([2; 32]))).unwrap();
        assert_ne!(state.intermediate_root(), base);
        state.set_storage(addr(1), key, Some(Hash::ZERO)).unwrap();
        assert_eq!(state.intermediate_root(), base);
        state.set_storage(addr(1), key, Some(Hash([3; 32]))).unwrap();
        state.set_storage(addr(1), key, None).unwrap();
        assert_eq!(state.storage(&addr(1), &key), Hash::ZERO);
        assert_eq!(state.intermediate_root(), base);
    }

    #[test]
    fn test_eoa_and_code_hash() {
        let mut state = open();
        let precompile = precompiles().next().unwrap();
        assert!(!state.is_eoa(&precompile));
        assert!(state.is_eoa(&addr(1)));
        assert_eq!(state.code_hash(&addr(1)), Hash::ZERO);
        state.add_balance(addr(1), &BigUint::from(1u32));
        assert_eq!(state.code_hash(&addr(1)), *EMPTY_CODE_HASH);
        state.set_code(addr(1), vec![0x60, 0x00]);
        assert!(!state.is_eoa(&addr(1)));
    }

    #[test]
    fn test_access_list() {
        let mut state = open();
        state.access_setup(addr(1), Some(addr(2)), addr(3), ForkRules::default());
        assert!(state.access_account(addr(1)));
        assert!(state.access_account(addr(2)));
        assert!(!state.access_account(addr(3)));
        assert!(!state.access_slot(addr(1), Hash([1; 32])));
        assert!(state.access_slot(addr(1), Hash([1; 32])));

        state.access_setup(addr(1), None, addr(3), ForkRules::shanghai());
        assert!(state.access_account(addr(3)));
        assert!(!state.access_slot(addr(1), Hash([1; 32])));
    }

    #[test]
    fn test_finalize_prunes_empty_accounts() {
        let mut state = open();
        state.set_nonce(addr(1), 0);
        assert!(state.exists(&addr(1)));
        state.finalize();
        assert!(!state.exists(&addr(1)));
    }
}
