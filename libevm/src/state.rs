//! State view handle.
//!
//! A [`StateDb`] is a mutable view of the world state opened at a root of a
//! [`Database`]. Changes live in the view until committed; commit returns
//! the new root, at which later views can be opened.

use std::path::Path;

use libevm_interop::codec::{HexBig, HexBytes, HexU64};
use libevm_interop::params::{
    AccessParams, AccountParams, BalanceParams, CodeParams, DumpParams, HandleParams, NonceParams,
    ProofParams, SetStorageParams, SlotParams, SnapshotParams, StateParams, StorageParams,
};
use libevm_interop::{
    Address, EvmContext, ForkRules, Handle, Hash, Invocation, InvocationResult, ProofAccountResult,
};
use num_bigint::BigUint;

use crate::database::Database;
use crate::error::{wire_path, GatewayError};
use crate::evm::Evm;
use crate::gateway::LibEvm;
use crate::resource::{ResourceHandle, ResourceKind};

#[derive(Debug)]
pub struct StateKind;

impl ResourceKind for StateKind {
    const NAME: &'static str = "state";

    fn release(libevm: &LibEvm, handle: Handle) -> Result<(), GatewayError> {
        libevm.execute_with("StateClose", &HandleParams { handle })
    }
}

#[derive(Debug)]
pub struct StateDb {
    resource: ResourceHandle<StateKind>,
}

impl StateDb {
    /// Open a view at `root`. The zero hash opens an empty state.
    pub fn open(db: &Database, root: Hash) -> Result<Self, GatewayError> {
        let libevm = db.libevm();
        let params = StateParams {
            database_handle: db.handle(),
            root,
        };
        let handle: Handle = libevm.call_with("StateOpen", &params)?;
        Ok(Self {
            resource: ResourceHandle::opened(libevm, handle),
        })
    }

    pub fn handle(&self) -> Handle {
        self.resource.handle()
    }

    pub fn close(self) -> Result<(), GatewayError> {
        self.resource.close()
    }

    fn libevm(&self) -> &'static LibEvm {
        self.resource.libevm()
    }

    fn handle_params(&self) -> HandleParams {
        HandleParams { handle: self.handle() }
    }

    fn account(&self, address: Address) -> AccountParams {
        AccountParams {
            handle: self.handle(),
            address,
        }
    }

    // ── Lifecycle ──

    /// Finalize pending changes: drop self-destructed and touched empty accounts.
    pub fn finalize(&self) -> Result<(), GatewayError> {
        self.libevm().execute_with("StateFinalize", &self.handle_params())
    }

    /// Root of the current state without committing.
    pub fn intermediate_root(&self) -> Result<Hash, GatewayError> {
        self.libevm().call_with("StateIntermediateRoot", &self.handle_params())
    }

    /// Persist the state to the database and return its root.
    pub fn commit(&self) -> Result<Hash, GatewayError> {
        self.libevm().call_with("StateCommit", &self.handle_params())
    }

    // ── Accounts ──

    /// Whether the account is absent or has zero nonce, zero balance and no code.
    pub fn is_empty(&self, address: Address) -> Result<bool, GatewayError> {
        self.libevm().call_with("StateEmpty", &self.account(address))
    }

    /// Whether the account is externally owned: no code and not a precompile.
    pub fn is_eoa(&self, address: Address) -> Result<bool, GatewayError> {
        self.libevm().call_with("StateIsEoa", &self.account(address))
    }

    pub fn get_balance(&self, address: Address) -> Result<BigUint, GatewayError> {
        let HexBig(balance) = self.libevm().call_with("StateGetBalance", &self.account(address))?;
        Ok(balance)
    }

    pub fn add_balance(&self, address: Address, amount: &BigUint) -> Result<(), GatewayError> {
        self.libevm().execute_with("StateAddBalance", &self.balance(address, amount))
    }

    pub fn sub_balance(&self, address: Address, amount: &BigUint) -> Result<(), GatewayError> {
        self.libevm().execute_with("StateSubBalance", &self.balance(address, amount))
    }

    pub fn set_balance(&self, address: Address, amount: &BigUint) -> Result<(), GatewayError> {
        self.libevm().execute_with("StateSetBalance", &self.balance(address, amount))
    }

    fn balance(&self, address: Address, amount: &BigUint) -> BalanceParams {
        BalanceParams {
            handle: self.handle(),
            address,
            amount: amount.clone(),
        }
    }

    pub fn get_nonce(&self, address: Address) -> Result<u64, GatewayError> {
        let HexU64(nonce) = self.libevm().call_with("StateGetNonce", &self.account(address))?;
        Ok(nonce)
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) -> Result<(), GatewayError> {
        let params = NonceParams {
            handle: self.handle(),
            address,
            nonce,
        };
        self.libevm().execute_with("StateSetNonce", &params)
    }

    // ── Code ──

    /// Code hash; zero for a non-existent account.
    pub fn get_code_hash(&self, address: Address) -> Result<Hash, GatewayError> {
        self.libevm().call_with("StateGetCodeHash", &self.account(address))
    }

    pub fn get_code(&self, address: Address) -> Result<Vec<u8>, GatewayError> {
        let HexBytes(code) = self.libevm().call_with("StateGetCode", &self.account(address))?;
        Ok(code)
    }

    /// Set the code; the code hash follows.
    pub fn set_code(&self, address: Address, code: &[u8]) -> Result<(), GatewayError> {
        let params = CodeParams {
            handle: self.handle(),
            address,
            code: code.to_vec(),
        };
        self.libevm().execute_with("StateSetCode", &params)
    }

    // ── Storage ──

    /// Storage value; zero for an unset slot.
    pub fn get_storage(&self, address: Address, key: Hash) -> Result<Hash, GatewayError> {
        let params = StorageParams {
            handle: self.handle(),
            address,
            key,
        };
        self.libevm().call_with("StateGetStorage", &params)
    }

    /// Write a slot. A zero value removes it. Fails on an empty account.
    pub fn set_storage(
        &self,
        address: Address,
        key: Hash,
        value: Hash,
    ) -> Result<(), GatewayError> {
        self.write_storage(address, key, Some(value))
    }

    pub fn remove_storage(&self, address: Address, key: Hash) -> Result<(), GatewayError> {
        self.write_storage(address, key, None)
    }

    fn write_storage(
        &self,
        address: Address,
        key: Hash,
        value: Option<Hash>,
    ) -> Result<(), GatewayError> {
        let params = SetStorageParams {
            handle: self.handle(),
            address,
            key,
            value,
        };
        self.libevm().execute_with("StateSetStorage", &params)
    }

    // ── Snapshots ──

    pub fn snapshot(&self) -> Result<i32, GatewayError> {
        self.libevm().call_with("StateSnapshot", &self.handle_params())
    }

    /// Undo all changes made since `revision_id` was taken. Later snapshots
    /// become invalid.
    pub fn revert_to_snapshot(&self, revision_id: i32) -> Result<(), GatewayError> {
        let params = SnapshotParams {
            handle: self.handle(),
            revision_id,
        };
        self.libevm().execute_with("StateRevertToSnapshot", &params)
    }

    // ── Inspection ──

    /// Merkle proof of the account and `storage_keys` against the committed `root`.
    pub fn get_proof(
        &self,
        address: Address,
        root: Hash,
        storage_keys: &[Hash],
    ) -> Result<ProofAccountResult, GatewayError> {
        let params = ProofParams {
            handle: self.handle(),
            address,
            root,
            storage_keys: storage_keys.to_vec(),
        };
        self.libevm().call_with("StateGetProof", &params)
    }

    /// Write a JSON dump of the state to `path`, which must be valid UTF-8.
    pub fn dump(&self, path: &Path) -> Result<(), GatewayError> {
        let params = DumpParams {
            handle: self.handle(),
            dump_file: wire_path(path)?.to_string(),
        };
        self.libevm().execute_with("StateDump", &params)
    }

    // ── Access list ──

    /// Reset the access list and warm up sender, destination, precompiles
    /// and (with Shanghai rules) the coinbase.
    pub fn access_setup(
        &self,
        sender: Address,
        destination: Option<Address>,
        coinbase: Address,
        rules: ForkRules,
    ) -> Result<(), GatewayError> {
        let params = AccessParams {
            handle: self.handle(),
            address: sender,
            destination,
            coinbase,
            rules,
        };
        self.libevm().execute_with("AccessSetup", &params)
    }

    /// Mark the account as accessed. Returns whether it was already warm.
    pub fn access_account(&self, address: Address) -> Result<bool, GatewayError> {
        self.libevm().call_with("AccessAccount", &self.account(address))
    }

    /// Mark the slot as accessed. Returns whether it was already warm.
    pub fn access_slot(&self, address: Address, slot: Hash) -> Result<bool, GatewayError> {
        let params = SlotParams {
            handle: self.handle(),
            address,
            slot,
        };
        self.libevm().call_with("AccessSlot", &params)
    }

    // ── Execution ──

    /// Apply an invocation to this view.
    pub fn apply(
        &self,
        invocation: &Invocation,
        context: &EvmContext,
    ) -> Result<InvocationResult, GatewayError> {
        Evm::new(self.libevm()).apply(self.handle(), invocation, context)
    }
}
