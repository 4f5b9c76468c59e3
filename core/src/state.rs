//! State database and proof-state capability
//!
//! `InMemoryDB` implements `revm::Database` for execution and `ProofState` for
//! snapshotting. `JournalView` is the live state while a transaction runs:
//! revm's journaled changes laid over the committed database.

use crate::errors::{Result, ProverError};
use crate::hashing::{hash_struct, keccak256};
use crate::output::Log;
use crate::types::{Address, Hash, U256};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use revm::primitives::{Account, AccountInfo, Bytecode, KECCAK_EMPTY};
use revm::{Database, JournaledState};
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Capability set the snapshot builders read from a state object.
pub trait ProofState {
    /// Independent snapshot of the state as it stands now
    fn copy(&self) -> InMemoryDB;

    /// Commitment over all accounts and storage
    fn root_for_proof(&self) -> Hash;

    /// Gas refund accumulated by the running transaction
    fn refund(&self) -> u64;

    /// Logs emitted by the running transaction
    fn current_logs(&self) -> Vec<Log>;
}

/// Account state representation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account balance in wei
    pub balance: U256,
    /// Transaction nonce
    pub nonce: u64,
    /// Hash of contract code (KECCAK_EMPTY if EOA)
    pub code_hash: Hash,
    /// Contract bytecode (empty for EOA)
    pub code: Vec<u8>,
    /// Storage slots (key -> value)
    pub storage: BTreeMap<U256, U256>,
}

impl AccountState {
    /// Create a new externally owned account (EOA) with balance
    pub fn new_with_balance(balance: U256) -> Self {
        Self {
            balance,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: Vec::new(),
            storage: BTreeMap::new(),
        }
    }

    /// Create a contract account with code
    pub fn new_contract(code: Vec<u8>, balance: U256) -> Self {
        let code_hash = keccak256(&code);
        Self {
            balance,
            nonce: 1, // Contracts start with nonce 1
            code_hash,
            code,
            storage: BTreeMap::new(),
        }
    }

    /// Check if this is an empty account (can be pruned)
    pub fn is_empty(&self) -> bool {
        self.balance.is_zero() && self.nonce == 0 && self.code.is_empty()
    }

    /// Set a storage slot value
    pub fn set_storage(&mut self, slot: U256, value: U256) {
        if value.is_zero() {
            self.storage.remove(&slot);
        } else {
            self.storage.insert(slot, value);
        }
    }

    /// Get a storage slot value
    pub fn get_storage(&self, slot: &U256) -> U256 {
        self.storage.get(slot).copied().unwrap_or(U256::ZERO)
    }
}

/// In-memory state database
///
/// BTreeMap keeps iteration order deterministic, which the state root relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryDB {
    /// Account states indexed by address
    pub accounts: BTreeMap<Address, AccountState>,
    /// Block hashes for BLOCKHASH opcode (block number -> hash)
    pub block_hashes: BTreeMap<u64, Hash>,
}

impl InMemoryDB {
    /// Create a new empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account into the database
    pub fn insert_account(&mut self, address: Address, account: AccountState) {
        self.accounts.insert(address, account);
    }

    /// Get an account reference
    pub fn get_account(&self, address: &Address) -> Option<&AccountState> {
        self.accounts.get(address)
    }

    /// Check if an account exists
    pub fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Insert a block hash (for BLOCKHASH opcode)
    pub fn insert_block_hash(&mut self, number: u64, hash: Hash) {
        self.block_hashes.insert(number, hash);
    }

    /// Deterministic hash of all accounts (not an MPT root)
    pub fn compute_state_root(&self) -> Hash {
        hash_struct(&self.accounts)
    }

    /// Drop an account destroyed during the transaction before the state root
    /// is taken for the next snapshot.
    pub fn delete_suicided_account_for_proof(&mut self, address: &Address) {
        if self.accounts.remove(address).is_some() {
            log::debug!("removed self-destructed account {address}");
        }
    }

    /// Fold one account diff from revm's journal into the database.
    ///
    /// Untouched accounts are skipped, self-destructed accounts are removed,
    /// and touched accounts that are still empty and never existed are not
    /// materialized.
    pub fn apply_account(&mut self, address: Address, account: &Account) {
        if !account.is_touched() {
            return;
        }
        if account.is_selfdestructed() {
            self.delete_suicided_account_for_proof(&address);
            return;
        }
        let info = &account.info;
        if info.is_empty() && account.storage.is_empty() && !self.account_exists(&address) {
            return;
        }

        let entry = self
            .accounts
            .entry(address)
            .or_insert_with(|| AccountState::new_with_balance(U256::ZERO));
        entry.balance = info.balance;
        entry.nonce = info.nonce;
        if let Some(code) = info.code.as_ref().filter(|code| !code.is_empty()) {
            entry.code = code.original_bytes().to_vec();
            entry.code_hash = info.code_hash;
        }
        for (slot, value) in &account.storage {
            entry.set_storage(*slot, value.present_value);
        }
    }
}

impl ProofState for InMemoryDB {
    fn copy(&self) -> InMemoryDB {
        self.clone()
    }

    fn root_for_proof(&self) -> Hash {
        self.compute_state_root()
    }

    // A committed state carries no in-flight refund or logs.
    fn refund(&self) -> u64 {
        0
    }

    fn current_logs(&self) -> Vec<Log> {
        Vec::new()
    }
}

impl Database for InMemoryDB {
    type Error = ProverError;

    fn basic(&mut self, address: Address) -> Result<Option<AccountInfo>> {
        Ok(self.accounts.get(&address).map(|acc| AccountInfo {
            balance: acc.balance,
            nonce: acc.nonce,
            code_hash: acc.code_hash,
            code: if acc.code.is_empty() {
                None
            } else {
                Some(Bytecode::new_raw(acc.code.clone().into()))
            },
        }))
    }

    fn code_by_hash(&mut self, code_hash: Hash) -> Result<Bytecode> {
        if code_hash == KECCAK_EMPTY {
            return Ok(Bytecode::default());
        }

        self.accounts
            .values()
            .find(|acc| acc.code_hash == code_hash && !acc.code.is_empty())
            .map(|acc| Bytecode::new_raw(acc.code.clone().into()))
            .ok_or_else(|| ProverError::DatabaseError(alloc::format!("unknown code hash {code_hash}")))
    }

    fn storage(&mut self, address: Address, slot: U256) -> Result<U256> {
        Ok(self
            .accounts
            .get(&address)
            .map(|acc| acc.get_storage(&slot))
            .unwrap_or(U256::ZERO))
    }

    fn block_hash(&mut self, number: u64) -> Result<Hash> {
        Ok(self.block_hashes.get(&number).copied().unwrap_or(Hash::ZERO))
    }
}

/// Live state of a running transaction.
pub struct JournalView<'a> {
    base: &'a InMemoryDB,
    journal: &'a JournaledState,
    refund: u64,
}

impl<'a> JournalView<'a> {
    pub fn new(base: &'a InMemoryDB, journal: &'a JournaledState, refund: u64) -> Self {
        Self {
            base,
            journal,
            refund,
        }
    }
}

impl ProofState for JournalView<'_> {
    fn copy(&self) -> InMemoryDB {
        let mut db = self.base.clone();
        for (address, account) in &self.journal.state {
            db.apply_account(*address, account);
        }
        db
    }

    fn root_for_proof(&self) -> Hash {
        self.copy().compute_state_root()
    }

    fn refund(&self) -> u64 {
        self.refund
    }

    fn current_logs(&self) -> Vec<Log> {
        self.journal.logs.iter().map(Log::from).collect()
    }
}
