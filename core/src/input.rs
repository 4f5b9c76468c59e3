//! Trace input types
//!
//! A [`TraceInput`] carries everything needed to re-execute a block range
//! deterministically: the committed state before the first block and, for
//! each block, its environment and transactions.

use crate::hashing::hash_struct;
use crate::state::InMemoryDB;
use crate::types::{Address, BlockNumber, Gas, Hash, Timestamp, U256};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Block environment for execution context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnv {
    pub number: BlockNumber,
    /// Seconds since epoch
    pub timestamp: Timestamp,
    pub gas_limit: Gas,
    pub coinbase: Address,
    /// EIP-1559 base fee
    pub base_fee: U256,
    /// Previous block's RANDAO value (post-merge)
    pub prev_randao: Hash,
    pub chain_id: u64,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self {
            number: 1,
            timestamp: 1700000000,
            gas_limit: 30_000_000,
            coinbase: Address::ZERO,
            base_fee: U256::from(1_000_000_000u64),
            prev_randao: Hash::ZERO,
            chain_id: 1,
        }
    }
}

impl BlockEnv {
    pub fn new(number: BlockNumber, timestamp: Timestamp, gas_limit: Gas, chain_id: u64) -> Self {
        Self {
            number,
            timestamp,
            gas_limit,
            chain_id,
            ..Default::default()
        }
    }

    /// Identifier recorded in the block-hash history once the block is traced.
    pub fn block_hash(&self) -> Hash {
        hash_struct(self)
    }
}

/// One transaction to re-execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// tx.origin and initial msg.sender
    pub caller: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    /// Calldata, or init code for a creation
    pub data: Vec<u8>,
    pub gas_limit: Gas,
    pub gas_price: U256,
    /// Taken from the state when absent
    #[serde(default)]
    pub nonce: Option<u64>,
}

impl Default for TxInput {
    fn default() -> Self {
        Self {
            caller: Address::ZERO,
            to: None,
            value: U256::ZERO,
            data: Vec::new(),
            gas_limit: 10_000_000,
            gas_price: U256::from(1_000_000_000u64),
            nonce: None,
        }
    }
}

impl TxInput {
    pub fn call(caller: Address, to: Address, data: Vec<u8>) -> Self {
        Self {
            caller,
            to: Some(to),
            data,
            ..Default::default()
        }
    }

    pub fn transfer(caller: Address, to: Address, value: U256) -> Self {
        Self {
            caller,
            to: Some(to),
            value,
            gas_limit: 21_000,
            ..Default::default()
        }
    }

    pub fn create(caller: Address, init_code: Vec<u8>, value: U256) -> Self {
        Self {
            caller,
            to: None,
            data: init_code,
            value,
            ..Default::default()
        }
    }

    pub fn is_create(&self) -> bool {
        self.to.is_none()
    }

    pub fn with_gas_limit(mut self, gas_limit: Gas) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Leaf committed into the block's transaction set.
    pub fn hash(&self) -> Hash {
        hash_struct(self)
    }
}

/// A block to trace: its environment and transactions in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInput {
    pub env: BlockEnv,
    pub transactions: Vec<TxInput>,
}

impl BlockInput {
    pub fn new(env: BlockEnv) -> Self {
        Self {
            env,
            transactions: Vec::new(),
        }
    }

    pub fn with_tx(mut self, tx: TxInput) -> Self {
        self.transactions.push(tx);
        self
    }
}

/// A contiguous block range and the committed state it starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceInput {
    /// State before the first block, including the known block-hash history
    pub pre_state: InMemoryDB,
    /// Cumulative gas the range starts from
    #[serde(default)]
    pub start_gas_used: U256,
    pub blocks: Vec<BlockInput>,
}

impl TraceInput {
    pub fn new(pre_state: InMemoryDB) -> Self {
        Self {
            pre_state,
            start_gas_used: U256::ZERO,
            blocks: Vec::new(),
        }
    }

    pub fn with_block(mut self, block: BlockInput) -> Self {
        self.blocks.push(block);
        self
    }

    /// Deterministic digest of the whole input
    pub fn hash(&self) -> Hash {
        hash_struct(self)
    }

    pub fn transaction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.transactions.len()).sum()
    }
}
