//! Trace output types
//!
//! What the driver hands back after executing a transaction or a block range:
//! receipts, per-instruction step digests and the interleaved state list the
//! dispute protocol bisects over.

use crate::encoding::Encode;
use crate::generator::GeneratedStep;
use crate::hashing::hash_struct;
use crate::snapshot::{BlockSnapshot, InstructionSnapshot, TransactionSnapshot};
use crate::types::{Address, Gas, Hash, U256};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// EVM execution log entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Log {
    /// Contract that emitted the log
    pub address: Address,
    /// Log topics (up to 4, first is usually event signature)
    pub topics: Vec<Hash>,
    /// Log data (ABI-encoded event parameters)
    pub data: Vec<u8>,
}

impl Log {
    /// Create a new log entry
    pub fn new(address: Address, topics: Vec<Hash>, data: Vec<u8>) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

impl From<&revm::primitives::Log> for Log {
    fn from(log: &revm::primitives::Log) -> Self {
        Log::new(log.address, log.topics().to_vec(), log.data.data.to_vec())
    }
}

/// Execution result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Execution completed successfully
    Success,
    /// Execution reverted (REVERT opcode)
    Revert,
    /// Execution halted (out of gas, invalid opcode, etc.)
    Halt,
}

impl ExecutionStatus {
    /// Check if execution was successful
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    /// Check if execution reverted
    pub fn is_revert(&self) -> bool {
        matches!(self, ExecutionStatus::Revert)
    }

    /// Check if execution halted
    pub fn is_halt(&self) -> bool {
        matches!(self, ExecutionStatus::Halt)
    }
}

/// Transaction receipt, folded into the receipt-set commitment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub status: ExecutionStatus,
    pub gas_used: Gas,
    /// Gas used by the block up to and including this transaction
    pub cumulative_gas_used: U256,
    pub logs: Vec<Log>,
    /// Created contract address (if contract creation)
    pub created_address: Option<Address>,
}

impl Receipt {
    /// Leaf committed into the receipt set
    pub fn hash(&self) -> Hash {
        hash_struct(self)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Everything produced by tracing a single transaction
#[derive(Debug, Clone)]
pub struct TransactionTrace {
    /// One entry per executed opcode, in program order
    pub steps: Vec<GeneratedStep>,
    pub receipt: Receipt,
    /// Snapshot whose digest matched the requested target, if any
    pub target: Option<InstructionSnapshot>,
}

/// One entry of the bisectable state list over a block range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratedState {
    Block(BlockSnapshot),
    Transaction(TransactionSnapshot),
    Instruction(GeneratedStep),
}

impl GeneratedState {
    pub fn hash(&self) -> Hash {
        match self {
            GeneratedState::Block(s) => s.hash(),
            GeneratedState::Transaction(s) => s.hash(),
            GeneratedState::Instruction(step) => step.vm_hash,
        }
    }

    /// Canonical bytes for block and transaction states. Instruction states
    /// only carry their digest and must be re-traced to be encoded.
    pub fn encode(&self) -> Option<Vec<u8>> {
        match self {
            GeneratedState::Block(s) => Some(s.encode()),
            GeneratedState::Transaction(s) => Some(s.encode()),
            GeneratedState::Instruction(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_creation() {
        let addr = Address::repeat_byte(0x01);
        let topic = Hash::repeat_byte(0x02);
        let data = vec![0x12, 0x34];

        let log = Log::new(addr, vec![topic], data.clone());

        assert_eq!(log.address, addr);
        assert_eq!(log.topics, vec![topic]);
        assert_eq!(log.data, data);
    }

    #[test]
    fn test_execution_status() {
        assert!(ExecutionStatus::Success.is_success());
        assert!(ExecutionStatus::Revert.is_revert());
        assert!(ExecutionStatus::Halt.is_halt());

        assert!(!ExecutionStatus::Success.is_revert());
        assert!(!ExecutionStatus::Revert.is_success());
    }

    #[test]
    fn test_receipt_hash_tracks_cumulative_gas() {
        let receipt = Receipt {
            status: ExecutionStatus::Success,
            gas_used: 21_000,
            cumulative_gas_used: U256::from(21_000u64),
            logs: vec![],
            created_address: None,
        };
        let mut later = receipt.clone();
        later.cumulative_gas_used = U256::from(42_000u64);

        assert_eq!(receipt.hash(), receipt.clone().hash());
        assert_ne!(receipt.hash(), later.hash());
    }

    #[test]
    fn test_generated_state_encoding() {
        let block = BlockSnapshot {
            global_state_root: Hash::repeat_byte(0x01),
            cumulative_gas_used: U256::ZERO,
            block_hash_root: Hash::ZERO,
        };
        let state = GeneratedState::Block(block.clone());
        assert_eq!(state.hash(), block.hash());
        assert_eq!(state.encode().map(|b| b.len()), Some(96));

        let step = GeneratedState::Instruction(GeneratedStep {
            vm_hash: Hash::repeat_byte(0x07),
            gas: 100,
        });
        assert_eq!(step.hash(), Hash::repeat_byte(0x07));
        assert!(step.encode().is_none());
    }
}
