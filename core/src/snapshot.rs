//! Snapshot model
//!
//! Three granularities of committed machine state:
//! - [`InstructionSnapshot`]: one per executed opcode, inside a transaction
//! - [`TransactionSnapshot`]: between transactions of a block
//! - [`BlockSnapshot`]: between blocks
//!
//! Snapshots are built once from live state and never mutated afterwards.
//! They copy fixed-size digests out of the accumulators and never hold the
//! accumulators themselves. Byte layout and digest live in [`crate::encoding`].

use crate::accumulators::{
    stack_hash, AccessListTrie, BlockHashTree, Commitment, LogSeries, Memory, OrderedTrie,
    SelfDestructSet,
};
use crate::state::ProofState;
use crate::types::{Address, Gas, Hash, U256};
use revm::interpreter::opcode;
use serde::{Deserialize, Serialize};

/// Kind of call that opened the current frame. Encoded as one byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CallFlag {
    #[default]
    Call = 0,
    CallCode = 1,
    DelegateCall = 2,
    StaticCall = 3,
    Create = 4,
    Create2 = 5,
}

impl CallFlag {
    /// Call flag for a frame-opening opcode, `None` for anything else
    /// (including SELFDESTRUCT, which never opens a frame).
    pub fn from_opcode(op: u8) -> Option<Self> {
        match op {
            opcode::CALL => Some(CallFlag::Call),
            opcode::CALLCODE => Some(CallFlag::CallCode),
            opcode::DELEGATECALL => Some(CallFlag::DelegateCall),
            opcode::STATICCALL => Some(CallFlag::StaticCall),
            opcode::CREATE => Some(CallFlag::Create),
            opcode::CREATE2 => Some(CallFlag::Create2),
            _ => None,
        }
    }

    /// Number of stack words the opening opcode consumes.
    pub fn argument_count(self) -> usize {
        match self {
            CallFlag::Call | CallFlag::CallCode => 7,
            CallFlag::DelegateCall | CallFlag::StaticCall => 6,
            CallFlag::Create => 3,
            CallFlag::Create2 => 4,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// What the interpreter reports for one step, before the opcode executes.
#[derive(Debug, Clone, Copy)]
pub struct CapturedStep<'a> {
    pub pc: u64,
    pub opcode: u8,
    /// Gas remaining before the opcode runs
    pub gas: Gas,
    /// Gas the opcode charges, when the interpreter knows it up front
    pub cost: Gas,
    /// Call nesting level, 1 for the outermost frame
    pub depth: u16,
    pub contract: Address,
    pub caller: Address,
    pub value: U256,
    pub code_hash: Hash,
    /// Bottom first
    pub stack: &'a [U256],
    pub memory: &'a [u8],
    /// Output of the most recent sub-call made by this frame
    pub return_data: &'a [u8],
}

/// Per-frame context owned by the generator rather than the interpreter.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    pub committed_root: Hash,
    pub last_depth_hash: Hash,
    pub call_flag: CallFlag,
    pub out: u64,
    pub out_size: u64,
    pub input: &'a Memory,
    pub self_destruct_set: &'a SelfDestructSet,
    pub access_list: &'a AccessListTrie,
    pub block_hash_root: Hash,
}

/// State committed before one opcode executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionSnapshot {
    pub depth: u16,
    pub gas: Gas,
    pub refund: u64,
    /// Digest of the enclosing frame at the moment this frame was entered,
    /// zero in the outermost frame
    pub last_depth_hash: Hash,
    pub contract_address: Address,
    pub caller: Address,
    pub value: U256,
    pub call_flag: CallFlag,
    /// Return buffer offset in the caller's memory
    pub out: u64,
    pub out_size: u64,
    pub pc: u64,
    pub opcode: u8,
    pub code_hash: Hash,
    pub stack_size: u64,
    pub stack_hash: Hash,
    pub memory_size: u64,
    pub memory_root: Hash,
    pub input_data_size: u64,
    pub input_data_root: Hash,
    pub return_data_size: u64,
    pub return_data_root: Hash,
    pub committed_global_state_root: Hash,
    pub global_state_root: Hash,
    pub self_destruct_acc: Hash,
    pub log_acc: Hash,
    pub block_hash_root: Hash,
    pub access_list_root: Hash,
}

impl InstructionSnapshot {
    /// Build the snapshot for one step. Pure read of `state` and the buffers.
    pub fn from_captured<S: ProofState + ?Sized>(
        ctx: &FrameContext<'_>,
        step: &CapturedStep<'_>,
        state: &S,
    ) -> Self {
        let memory = Memory::from_bytes(step.memory);
        let return_data = Memory::from_bytes(step.return_data);
        let last_depth_hash = if step.depth > 1 {
            ctx.last_depth_hash
        } else {
            Hash::ZERO
        };

        Self {
            depth: step.depth,
            gas: step.gas,
            refund: state.refund(),
            last_depth_hash,
            contract_address: step.contract,
            caller: step.caller,
            value: step.value,
            call_flag: ctx.call_flag,
            out: ctx.out,
            out_size: ctx.out_size,
            pc: step.pc,
            opcode: step.opcode,
            code_hash: step.code_hash,
            stack_size: step.stack.len() as u64,
            stack_hash: stack_hash(step.stack),
            memory_size: memory.size(),
            memory_root: memory.root(),
            input_data_size: ctx.input.size(),
            input_data_root: ctx.input.root(),
            return_data_size: return_data.size(),
            return_data_root: return_data.root(),
            committed_global_state_root: ctx.committed_root,
            global_state_root: state.root_for_proof(),
            self_destruct_acc: ctx.self_destruct_set.root(),
            log_acc: LogSeries::from_logs(&state.current_logs()).hash(),
            block_hash_root: ctx.block_hash_root,
            access_list_root: ctx.access_list.root(),
        }
    }

    /// This snapshot as the enclosing frame of a call it is about to open:
    /// the opcode's cost is charged and its arguments are popped from `stack`
    /// (the stack this snapshot was built from).
    #[must_use]
    pub fn as_last_depth(&self, stack: &[U256], callee: CallFlag, cost: Gas) -> Self {
        debug_assert_eq!(stack.len() as u64, self.stack_size);
        let remaining = &stack[..stack.len().saturating_sub(callee.argument_count())];
        Self {
            gas: self.gas.saturating_sub(cost),
            stack_size: remaining.len() as u64,
            stack_hash: stack_hash(remaining),
            ..self.clone()
        }
    }
}

/// State between two transactions of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub global_state_root: Hash,
    /// Gas used by the block up to and including the previous transaction
    pub cumulative_gas_used: U256,
    pub transaction_trie_root: Hash,
    pub receipt_trie_root: Hash,
    pub block_hash_root: Hash,
}

impl TransactionSnapshot {
    pub fn from_state<S: ProofState + ?Sized>(
        state: &S,
        cumulative_gas_used: U256,
        transactions: &OrderedTrie,
        receipts: &OrderedTrie,
        block_hashes: &BlockHashTree,
    ) -> Self {
        Self {
            global_state_root: state.root_for_proof(),
            cumulative_gas_used,
            transaction_trie_root: transactions.root(),
            receipt_trie_root: receipts.root(),
            block_hash_root: block_hashes.root(),
        }
    }
}

/// State between blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub global_state_root: Hash,
    pub cumulative_gas_used: U256,
    pub block_hash_root: Hash,
}

impl BlockSnapshot {
    pub fn from_state<S: ProofState + ?Sized>(
        state: &S,
        cumulative_gas_used: U256,
        block_hashes: &BlockHashTree,
    ) -> Self {
        Self {
            global_state_root: state.root_for_proof(),
            cumulative_gas_used,
            block_hash_root: block_hashes.root(),
        }
    }
}
