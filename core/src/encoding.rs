//! Canonical snapshot encoding
//!
//! The bytes produced here are hashed into the commitments the dispute
//! protocol compares, so the layout is fixed:
//!
//! - integers are big-endian: depth 2 bytes; gas, refund, pc and sizes 8
//!   bytes; call flag and opcode 1 byte
//! - hashes are 32 bytes, addresses 20 bytes, `U256` values 32 bytes
//! - an instruction snapshot is a fixed sequence of fields, some of which are
//!   present only when their guard holds and otherwise take zero bytes
//!
//! Transaction (160 bytes) and block (96 bytes) snapshots have no
//! conditional fields.

use crate::hashing::keccak256;
use crate::snapshot::{BlockSnapshot, InstructionSnapshot, TransactionSnapshot};
use crate::types::{Address, Hash, U256};
use alloc::vec::Vec;

extern crate alloc;

/// Canonical byte encoding and its keccak digest.
pub trait Encode {
    fn encode(&self) -> Vec<u8>;

    fn hash(&self) -> Hash {
        keccak256(&self.encode())
    }
}

/// One fixed-width field of an encoding.
#[derive(Debug, Clone, Copy)]
enum Field<'a> {
    U8(u8),
    U16(u16),
    U64(u64),
    Word(&'a U256),
    Hash(&'a Hash),
    Address(&'a Address),
}

impl Field<'_> {
    fn len(&self) -> usize {
        match self {
            Field::U8(_) => 1,
            Field::U16(_) => 2,
            Field::U64(_) => 8,
            Field::Word(_) | Field::Hash(_) => 32,
            Field::Address(_) => 20,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            Field::U8(v) => out.push(*v),
            Field::U16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::U64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Field::Word(v) => out.extend_from_slice(&v.to_be_bytes::<32>()),
            Field::Hash(v) => out.extend_from_slice(v.as_slice()),
            Field::Address(v) => out.extend_from_slice(v.as_slice()),
        }
    }
}

/// Writes the fields whose guard holds, in order.
fn write_fields(fields: &[(bool, Field<'_>)]) -> Vec<u8> {
    let len = fields
        .iter()
        .filter(|(include, _)| *include)
        .map(|(_, field)| field.len())
        .sum();
    let mut out = Vec::with_capacity(len);
    for (_, field) in fields.iter().filter(|(include, _)| *include) {
        field.write(&mut out);
    }
    debug_assert_eq!(out.len(), len);
    out
}

impl InstructionSnapshot {
    /// Field list in wire order. The caller block (last-depth hash through
    /// out size, and the input size) exists only below the outermost frame.
    fn fields(&self) -> [(bool, Field<'_>); 27] {
        let nested = self.depth != 1;
        [
            (true, Field::U16(self.depth)),
            (true, Field::U64(self.gas)),
            (true, Field::U64(self.refund)),
            (nested, Field::Hash(&self.last_depth_hash)),
            (nested, Field::Address(&self.contract_address)),
            (nested, Field::Address(&self.caller)),
            (nested, Field::Word(&self.value)),
            (nested, Field::U8(self.call_flag.as_u8())),
            (nested, Field::U64(self.out)),
            (nested, Field::U64(self.out_size)),
            (true, Field::U64(self.pc)),
            (true, Field::U8(self.opcode)),
            (true, Field::Hash(&self.code_hash)),
            (true, Field::U64(self.stack_size)),
            (true, Field::Hash(&self.stack_hash)),
            (true, Field::U64(self.memory_size)),
            (self.memory_size != 0, Field::Hash(&self.memory_root)),
            (nested, Field::U64(self.input_data_size)),
            (nested && self.input_data_size != 0, Field::Hash(&self.input_data_root)),
            (true, Field::U64(self.return_data_size)),
            (self.return_data_size != 0, Field::Hash(&self.return_data_root)),
            (true, Field::Hash(&self.committed_global_state_root)),
            (true, Field::Hash(&self.global_state_root)),
            (true, Field::Hash(&self.self_destruct_acc)),
            (true, Field::Hash(&self.log_acc)),
            (true, Field::Hash(&self.block_hash_root)),
            (true, Field::Hash(&self.access_list_root)),
        ]
    }
}

impl Encode for InstructionSnapshot {
    fn encode(&self) -> Vec<u8> {
        write_fields(&self.fields())
    }
}

impl Encode for TransactionSnapshot {
    fn encode(&self) -> Vec<u8> {
        write_fields(&[
            (true, Field::Hash(&self.global_state_root)),
            (true, Field::Word(&self.cumulative_gas_used)),
            (true, Field::Hash(&self.transaction_trie_root)),
            (true, Field::Hash(&self.receipt_trie_root)),
            (true, Field::Hash(&self.block_hash_root)),
        ])
    }
}

impl Encode for BlockSnapshot {
    fn encode(&self) -> Vec<u8> {
        write_fields(&[
            (true, Field::Hash(&self.global_state_root)),
            (true, Field::Word(&self.cumulative_gas_used)),
            (true, Field::Hash(&self.block_hash_root)),
        ])
    }
}
