//! Core type definitions
//!
//! Uses alloy-primitives for Ethereum-compatible types.

pub use alloy_primitives::{Address, B256, Bytes, U256};

/// 32-byte hash (Keccak256 output)
pub type Hash = B256;

/// Account nonce type
pub type Nonce = u64;

/// Gas amount type
pub type Gas = u64;

/// Block number
pub type BlockNumber = u64;

/// Timestamp (seconds since epoch)
pub type Timestamp = u64;

/// Wei amount (for clarity in value transfers)
pub type Wei = U256;

/// Interpret the low 20 bytes of a stack word as an address.
pub fn word_to_address(word: U256) -> Address {
    Address::from_word(B256::from(word))
}
