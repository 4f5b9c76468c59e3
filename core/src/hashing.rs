//! Hashing utilities
//!
//! Keccak256 helpers shared by the canonical encoder and the reference
//! accumulators.

use crate::types::{Hash, B256};
use sha3::{Digest, Keccak256};

/// Compute Keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    B256::from_slice(&hasher.finalize())
}

/// Hash a serializable struct
///
/// Uses bincode for deterministic serialization before hashing.
pub fn hash_struct<T: serde::Serialize>(value: &T) -> Hash {
    let bytes = bincode::serialize(value).expect("serialization should not fail");
    keccak256(&bytes)
}

/// Hash multiple values together
///
/// Concatenates all byte slices and hashes the result.
pub fn hash_concat(values: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for value in values {
        hasher.update(value);
    }
    B256::from_slice(&hasher.finalize())
}

/// `keccak256(left || right)`
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    hash_concat(&[left.as_slice(), right.as_slice()])
}
