//! Reference accumulators
//!
//! Snapshots only read a digest (and, for buffers, a size) from each of these.
//! The implementations here are flat keccak folds and binary Merkle roots, not
//! Merkle-Patricia tries; they exist so the generator can be driven end to end
//! against an in-memory state.

use crate::hashing::{hash_concat, hash_pair, keccak256};
use crate::output::Log;
use crate::types::{Address, BlockNumber, Hash, U256};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Read-only view every accumulator exposes to the snapshot builders
pub trait Commitment {
    /// Digest committing to the full contents
    fn root(&self) -> Hash;

    /// Number of elements (bytes for buffers)
    fn size(&self) -> u64;
}

/// Binary keccak Merkle root. An odd node is paired with the zero hash.
fn merkle_root(mut layer: Vec<Hash>) -> Hash {
    if layer.is_empty() {
        return Hash::ZERO;
    }
    while layer.len() > 1 {
        layer = layer
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&Hash::ZERO)))
            .collect();
    }
    layer[0]
}

/// Byte buffer committed as 32-byte words: memory, call input and return data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }
}

impl Commitment for Memory {
    fn root(&self) -> Hash {
        let leaves = self
            .data
            .chunks(32)
            .map(|chunk| {
                let mut word = [0u8; 32];
                word[..chunk.len()].copy_from_slice(chunk);
                keccak256(&word)
            })
            .collect();
        merkle_root(leaves)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Fold the stack bottom to top: `h' = keccak(h || word)`, starting from zero.
pub fn stack_hash(words: &[U256]) -> Hash {
    words.iter().fold(Hash::ZERO, |acc, word| {
        hash_concat(&[acc.as_slice(), &word.to_be_bytes::<32>()])
    })
}

/// Ordered set of self-destructed contracts.
///
/// `add` returns a new value so a frame can keep the set it saw on entry and
/// restore it if the frame reverts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfDestructSet {
    pub contents: Vec<Address>,
    pub hash: Hash,
}

impl SelfDestructSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add(&self, address: Address) -> Self {
        let mut contents = self.contents.clone();
        contents.push(address);
        Self {
            contents,
            hash: hash_concat(&[self.hash.as_slice(), address.as_slice()]),
        }
    }
}

impl Commitment for SelfDestructSet {
    fn root(&self) -> Hash {
        self.hash
    }

    fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}

/// Warm accounts and storage slots touched by the transaction so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessListTrie {
    entries: BTreeMap<Address, BTreeSet<U256>>,
}

impl AccessListTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the address was cold.
    pub fn add_address(&mut self, address: Address) -> bool {
        if self.entries.contains_key(&address) {
            return false;
        }
        self.entries.insert(address, BTreeSet::new());
        true
    }

    /// Returns `true` if the slot was cold.
    pub fn add_slot(&mut self, address: Address, slot: U256) -> bool {
        self.entries.entry(address).or_default().insert(slot)
    }

    pub fn contains_address(&self, address: &Address) -> bool {
        self.entries.contains_key(address)
    }

    pub fn contains_slot(&self, address: &Address, slot: &U256) -> bool {
        self.entries
            .get(address)
            .is_some_and(|slots| slots.contains(slot))
    }
}

impl Commitment for AccessListTrie {
    fn root(&self) -> Hash {
        if self.entries.is_empty() {
            return Hash::ZERO;
        }
        let mut buf = Vec::new();
        for (address, slots) in &self.entries {
            buf.extend_from_slice(address.as_slice());
            for slot in slots {
                buf.extend_from_slice(&slot.to_be_bytes::<32>());
            }
        }
        keccak256(&buf)
    }

    fn size(&self) -> u64 {
        self.entries.len() as u64
    }
}

/// Hash chain over the logs emitted so far in the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogSeries {
    hash: Hash,
    len: u64,
}

impl LogSeries {
    pub fn from_logs(logs: &[Log]) -> Self {
        logs.iter().fold(Self::default(), |series, log| series.append(log))
    }

    #[must_use]
    pub fn append(&self, log: &Log) -> Self {
        let mut leaf = Vec::with_capacity(20 + 32 * log.topics.len() + log.data.len());
        leaf.extend_from_slice(log.address.as_slice());
        for topic in &log.topics {
            leaf.extend_from_slice(topic.as_slice());
        }
        leaf.extend_from_slice(&log.data);
        Self {
            hash: hash_pair(&self.hash, &keccak256(&leaf)),
            len: self.len + 1,
        }
    }

    pub fn hash(&self) -> Hash {
        self.hash
    }
}

impl Commitment for LogSeries {
    fn root(&self) -> Hash {
        self.hash
    }

    fn size(&self) -> u64 {
        self.len
    }
}

/// History of block hashes visible to BLOCKHASH.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHashTree {
    hashes: BTreeMap<BlockNumber, Hash>,
}

impl BlockHashTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_hashes(hashes: &BTreeMap<BlockNumber, Hash>) -> Self {
        Self {
            hashes: hashes.clone(),
        }
    }

    pub fn insert(&mut self, number: BlockNumber, hash: Hash) {
        self.hashes.insert(number, hash);
    }

    pub fn get(&self, number: BlockNumber) -> Option<Hash> {
        self.hashes.get(&number).copied()
    }
}

impl Commitment for BlockHashTree {
    fn root(&self) -> Hash {
        self.hashes.iter().fold(Hash::ZERO, |acc, (number, hash)| {
            hash_concat(&[acc.as_slice(), &number.to_be_bytes(), hash.as_slice()])
        })
    }

    fn size(&self) -> u64 {
        self.hashes.len() as u64
    }
}

/// Append-only leaf list; used for the transaction and receipt sets of a block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedTrie {
    leaves: Vec<Hash>,
}

impl OrderedTrie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, leaf: Hash) {
        self.leaves.push(leaf);
    }
}

impl Commitment for OrderedTrie {
    fn root(&self) -> Hash {
        merkle_root(self.leaves.clone())
    }

    fn size(&self) -> u64 {
        self.leaves.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_memory() {
        let memory = Memory::new();
        assert_eq!(memory.size(), 0);
        assert_eq!(memory.root(), Hash::ZERO);
    }

    #[test]
    fn test_memory_pads_last_word() {
        let short = Memory::from_bytes(&[0x01]);
        let mut padded = [0u8; 32];
        padded[0] = 0x01;
        assert_eq!(short.size(), 1);
        assert_eq!(short.root(), keccak256(&padded));
        // Same words, different length: only the size differs.
        assert_eq!(short.root(), Memory::from_bytes(&padded).root());
    }

    #[test]
    fn test_memory_root_pairs_words() {
        let data = [0x11u8; 96];
        let leaf = keccak256(&[0x11u8; 32]);
        let expected = hash_pair(&hash_pair(&leaf, &leaf), &hash_pair(&leaf, &Hash::ZERO));
        assert_eq!(Memory::from_bytes(&data).root(), expected);
    }

    #[test]
    fn test_stack_hash_order() {
        let a = U256::from(1u64);
        let b = U256::from(2u64);
        assert_eq!(stack_hash(&[]), Hash::ZERO);
        assert_ne!(stack_hash(&[a, b]), stack_hash(&[b, a]));
        assert_eq!(
            stack_hash(&[a]),
            hash_concat(&[Hash::ZERO.as_slice(), &a.to_be_bytes::<32>()])
        );
    }

    #[test]
    fn test_self_destruct_set_is_persistent() {
        let empty = SelfDestructSet::new();
        let one = empty.add(Address::repeat_byte(0x01));

        assert_eq!(empty.size(), 0);
        assert_eq!(empty.root(), Hash::ZERO);
        assert_eq!(one.size(), 1);
        assert_eq!(
            one.hash,
            hash_concat(&[Hash::ZERO.as_slice(), Address::repeat_byte(0x01).as_slice()])
        );
    }

    #[test]
    fn test_access_list_warmth() {
        let mut list = AccessListTrie::new();
        let addr = Address::repeat_byte(0x0a);

        assert_eq!(list.root(), Hash::ZERO);
        assert!(list.add_address(addr));
        assert!(!list.add_address(addr));
        assert!(list.add_slot(addr, U256::from(1u64)));
        assert!(!list.add_slot(addr, U256::from(1u64)));
        assert!(list.contains_slot(&addr, &U256::from(1u64)));
        assert_ne!(list.root(), Hash::ZERO);
    }

    #[test]
    fn test_access_list_root_ignores_insertion_order() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);

        let mut first = AccessListTrie::new();
        first.add_address(a);
        first.add_slot(b, U256::from(7u64));

        let mut second = AccessListTrie::new();
        second.add_slot(b, U256::from(7u64));
        second.add_address(a);

        assert_eq!(first.root(), second.root());
    }

    #[test]
    fn test_log_series_chains() {
        let log = Log::new(Address::repeat_byte(0x01), vec![Hash::repeat_byte(0x02)], vec![0xff]);
        let one = LogSeries::default().append(&log);
        let two = one.append(&log);

        assert_eq!(LogSeries::from_logs(&[]).hash(), Hash::ZERO);
        assert_eq!(LogSeries::from_logs(&[log.clone(), log]), two);
        assert_ne!(one.hash(), two.hash());
        assert_eq!(two.size(), 2);
    }

    #[test]
    fn test_block_hash_tree_root_depends_on_number() {
        let mut a = BlockHashTree::new();
        a.insert(1, Hash::repeat_byte(0xaa));
        let mut b = BlockHashTree::new();
        b.insert(2, Hash::repeat_byte(0xaa));

        assert_eq!(BlockHashTree::new().root(), Hash::ZERO);
        assert_ne!(a.root(), b.root());
        assert_eq!(a.get(1), Some(Hash::repeat_byte(0xaa)));
    }

    #[test]
    fn test_ordered_trie() {
        let mut trie = OrderedTrie::new();
        assert_eq!(trie.root(), Hash::ZERO);

        trie.push(Hash::repeat_byte(0x01));
        assert_eq!(trie.root(), Hash::repeat_byte(0x01));

        trie.push(Hash::repeat_byte(0x02));
        assert_eq!(
            trie.root(),
            hash_pair(&Hash::repeat_byte(0x01), &Hash::repeat_byte(0x02))
        );
        assert_eq!(trie.size(), 2);
    }
}
