//! I/O utilities for the host
//!
//! Trace inputs and configuration are JSON; generated state lists are stored
//! with bincode.

use anyhow::{bail, Context, Result};
use osp_core::prelude::*;
use std::fs;
use std::path::Path;

pub fn save_input_json<P: AsRef<Path>>(input: &TraceInput, path: P) -> Result<()> {
    let json = serde_json::to_string_pretty(input)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn load_input_json<P: AsRef<Path>>(path: P) -> Result<TraceInput> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse trace input {path:?}"))
}

/// Missing file means default configuration; missing fields take defaults.
pub fn load_config(path: Option<&Path>) -> Result<ProverConfig> {
    let Some(path) = path else {
        return Ok(ProverConfig::default());
    };
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse config {path:?}"))
}

pub fn save_states<P: AsRef<Path>>(states: &[GeneratedState], path: P) -> Result<()> {
    let bytes = bincode::serialize(states).context("Failed to serialize generated states")?;
    save_bytes(&bytes, path)
}

pub fn load_states<P: AsRef<Path>>(path: P) -> Result<Vec<GeneratedState>> {
    let bytes = fs::read(path)?;
    bincode::deserialize(&bytes).context("Failed to deserialize generated states")
}

pub fn save_bytes<P: AsRef<Path>>(data: &[u8], path: P) -> Result<()> {
    fs::write(path, data)?;
    Ok(())
}

/// Parse a 32-byte hash, with or without `0x`.
pub fn parse_hash(s: &str) -> Result<Hash> {
    let bytes = hex::decode(s.trim().trim_start_matches("0x")).context("Hash is not valid hex")?;
    if bytes.len() != 32 {
        bail!("Hash must be 32 bytes, got {}", bytes.len());
    }
    Ok(Hash::from_slice(&bytes))
}

pub fn format_hash(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// One funded sender, a transfer and a call into a contract that adds two
/// numbers and stores the result.
pub fn sample_input() -> TraceInput {
    let sender = Address::repeat_byte(0x01);
    let receiver = Address::repeat_byte(0x02);
    let contract = Address::repeat_byte(0xc0);

    let mut state = InMemoryDB::new();
    state.insert_account(
        sender,
        AccountState::new_with_balance(U256::from(10u128.pow(18))),
    );
    // PUSH1 1, PUSH1 2, ADD, PUSH1 0, SSTORE, STOP
    let code = vec![0x60, 0x01, 0x60, 0x02, 0x01, 0x60, 0x00, 0x55, 0x00];
    state.insert_account(contract, AccountState::new_contract(code, U256::ZERO));

    TraceInput::new(state).with_block(
        BlockInput::new(BlockEnv::default())
            .with_tx(TxInput::transfer(
                sender,
                receiver,
                U256::from(1_000_000_000_000_000u64),
            ))
            .with_tx(TxInput::call(sender, contract, vec![]).with_gas_limit(100_000)),
    )
}
