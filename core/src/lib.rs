//! # One-Step-Proof Core
//!
//! State commitments for optimistic-rollup fraud proofs.
//!
//! While a block range is re-executed, this crate commits the machine state
//! before every opcode, before every transaction and at every block boundary.
//! Each commitment is the keccak digest of a canonical byte encoding, and
//! nested call frames name their caller by digest, so a single disputed step
//! can be checked without replaying the rest of the execution.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   TraceInput    │ ── Pre-state, blocks, transactions
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   TraceDriver   │ ── revm + TraceInspector per transaction
//! └────────┬────────┘
//!          │ step / call / create / selfdestruct hooks
//!          ▼
//! ┌─────────────────┐
//! │ TraceGenerator  │ ── Call frames, accumulators, one snapshot per opcode
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Encode / digest │ ── Instruction, transaction and block snapshots
//! └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use osp_core::{AccountState, BlockEnv, InMemoryDB, TraceBuilder, TxInput};
//!
//! let mut state = InMemoryDB::new();
//! state.insert_account(sender, AccountState::new_with_balance(balance));
//!
//! let hashes = TraceBuilder::new()
//!     .with_state(state)
//!     .with_tx(BlockEnv::default(), TxInput::call(sender, contract, calldata))
//!     .state_hashes()?;
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core type definitions (Address, Hash, U256)
//! - [`errors`] - Error types and Result alias
//! - [`config`] - Prover configuration
//! - [`hashing`] - Keccak256 helpers
//! - [`accumulators`] - Reference accumulators behind the snapshot roots
//! - [`state`] - In-memory state database and the proof-state capability
//! - [`snapshot`] - Instruction, transaction and block snapshots
//! - [`encoding`] - Canonical snapshot encoding
//! - [`generator`] - Instruction-level state generation
//! - [`inspector`] - revm adapter for the generator
//! - [`input`] - Trace input types
//! - [`output`] - Receipts and generated states
//! - [`driver`] - Block-range tracing and proof entry points

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod accumulators;
pub mod config;
pub mod driver;
pub mod encoding;
pub mod errors;
pub mod generator;
pub mod hashing;
pub mod input;
pub mod inspector;
pub mod output;
pub mod snapshot;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use config::{Hardfork, ProverConfig};
pub use driver::{RangeTrace, TraceBuilder, TraceDriver, TransactionContext};
pub use encoding::Encode;
pub use errors::{ProverError, Result};
pub use generator::{ExecutionTracer, GeneratedStep, TraceGenerator, TraceStatus};
pub use hashing::{hash_struct, keccak256};
pub use input::{BlockEnv, BlockInput, TraceInput, TxInput};
pub use inspector::TraceInspector;
pub use output::{ExecutionStatus, GeneratedState, Log, Receipt, TransactionTrace};
pub use snapshot::{BlockSnapshot, CallFlag, InstructionSnapshot, TransactionSnapshot};
pub use state::{AccountState, InMemoryDB, ProofState};
pub use types::{Address, Bytes, Gas, Hash, U256};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AccountState, Address, BlockEnv, BlockInput, BlockSnapshot, Encode, GeneratedState,
        GeneratedStep, Hash, InMemoryDB, InstructionSnapshot, ProverConfig, ProverError,
        Result, TraceBuilder, TraceDriver, TraceInput, TransactionSnapshot, TxInput, U256,
    };
}
