//! Trace driver
//!
//! Re-executes a block range under revm with a [`TraceGenerator`] attached
//! and assembles the interleaved state list the dispute protocol bisects
//! over: a block snapshot at each block boundary, a transaction snapshot
//! before each transaction, and one instruction digest per executed opcode.

extern crate alloc;

use crate::accumulators::{BlockHashTree, OrderedTrie};
use crate::config::ProverConfig;
use crate::encoding::Encode;
use crate::errors::{ProverError, Result};
use crate::generator::{ExecutionTracer, TraceGenerator};
use crate::input::{BlockEnv, BlockInput, TraceInput, TxInput};
use crate::inspector::TraceInspector;
use crate::output::{ExecutionStatus, GeneratedState, Log, Receipt, TransactionTrace};
use crate::snapshot::{BlockSnapshot, InstructionSnapshot, TransactionSnapshot};
use crate::state::InMemoryDB;
use crate::types::{Gas, Hash, U256};
use alloc::format;
use alloc::vec::Vec;
use log::{debug, info};
use revm::primitives::{
    BlockEnv as RevmBlockEnv, CfgEnv, EVMError, ExecutionResult, ResultAndState, TxEnv, TxKind,
};
use revm::{inspector_handle_register, Evm, GetInspector};

/// Where a transaction sits in the range being traced.
#[derive(Debug, Clone)]
pub struct TransactionContext<'a> {
    pub block: &'a BlockEnv,
    pub index: u64,
    /// Snapshot taken before the transaction; carries the cumulative gas so far
    pub start: TransactionSnapshot,
    pub block_hashes: &'a BlockHashTree,
    /// Instruction digest whose full snapshot should be kept
    pub target: Option<Hash>,
}

/// Result of tracing a whole range.
#[derive(Debug, Clone)]
pub struct RangeTrace {
    pub states: Vec<GeneratedState>,
    /// Instruction snapshot matching the requested target, if one was seen
    pub target: Option<InstructionSnapshot>,
    pub receipts: Vec<Receipt>,
    pub post_state: InMemoryDB,
}

impl RangeTrace {
    pub fn hashes(&self) -> Vec<Hash> {
        self.states.iter().map(GeneratedState::hash).collect()
    }
}

/// Prover-side execution engine.
///
/// Every call works on its own copy of the input state, so independent
/// inputs can be traced concurrently with one driver each.
#[derive(Debug, Clone, Default)]
pub struct TraceDriver {
    config: ProverConfig,
}

impl TraceDriver {
    pub fn new(config: ProverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProverConfig {
        &self.config
    }

    /// Execute one transaction with a generator attached and commit its
    /// effects to `state`.
    pub fn trace_transaction(
        &self,
        state: &mut InMemoryDB,
        ctx: TransactionContext<'_>,
        tx: &TxInput,
    ) -> Result<TransactionTrace> {
        let gas_limit = self.config.effective_gas_limit(tx.gas_limit);
        let cumulative_before = ctx.start.cumulative_gas_used;
        let mut generator = TraceGenerator::new(
            ctx.block.number,
            ctx.index,
            &*state,
            ctx.start,
            ctx.block_hashes,
        )
        .with_access_list(self.config.record_access_list);
        if let Some(target) = ctx.target {
            generator = generator.with_target(target);
        }

        generator.capture_tx_start(gas_limit);
        let ResultAndState {
            result,
            state: changes,
        } = {
            let mut inspector = TraceInspector::new(&mut generator, &*state);
            let mut evm = self.build_evm(ctx.block, tx, gas_limit, state.clone(), &mut inspector);
            evm.transact().map_err(map_evm_error)?
        };
        generator.capture_tx_end(gas_limit.saturating_sub(result.gas_used()));

        for (address, account) in &changes {
            state.apply_account(*address, account);
        }

        let receipt = build_receipt(&result, cumulative_before);
        let (steps, target) = generator.into_steps()?;
        debug!(
            "block {} tx {}: {:?}, gas used {}, {} steps",
            ctx.block.number,
            ctx.index,
            receipt.status,
            receipt.gas_used,
            steps.len()
        );
        Ok(TransactionTrace {
            steps,
            receipt,
            target,
        })
    }

    /// Trace every block of `input` in order.
    pub fn trace_range(&self, input: &TraceInput, target: Option<Hash>) -> Result<RangeTrace> {
        validate_range(&input.blocks)?;
        info!(
            "tracing {} blocks, {} transactions",
            input.blocks.len(),
            input.transaction_count()
        );

        let mut state = input.pre_state.clone();
        let mut block_hashes = BlockHashTree::from_hashes(&state.block_hashes);
        let mut cumulative = input.start_gas_used;
        let mut states = Vec::new();
        let mut receipts = Vec::new();
        let mut captured = None;

        for block in &input.blocks {
            states.push(GeneratedState::Block(BlockSnapshot::from_state(
                &state,
                cumulative,
                &block_hashes,
            )));

            let mut transactions = OrderedTrie::new();
            let mut block_receipts = OrderedTrie::new();
            for (index, tx) in block.transactions.iter().enumerate() {
                let start = TransactionSnapshot::from_state(
                    &state,
                    cumulative,
                    &transactions,
                    &block_receipts,
                    &block_hashes,
                );
                states.push(GeneratedState::Transaction(start.clone()));

                let ctx = TransactionContext {
                    block: &block.env,
                    index: index as u64,
                    start,
                    block_hashes: &block_hashes,
                    target: if captured.is_none() { target } else { None },
                };
                let trace = self.trace_transaction(&mut state, ctx, tx)?;

                cumulative = trace.receipt.cumulative_gas_used;
                transactions.push(tx.hash());
                block_receipts.push(trace.receipt.hash());
                states.extend(trace.steps.into_iter().map(GeneratedState::Instruction));
                captured = captured.or(trace.target);
                receipts.push(trace.receipt);
            }

            let hash = block.env.block_hash();
            block_hashes.insert(block.env.number, hash);
            state.insert_block_hash(block.env.number, hash);
            debug!("block {} done, hash {hash}", block.env.number);
        }
        states.push(GeneratedState::Block(BlockSnapshot::from_state(
            &state,
            cumulative,
            &block_hashes,
        )));

        info!("generated {} states", states.len());
        Ok(RangeTrace {
            states,
            target: captured,
            receipts,
            post_state: state,
        })
    }

    pub fn generate_states(&self, input: &TraceInput) -> Result<Vec<GeneratedState>> {
        Ok(self.trace_range(input, None)?.states)
    }

    pub fn generate_state_hashes(&self, input: &TraceInput) -> Result<Vec<Hash>> {
        Ok(self.trace_range(input, None)?.hashes())
    }

    /// Canonical encoding of the state in the range whose digest is `target`.
    pub fn prove_state(&self, input: &TraceInput, target: Hash) -> Result<Vec<u8>> {
        let trace = self.trace_range(input, Some(target))?;
        if let Some(snapshot) = trace.target {
            return Ok(snapshot.encode());
        }
        trace
            .states
            .iter()
            .filter(|state| state.hash() == target)
            .find_map(GeneratedState::encode)
            .ok_or(ProverError::TargetNotFound(target))
    }

    /// Encoded block and transaction snapshots of the range, in order.
    pub fn prove_blocks(&self, input: &TraceInput) -> Result<Vec<Vec<u8>>> {
        let states = self.generate_states(input)?;
        Ok(states.iter().filter_map(GeneratedState::encode).collect())
    }

    /// Build a revm instance for one transaction.
    fn build_evm<'a, EXT>(
        &self,
        block: &BlockEnv,
        tx: &TxInput,
        gas_limit: Gas,
        db: InMemoryDB,
        external: EXT,
    ) -> Evm<'a, EXT, InMemoryDB>
    where
        EXT: GetInspector<InMemoryDB>,
    {
        let mut cfg = CfgEnv::default();
        cfg.chain_id = block.chain_id;

        let block_env = RevmBlockEnv {
            number: U256::from(block.number),
            timestamp: U256::from(block.timestamp),
            gas_limit: U256::from(block.gas_limit),
            coinbase: block.coinbase,
            basefee: block.base_fee,
            prevrandao: Some(block.prev_randao),
            ..Default::default()
        };

        let tx_env = TxEnv {
            caller: tx.caller,
            transact_to: match tx.to {
                Some(addr) => TxKind::Call(addr),
                None => TxKind::Create,
            },
            value: tx.value,
            data: tx.data.clone().into(),
            gas_limit,
            gas_price: tx.gas_price,
            nonce: tx.nonce,
            ..Default::default()
        };

        Evm::builder()
            .with_db(db)
            .with_external_context(external)
            .with_spec_id(self.config.hardfork.spec_id())
            .modify_cfg_env(|c| *c = cfg)
            .modify_block_env(|b| *b = block_env)
            .modify_tx_env(|t| *t = tx_env)
            .append_handler_register(inspector_handle_register)
            .build()
    }
}

fn map_evm_error(err: EVMError<ProverError>) -> ProverError {
    match err {
        EVMError::Database(err) => err,
        EVMError::Transaction(err) => ProverError::InvalidTransaction(format!("{err:?}")),
        other => ProverError::ExecutionHalted(format!("{other:?}")),
    }
}

fn build_receipt(result: &ExecutionResult, cumulative_before: U256) -> Receipt {
    let (status, created_address) = match result {
        ExecutionResult::Success { output, .. } => {
            (ExecutionStatus::Success, output.address().copied())
        }
        ExecutionResult::Revert { .. } => (ExecutionStatus::Revert, None),
        ExecutionResult::Halt { .. } => (ExecutionStatus::Halt, None),
    };
    let gas_used = result.gas_used();
    Receipt {
        status,
        gas_used,
        cumulative_gas_used: cumulative_before + U256::from(gas_used),
        logs: result.logs().iter().map(Log::from).collect(),
        created_address,
    }
}

/// Blocks must be non-empty and consecutive.
fn validate_range(blocks: &[BlockInput]) -> Result<()> {
    if blocks.is_empty() {
        return Err(ProverError::InvalidInput("empty block range".into()));
    }
    for pair in blocks.windows(2) {
        let (prev, next) = (pair[0].env.number, pair[1].env.number);
        if prev.checked_add(1) != Some(next) {
            return Err(ProverError::InvalidInput(format!(
                "block {next} does not follow block {prev}"
            )));
        }
    }
    Ok(())
}

/// Builder for trace inputs
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    config: ProverConfig,
    input: TraceInput,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ProverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_state(mut self, state: InMemoryDB) -> Self {
        self.input.pre_state = state;
        self
    }

    pub fn with_start_gas_used(mut self, gas: U256) -> Self {
        self.input.start_gas_used = gas;
        self
    }

    pub fn with_block(mut self, block: BlockInput) -> Self {
        self.input.blocks.push(block);
        self
    }

    /// Single-transaction block appended to the range.
    pub fn with_tx(self, env: BlockEnv, tx: TxInput) -> Self {
        self.with_block(BlockInput::new(env).with_tx(tx))
    }

    pub fn build(self) -> TraceInput {
        self.input
    }

    pub fn trace(self) -> Result<RangeTrace> {
        TraceDriver::new(self.config).trace_range(&self.input, None)
    }

    pub fn state_hashes(self) -> Result<Vec<Hash>> {
        TraceDriver::new(self.config).generate_state_hashes(&self.input)
    }
}
