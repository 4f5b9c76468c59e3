//! Instruction-level state generation
//!
//! [`TraceGenerator`] observes an interpreter through [`ExecutionTracer`]
//! callbacks and commits one [`InstructionSnapshot`] per executed opcode. It
//! tracks the call-frame context the interpreter does not report on each step
//! (call flag, return buffer, call input, self-destruct and access-list
//! accumulators) and links every frame to the digest of the frame that
//! entered it.
//!
//! Lifecycle: `Idle -> Tracing -> Done`. Once done, every callback is a no-op.

use crate::accumulators::{AccessListTrie, BlockHashTree, Commitment, Memory, SelfDestructSet};
use crate::encoding::Encode;
use crate::errors::{ProverError, Result};
use crate::snapshot::{CallFlag, CapturedStep, FrameContext, InstructionSnapshot, TransactionSnapshot};
use crate::state::ProofState;
use crate::types::{word_to_address, Address, BlockNumber, Gas, Hash, U256};
use alloc::vec::Vec;
use log::{debug, trace, warn};
use revm::interpreter::opcode;
use serde::{Deserialize, Serialize};

extern crate alloc;

/// Digest of one instruction snapshot and the gas left before that opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStep {
    pub vm_hash: Hash,
    pub gas: Gas,
}

/// Lifecycle callbacks an interpreter emits while executing one transaction.
///
/// The order mirrors execution: `capture_tx_start`, `capture_start` for the
/// outermost frame, then `capture_state` before every opcode, with
/// `capture_enter`/`capture_exit` around nested frames, and finally
/// `capture_end` and `capture_tx_end`.
pub trait ExecutionTracer {
    fn capture_tx_start(&mut self, gas_limit: Gas);

    #[allow(clippy::too_many_arguments)]
    fn capture_start<S: ProofState + ?Sized>(
        &mut self,
        state: &S,
        from: Address,
        to: Address,
        create: bool,
        input: &[u8],
        gas: Gas,
        value: U256,
    );

    /// Called before the opcode in `step` executes.
    fn capture_state<S: ProofState + ?Sized>(&mut self, state: &S, step: &CapturedStep<'_>);

    /// Gas charged by the opcode last passed to `capture_state`, for
    /// interpreters that only know it after the opcode ran.
    fn capture_cost(&mut self, _cost: Gas) {}

    /// A frame-opening opcode (or SELFDESTRUCT) is about to run its callee.
    fn capture_enter(
        &mut self,
        op: u8,
        from: Address,
        to: Address,
        input: &[u8],
        gas: Gas,
        value: U256,
    );

    fn capture_exit(&mut self, output: &[u8], gas_used: Gas, error: Option<&str>);

    /// Stack and gas checks passed but the opcode itself failed.
    fn capture_fault(&mut self, _pc: u64, _op: u8, _gas: Gas, _cost: Gas, _depth: u16, _error: &str) {}

    /// The outermost frame returned.
    fn capture_end(&mut self, output: &[u8], gas_used: Gas, error: Option<&str>);

    fn capture_tx_end(&mut self, rest_gas: Gas);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceStatus {
    Idle,
    Tracing,
    Done,
}

/// Context of an enclosing frame, restored when its callee exits.
#[derive(Debug, Clone)]
struct CallFrame {
    /// The enclosing frame committed "as last depth"
    snapshot: InstructionSnapshot,
    hash: Hash,
    call_flag: CallFlag,
    out: u64,
    out_size: u64,
    input: Memory,
    self_destruct_set: SelfDestructSet,
    access_list: AccessListTrie,
}

pub struct TraceGenerator {
    // Context (read-only)
    block_number: BlockNumber,
    transaction_index: u64,
    committed_root: Hash,
    start_snapshot: TransactionSnapshot,
    block_hash_root: Hash,
    record_access_list: bool,
    target: Option<Hash>,

    // Global
    status: TraceStatus,
    gas_limit: Gas,
    counter: usize,
    steps: Vec<GeneratedStep>,
    error: Option<ProverError>,
    self_destruct_set: SelfDestructSet,
    access_list: AccessListTrie,
    captured: Option<InstructionSnapshot>,

    // Current call frame
    call_flag: CallFlag,
    last_snapshot: Option<InstructionSnapshot>,
    last_stack: Vec<U256>,
    last_cost: Gas,
    frames: Vec<CallFrame>,
    input: Memory,
    out: u64,
    out_size: u64,
    self_destructed: bool,
}

impl TraceGenerator {
    /// `committed` is the state before the transaction; `start_snapshot` the
    /// transaction-level snapshot the trace starts from.
    pub fn new<S: ProofState + ?Sized>(
        block_number: BlockNumber,
        transaction_index: u64,
        committed: &S,
        start_snapshot: TransactionSnapshot,
        block_hashes: &BlockHashTree,
    ) -> Self {
        Self {
            block_number,
            transaction_index,
            committed_root: committed.root_for_proof(),
            start_snapshot,
            block_hash_root: block_hashes.root(),
            record_access_list: true,
            target: None,
            status: TraceStatus::Idle,
            gas_limit: 0,
            counter: 0,
            steps: Vec::new(),
            error: None,
            self_destruct_set: SelfDestructSet::new(),
            access_list: AccessListTrie::new(),
            captured: None,
            call_flag: CallFlag::Call,
            last_snapshot: None,
            last_stack: Vec::new(),
            last_cost: 0,
            frames: Vec::new(),
            input: Memory::new(),
            out: 0,
            out_size: 0,
            self_destructed: false,
        }
    }

    /// Keep the full snapshot whose digest equals `target`.
    pub fn with_target(mut self, target: Hash) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_access_list(mut self, record: bool) -> Self {
        self.record_access_list = record;
        self
    }

    pub fn status(&self) -> TraceStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == TraceStatus::Done
    }

    /// Current call depth as seen by the generator (1 = outermost frame).
    pub fn depth(&self) -> usize {
        self.frames.len() + 1
    }

    pub fn gas_limit(&self) -> Gas {
        self.gas_limit
    }

    /// Transaction-level snapshot the trace starts from; its global state
    /// is the working copy taken when the outermost frame started.
    pub fn start_snapshot(&self) -> &TransactionSnapshot {
        &self.start_snapshot
    }

    pub fn self_destruct_set(&self) -> &SelfDestructSet {
        &self.self_destruct_set
    }

    pub fn access_list(&self) -> &AccessListTrie {
        &self.access_list
    }

    pub fn last_snapshot(&self) -> Option<&InstructionSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Steps generated so far, with the error slot. Fails until the trace is done.
    pub fn generated_steps(&self) -> Result<(&[GeneratedStep], Option<&ProverError>)> {
        if !self.is_done() {
            return Err(ProverError::IncompleteTrace);
        }
        Ok((&self.steps, self.error.as_ref()))
    }

    /// Consume the generator, returning the steps and the matched target snapshot.
    pub fn into_steps(self) -> Result<(Vec<GeneratedStep>, Option<InstructionSnapshot>)> {
        if !self.is_done() {
            return Err(ProverError::IncompleteTrace);
        }
        match self.error {
            Some(err) => Err(err),
            None => Ok((self.steps, self.captured)),
        }
    }

    fn frame_context(&self) -> FrameContext<'_> {
        FrameContext {
            committed_root: self.committed_root,
            last_depth_hash: self.frames.last().map(|f| f.hash).unwrap_or(Hash::ZERO),
            call_flag: self.call_flag,
            out: self.out,
            out_size: self.out_size,
            input: &self.input,
            self_destruct_set: &self.self_destruct_set,
            access_list: &self.access_list,
            block_hash_root: self.block_hash_root,
        }
    }

    /// Fold the accesses `op` is about to make into the access list.
    fn record_access(&mut self, op: u8, contract: Address, stack: &[U256]) {
        let nth_last = |n: usize| stack.len().checked_sub(n + 1).map(|i| stack[i]);
        match op {
            opcode::SLOAD | opcode::SSTORE => {
                if let Some(key) = nth_last(0) {
                    self.access_list.add_slot(contract, key);
                }
            }
            opcode::BALANCE
            | opcode::EXTCODESIZE
            | opcode::EXTCODECOPY
            | opcode::EXTCODEHASH
            | opcode::SELFDESTRUCT => {
                if let Some(word) = nth_last(0) {
                    self.access_list.add_address(word_to_address(word));
                }
            }
            opcode::CALL | opcode::CALLCODE | opcode::DELEGATECALL | opcode::STATICCALL => {
                if let Some(word) = nth_last(1) {
                    self.access_list.add_address(word_to_address(word));
                }
            }
            _ => {}
        }
    }

    /// Stack word `n` positions below the top of the last recorded step.
    fn last_stack_back(&self, n: usize) -> u64 {
        self.last_stack
            .len()
            .checked_sub(n + 1)
            .map(|i| self.last_stack[i].as_limbs()[0])
            .unwrap_or_default()
    }
}

impl ExecutionTracer for TraceGenerator {
    fn capture_tx_start(&mut self, gas_limit: Gas) {
        if self.status != TraceStatus::Idle {
            warn!("transaction start received while {:?}", self.status);
            return;
        }
        self.gas_limit = gas_limit;
        self.status = TraceStatus::Tracing;
    }

    fn capture_start<S: ProofState + ?Sized>(
        &mut self,
        state: &S,
        from: Address,
        to: Address,
        create: bool,
        input: &[u8],
        gas: Gas,
        _value: U256,
    ) {
        match self.status {
            TraceStatus::Done => return,
            TraceStatus::Idle => self.status = TraceStatus::Tracing,
            TraceStatus::Tracing => {}
        }
        // Kept in step with the interpreter's step index.
        self.counter = 1;
        self.call_flag = if create {
            CallFlag::Create
        } else {
            CallFlag::Call
        };
        self.input = Memory::from_bytes(input);
        self.self_destruct_set = SelfDestructSet::new();
        self.access_list = AccessListTrie::new();
        self.frames.clear();
        // Includes gas purchase and nonce increment.
        self.start_snapshot.global_state_root = state.copy().root_for_proof();
        debug!(
            "trace start: block {} tx {} from {from} to {to} gas {gas}",
            self.block_number, self.transaction_index
        );
    }

    fn capture_state<S: ProofState + ?Sized>(&mut self, state: &S, step: &CapturedStep<'_>) {
        if self.status != TraceStatus::Tracing {
            return;
        }
        debug_assert_eq!(
            usize::from(step.depth),
            self.depth(),
            "interpreter depth diverged from tracked frames"
        );

        let snapshot = InstructionSnapshot::from_captured(&self.frame_context(), step, state);
        let vm_hash = snapshot.hash();
        trace!(
            "step {} depth {} pc {} op {:#04x} gas {} hash {vm_hash}",
            self.counter,
            step.depth,
            step.pc,
            step.opcode,
            step.gas
        );
        self.steps.push(GeneratedStep {
            vm_hash,
            gas: step.gas,
        });
        if self.target == Some(vm_hash) {
            self.captured = Some(snapshot.clone());
        }
        if self.record_access_list {
            self.record_access(step.opcode, step.contract, step.stack);
        }

        self.last_snapshot = Some(snapshot);
        self.last_stack.clear();
        self.last_stack.extend_from_slice(step.stack);
        self.last_cost = step.cost;
        self.counter += 1;
    }

    fn capture_cost(&mut self, cost: Gas) {
        if self.status == TraceStatus::Tracing {
            self.last_cost = cost;
        }
    }

    fn capture_enter(
        &mut self,
        op: u8,
        from: Address,
        to: Address,
        input: &[u8],
        gas: Gas,
        _value: U256,
    ) {
        if self.status != TraceStatus::Tracing {
            return;
        }
        if op == opcode::SELFDESTRUCT {
            // Not a frame: record the destroyed contract and wait for the paired exit.
            self.self_destructed = true;
            self.self_destruct_set = self.self_destruct_set.add(from);
            debug!("selfdestruct {from} -> {to}");
            return;
        }
        let Some(call_flag) = CallFlag::from_opcode(op) else {
            warn!("ignoring enter for non-call opcode {op:#04x}");
            return;
        };
        let Some(last) = self.last_snapshot.as_ref() else {
            warn!("enter before any step was captured");
            return;
        };

        // The pre-call step is read rather than the live stack: the call may
        // fail before the new frame exists.
        let (out, out_size) = match call_flag {
            CallFlag::Call | CallFlag::CallCode => (self.last_stack_back(5), self.last_stack_back(6)),
            CallFlag::DelegateCall | CallFlag::StaticCall => {
                (self.last_stack_back(4), self.last_stack_back(5))
            }
            CallFlag::Create | CallFlag::Create2 => (self.out, self.out_size),
        };

        let parent = last.as_last_depth(&self.last_stack, call_flag, self.last_cost);
        let hash = parent.hash();
        self.frames.push(CallFrame {
            snapshot: parent,
            hash,
            call_flag: self.call_flag,
            out: self.out,
            out_size: self.out_size,
            input: core::mem::replace(&mut self.input, Memory::from_bytes(input)),
            self_destruct_set: self.self_destruct_set.clone(),
            access_list: self.access_list.clone(),
        });
        self.call_flag = call_flag;
        self.out = out;
        self.out_size = out_size;
        debug!(
            "enter {call_flag:?} {from} -> {to} depth {} gas {gas} parent {hash}",
            self.depth()
        );
    }

    fn capture_exit(&mut self, _output: &[u8], gas_used: Gas, error: Option<&str>) {
        if self.status != TraceStatus::Tracing {
            return;
        }
        if self.self_destructed {
            self.self_destructed = false;
            return;
        }
        // The outermost frame is closed by `capture_end`.
        let Some(frame) = self.frames.pop() else {
            return;
        };
        self.call_flag = frame.call_flag;
        self.out = frame.out;
        self.out_size = frame.out_size;
        self.input = frame.input;
        if let Some(error) = error {
            // Reverted: discard self-destructs and accesses made inside the callee.
            self.self_destruct_set = frame.self_destruct_set;
            self.access_list = frame.access_list;
            debug!(
                "exit depth {} reverted ({error}), accumulators restored to frame entry",
                self.depth() + 1
            );
        } else {
            debug!("exit depth {} gas used {gas_used}", self.depth() + 1);
        }
        debug_assert_eq!(frame.snapshot.depth as usize, self.depth());
    }

    fn capture_end(&mut self, _output: &[u8], gas_used: Gas, error: Option<&str>) {
        if self.status == TraceStatus::Done {
            return;
        }
        self.status = TraceStatus::Done;
        debug!(
            "trace done: {} steps, gas used {gas_used}, error {:?}",
            self.steps.len(),
            error
        );
    }

    fn capture_tx_end(&mut self, _rest_gas: Gas) {
        self.status = TraceStatus::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulators::OrderedTrie;
    use crate::state::{AccountState, InMemoryDB};

    const CALLER: Address = Address::repeat_byte(0x01);
    const CONTRACT: Address = Address::repeat_byte(0x02);
    const CALLEE: Address = Address::repeat_byte(0x03);

    /// Minimal stand-in for an interpreter: emits callbacks with hand-built steps.
    struct MockVm {
        db: InMemoryDB,
        generator: TraceGenerator,
    }

    impl MockVm {
        fn new() -> Self {
            let mut db = InMemoryDB::new();
            db.insert_account(CALLER, AccountState::new_with_balance(U256::from(10u64.pow(18))));
            db.insert_account(CONTRACT, AccountState::new_contract(vec![0x00], U256::ZERO));
            let start = TransactionSnapshot::from_state(
                &db,
                U256::ZERO,
                &OrderedTrie::new(),
                &OrderedTrie::new(),
                &BlockHashTree::new(),
            );
            let generator = TraceGenerator::new(1, 0, &db, start, &BlockHashTree::new());
            Self { db, generator }
        }

        fn start(&mut self, input: &[u8]) {
            self.generator.capture_tx_start(100_000);
            self.generator
                .capture_start(&self.db, CALLER, CONTRACT, false, input, 100_000, U256::ZERO);
        }

        fn step(&mut self, depth: u16, pc: u64, op: u8, gas: Gas, stack: &[U256]) {
            let (contract, caller) = if depth == 1 {
                (CONTRACT, CALLER)
            } else {
                (CALLEE, CONTRACT)
            };
            let step = CapturedStep {
                pc,
                opcode: op,
                gas,
                cost: 3,
                depth,
                contract,
                caller,
                value: U256::ZERO,
                code_hash: Hash::repeat_byte(depth as u8),
                stack,
                memory: &[],
                return_data: &[],
            };
            self.generator.capture_state(&self.db, &step);
        }

        fn finish(&mut self) {
            self.generator.capture_end(&[], 21_000, None);
            self.generator.capture_tx_end(0);
        }
    }

    fn words(values: &[u64]) -> Vec<U256> {
        values.iter().copied().map(U256::from).collect()
    }

    /// Stack for CALL, bottom first: ret size, ret offset, args size, args
    /// offset, value, address, gas.
    fn call_stack() -> Vec<U256> {
        let mut stack = words(&[0x20, 0x40, 0x04, 0x00, 0x00]);
        stack.push(U256::from_be_slice(CALLEE.as_slice()));
        stack.push(U256::from(50_000u64));
        stack
    }

    #[test]
    fn test_simple_add_program() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 0, opcode::PUSH1, 100_000, &[]);
        vm.step(1, 2, opcode::PUSH1, 99_997, &words(&[1]));
        vm.step(1, 4, opcode::ADD, 99_994, &words(&[1, 2]));
        let add = vm.generator.last_snapshot().cloned().unwrap();
        vm.step(1, 5, opcode::STOP, 99_991, &words(&[3]));
        vm.finish();

        let (steps, error) = vm.generator.generated_steps().unwrap();
        assert!(error.is_none());
        assert_eq!(steps.len(), 4);
        assert_eq!(
            steps.iter().map(|s| s.gas).collect::<Vec<_>>(),
            vec![100_000, 99_997, 99_994, 99_991]
        );

        assert_eq!(steps[2].vm_hash, add.hash());
        assert_eq!(add.opcode, opcode::ADD);
        assert_eq!(add.stack_size, 2);
        assert_eq!(add.stack_hash, crate::accumulators::stack_hash(&words(&[1, 2])));
        assert_eq!(add.memory_size, 0);
        assert_eq!(add.depth, 1);
        // No caller block, memory root or return-data root.
        assert_eq!(add.encode().len(), 307);
    }

    #[test]
    fn test_steps_unavailable_until_done() {
        let mut vm = MockVm::new();
        assert!(matches!(
            vm.generator.generated_steps(),
            Err(ProverError::IncompleteTrace)
        ));

        vm.start(&[]);
        vm.step(1, 0, opcode::STOP, 100_000, &[]);
        assert_eq!(vm.generator.status(), TraceStatus::Tracing);
        assert!(matches!(
            vm.generator.generated_steps(),
            Err(ProverError::IncompleteTrace)
        ));

        vm.finish();
        assert_eq!(vm.generator.generated_steps().unwrap().0.len(), 1);
    }

    #[test]
    fn test_no_steps_after_done() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 0, opcode::STOP, 100_000, &[]);
        vm.finish();
        vm.step(1, 1, opcode::STOP, 99_000, &[]);
        vm.generator.capture_enter(opcode::CALL, CONTRACT, CALLEE, &[], 0, U256::ZERO);

        assert_eq!(vm.generator.depth(), 1);
        let (steps, _) = vm.generator.into_steps().unwrap();
        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_call_links_parent_frame() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        let stack = call_stack();
        vm.step(1, 10, opcode::CALL, 90_000, &stack);
        vm.generator.capture_cost(52_600);
        let call_step = vm.generator.last_snapshot().cloned().unwrap();

        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[0xaa; 4], 50_000, U256::ZERO);
        assert_eq!(vm.generator.depth(), 2);

        vm.step(2, 0, opcode::STOP, 50_000, &[]);
        let inner = vm.generator.last_snapshot().cloned().unwrap();

        let parent = call_step.as_last_depth(&stack, CallFlag::Call, 52_600);
        assert_eq!(inner.last_depth_hash, parent.hash());
        assert_eq!(parent.gas, 90_000 - 52_600);
        assert_eq!(parent.stack_size, 0);
        assert_eq!(inner.out, 0x40);
        assert_eq!(inner.out_size, 0x20);
        assert_eq!(inner.call_flag, CallFlag::Call);
        assert_eq!(inner.input_data_size, 4);
        assert_eq!(inner.caller, CONTRACT);

        vm.generator.capture_exit(&[], 0, None);
        assert_eq!(vm.generator.depth(), 1);
        vm.step(1, 11, opcode::STOP, 80_000, &words(&[1]));
        let after = vm.generator.last_snapshot().cloned().unwrap();
        assert_eq!(after.call_flag, CallFlag::Call);
        assert_eq!(after.out, 0);
        assert_eq!(after.input_data_size, 0);
        assert_eq!(after.last_depth_hash, Hash::ZERO);
    }

    #[test]
    fn test_delegatecall_reads_shifted_slots() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        // ret size, ret offset, args size, args offset, address, gas
        let mut stack = words(&[0x08, 0x80, 0x00, 0x00]);
        stack.push(U256::from_be_slice(CALLEE.as_slice()));
        stack.push(U256::from(1_000u64));
        vm.step(1, 0, opcode::DELEGATECALL, 90_000, &stack);
        vm.generator
            .capture_enter(opcode::DELEGATECALL, CONTRACT, CALLEE, &[], 1_000, U256::ZERO);
        vm.step(2, 0, opcode::STOP, 1_000, &[]);

        let inner = vm.generator.last_snapshot().unwrap();
        assert_eq!(inner.call_flag, CallFlag::DelegateCall);
        assert_eq!(inner.out, 0x80);
        assert_eq!(inner.out_size, 0x08);
    }

    #[test]
    fn test_return_offset_keeps_low_word() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        // A zero-sized return buffer never expands memory, so any offset enters.
        let offset = U256::from(1u128 << 64) + U256::from(5u64);
        let mut stack = vec![U256::ZERO, offset];
        stack.extend(words(&[0x00, 0x00, 0x00]));
        stack.push(U256::from_be_slice(CALLEE.as_slice()));
        stack.push(U256::from(50_000u64));
        vm.step(1, 0, opcode::CALL, 90_000, &stack);
        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[], 50_000, U256::ZERO);
        vm.step(2, 0, opcode::STOP, 50_000, &[]);

        let inner = vm.generator.last_snapshot().unwrap();
        assert_eq!(inner.out, 5);
        assert_eq!(inner.out_size, 0);
    }

    #[test]
    fn test_nested_frames_restore_parent_link() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 10, opcode::CALL, 90_000, &call_stack());
        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[0xaa; 4], 50_000, U256::ZERO);
        vm.step(2, 0, opcode::PUSH1, 50_000, &[]);
        let before = vm.generator.last_snapshot().cloned().unwrap();

        // ret size, ret offset, args size, args offset, address, gas
        let mut stack = words(&[0x10, 0x60, 0x00, 0x00]);
        stack.push(U256::from_be_slice(CALLER.as_slice()));
        stack.push(U256::from(10_000u64));
        vm.step(2, 2, opcode::STATICCALL, 49_000, &stack);
        vm.generator.capture_cost(12_600);
        let static_step = vm.generator.last_snapshot().cloned().unwrap();
        vm.generator
            .capture_enter(opcode::STATICCALL, CALLEE, CALLER, &[], 10_000, U256::ZERO);
        assert_eq!(vm.generator.depth(), 3);

        vm.step(3, 0, opcode::STOP, 10_000, &[]);
        let innermost = vm.generator.last_snapshot().cloned().unwrap();
        let parent = static_step.as_last_depth(&stack, CallFlag::StaticCall, 12_600);
        assert_eq!(innermost.last_depth_hash, parent.hash());
        assert_ne!(innermost.last_depth_hash, before.last_depth_hash);
        assert_eq!(innermost.call_flag, CallFlag::StaticCall);
        assert_eq!(innermost.out, 0x60);
        assert_eq!(innermost.out_size, 0x10);
        assert_eq!(innermost.input_data_size, 0);

        vm.generator.capture_exit(&[], 0, None);
        assert_eq!(vm.generator.depth(), 2);
        vm.step(2, 3, opcode::STOP, 36_000, &words(&[1]));
        let after = vm.generator.last_snapshot().cloned().unwrap();
        assert_eq!(after.last_depth_hash, before.last_depth_hash);
        assert_eq!(after.call_flag, CallFlag::Call);
        assert_eq!(after.out, 0x40);
        assert_eq!(after.out_size, 0x20);
        assert_eq!(after.input_data_size, 4);
        assert_eq!(after.input_data_root, before.input_data_root);
    }

    #[test]
    fn test_create_keeps_return_buffer() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 10, opcode::CALL, 90_000, &call_stack());
        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[], 50_000, U256::ZERO);

        // One unrelated word, then salt, size, offset, value.
        let stack = words(&[0x99, 0x01, 0x00, 0x00, 0x00]);
        vm.step(2, 0, opcode::CREATE2, 50_000, &stack);
        vm.generator.capture_cost(32_000);
        let create_step = vm.generator.last_snapshot().cloned().unwrap();
        vm.generator
            .capture_enter(opcode::CREATE2, CALLEE, CALLER, &[0x00], 18_000, U256::ZERO);

        vm.step(3, 0, opcode::STOP, 18_000, &[]);
        let inner = vm.generator.last_snapshot().cloned().unwrap();
        let parent = create_step.as_last_depth(&stack, CallFlag::Create2, 32_000);
        assert_eq!(parent.stack_size, 1);
        assert_eq!(parent.stack_hash, crate::accumulators::stack_hash(&words(&[0x99])));
        assert_eq!(parent.gas, 18_000);
        assert_eq!(inner.last_depth_hash, parent.hash());
        assert_eq!(inner.call_flag, CallFlag::Create2);
        assert_eq!(inner.out, 0x40);
        assert_eq!(inner.out_size, 0x20);
        assert_eq!(inner.input_data_size, 1);

        vm.generator.capture_exit(&[], 0, None);
        vm.step(2, 1, opcode::STOP, 17_000, &words(&[1]));
        assert_eq!(vm.generator.last_snapshot().unwrap().call_flag, CallFlag::Call);
    }

    #[test]
    fn test_reverted_call_restores_accumulators() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 0, opcode::SLOAD, 95_000, &words(&[7]));
        vm.step(1, 1, opcode::CALL, 90_000, &call_stack());
        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[], 50_000, U256::ZERO);
        let access_at_entry = vm.generator.access_list().clone();
        let destructs_at_entry = vm.generator.self_destruct_set().clone();
        assert!(access_at_entry.contains_slot(&CONTRACT, &U256::from(7u64)));
        assert!(access_at_entry.contains_address(&CALLEE));

        vm.step(2, 0, opcode::SSTORE, 50_000, &words(&[1, 9]));
        let beneficiary = Address::repeat_byte(0x09);
        vm.step(2, 1, opcode::SELFDESTRUCT, 45_000, &[U256::from_be_slice(beneficiary.as_slice())]);
        vm.generator
            .capture_enter(opcode::SELFDESTRUCT, CALLEE, beneficiary, &[], 0, U256::ZERO);
        vm.generator.capture_exit(&[], 0, None);
        assert_ne!(vm.generator.access_list(), &access_at_entry);
        assert_eq!(vm.generator.self_destruct_set().contents, vec![CALLEE]);

        vm.generator.capture_exit(&[], 50_000, Some("Revert"));

        assert_eq!(vm.generator.depth(), 1);
        assert_eq!(vm.generator.access_list(), &access_at_entry);
        assert_eq!(vm.generator.self_destruct_set(), &destructs_at_entry);
    }

    #[test]
    fn test_successful_call_keeps_accumulators() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 0, opcode::CALL, 90_000, &call_stack());
        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[], 50_000, U256::ZERO);
        vm.step(2, 0, opcode::SLOAD, 50_000, &words(&[3]));
        vm.generator.capture_exit(&[], 2_100, None);

        assert!(vm.generator.access_list().contains_slot(&CALLEE, &U256::from(3u64)));
    }

    #[test]
    fn test_selfdestruct_is_not_a_frame() {
        let mut vm = MockVm::new();
        vm.start(&[]);
        vm.step(1, 0, opcode::CALL, 90_000, &call_stack());
        vm.generator
            .capture_enter(opcode::CALL, CONTRACT, CALLEE, &[], 50_000, U256::ZERO);
        vm.step(2, 0, opcode::SELFDESTRUCT, 50_000, &[U256::from(9u64)]);

        vm.generator
            .capture_enter(opcode::SELFDESTRUCT, CALLEE, CALLER, &[], 0, U256::ZERO);
        assert_eq!(vm.generator.depth(), 2);
        assert_eq!(vm.generator.self_destruct_set().contents, vec![CALLEE]);

        // Paired exit only clears the pending self-destruct.
        vm.generator.capture_exit(&[], 0, None);
        assert_eq!(vm.generator.depth(), 2);
        assert_eq!(vm.generator.self_destruct_set().contents, vec![CALLEE]);

        // The frame's own exit unwinds; a successful exit keeps the record.
        vm.generator.capture_exit(&[], 5_000, None);
        assert_eq!(vm.generator.depth(), 1);
        assert_eq!(vm.generator.self_destruct_set().contents, vec![CALLEE]);
    }

    #[test]
    fn test_exit_of_outermost_frame_is_ignored() {
        let mut vm = MockVm::new();
        vm.start(&[0x01]);
        vm.step(1, 0, opcode::STOP, 100_000, &[]);
        vm.generator.capture_exit(&[], 0, Some("Revert"));

        assert_eq!(vm.generator.depth(), 1);
        assert_eq!(vm.generator.status(), TraceStatus::Tracing);
    }

    #[test]
    fn test_target_snapshot_is_captured() {
        let mut probe = MockVm::new();
        probe.start(&[]);
        probe.step(1, 0, opcode::PUSH1, 100_000, &[]);
        probe.step(1, 2, opcode::POP, 99_997, &words(&[5]));
        probe.finish();
        let target = probe.generator.generated_steps().unwrap().0[1].vm_hash;

        let mut vm = MockVm::new();
        vm.generator = vm.generator.with_target(target);
        vm.start(&[]);
        vm.step(1, 0, opcode::PUSH1, 100_000, &[]);
        vm.step(1, 2, opcode::POP, 99_997, &words(&[5]));
        vm.finish();

        let (_, captured) = vm.generator.into_steps().unwrap();
        let captured = captured.unwrap();
        assert_eq!(captured.hash(), target);
        assert_eq!(captured.opcode, opcode::POP);
    }

    #[test]
    fn test_access_list_recording_can_be_disabled() {
        let mut vm = MockVm::new();
        vm.generator = vm.generator.with_access_list(false);
        vm.start(&[]);
        vm.step(1, 0, opcode::SLOAD, 100_000, &words(&[1]));

        assert_eq!(vm.generator.access_list().root(), Hash::ZERO);
    }

    #[test]
    fn test_start_snapshot_tracks_working_state() {
        let mut vm = MockVm::new();
        let before = vm.generator.start_snapshot().clone();
        vm.db
            .insert_account(Address::repeat_byte(0x0f), AccountState::new_with_balance(U256::from(1u64)));
        vm.start(&[]);

        assert_eq!(vm.generator.gas_limit(), 100_000);
        assert_ne!(vm.generator.start_snapshot().global_state_root, before.global_state_root);
        assert_eq!(vm.generator.start_snapshot().global_state_root, vm.db.root_for_proof());
    }
}
