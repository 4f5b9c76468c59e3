//! revm adapter
//!
//! [`TraceInspector`] translates revm's inspector hooks into
//! [`ExecutionTracer`] callbacks. revm reports every frame (the outermost one
//! included) through `call`/`create`, so the adapter counts frames itself to
//! tell a transaction's first frame from a nested one.

use crate::generator::ExecutionTracer;
use crate::hashing::keccak256;
use crate::snapshot::CapturedStep;
use crate::state::{InMemoryDB, JournalView};
use crate::types::{Address, Gas, U256};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use revm::interpreter::{
    opcode, CallInputs, CallOutcome, CallScheme, CreateInputs, CreateOutcome, InstructionResult,
    Interpreter,
};
use revm::primitives::CreateScheme;
use revm::{Database, EvmContext, Inspector};

extern crate alloc;

/// Opcode that opens a frame of the given call scheme.
pub fn call_scheme_opcode(scheme: CallScheme) -> u8 {
    match scheme {
        CallScheme::CallCode => opcode::CALLCODE,
        CallScheme::DelegateCall => opcode::DELEGATECALL,
        CallScheme::StaticCall => opcode::STATICCALL,
        _ => opcode::CALL,
    }
}

pub fn create_scheme_opcode(scheme: CreateScheme) -> u8 {
    match scheme {
        CreateScheme::Create2 { .. } => opcode::CREATE2,
        _ => opcode::CREATE,
    }
}

fn frame_error(result: InstructionResult) -> Option<String> {
    if result.is_ok() {
        None
    } else {
        Some(format!("{result:?}"))
    }
}

/// Drives an [`ExecutionTracer`] from a revm execution.
///
/// `committed` is the state the transaction started from; the live state
/// seen by each step is revm's journal laid over it.
pub struct TraceInspector<'a, T> {
    tracer: &'a mut T,
    committed: &'a InMemoryDB,
    /// Open frames
    depth: usize,
    /// Refund counter of each open frame, outermost first
    refunds: Vec<i64>,
    gas_before: Gas,
}

impl<'a, T: ExecutionTracer> TraceInspector<'a, T> {
    pub fn new(tracer: &'a mut T, committed: &'a InMemoryDB) -> Self {
        Self {
            tracer,
            committed,
            depth: 0,
            refunds: Vec::new(),
            gas_before: 0,
        }
    }

    fn refund(&self) -> u64 {
        self.refunds.iter().sum::<i64>().max(0) as u64
    }

    #[allow(clippy::too_many_arguments)]
    fn open_frame<DB: Database>(
        &mut self,
        context: &EvmContext<DB>,
        op: u8,
        from: Address,
        to: Address,
        input: &[u8],
        gas: Gas,
        value: U256,
    ) {
        if self.depth == 0 {
            let state = JournalView::new(self.committed, &context.journaled_state, 0);
            let create = matches!(op, opcode::CREATE | opcode::CREATE2);
            self.tracer
                .capture_start(&state, from, to, create, input, gas, value);
        } else {
            self.tracer.capture_enter(op, from, to, input, gas, value);
        }
        self.depth += 1;
        self.refunds.push(0);
    }

    fn close_frame(&mut self, output: &[u8], gas_used: Gas, result: InstructionResult) {
        let error = frame_error(result);
        self.depth = self.depth.saturating_sub(1);
        self.refunds.pop();
        if self.depth == 0 {
            self.tracer.capture_end(output, gas_used, error.as_deref());
        } else {
            self.tracer.capture_exit(output, gas_used, error.as_deref());
        }
    }
}

impl<DB: Database, T: ExecutionTracer> Inspector<DB> for TraceInspector<'_, T> {
    fn step(&mut self, interp: &mut Interpreter, context: &mut EvmContext<DB>) {
        if let Some(refund) = self.refunds.last_mut() {
            *refund = interp.gas.refunded();
        }
        self.gas_before = interp.gas.remaining();

        let contract = &interp.contract;
        let code_hash = contract
            .hash
            .unwrap_or_else(|| keccak256(&contract.bytecode.original_bytes()));
        let step = CapturedStep {
            pc: interp.program_counter() as u64,
            opcode: interp.current_opcode(),
            gas: self.gas_before,
            cost: 0,
            depth: u16::try_from(self.depth).unwrap_or(u16::MAX),
            contract: contract.target_address,
            caller: contract.caller,
            value: contract.call_value,
            code_hash,
            stack: interp.stack.data(),
            memory: interp.shared_memory.context_memory(),
            return_data: &interp.return_data_buffer,
        };
        let state = JournalView::new(self.committed, &context.journaled_state, self.refund());
        self.tracer.capture_state(&state, &step);
    }

    fn step_end(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        self.tracer
            .capture_cost(self.gas_before.saturating_sub(interp.gas.remaining()));
    }

    fn call(&mut self, context: &mut EvmContext<DB>, inputs: &mut CallInputs) -> Option<CallOutcome> {
        self.open_frame(
            context,
            call_scheme_opcode(inputs.scheme),
            inputs.caller,
            inputs.target_address,
            &inputs.input,
            inputs.gas_limit,
            inputs.value.get(),
        );
        None
    }

    fn call_end(
        &mut self,
        _context: &mut EvmContext<DB>,
        _inputs: &CallInputs,
        outcome: CallOutcome,
    ) -> CallOutcome {
        self.close_frame(
            &outcome.result.output,
            outcome.result.gas.spent(),
            outcome.result.result,
        );
        outcome
    }

    fn create(
        &mut self,
        context: &mut EvmContext<DB>,
        inputs: &mut CreateInputs,
    ) -> Option<CreateOutcome> {
        // The new address is only known once the frame exists.
        self.open_frame(
            context,
            create_scheme_opcode(inputs.scheme),
            inputs.caller,
            Address::ZERO,
            &inputs.init_code,
            inputs.gas_limit,
            inputs.value,
        );
        None
    }

    fn create_end(
        &mut self,
        _context: &mut EvmContext<DB>,
        _inputs: &CreateInputs,
        outcome: CreateOutcome,
    ) -> CreateOutcome {
        self.close_frame(
            &outcome.result.output,
            outcome.result.gas.spent(),
            outcome.result.result,
        );
        outcome
    }

    fn selfdestruct(&mut self, contract: Address, target: Address, value: U256) {
        self.tracer
            .capture_enter(opcode::SELFDESTRUCT, contract, target, &[], 0, value);
        self.tracer.capture_exit(&[], 0, None);
    }
}
