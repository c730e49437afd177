//! [`Interpreter`] implementation: the decode/execute loop over a
//! [`SoilBinary`] (spec §4.3).

use soil_asm::{Instruction, PanicReason, Reg, Word};

use crate::{
    backtrace::Backtrace,
    binary::{Labels, SoilBinary},
    config::VmConfig,
    error::RuntimeError,
    registers::Registers,
    state::VmStatus,
    syscalls::{SyscallAccess, SyscallTable},
};

mod alu;
mod constructors;
mod flow;
mod memory;

/// A try/catch scope pushed by `trystart`, popped by `tryend` or by an
/// unwind (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TryScope {
    pub(crate) call_stack_len: usize,
    pub(crate) sp: Word,
    pub(crate) catch_offset: usize,
}

/// The Soil virtual machine: byte-code, registers, linear memory, the call
/// and try stacks, and a syscall table, all owned together (spec §3's
/// ownership rule: "the VM exclusively owns its memory, stacks, and
/// registers").
pub struct Interpreter {
    byte_code: Vec<u8>,
    memory: Vec<u8>,
    registers: Registers,
    ip: usize,
    call_stack: Vec<usize>,
    try_stack: Vec<TryScope>,
    status: VmStatus,
    labels: Labels,
    syscalls: SyscallTable,
    config: VmConfig,
    last_backtrace: Option<Backtrace>,
    /// Byte-code offset of the instruction currently being decoded/executed
    /// — the fault site a panic's backtrace blames, distinct from `ip`
    /// (which has already moved past it by the time a fault is handled).
    last_instruction_ip: usize,
}

impl Interpreter {
    /// Current status: `Running` while stepping, a terminal variant once
    /// the VM has exited, panicked, or faulted (spec §4.3 `status`).
    pub fn status(&self) -> &VmStatus {
        &self.status
    }

    /// The label-resolved backtrace captured at the moment the VM last
    /// transitioned to `Panicked`, if it ever did (spec §4.4, §8 scenario 6).
    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.last_backtrace.as_ref()
    }

    /// The configured linear memory, read-only.
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// One register's current value.
    pub fn register(&self, reg: Reg) -> Word {
        self.registers[reg]
    }

    /// The current call stack, outermost frame first — return addresses
    /// only, distinct from any guest data stack living in linear memory.
    pub fn call_stack(&self) -> &[usize] {
        &self.call_stack
    }

    /// Peeks the next instruction without executing it or advancing `ip`
    /// (spec §4.3 `decodeNextInstruction`; used by debuggers/UI).
    pub fn decode_next_instruction(&self) -> Result<Instruction, soil_asm::DecodeError> {
        Instruction::decode(&self.byte_code, self.ip).map(|(instruction, _)| instruction)
    }

    /// Decodes up to `count` instructions starting at `ip`, without
    /// executing any of them. A host debugger can use this to render a
    /// few instructions ahead of the current position.
    pub fn disassemble_from(&self, count: usize) -> Vec<Instruction> {
        let mut instructions = Vec::with_capacity(count);
        let mut ip = self.ip;
        for _ in 0..count {
            match Instruction::decode(&self.byte_code, ip) {
                Ok((instruction, next_ip)) => {
                    instructions.push(instruction);
                    ip = next_ip;
                }
                Err(_) => break,
            }
        }
        instructions
    }

    /// Decodes and executes exactly one instruction, if the VM is still
    /// running (spec §4.3 `runInstruction`).
    pub fn run_instruction(&mut self) {
        if !self.status.is_running() {
            return;
        }
        match self.step() {
            Ok(()) => {}
            Err(RuntimeError::Recoverable(reason)) => self.handle_fault(reason),
            Err(RuntimeError::Fatal(message)) => self.status = VmStatus::Error(message),
        }
    }

    /// Runs at most `n` instructions, stopping early if the VM leaves
    /// `Running` (spec §4.3 `runInstructions`; lets a host yield between
    /// batches).
    pub fn run_instructions(&mut self, n: usize) {
        let span = tracing::trace_span!("run_instructions", requested = n);
        let _guard = span.enter();
        for _ in 0..n {
            if !self.status.is_running() {
                break;
            }
            self.run_instruction();
        }
    }

    /// Runs until the VM leaves `Running` (spec §4.3 `runForever`).
    pub fn run_forever(&mut self) {
        while self.status.is_running() {
            self.run_instruction();
        }
    }

    fn step(&mut self) -> Result<(), RuntimeError> {
        self.last_instruction_ip = self.ip;
        let (instruction, next_ip) =
            Instruction::decode(&self.byte_code, self.ip).map_err(RuntimeError::decode)?;
        self.ip = next_ip;

        if self.config.trace_calls() {
            tracing::trace!(ip = self.ip, %instruction, "decoded instruction");
        }

        self.execute(instruction)
    }

    /// Unwinds into the innermost try scope if one exists; otherwise
    /// transitions to a terminal status (spec §4.4, §7).
    fn handle_fault(&mut self, reason: PanicReason) {
        if let Some(scope) = self.try_stack.pop() {
            self.call_stack.truncate(scope.call_stack_len);
            self.registers[soil_asm::reg::SP] = scope.sp;
            self.ip = scope.catch_offset;
            tracing::warn!(%reason, catch_offset = scope.catch_offset, "recovered via try scope");
        } else if reason.is_explicit() {
            self.last_backtrace = Some(Backtrace::capture(
                self.last_instruction_ip,
                &self.call_stack,
                &self.registers,
                &self.labels,
            ));
            self.status = VmStatus::Panicked;
        } else {
            self.status = VmStatus::Error(reason.to_string());
        }
    }
}

impl SyscallAccess for Interpreter {
    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn register(&self, reg: Reg) -> Word {
        self.registers[reg]
    }

    fn set_register(&mut self, reg: Reg, value: Word) {
        self.registers[reg] = value;
    }

    fn exit(&mut self, code: Word) {
        self.status = VmStatus::Exited(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soil_asm::reg::{A, B};

    fn interpreter(byte_code: Vec<u8>) -> Interpreter {
        let binary = SoilBinary {
            name: None,
            description: None,
            initial_memory: None,
            labels: Labels::new(),
            byte_code,
        };
        Interpreter::new(binary, crate::syscalls::reference::table(), VmConfig::default())
    }

    fn encode(instructions: &[Instruction]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for instruction in instructions {
            instruction.encode(&mut bytes);
        }
        bytes
    }

    #[test]
    fn scenario_one_minimal_exit() {
        let mut vm = interpreter(encode(&[
            Instruction::MoveImmediate(A, 42),
            Instruction::MoveImmediate(B, 0),
            Instruction::Syscall(0),
        ]));
        vm.run_forever();
        assert_eq!(*vm.status(), VmStatus::Exited(42));
    }

    #[test]
    fn scenario_two_panic_without_catch() {
        let mut vm = interpreter(encode(&[Instruction::Panic]));
        vm.run_forever();
        assert_eq!(*vm.status(), VmStatus::Panicked);
        assert!(vm.call_stack().is_empty());
    }

    #[test]
    fn scenario_three_panic_with_catch() {
        // trystart catch; panic; (skipped) movei a 7; syscall 0 (exit)
        const TRYSTART_LEN: usize = 9; // opcode + one word operand, always
        let catch_body = encode(&[Instruction::MoveImmediate(A, 7), Instruction::Syscall(0)]);
        let panic_body = encode(&[Instruction::Panic]);
        let catch_offset = (TRYSTART_LEN + panic_body.len()) as Word;

        let mut bytes = Vec::new();
        Instruction::TryStart(catch_offset).encode(&mut bytes);
        assert_eq!(bytes.len(), TRYSTART_LEN);
        bytes.extend_from_slice(&panic_body);
        bytes.extend_from_slice(&catch_body);

        let mut vm = interpreter(bytes);
        vm.run_forever();
        assert_eq!(*vm.status(), VmStatus::Exited(7));
    }

    #[test]
    fn scenario_four_arithmetic_wraps() {
        let mut vm = interpreter(encode(&[
            Instruction::MoveImmediate(A, i64::MAX),
            Instruction::MoveImmediate(B, 1),
            Instruction::Add(A, B),
            Instruction::Syscall(0),
        ]));
        vm.run_forever();
        assert_eq!(*vm.status(), VmStatus::Exited(i64::MIN));
    }

    #[test]
    fn scenario_five_memory_round_trip() {
        use soil_asm::reg::C;
        let mut vm = interpreter(encode(&[
            Instruction::MoveImmediate(A, 100),
            Instruction::MoveImmediate(B, 0xdeadbeefu32 as i64),
            Instruction::Store(A, B),
            Instruction::Load(C, A),
            Instruction::Move(A, C),
            Instruction::Syscall(0),
        ]));
        vm.run_forever();
        assert_eq!(*vm.status(), VmStatus::Exited(0xdeadbeefu32 as i64));
    }

    #[test]
    fn division_by_zero_is_recoverable_and_fatal_without_a_catch() {
        let mut vm = interpreter(encode(&[
            Instruction::MoveImmediate(A, 1),
            Instruction::MoveImmediate(B, 0),
            Instruction::Div(A, B),
        ]));
        vm.run_forever();
        assert!(matches!(vm.status(), VmStatus::Error(_)));
    }

    #[test]
    fn ret_with_empty_call_stack_is_an_error() {
        let mut vm = interpreter(encode(&[Instruction::Ret]));
        vm.run_forever();
        assert!(matches!(vm.status(), VmStatus::Error(_)));
    }

    #[test]
    fn call_then_ret_returns_to_the_instruction_after_call() {
        let call_target = 100usize;
        let mut bytes = encode(&[Instruction::Call(call_target as Word)]);
        let after_call = bytes.len();
        bytes.extend_from_slice(&encode(&[Instruction::MoveImmediate(A, 1), Instruction::Syscall(0)]));
        bytes.resize(call_target, 0x00); // nop padding up to the callee
        bytes.extend_from_slice(&encode(&[Instruction::Ret]));

        let mut vm = interpreter(bytes);
        vm.run_instruction(); // call
        assert_eq!(vm.call_stack(), &[after_call]);
        vm.run_instruction(); // ret
        assert_eq!(*vm.status(), VmStatus::Running);
    }

    #[quickcheck_macros::quickcheck]
    fn call_then_ret_balances_for_any_target(raw_target: u16) -> bool {
        // `call` is always 9 bytes (opcode + word), so the callee has to
        // start at or after `after_call` for the nop padding below to land.
        let call_target = 9usize + (raw_target as usize % 4000);
        let mut bytes = encode(&[Instruction::Call(call_target as Word)]);
        let after_call = bytes.len();
        bytes.resize(call_target, 0x00); // nop padding up to the callee
        bytes.extend_from_slice(&encode(&[Instruction::Ret]));
        let call_stack_depth_before = 0;

        let mut vm = interpreter(bytes);
        vm.run_instruction(); // call
        let balanced_after_call =
            vm.call_stack() == [after_call] && vm.ip == call_target;
        vm.run_instruction(); // ret
        balanced_after_call
            && vm.ip == after_call
            && vm.call_stack().len() == call_stack_depth_before
            && *vm.status() == VmStatus::Running
    }

    #[test]
    fn decode_error_without_a_catch_becomes_an_error_status() {
        let mut vm = interpreter(vec![0xff]);
        vm.run_forever();
        assert!(matches!(vm.status(), VmStatus::Error(_)));
    }

    #[test]
    fn disassemble_from_does_not_move_ip() {
        let vm = interpreter(encode(&[Instruction::Nop, Instruction::Nop, Instruction::Ret]));
        let instructions = vm.disassemble_from(3);
        assert_eq!(instructions, vec![Instruction::Nop, Instruction::Nop, Instruction::Ret]);
    }
}
