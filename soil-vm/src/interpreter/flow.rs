//! Control flow, the try/catch scope stack, and syscall dispatch
//! (spec §4.2, §4.4, §4.5).

use soil_asm::{reg, Instruction, PanicReason, Word};

use crate::{error::RuntimeError, syscalls::SyscallOutput};

use super::{Interpreter, TryScope};

impl Interpreter {
    /// Executes one already-decoded instruction. `self.ip` has already been
    /// advanced past its operands (spec §4.2: "`ip` is post-incremented by
    /// the decoder... before the instruction executes").
    pub(super) fn execute(&mut self, instruction: Instruction) -> Result<(), RuntimeError> {
        match instruction {
            Instruction::Nop => {}

            Instruction::Panic => return Err(PanicReason::ExplicitPanic.into()),
            Instruction::TryStart(catch_offset) => {
                self.try_stack.push(TryScope {
                    call_stack_len: self.call_stack.len(),
                    sp: self.registers[reg::SP],
                    catch_offset: catch_offset as usize,
                });
            }
            Instruction::TryEnd => {
                self.try_stack.pop().ok_or(PanicReason::TryStackUnderflow)?;
            }

            Instruction::Move(a, b) => self.registers[a] = self.registers[b],
            Instruction::MoveImmediate(r, word) => self.registers[r] = word,
            Instruction::MoveImmediateByte(r, byte) => self.registers[r] = byte as Word,
            Instruction::Load(a, b) => self.registers[a] = self.mem_read_word(self.registers[b])?,
            Instruction::LoadByte(a, b) => {
                self.registers[a] = self.mem_read_byte(self.registers[b])? as Word
            }
            Instruction::Store(a, b) => self.mem_write_word(self.registers[a], self.registers[b])?,
            Instruction::StoreByte(a, b) => {
                self.mem_write_byte(self.registers[a], self.registers[b] as u8)?
            }
            Instruction::Push(r) => self.push_word(self.registers[r])?,
            Instruction::Pop(r) => self.registers[r] = self.pop_word()?,

            Instruction::Jump(target) => self.ip = target as usize,
            Instruction::CJump(target) => {
                if self.registers[reg::ST] != 0 {
                    self.ip = target as usize;
                }
            }
            Instruction::Call(target) => {
                self.call_stack.push(self.ip);
                if self.config.trace_calls() {
                    tracing::trace!(target, depth = self.call_stack.len(), "call");
                }
                self.ip = target as usize;
            }
            Instruction::Ret => {
                self.ip = self.call_stack.pop().ok_or(PanicReason::CallStackUnderflow)?;
            }
            Instruction::Syscall(number) => self.dispatch_syscall(number)?,

            Instruction::Cmp(a, b) => self.exec_cmp(a, b),
            Instruction::IsEqual => self.exec_is(|st| st == 0),
            Instruction::IsLess => self.exec_is(|st| st < 0),
            Instruction::IsGreater => self.exec_is(|st| st > 0),
            Instruction::IsLessEqual => self.exec_is(|st| st <= 0),
            Instruction::IsGreaterEqual => self.exec_is(|st| st >= 0),
            Instruction::IsNotEqual => self.exec_is(|st| st != 0),
            Instruction::FCmp(a, b) => self.exec_fcmp(a, b),
            Instruction::FIsEqual => self.exec_fis(|st| st == 0.0),
            Instruction::FIsLess => self.exec_fis(|st| st < 0.0),
            Instruction::FIsGreater => self.exec_fis(|st| st > 0.0),
            Instruction::FIsLessEqual => self.exec_fis(|st| st <= 0.0),
            Instruction::FIsGreaterEqual => self.exec_fis(|st| st >= 0.0),
            Instruction::FIsNotEqual => self.exec_fis(|st| st != 0.0),
            Instruction::IntToFloat(r) => self.exec_int_to_float(r),
            Instruction::FloatToInt(r) => self.exec_float_to_int(r),

            Instruction::Add(a, b) => self.exec_add(a, b),
            Instruction::Sub(a, b) => self.exec_sub(a, b),
            Instruction::Mul(a, b) => self.exec_mul(a, b),
            Instruction::Div(a, b) => self.exec_div(a, b)?,
            Instruction::Rem(a, b) => self.exec_rem(a, b)?,
            Instruction::FAdd(a, b) => self.exec_fadd(a, b),
            Instruction::FSub(a, b) => self.exec_fsub(a, b),
            Instruction::FMul(a, b) => self.exec_fmul(a, b),
            Instruction::FDiv(a, b) => self.exec_fdiv(a, b)?,

            Instruction::And(a, b) => self.exec_and(a, b),
            Instruction::Or(a, b) => self.exec_or(a, b),
            Instruction::Xor(a, b) => self.exec_xor(a, b),
            Instruction::Not(r) => self.exec_not(r),
        }

        Ok(())
    }

    fn dispatch_syscall(&mut self, number: u8) -> Result<(), RuntimeError> {
        let handler = self
            .syscalls
            .get(number)
            .ok_or_else(|| RuntimeError::unregistered_syscall(number))?;

        let a = self.registers[reg::A];
        let b = self.registers[reg::B];
        let c = self.registers[reg::C];

        match handler(self, a, b, c) {
            SyscallOutput::Void => {}
            SyscallOutput::One(value) => self.registers[reg::A] = value,
            SyscallOutput::Two(first, second) => {
                self.registers[reg::A] = first;
                self.registers[reg::B] = second;
            }
        }
        Ok(())
    }
}
