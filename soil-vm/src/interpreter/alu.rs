//! Arithmetic, bitwise, and comparison opcodes (spec §4.2).
//!
//! Two-register arithmetic/bitwise ops are not given an explicit formula in
//! the opcode table the way `cmp` is (`st ← a − b`); this implementation
//! takes them as in-place on the first register, `a ← a op b`, the natural
//! reading of "regs a,b" for an accumulator-style two-operand encoding
//! (recorded in the design ledger as an open-question resolution).

use soil_asm::{word_to_float, float_to_word, PanicReason, Reg};

use crate::error::RuntimeError;

use super::Interpreter;

impl Interpreter {
    pub(super) fn exec_cmp(&mut self, a: Reg, b: Reg) {
        self.registers[soil_asm::reg::ST] =
            self.registers[a].wrapping_sub(self.registers[b]);
    }

    pub(super) fn exec_is(&mut self, cond: fn(i64) -> bool) {
        let st = self.registers[soil_asm::reg::ST];
        self.registers[soil_asm::reg::ST] = cond(st) as i64;
    }

    pub(super) fn exec_fcmp(&mut self, a: Reg, b: Reg) {
        let diff = word_to_float(self.registers[a]) - word_to_float(self.registers[b]);
        self.registers[soil_asm::reg::ST] = float_to_word(diff);
    }

    pub(super) fn exec_fis(&mut self, cond: fn(f64) -> bool) {
        let st = word_to_float(self.registers[soil_asm::reg::ST]);
        self.registers[soil_asm::reg::ST] = cond(st) as i64;
    }

    pub(super) fn exec_int_to_float(&mut self, r: Reg) {
        self.registers[r] = float_to_word(self.registers[r] as f64);
    }

    pub(super) fn exec_float_to_int(&mut self, r: Reg) {
        self.registers[r] = word_to_float(self.registers[r]) as i64;
    }

    pub(super) fn exec_add(&mut self, a: Reg, b: Reg) {
        self.registers[a] = self.registers[a].wrapping_add(self.registers[b]);
    }

    pub(super) fn exec_sub(&mut self, a: Reg, b: Reg) {
        self.registers[a] = self.registers[a].wrapping_sub(self.registers[b]);
    }

    pub(super) fn exec_mul(&mut self, a: Reg, b: Reg) {
        self.registers[a] = self.registers[a].wrapping_mul(self.registers[b]);
    }

    pub(super) fn exec_div(&mut self, a: Reg, b: Reg) -> Result<(), RuntimeError> {
        if self.registers[b] == 0 {
            return Err(PanicReason::DivisionByZero.into());
        }
        self.registers[a] = self.registers[a].wrapping_div(self.registers[b]);
        Ok(())
    }

    pub(super) fn exec_rem(&mut self, a: Reg, b: Reg) -> Result<(), RuntimeError> {
        if self.registers[b] == 0 {
            return Err(PanicReason::DivisionByZero.into());
        }
        self.registers[a] = self.registers[a].wrapping_rem(self.registers[b]);
        Ok(())
    }

    pub(super) fn exec_fadd(&mut self, a: Reg, b: Reg) {
        let result = word_to_float(self.registers[a]) + word_to_float(self.registers[b]);
        self.registers[a] = float_to_word(result);
    }

    pub(super) fn exec_fsub(&mut self, a: Reg, b: Reg) {
        let result = word_to_float(self.registers[a]) - word_to_float(self.registers[b]);
        self.registers[a] = float_to_word(result);
    }

    pub(super) fn exec_fmul(&mut self, a: Reg, b: Reg) {
        let result = word_to_float(self.registers[a]) * word_to_float(self.registers[b]);
        self.registers[a] = float_to_word(result);
    }

    pub(super) fn exec_fdiv(&mut self, a: Reg, b: Reg) -> Result<(), RuntimeError> {
        let divisor = word_to_float(self.registers[b]);
        if divisor == 0.0 {
            return Err(PanicReason::FloatDivisionByZero.into());
        }
        let result = word_to_float(self.registers[a]) / divisor;
        self.registers[a] = float_to_word(result);
        Ok(())
    }

    pub(super) fn exec_and(&mut self, a: Reg, b: Reg) {
        self.registers[a] &= self.registers[b];
    }

    pub(super) fn exec_or(&mut self, a: Reg, b: Reg) {
        self.registers[a] |= self.registers[b];
    }

    pub(super) fn exec_xor(&mut self, a: Reg, b: Reg) {
        self.registers[a] ^= self.registers[b];
    }

    pub(super) fn exec_not(&mut self, r: Reg) {
        self.registers[r] = !self.registers[r];
    }
}
