//! Bounds-checked linear memory access (spec §3, §4.2 `load`/`loadb`/`store`/`storeb`).

use soil_asm::{PanicReason, Word};

use super::Interpreter;

fn address(raw: Word) -> Result<usize, PanicReason> {
    usize::try_from(raw).map_err(|_| PanicReason::MemoryOutOfBounds)
}

impl Interpreter {
    pub(super) fn mem_read_word(&self, addr: Word) -> Result<Word, PanicReason> {
        let addr = address(addr)?;
        let bytes = self
            .memory
            .get(addr..addr + 8)
            .ok_or(PanicReason::MemoryOutOfBounds)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(Word::from_le_bytes(buf))
    }

    pub(super) fn mem_write_word(&mut self, addr: Word, value: Word) -> Result<(), PanicReason> {
        let addr = address(addr)?;
        let slot = self
            .memory
            .get_mut(addr..addr + 8)
            .ok_or(PanicReason::MemoryOutOfBounds)?;
        slot.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub(super) fn mem_read_byte(&self, addr: Word) -> Result<u8, PanicReason> {
        let addr = address(addr)?;
        self.memory.get(addr).copied().ok_or(PanicReason::MemoryOutOfBounds)
    }

    pub(super) fn mem_write_byte(&mut self, addr: Word, value: u8) -> Result<(), PanicReason> {
        let addr = address(addr)?;
        let slot = self.memory.get_mut(addr).ok_or(PanicReason::MemoryOutOfBounds)?;
        *slot = value;
        Ok(())
    }

    /// `push r`: `sp ← sp − 8; mem64[sp] ← r`.
    pub(super) fn push_word(&mut self, value: Word) -> Result<(), PanicReason> {
        let new_sp = self.registers[soil_asm::reg::SP]
            .checked_sub(8)
            .ok_or(PanicReason::MemoryOutOfBounds)?;
        self.mem_write_word(new_sp, value)?;
        self.registers[soil_asm::reg::SP] = new_sp;
        Ok(())
    }

    /// `pop r`: `r ← mem64[sp]; sp ← sp + 8`.
    pub(super) fn pop_word(&mut self) -> Result<Word, PanicReason> {
        let sp = self.registers[soil_asm::reg::SP];
        let value = self.mem_read_word(sp)?;
        self.registers[soil_asm::reg::SP] = sp.checked_add(8).ok_or(PanicReason::MemoryOutOfBounds)?;
        Ok(value)
    }
}
