//! VM construction (spec §4.3 `init`).

use soil_asm::Word;

use crate::{
    binary::{self, SoilBinary},
    config::VmConfig,
    error::InterpreterError,
    registers::Registers,
    state::VmStatus,
    syscalls::SyscallTable,
};

use super::Interpreter;

impl Interpreter {
    /// Builds a VM from an already-parsed container: allocates memory of
    /// the configured size, copies `binary.initial_memory` into the low
    /// addresses (zeroing the rest), sets `sp` to `memory_size`, and
    /// leaves every other register, the call stack, and the try stack
    /// empty.
    pub fn new(binary: SoilBinary, syscalls: SyscallTable, config: VmConfig) -> Self {
        let memory_size = config.memory_size();
        let mut memory = vec![0u8; memory_size];
        if let Some(image) = &binary.initial_memory {
            let copy_len = image.len().min(memory.len());
            memory[..copy_len].copy_from_slice(&image[..copy_len]);
        }

        Self {
            registers: Registers::with_stack_pointer(memory_size as Word),
            memory,
            byte_code: binary.byte_code,
            labels: binary.labels,
            ip: 0,
            call_stack: Vec::new(),
            try_stack: Vec::new(),
            status: VmStatus::Running,
            syscalls,
            config,
            last_backtrace: None,
            last_instruction_ip: 0,
        }
    }

    /// Parses a `.soil` container and builds a VM from it in one step.
    pub fn from_bytes(
        bytes: &[u8],
        syscalls: SyscallTable,
        config: VmConfig,
    ) -> Result<Self, InterpreterError> {
        let parsed = binary::parse(bytes)?;
        Ok(Self::new(parsed, syscalls, config))
    }
}
