//! Host-supplied VM configuration (spec §6 "Host configuration").

/// One word, the minimum memory a VM can be configured with — the initial
/// stack pointer has to be able to address something.
const MIN_MEMORY_SIZE: usize = 8;

/// Configuration a host supplies when constructing an [`crate::Interpreter`].
///
/// Built with `with_*` setters, following the host's usual convention for
/// knob-heavy configuration objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    memory_size: usize,
    trace_registers: bool,
    trace_calls: bool,
}

/// The requested memory size can't hold even the initial stack pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "memory size {_0} is smaller than the minimum of {MIN_MEMORY_SIZE} bytes")]
pub struct MemoryTooSmall(pub usize);

impl std::error::Error for MemoryTooSmall {}

impl VmConfig {
    /// Sets `memory_size`, in bytes. Rejects anything below one word.
    pub fn with_memory_size(mut self, memory_size: usize) -> Result<Self, MemoryTooSmall> {
        if memory_size < MIN_MEMORY_SIZE {
            return Err(MemoryTooSmall(memory_size));
        }
        self.memory_size = memory_size;
        Ok(self)
    }

    /// Enables or disables a `trace!` event per register write.
    pub const fn with_trace_registers(mut self, trace_registers: bool) -> Self {
        self.trace_registers = trace_registers;
        self
    }

    /// Enables or disables a `trace!` event per `call`/`ret`.
    pub const fn with_trace_calls(mut self, trace_calls: bool) -> Self {
        self.trace_calls = trace_calls;
        self
    }

    /// Configured memory size, in bytes.
    pub const fn memory_size(&self) -> usize {
        self.memory_size
    }

    /// Whether register writes should be traced.
    pub const fn trace_registers(&self) -> bool {
        self.trace_registers
    }

    /// Whether calls/returns should be traced.
    pub const fn trace_calls(&self) -> bool {
        self.trace_calls
    }
}

impl Default for VmConfig {
    /// One mebibyte of memory, no tracing — spec §6's "implementation-chosen
    /// value large enough for typical guests (e.g., 1 MiB)".
    fn default() -> Self {
        Self {
            memory_size: 1024 * 1024,
            trace_registers: false,
            trace_calls: false,
        }
    }
}
