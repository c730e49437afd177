//! Reasons the interpreter may fault, recoverably or not.
//!
//! The `panic` opcode itself carries no payload — the byte-code can't name
//! a reason directly — but the interpreter needs one internally to report
//! diagnostics and to decide, per spec §7, whether a fault is the kind that
//! unwinds to a try scope. [`PanicReason`] is that internal vocabulary.

use core::fmt;

/// Cause of a VM fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[non_exhaustive]
pub enum PanicReason {
    /// The `panic` instruction was executed.
    ExplicitPanic,
    /// The decoder hit an unknown opcode or an out-of-range register index.
    InvalidInstruction,
    /// A `load`/`loadb`/`store`/`storeb` address fell outside `[0, memory_size)`.
    MemoryOutOfBounds,
    /// `div`/`rem` with a zero divisor.
    DivisionByZero,
    /// `fdiv` with a divisor of exactly `0.0`.
    FloatDivisionByZero,
    /// `ret` executed with an empty call stack.
    CallStackUnderflow,
    /// `tryend` executed with an empty try stack.
    TryStackUnderflow,
}

impl fmt::Display for PanicReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PanicReason::ExplicitPanic => "explicit panic",
            PanicReason::InvalidInstruction => "invalid instruction",
            PanicReason::MemoryOutOfBounds => "memory access out of bounds",
            PanicReason::DivisionByZero => "integer division by zero",
            PanicReason::FloatDivisionByZero => "floating-point division by zero",
            PanicReason::CallStackUnderflow => "return with an empty call stack",
            PanicReason::TryStackUnderflow => "tryend with an empty try stack",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for PanicReason {}

impl PanicReason {
    /// `true` for the `panic` opcode itself; `false` for the "recoverable
    /// runtime error" family (spec §7), which the caller always treats the
    /// same way but which is worth distinguishing in logs.
    pub const fn is_explicit(&self) -> bool {
        matches!(self, PanicReason::ExplicitPanic)
    }
}
