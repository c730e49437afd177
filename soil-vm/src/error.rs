//! Runtime error types.
//!
//! Splits a "well-formed panic, recoverable via the try stack" error from
//! one that must halt the VM outright: see `RuntimeError::Recoverable`
//! below and spec §7's error taxonomy.

use soil_asm::PanicReason;

use crate::binary::ParseError;

/// An error produced while constructing or driving the interpreter that is
/// never funneled through [`crate::state::VmStatus`] — it happens before
/// or outside of instruction execution.
#[derive(Debug, derive_more::Display)]
pub enum InterpreterError {
    /// The container failed to parse; the VM was never constructed.
    #[display(fmt = "failed to parse Soil binary: {_0}")]
    Parse(ParseError),
}

impl std::error::Error for InterpreterError {}

impl From<ParseError> for InterpreterError {
    fn from(e: ParseError) -> Self {
        InterpreterError::Parse(e)
    }
}

/// Outcome of a single instruction's execution, before it has been folded
/// into [`crate::state::VmStatus`].
///
/// Spec §7: every non-panic, non-exit fault is either `Recoverable` (may
/// unwind into a try scope) or `Fatal` (always halts the VM, even inside a
/// try scope — syscall-to-an-unregistered-number is the one example).
#[derive(Debug, PartialEq, Eq)]
pub enum RuntimeError {
    /// May be caught by an enclosing `trystart`/`tryend` scope.
    Recoverable(PanicReason),
    /// Always halts the VM with `VmStatus::Error`.
    Fatal(String),
}

impl RuntimeError {
    /// Decode errors are recoverable (spec §7): an unknown opcode or bad
    /// register index unwinds into a try scope exactly like any other
    /// fault. The decoder's detailed message is for `tracing` at the call
    /// site, not the status, since `PanicReason` carries no string payload.
    pub(crate) fn decode(err: soil_asm::DecodeError) -> Self {
        tracing::trace!(%err, "instruction decode failed");
        RuntimeError::Recoverable(PanicReason::InvalidInstruction)
    }

    /// A syscall to an unregistered number is never recoverable (spec §7,
    /// the one exception to the "recoverable" rule among runtime faults).
    pub(crate) fn unregistered_syscall(number: u8) -> Self {
        RuntimeError::Fatal(format!("syscall {number} has no registered handler"))
    }
}

impl From<PanicReason> for RuntimeError {
    fn from(reason: PanicReason) -> Self {
        RuntimeError::Recoverable(reason)
    }
}
