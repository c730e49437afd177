//! Container format, linear memory, and interpreter loop for the Soil
//! virtual machine.
//!
//! This crate has no opinions about where byte-code comes from beyond
//! `binary::parse`, and no opinions about I/O beyond the syscall contract in
//! [`syscalls`] — the CLI entry point, GUI front-end, and real host syscall
//! implementations are all out of scope, left to whatever links against
//! this library.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backtrace;
pub mod binary;
pub mod config;
pub mod error;
mod interpreter;
mod registers;
pub mod state;
pub mod syscalls;

pub use binary::SoilBinary;
pub use config::VmConfig;
pub use error::{InterpreterError, RuntimeError};
pub use interpreter::Interpreter;
pub use state::VmStatus;
