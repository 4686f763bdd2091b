//! Instruction model for the register-based bytecode.
//!
//! See [`instruction`] for the instruction set understood by the analyses and passes.

pub mod instruction;

pub use instruction::{Insn, Reg};
