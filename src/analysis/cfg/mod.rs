//! Control flow graphs over register-based bytecode.
//!
//! - [`BlockId`] / [`Block`] - Basic blocks and their identity
//! - [`Edge`] / [`EdgeKind`] - Typed successor edges (`Goto`, `Branch`, `Throw`)
//! - [`ControlFlowGraph`] - The method body, with the editing primitives passes build on

mod block;
mod edge;
mod graph;

pub use block::{Block, BlockId};
pub use edge::{Edge, EdgeKind};
pub use graph::ControlFlowGraph;
