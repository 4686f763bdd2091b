//! Program analysis infrastructure for method bodies.
//!
//! # Architecture
//!
//! - [`cfg`] - Control flow graph with typed edges and editing primitives
//! - [`dataflow`] - Lattice framework and forward constant propagation
//! - [`switch`] - Recognition of equality-branch chains that act as a switch
//!
//! # Usage
//!
//! ```rust
//! use dexopt::analysis::{
//!     dataflow::{ConstantEnvironment, ConstantFixpoint},
//!     find_determining_reg, ControlFlowGraph, SwitchEquivFinder,
//! };
//!
//! # fn analyze(cfg: &ControlFlowGraph) {
//! let fixpoint = ConstantFixpoint::run(cfg, ConstantEnvironment::new());
//! let root = cfg.entry_block();
//! if let Some(reg) = find_determining_reg(&fixpoint, cfg, root) {
//!     let finder = SwitchEquivFinder::find(cfg, root, reg, &fixpoint);
//!     println!("{} cases", finder.key_to_case().len());
//! }
//! # }
//! ```

pub mod cfg;
pub mod dataflow;
pub mod switch;

pub use cfg::{Block, BlockId, ControlFlowGraph, Edge, EdgeKind};
pub use switch::{
    find_determining_reg, simplify_moves, FinderFailure, KeyKind, SwitchEquivFinder, SwitchKey,
};
