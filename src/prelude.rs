//! # dexopt Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the crate. Import it to get quick access to the object model, the analyses and the
//! pass infrastructure.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dexopt operations
pub use crate::Error;

/// The result type used throughout dexopt
pub use crate::Result;

// ================================================================================================
// Object Model
// ================================================================================================

/// Symbolic references
pub use crate::metadata::{FieldRef, MethodRef, Proto, TypeName};

/// Definitions and containers
pub use crate::metadata::{AccessFlags, DexClass, DexFile, DexMethod, Program};

/// Reference budget bookkeeping
pub use crate::metadata::{RefReservations, ReservationGuard, ReserveRefsInfo, ReservedRefsHandle};

// ================================================================================================
// Instructions and Analysis
// ================================================================================================

/// Instructions
pub use crate::assembly::{Insn, Reg};

/// Control flow graphs
pub use crate::analysis::{Block, BlockId, ControlFlowGraph, Edge, EdgeKind};

/// Data flow
pub use crate::analysis::dataflow::{
    ConstValue, ConstantEnvironment, ConstantFixpoint, MeetSemiLattice,
};

/// Switch recognition
pub use crate::analysis::{
    find_determining_reg, simplify_moves, KeyKind, SwitchEquivFinder, SwitchKey,
};

// ================================================================================================
// Passes
// ================================================================================================

/// Pass infrastructure
pub use crate::compiler::{Metrics, PassContext, PassManager, ProgramPass};

/// Const-class branch transformation
pub use crate::compiler::passes::constclass::{
    ConstClassBranchesConfig, ConstClassBranchesPass, DecisionTree, TransformPlan,
};

/// String table codec
pub use crate::utils::stringtree;
