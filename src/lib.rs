// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # dexopt
//!
//! Whole-program optimization passes for register-based dex bytecode split across several
//! physically linked containers.
//!
//! The crate ships the infrastructure a pass needs (an instruction model, an object model for
//! classes, methods and containers, control flow graphs, constant propagation and switch
//! recognition) together with the const-class branch transformation, which turns long
//! `if (x == A.class) ... else if (x == B.class) ...` chains into a compact string-table
//! lookup followed by a single `switch`.
//!
//! ## Architecture
//!
//! - [`assembly`] - Instructions and registers
//! - [`metadata`] - Types, method references, classes, containers and reference reservations
//! - [`analysis`] - Control flow graphs, data flow and switch recognition
//! - [`compiler`] - Pass trait, pass manager, metrics and the passes
//! - [`utils`] - The string-table codec used by generated code
//!
//! ## Quick Start
//!
//! ```rust
//! use dexopt::prelude::*;
//!
//! let mut program = Program::new();
//! program.add_container(DexFile::new("classes.dex"));
//!
//! let config = ConstClassBranchesConfig::default().with_lookup_method(
//!     "Lcom/example/runtime/StringTreeSet;.lookup:(Ljava/lang/Object;Ljava/lang/String;I)I",
//! );
//! let ctx = PassContext::new();
//! let mut manager = PassManager::new().with_pass(Box::new(ConstClassBranchesPass::new(config)));
//! manager.run_passes(&mut program, &ctx)?;
//!
//! // The lookup routine does not resolve in this empty program, so nothing changed.
//! assert_eq!(ctx.metrics.get("TransformConstClassBranchesPass", "num_methods_transformed"), 0);
//! # Ok::<(), dexopt::Error>(())
//! ```
//!
//! ## Logging
//!
//! All diagnostics are emitted as [`tracing`](https://docs.rs/tracing) events. The library
//! never installs a subscriber; pass summaries are logged at `info`, per-candidate decisions
//! at `debug` and per-block details at `trace`.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use dexopt::prelude::*;
///
/// let method = MethodRef::parse("Lcom/example/Host;.pick:()I")?;
/// assert_eq!(&*method.name, "pick");
/// # Ok::<(), dexopt::Error>(())
/// ```
pub mod prelude;

/// Register-based instruction model.
///
/// # Key Types
///
/// - [`assembly::Insn`] - A single instruction, with classification helpers
/// - [`assembly::Reg`] - A method-local register number
pub mod assembly;

/// Object model of the program under optimization.
///
/// # Key Types
///
/// - [`metadata::TypeName`], [`metadata::MethodRef`], [`metadata::FieldRef`] - Symbolic
///   references with a total order
/// - [`metadata::DexMethod`], [`metadata::DexClass`], [`metadata::DexFile`],
///   [`metadata::Program`] - Definitions and their containers
/// - [`metadata::RefReservations`] - Per-run reference budget bookkeeping
pub mod metadata;

/// Program analyses over method bodies.
///
/// See [`analysis::ControlFlowGraph`], [`analysis::dataflow::ConstantFixpoint`] and
/// [`analysis::SwitchEquivFinder`].
pub mod analysis;

/// Pass infrastructure and optimization passes.
///
/// See [`compiler::PassManager`] and [`compiler::passes::constclass`].
pub mod compiler;

/// Codecs shared between the passes and the code they generate.
pub mod utils;

/// `dexopt` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `dexopt` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the categories.
pub use error::Error;
