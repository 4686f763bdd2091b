//! Data flow analysis over control flow graphs.
//!
//! - [`MeetSemiLattice`]: how abstract states combine where control flow merges
//! - [`ConstantFixpoint`]: forward constant propagation yielding a [`ConstantEnvironment`]
//!   for any program point
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

mod constants;
mod lattice;

pub use constants::{ConstValue, ConstantEnvironment, ConstantFixpoint};
pub use lattice::MeetSemiLattice;
