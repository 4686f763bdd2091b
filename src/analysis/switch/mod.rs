//! Switch-equivalence recognition.
//!
//! Finds chains of equality branches on a single register that are semantically a multi-way
//! branch. [`find_determining_reg`] picks the discriminant of a candidate root and
//! [`SwitchEquivFinder`] follows the chain from there. [`simplify_moves`] prepares a body so
//! that chains staging their constants through moves are recognized too.

mod determining;
mod editor;
mod finder;

pub use determining::find_determining_reg;
pub use editor::simplify_moves;
pub use finder::{FinderFailure, KeyKind, SwitchEquivFinder, SwitchKey};
