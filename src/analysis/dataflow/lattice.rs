//! Lattice traits for data flow analysis.
//!
//! A lattice defines how abstract values combine at control flow join points. Forward
//! analyses meet the exit states of all predecessors to obtain a block's entry state.

use std::fmt::Debug;

/// A meet semi-lattice with a meet (greatest lower bound) operation.
///
/// The meet operation combines information from multiple control flow paths.
/// It must satisfy:
///
/// - **Idempotent**: `x.meet(x) = x`
/// - **Commutative**: `x.meet(y) = y.meet(x)`
/// - **Associative**: `x.meet(y.meet(z)) = (x.meet(y)).meet(z)`
///
/// # Examples
///
/// ```rust
/// use dexopt::analysis::dataflow::MeetSemiLattice;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Parity {
///     Top,
///     Even,
///     Odd,
///     Bottom,
/// }
///
/// impl MeetSemiLattice for Parity {
///     fn meet(&self, other: &Self) -> Self {
///         match (self, other) {
///             (Self::Top, x) | (x, Self::Top) => x.clone(),
///             (a, b) if a == b => a.clone(),
///             _ => Self::Bottom,
///         }
///     }
///
///     fn is_bottom(&self) -> bool {
///         matches!(self, Self::Bottom)
///     }
/// }
///
/// assert_eq!(Parity::Even.meet(&Parity::Top), Parity::Even);
/// assert!(Parity::Even.meet(&Parity::Odd).is_bottom());
/// ```
pub trait MeetSemiLattice: Clone + Debug + PartialEq {
    /// Computes the meet (greatest lower bound) of two lattice elements.
    ///
    /// The meet represents combining information from two paths that merge.
    #[must_use]
    fn meet(&self, other: &Self) -> Self;

    /// Returns `true` if this is the bottom element.
    ///
    /// Once bottom is reached, further meets cannot change the value.
    fn is_bottom(&self) -> bool;
}
