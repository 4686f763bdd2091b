//! Control flow edge types for the CFG.

use std::fmt;

use crate::analysis::cfg::BlockId;

/// The kind of control flow represented by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Unconditional control flow: fall-through, jump, or the default of a switch.
    ///
    /// A block has at most one `Goto` edge.
    Goto,

    /// A branch target.
    ///
    /// For conditional branches this is the taken edge and `case` is `None`. For switches
    /// `case` holds the case key that selects the edge.
    Branch {
        /// The case key for switch edges, `None` for conditional branches.
        case: Option<i32>,
    },

    /// Edge to an exception handler.
    Throw,
}

impl EdgeKind {
    /// Returns `true` for branch-target edges.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(self, Self::Branch { .. })
    }
}

/// A control flow edge from the owning block to `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Destination block.
    pub target: BlockId,
    /// Kind of transfer.
    pub kind: EdgeKind,
}

impl Edge {
    /// Creates a new edge.
    #[must_use]
    pub const fn new(target: BlockId, kind: EdgeKind) -> Self {
        Edge { target, kind }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EdgeKind::Goto => write!(f, "goto {}", self.target),
            EdgeKind::Branch { case: None } => write!(f, "branch {}", self.target),
            EdgeKind::Branch { case: Some(key) } => write!(f, "case {key} -> {}", self.target),
            EdgeKind::Throw => write!(f, "throw {}", self.target),
        }
    }
}
