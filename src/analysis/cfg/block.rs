//! Basic blocks.

use std::fmt;

use crate::{
    analysis::cfg::{Edge, EdgeKind},
    assembly::Insn,
};

/// Identifier of a block within one [`ControlFlowGraph`](super::ControlFlowGraph).
///
/// Identifiers are never reused after a block is removed, so a `BlockId` held across
/// modifications either names the same block or no block at all.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Creates a block identifier from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A straight-line sequence of instructions with typed outgoing edges.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    insns: Vec<Insn>,
    succs: Vec<Edge>,
    is_catch: bool,
}

impl Block {
    pub(crate) fn new(id: BlockId, is_catch: bool) -> Self {
        Block {
            id,
            insns: Vec::new(),
            succs: Vec::new(),
            is_catch,
        }
    }

    /// Returns this block's identifier.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns `true` if this block is the entry of an exception handler.
    #[must_use]
    pub fn is_catch(&self) -> bool {
        self.is_catch
    }

    /// Returns the instructions in execution order.
    #[must_use]
    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    /// Returns the last instruction, if any.
    #[must_use]
    pub fn last_insn(&self) -> Option<&Insn> {
        self.insns.last()
    }

    /// Returns `true` if the block ends in `if-eq` or `if-ne`.
    #[must_use]
    pub fn ends_in_equality_branch(&self) -> bool {
        self.last_insn().is_some_and(Insn::is_equality_branch)
    }

    /// Returns the outgoing edges.
    #[must_use]
    pub fn succs(&self) -> &[Edge] {
        &self.succs
    }

    /// Returns the target of the `Goto` edge.
    #[must_use]
    pub fn goto_target(&self) -> Option<BlockId> {
        self.succs
            .iter()
            .find(|e| e.kind == EdgeKind::Goto)
            .map(|e| e.target)
    }

    /// Returns the target of the conditional `Branch` edge (the taken side of an `if-*`).
    #[must_use]
    pub fn branch_target(&self) -> Option<BlockId> {
        self.succs
            .iter()
            .find(|e| e.kind == EdgeKind::Branch { case: None })
            .map(|e| e.target)
    }

    /// Appends an instruction.
    pub fn push(&mut self, insn: Insn) {
        self.insns.push(insn);
    }

    /// Appends several instructions.
    pub fn extend(&mut self, insns: impl IntoIterator<Item = Insn>) {
        self.insns.extend(insns);
    }

    pub(crate) fn insns_mut(&mut self) -> &mut Vec<Insn> {
        &mut self.insns
    }

    pub(crate) fn succs_mut(&mut self) -> &mut Vec<Edge> {
        &mut self.succs
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_catch {
            writeln!(f, "{} (catch):", self.id)?;
        } else {
            writeln!(f, "{}:", self.id)?;
        }
        for insn in &self.insns {
            writeln!(f, "    {insn}")?;
        }
        for edge in &self.succs {
            writeln!(f, "    -> {edge}")?;
        }
        Ok(())
    }
}
