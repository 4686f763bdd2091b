//! Control Flow Graph implementation.
//!
//! The graph owns its blocks; edges are stored on the source block. Predecessors are derived
//! on demand, which keeps edits (retargeting, pruning) trivially consistent.
//!
//! Block iteration is always in ascending [`BlockId`] order so every analysis built on top of
//! the graph is deterministic.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::{
    analysis::cfg::{Block, BlockId, Edge, EdgeKind},
    assembly::{Insn, Reg},
    Result,
};

/// A method body as a graph of basic blocks.
///
/// Parameters occupy the lowest registers; [`ControlFlowGraph::allocate_temp`] hands out fresh
/// registers above everything in use.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    blocks: BTreeMap<BlockId, Block>,
    entry: BlockId,
    next_block: usize,
    registers: u32,
}

impl ControlFlowGraph {
    /// Creates a graph with an empty entry block and `registers` registers in use.
    #[must_use]
    pub fn new(registers: u32) -> Self {
        let entry = BlockId(0);
        let mut blocks = BTreeMap::new();
        blocks.insert(entry, Block::new(entry, false));
        ControlFlowGraph {
            blocks,
            entry,
            next_block: 1,
            registers,
        }
    }

    /// Returns the entry block.
    #[must_use]
    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    /// Returns the number of registers in use.
    #[must_use]
    pub fn registers_size(&self) -> u32 {
        self.registers
    }

    /// Allocates a fresh register.
    pub fn allocate_temp(&mut self) -> Reg {
        let reg = self.registers;
        self.registers += 1;
        reg
    }

    /// Creates a new, empty, normal block.
    pub fn create_block(&mut self) -> BlockId {
        self.insert_block(false)
    }

    /// Creates a new, empty exception handler block.
    pub fn create_catch_block(&mut self) -> BlockId {
        self.insert_block(true)
    }

    fn insert_block(&mut self, is_catch: bool) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, Block::new(id, is_catch));
        id
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns a block.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Returns a block for modification.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    /// Iterates over all blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> + '_ {
        self.blocks.values()
    }

    pub(crate) fn blocks_mut(&mut self) -> impl Iterator<Item = &mut Block> + '_ {
        self.blocks.values_mut()
    }

    /// Returns `true` if the graph contains `id`.
    #[must_use]
    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    fn existing_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        self.blocks
            .get_mut(&id)
            .ok_or_else(|| invariant_error!("block {} does not exist", id))
    }

    fn check_target(&self, target: BlockId) -> Result<()> {
        if self.blocks.contains_key(&target) {
            Ok(())
        } else {
            Err(invariant_error!("edge target {} does not exist", target))
        }
    }

    /// Appends an instruction to a block.
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist.
    pub fn push(&mut self, block: BlockId, insn: Insn) -> Result<()> {
        self.existing_mut(block)?.push(insn);
        Ok(())
    }

    /// Adds an edge.
    ///
    /// # Errors
    ///
    /// Returns an error if either block does not exist.
    pub fn add_edge(&mut self, src: BlockId, target: BlockId, kind: EdgeKind) -> Result<()> {
        self.check_target(target)?;
        self.existing_mut(src)?
            .succs_mut()
            .push(Edge::new(target, kind));
        Ok(())
    }

    /// Points the `Goto` edge of `src` at `target`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if either block does not exist.
    pub fn set_goto(&mut self, src: BlockId, target: BlockId) -> Result<()> {
        self.check_target(target)?;
        let succs = self.existing_mut(src)?.succs_mut();
        match succs.iter_mut().find(|e| e.kind == EdgeKind::Goto) {
            Some(edge) => edge.target = target,
            None => succs.push(Edge::new(target, EdgeKind::Goto)),
        }
        Ok(())
    }

    /// Retargets every `Goto` edge of `src` to `target` and returns how many were changed.
    ///
    /// # Errors
    ///
    /// Returns an error if either block does not exist.
    pub fn redirect_gotos(&mut self, src: BlockId, target: BlockId) -> Result<usize> {
        self.check_target(target)?;
        let mut count = 0;
        for edge in self.existing_mut(src)?.succs_mut() {
            if edge.kind == EdgeKind::Goto {
                edge.target = target;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Terminates `block` with a conditional branch.
    ///
    /// The branch is taken to `taken`; otherwise control falls through to `fallthrough`.
    ///
    /// # Errors
    ///
    /// Returns an error if `insn` is not a conditional branch, the block already ends in a
    /// terminator, or a block does not exist.
    pub fn create_conditional(
        &mut self,
        block: BlockId,
        insn: Insn,
        fallthrough: BlockId,
        taken: BlockId,
    ) -> Result<()> {
        if !insn.is_conditional_branch() {
            return Err(invariant_error!("{} is not a conditional branch", insn));
        }
        self.check_target(taken)?;
        self.check_target(fallthrough)?;
        self.append_terminator(block, insn)?;
        self.set_goto(block, fallthrough)?;
        self.add_edge(block, taken, EdgeKind::Branch { case: None })
    }

    /// Terminates `block` with a multi-way branch.
    ///
    /// One `Branch` edge is added per `(key, target)` case. With `default` set the `Goto` edge
    /// is pointed at it; with `None` any existing `Goto` edge is kept as it is.
    ///
    /// # Errors
    ///
    /// Returns an error if `insn` is not a switch, a case key repeats, the block already ends
    /// in a terminator, or a block does not exist.
    pub fn create_branch(
        &mut self,
        block: BlockId,
        insn: Insn,
        default: Option<BlockId>,
        cases: &[(i32, BlockId)],
    ) -> Result<()> {
        if !matches!(insn, Insn::Switch { .. }) {
            return Err(invariant_error!("{} is not a switch", insn));
        }
        let mut keys = BTreeSet::new();
        for (key, target) in cases {
            if !keys.insert(*key) {
                return Err(invariant_error!("duplicate switch case {}", key));
            }
            self.check_target(*target)?;
        }

        self.append_terminator(block, insn)?;
        for (key, target) in cases {
            self.add_edge(block, *target, EdgeKind::Branch { case: Some(*key) })?;
        }
        if let Some(default) = default {
            self.set_goto(block, default)?;
        }
        Ok(())
    }

    fn append_terminator(&mut self, block: BlockId, insn: Insn) -> Result<()> {
        let target = self.existing_mut(block)?;
        if target.last_insn().is_some_and(Insn::is_terminator) {
            return Err(invariant_error!("{} already ends in a terminator", block));
        }
        target.push(insn);
        Ok(())
    }

    /// Removes the branch instruction ending `block`, drops its `Branch` edges and appends
    /// `replacements`. The `Goto` edge is kept.
    ///
    /// Returns the removed instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist or does not end in a branch.
    pub fn replace_terminator(&mut self, block: BlockId, replacements: Vec<Insn>) -> Result<Insn> {
        let target = self.existing_mut(block)?;
        if !target.last_insn().is_some_and(Insn::is_branch) {
            return Err(invariant_error!("{} does not end in a branch", block));
        }
        let removed = target
            .insns_mut()
            .pop()
            .ok_or_else(|| invariant_error!("{} is empty", block))?;
        target.succs_mut().retain(|edge| !edge.kind.is_branch());
        target.extend(replacements);
        Ok(removed)
    }

    /// Returns the successor blocks of `id`, in edge order, without duplicates.
    #[must_use]
    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        let mut out: Vec<BlockId> = Vec::new();
        if let Some(block) = self.blocks.get(&id) {
            for edge in block.succs() {
                if !out.contains(&edge.target) {
                    out.push(edge.target);
                }
            }
        }
        out
    }

    /// Returns the predecessor blocks of `id` in id order.
    #[must_use]
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .values()
            .filter(|block| block.succs().iter().any(|e| e.target == id))
            .map(Block::id)
            .collect()
    }

    /// Returns the set of blocks reachable from the entry.
    #[must_use]
    pub fn reachable(&self) -> BTreeSet<BlockId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.entry];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            stack.extend(self.successors(id));
        }
        seen
    }

    /// Returns `true` if `id` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, id: BlockId) -> bool {
        self.reachable().contains(&id)
    }

    /// Deletes every block not reachable from the entry and returns how many were removed.
    pub fn remove_unreachable_blocks(&mut self) -> usize {
        let reachable = self.reachable();
        let before = self.blocks.len();
        self.blocks.retain(|id, _| reachable.contains(id));
        before - self.blocks.len()
    }

    /// Iterates over all instructions of all blocks in block order.
    pub fn instructions(&self) -> impl Iterator<Item = (BlockId, &Insn)> + '_ {
        self.blocks
            .values()
            .flat_map(|block| block.insns().iter().map(move |insn| (block.id(), insn)))
    }

    /// Counts `const-class` instructions.
    #[must_use]
    pub fn count_const_class(&self) -> usize {
        self.instructions()
            .filter(|(_, insn)| insn.is_const_class())
            .count()
    }
}

impl fmt::Display for ControlFlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CFG (entry {}, {} registers)", self.entry, self.registers)?;
        for block in self.blocks.values() {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}
