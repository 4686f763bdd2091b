//! Recognition of equality-branch chains that behave like a switch.
//!
//! A chain starts at a root block ending in `if-eq`/`if-ne` that compares a discriminant
//! register against a constant. Following the "not equal" successor, each further block joins
//! the chain while it
//!
//! - is a normal (non-handler) block whose predecessors all belong to the chain,
//! - contains nothing but constant loads that leave the discriminant untouched, and
//! - ends in another equality comparison of the discriminant against a known constant.
//!
//! The first successor that does not continue the chain is the default case; the "equal"
//! successors are the case leaves.
//!
//! ```text
//!   root: if v0 == A.class -> LA
//!     |
//!   b1:   if v0 == B.class -> LB
//!     |
//!   b2:   if v0 == C.class -> LC
//!     |
//!   default
//! ```

use std::collections::{BTreeMap, BTreeSet};

use strum::Display;

use crate::{
    analysis::{
        dataflow::{ConstValue, ConstantFixpoint},
        switch::determining::equality_operands,
        BlockId, ControlFlowGraph,
    },
    assembly::{Insn, Reg},
    metadata::TypeName,
};

/// A case key of a recognized chain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SwitchKey {
    /// Class literal.
    Class(TypeName),
    /// Integer literal.
    Int(i64),
}

impl SwitchKey {
    /// Returns the kind of this key.
    #[must_use]
    pub fn kind(&self) -> KeyKind {
        match self {
            SwitchKey::Class(_) => KeyKind::Class,
            SwitchKey::Int(_) => KeyKind::Int,
        }
    }

    /// Returns the class of a class key.
    #[must_use]
    pub fn as_class(&self) -> Option<&TypeName> {
        match self {
            SwitchKey::Class(ty) => Some(ty),
            SwitchKey::Int(_) => None,
        }
    }
}

/// The kind of a [`SwitchKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Class literals.
    Class,
    /// Integer literals.
    Int,
}

/// Reason a chain could not be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum FinderFailure {
    /// The root does not end in an equality comparison of the discriminant.
    NotEqualityBranch,
    /// A branch lacks its taken or fall-through edge.
    MissingEdge,
    /// A case key is not a statically known constant.
    UnknownCaseKey,
    /// A case key is a string constant.
    UnsupportedKey,
    /// The same key is compared twice.
    DuplicateKey,
    /// The chain leads back into itself.
    Cycle,
    /// A case leaf is also entered from outside the chain.
    SharedLeaf,
}

/// Result of following a chain from one root block.
#[derive(Debug, Clone)]
pub struct SwitchEquivFinder {
    root: BlockId,
    reg: Reg,
    failure: Option<FinderFailure>,
    visited: BTreeSet<BlockId>,
    key_to_case: BTreeMap<SwitchKey, BlockId>,
    default: Option<BlockId>,
    extra_loads: BTreeMap<BlockId, Vec<Reg>>,
}

impl SwitchEquivFinder {
    /// Follows the chain rooted at `root`, which discriminates on `reg`.
    #[must_use]
    pub fn find(
        cfg: &ControlFlowGraph,
        root: BlockId,
        reg: Reg,
        fixpoint: &ConstantFixpoint,
    ) -> Self {
        let mut finder = SwitchEquivFinder {
            root,
            reg,
            failure: None,
            visited: BTreeSet::new(),
            key_to_case: BTreeMap::new(),
            default: None,
            extra_loads: BTreeMap::new(),
        };
        if let Err(failure) = finder.follow(cfg, fixpoint) {
            finder.failure = Some(failure);
        }
        finder
    }

    fn follow(
        &mut self,
        cfg: &ControlFlowGraph,
        fixpoint: &ConstantFixpoint,
    ) -> Result<(), FinderFailure> {
        let mut current = self.root;
        let default = loop {
            self.visited.insert(current);
            let (key, equal, not_equal) = self.decode_comparison(cfg, fixpoint, current)?;
            if self.key_to_case.insert(key, equal).is_some() {
                return Err(FinderFailure::DuplicateKey);
            }

            if self.visited.contains(&not_equal) {
                return Err(FinderFailure::Cycle);
            }
            if !self.continues_chain(cfg, fixpoint, not_equal) {
                break not_equal;
            }
            current = not_equal;
        };

        for leaf in self.key_to_case.values() {
            if self.visited.contains(leaf) {
                return Err(FinderFailure::Cycle);
            }
            let foreign = cfg
                .predecessors(*leaf)
                .iter()
                .any(|pred| !self.visited.contains(pred));
            if foreign {
                return Err(FinderFailure::SharedLeaf);
            }
        }
        self.default = Some(default);
        self.collect_extra_loads(cfg);
        Ok(())
    }

    /// Decodes the comparison ending `block` into `(key, equal_target, not_equal_target)`.
    fn decode_comparison(
        &self,
        cfg: &ControlFlowGraph,
        fixpoint: &ConstantFixpoint,
        block: BlockId,
    ) -> Result<(SwitchKey, BlockId, BlockId), FinderFailure> {
        let data = cfg.block(block).ok_or(FinderFailure::NotEqualityBranch)?;
        let index = data
            .insns()
            .len()
            .checked_sub(1)
            .ok_or(FinderFailure::NotEqualityBranch)?;
        let insn = &data.insns()[index];
        let other = self
            .case_operand(insn)
            .ok_or(FinderFailure::NotEqualityBranch)?;

        let env = fixpoint
            .env_before(cfg, block, index)
            .ok_or(FinderFailure::UnknownCaseKey)?;
        let key = match env.get(other) {
            Some(ConstValue::Class(ty)) => SwitchKey::Class(ty.clone()),
            Some(ConstValue::Int(value)) => SwitchKey::Int(*value),
            Some(ConstValue::String(_)) => return Err(FinderFailure::UnsupportedKey),
            None => return Err(FinderFailure::UnknownCaseKey),
        };

        let taken = data.branch_target().ok_or(FinderFailure::MissingEdge)?;
        let fallthrough = data.goto_target().ok_or(FinderFailure::MissingEdge)?;
        match insn {
            Insn::IfEq { .. } => Ok((key, taken, fallthrough)),
            _ => Ok((key, fallthrough, taken)),
        }
    }

    /// Returns the constant-side operand of an equality comparison involving the discriminant.
    fn case_operand(&self, insn: &Insn) -> Option<Reg> {
        let (left, right) = equality_operands(insn)?;
        match (left == self.reg, right == self.reg) {
            (true, false) => Some(right),
            (false, true) => Some(left),
            _ => None,
        }
    }

    fn continues_chain(
        &self,
        cfg: &ControlFlowGraph,
        fixpoint: &ConstantFixpoint,
        next: BlockId,
    ) -> bool {
        let Some(block) = cfg.block(next) else {
            return false;
        };
        if block.is_catch() || !block.ends_in_equality_branch() {
            return false;
        }

        let preds = cfg.predecessors(next);
        if preds.is_empty() || preds.iter().any(|pred| !self.visited.contains(pred)) {
            return false;
        }

        let insns = block.insns();
        let (body, last) = insns.split_at(insns.len() - 1);
        let clobbers = body
            .iter()
            .any(|insn| !insn.is_const_load() || insn.dest() == Some(self.reg));
        if clobbers {
            return false;
        }

        let Some(other) = self.case_operand(&last[0]) else {
            return false;
        };
        fixpoint
            .env_before(cfg, next, body.len())
            .is_some_and(|env| env.get(other).is_some())
    }

    /// Records constant loads of non-root chain blocks whose value is still read once control
    /// has left the chain.
    fn collect_extra_loads(&mut self, cfg: &ControlFlowGraph) {
        let mut exits: Vec<BlockId> = self.key_to_case.values().copied().collect();
        exits.extend(self.default);

        for id in self.visited.iter().filter(|id| **id != self.root) {
            let Some(block) = cfg.block(*id) else {
                continue;
            };
            let live: Vec<Reg> = block
                .insns()
                .iter()
                .filter_map(Insn::dest)
                .filter(|dest| is_read_outside(cfg, &exits, *dest, &self.visited))
                .collect();
            if !live.is_empty() {
                self.extra_loads.insert(*id, live);
            }
        }
    }

    /// Returns `true` if the chain was recognized.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns why recognition failed.
    #[must_use]
    pub fn failure(&self) -> Option<FinderFailure> {
        self.failure
    }

    /// Returns the root block.
    #[must_use]
    pub fn root(&self) -> BlockId {
        self.root
    }

    /// Returns the discriminant register.
    #[must_use]
    pub fn reg(&self) -> Reg {
        self.reg
    }

    /// Returns the blocks making up the chain, root included.
    #[must_use]
    pub fn visited(&self) -> &BTreeSet<BlockId> {
        &self.visited
    }

    /// Returns the case leaves by key.
    #[must_use]
    pub fn key_to_case(&self) -> &BTreeMap<SwitchKey, BlockId> {
        &self.key_to_case
    }

    /// Returns the default block.
    #[must_use]
    pub fn default_case(&self) -> Option<BlockId> {
        self.default
    }

    /// Returns `true` if removing the chain would drop loads that are still needed.
    #[must_use]
    pub fn has_extra_loads(&self) -> bool {
        !self.extra_loads.is_empty()
    }

    /// Returns the still-needed loads per chain block.
    #[must_use]
    pub fn extra_loads(&self) -> &BTreeMap<BlockId, Vec<Reg>> {
        &self.extra_loads
    }

    /// Returns `true` if every key is of `kind`.
    #[must_use]
    pub fn are_keys_uniform(&self, kind: KeyKind) -> bool {
        self.key_to_case.keys().all(|key| key.kind() == kind)
    }
}

/// Returns `true` if `reg` may be read, before being overwritten, on some path starting at one
/// of `starts` that avoids `chain`.
fn is_read_outside(
    cfg: &ControlFlowGraph,
    starts: &[BlockId],
    reg: Reg,
    chain: &BTreeSet<BlockId>,
) -> bool {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<BlockId> = starts.to_vec();
    while let Some(id) = stack.pop() {
        if chain.contains(&id) || !seen.insert(id) {
            continue;
        }
        let Some(block) = cfg.block(id) else {
            continue;
        };

        let mut killed = false;
        for insn in block.insns() {
            if insn.uses().contains(&reg) {
                return true;
            }
            if insn.dest() == Some(reg) {
                killed = true;
                break;
            }
        }
        if !killed {
            stack.extend(cfg.successors(id));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{
            dataflow::ConstantEnvironment,
            switch::{find_determining_reg, simplify_moves},
        },
        test::helpers::ChainBuilder,
    };

    fn run(cfg: &ControlFlowGraph) -> SwitchEquivFinder {
        let fixpoint = ConstantFixpoint::run(cfg, ConstantEnvironment::new());
        let root = cfg.entry_block();
        let reg = find_determining_reg(&fixpoint, cfg, root).unwrap();
        SwitchEquivFinder::find(cfg, root, reg, &fixpoint)
    }

    #[test]
    fn test_simple_chain() {
        let chain = ChainBuilder::new(&["A", "B", "C"]).build();
        let finder = run(&chain.cfg);
        assert!(finder.success(), "{:?}", finder.failure());
        assert_eq!(finder.reg(), chain.discriminant);
        assert_eq!(finder.key_to_case().len(), 3);
        assert_eq!(finder.visited().len(), 3);
        assert_eq!(finder.default_case(), Some(chain.default));
        assert!(!finder.has_extra_loads());
        assert!(finder.are_keys_uniform(KeyKind::Class));
        assert!(!finder.are_keys_uniform(KeyKind::Int));

        for (name, leaf) in ["A", "B", "C"].iter().zip(&chain.leaves) {
            let key = SwitchKey::Class(TypeName::class(name));
            assert_eq!(finder.key_to_case().get(&key), Some(leaf));
        }
    }

    #[test]
    fn test_not_equal_polarity() {
        let chain = ChainBuilder::new(&["A", "B"]).not_equal().build();
        let finder = run(&chain.cfg);
        assert!(finder.success());
        assert_eq!(finder.default_case(), Some(chain.default));
        assert_eq!(
            finder
                .key_to_case()
                .get(&SwitchKey::Class(TypeName::class("B"))),
            Some(&chain.leaves[1])
        );
    }

    #[test]
    fn test_staged_chain_needs_simplified_moves() {
        let mut chain = ChainBuilder::new(&["A", "B", "C"]).staged().build();
        let finder = run(&chain.cfg);
        assert!(finder.success());
        assert_eq!(finder.visited().len(), 1);

        simplify_moves(&mut chain.cfg);
        let finder = run(&chain.cfg);
        assert!(finder.success(), "{:?}", finder.failure());
        assert_eq!(finder.visited().len(), 3);
        assert_eq!(finder.default_case(), Some(chain.default));
        assert!(!finder.has_extra_loads());
    }

    #[test]
    fn test_duplicate_key_fails() {
        let chain = ChainBuilder::new(&["A", "B", "A"]).build();
        let finder = run(&chain.cfg);
        assert_eq!(finder.failure(), Some(FinderFailure::DuplicateKey));
    }

    #[test]
    fn test_shared_leaf_fails() {
        let mut chain = ChainBuilder::new(&["A", "B", "C"]).build();
        // The default block jumps into the first leaf as well.
        let default = chain.default;
        let leaf = chain.leaves[0];
        chain.cfg.block_mut(default).unwrap().insns_mut().clear();
        chain.cfg.set_goto(default, leaf).unwrap();
        let finder = run(&chain.cfg);
        assert_eq!(finder.failure(), Some(FinderFailure::SharedLeaf));
    }

    #[test]
    fn test_extra_loads_detected() {
        let mut chain = ChainBuilder::new(&["A", "B", "C"]).build();
        // The default block reads the comparison register loaded by the last chain block.
        let default = chain.default;
        let scratch = chain.scratch;
        let block = chain.cfg.block_mut(default).unwrap();
        block.insns_mut().clear();
        block.push(Insn::ReturnObject { src: scratch });
        let finder = run(&chain.cfg);
        assert!(finder.success());
        assert!(finder.has_extra_loads());
    }

    #[test]
    fn test_overwritten_load_is_not_extra() {
        let mut chain = ChainBuilder::new(&["A", "B", "C"]).build();
        let default = chain.default;
        let scratch = chain.scratch;
        let block = chain.cfg.block_mut(default).unwrap();
        block.insns_mut().clear();
        block.push(Insn::Const {
            dest: scratch,
            literal: 0,
        });
        block.push(Insn::Return { src: scratch });
        let finder = run(&chain.cfg);
        assert!(finder.success());
        assert!(!finder.has_extra_loads());
    }

    #[test]
    fn test_chain_stops_at_foreign_predecessor() {
        let mut chain = ChainBuilder::new(&["A", "B", "C"]).build();
        // A block outside the chain also jumps to the third comparison, so the chain must end
        // before it and treat it as the default.
        let outsider = chain.cfg.create_block();
        let third = chain.chain[2];
        chain.cfg.set_goto(outsider, third).unwrap();
        let leaf = chain.leaves[0];
        chain
            .cfg
            .block_mut(leaf)
            .unwrap()
            .insns_mut()
            .retain(|insn| !insn.is_exit());
        chain.cfg.set_goto(leaf, outsider).unwrap();

        let finder = run(&chain.cfg);
        assert!(finder.success(), "{:?}", finder.failure());
        assert_eq!(finder.key_to_case().len(), 2);
        assert_eq!(finder.default_case(), Some(third));
    }

    #[test]
    fn test_int_keys() {
        let chain = ChainBuilder::with_ints(&[1, 2, 3]).build();
        let finder = run(&chain.cfg);
        assert!(finder.success());
        assert!(finder.are_keys_uniform(KeyKind::Int));
        assert!(!finder.are_keys_uniform(KeyKind::Class));
    }
}
