//! Forward constant propagation over a [`ControlFlowGraph`].
//!
//! Tracks, for every register, whether it holds a statically known constant (an integer, a
//! class literal or a string literal). The analysis is a classic worklist fixpoint: block entry
//! states are the meet of the exit states of all reached predecessors, and blocks whose entry
//! state changes are re-queued until nothing changes.
//!
//! # Example
//!
//! ```rust
//! use dexopt::analysis::{
//!     dataflow::{ConstValue, ConstantEnvironment, ConstantFixpoint},
//!     ControlFlowGraph,
//! };
//! use dexopt::assembly::Insn;
//!
//! let mut cfg = ControlFlowGraph::new(1);
//! let entry = cfg.entry_block();
//! cfg.push(entry, Insn::Const { dest: 0, literal: 7 })?;
//! cfg.push(entry, Insn::ReturnVoid)?;
//!
//! let fixpoint = ConstantFixpoint::run(&cfg, ConstantEnvironment::new());
//! let env = fixpoint.env_at_exit(entry).unwrap();
//! assert_eq!(env.get(0), Some(&ConstValue::Int(7)));
//! # Ok::<(), dexopt::Error>(())
//! ```

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, VecDeque},
    fmt,
    sync::Arc,
};

use crate::{
    analysis::{dataflow::MeetSemiLattice, BlockId, ControlFlowGraph},
    assembly::{Insn, Reg},
    metadata::TypeName,
};

/// A statically known register value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstValue {
    /// Integer (or null, as `0`).
    Int(i64),
    /// Class literal.
    Class(TypeName),
    /// String literal.
    String(Arc<str>),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(value) => write!(f, "{value}"),
            ConstValue::Class(ty) => write!(f, "{ty}.class"),
            ConstValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// Map from registers to their known constant value.
///
/// A register absent from the map is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantEnvironment {
    values: BTreeMap<Reg, ConstValue>,
}

impl ConstantEnvironment {
    /// Creates an environment in which nothing is known.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the known value of `reg`.
    #[must_use]
    pub fn get(&self, reg: Reg) -> Option<&ConstValue> {
        self.values.get(&reg)
    }

    /// Records that `reg` holds `value`.
    pub fn set(&mut self, reg: Reg, value: ConstValue) {
        self.values.insert(reg, value);
    }

    /// Forgets anything known about `reg`.
    pub fn invalidate(&mut self, reg: Reg) {
        self.values.remove(&reg);
    }

    /// Returns the number of known registers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if nothing is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies the effect of one instruction.
    pub fn transfer(&mut self, insn: &Insn) {
        match insn {
            Insn::Const { dest, literal } => self.set(*dest, ConstValue::Int(*literal)),
            Insn::ConstClass { dest, ty } => self.set(*dest, ConstValue::Class(ty.clone())),
            Insn::ConstString { dest, value } => {
                self.set(*dest, ConstValue::String(value.clone()));
            }
            Insn::Move { dest, src } | Insn::MoveObject { dest, src } => {
                match self.get(*src).cloned() {
                    Some(value) => self.set(*dest, value),
                    None => self.invalidate(*dest),
                }
            }
            Insn::AddIntLit { dest, src, literal } => match self.get(*src) {
                Some(ConstValue::Int(value)) => {
                    let sum = value.wrapping_add(i64::from(*literal));
                    self.set(*dest, ConstValue::Int(sum));
                }
                _ => self.invalidate(*dest),
            },
            other => {
                if let Some(dest) = other.dest() {
                    self.invalidate(dest);
                }
            }
        }
    }
}

impl MeetSemiLattice for ConstantEnvironment {
    fn meet(&self, other: &Self) -> Self {
        let values = self
            .values
            .iter()
            .filter(|(reg, value)| other.values.get(reg) == Some(*value))
            .map(|(reg, value)| (*reg, value.clone()))
            .collect();
        ConstantEnvironment { values }
    }

    fn is_bottom(&self) -> bool {
        self.values.is_empty()
    }
}

/// Solved constant propagation for one graph.
#[derive(Debug, Clone)]
pub struct ConstantFixpoint {
    entry_states: HashMap<BlockId, ConstantEnvironment>,
    exit_states: HashMap<BlockId, ConstantEnvironment>,
    iterations: usize,
}

impl ConstantFixpoint {
    /// Solves the analysis with `initial` as the state on method entry.
    ///
    /// Blocks not reachable from the entry have no state.
    #[must_use]
    pub fn run(cfg: &ControlFlowGraph, initial: ConstantEnvironment) -> Self {
        let mut entry_states: HashMap<BlockId, ConstantEnvironment> = HashMap::new();
        let mut exit_states: HashMap<BlockId, ConstantEnvironment> = HashMap::new();
        let mut worklist = VecDeque::new();
        let mut queued = BTreeSet::new();
        let mut iterations = 0;

        let entry = cfg.entry_block();
        entry_states.insert(entry, initial);
        worklist.push_back(entry);
        queued.insert(entry);

        while let Some(id) = worklist.pop_front() {
            queued.remove(&id);
            iterations += 1;

            let Some(block) = cfg.block(id) else {
                continue;
            };
            let Some(mut state) = entry_states.get(&id).cloned() else {
                continue;
            };
            for insn in block.insns() {
                state.transfer(insn);
            }

            if exit_states.get(&id) == Some(&state) {
                continue;
            }
            exit_states.insert(id, state.clone());

            for succ in cfg.successors(id) {
                let merged = match entry_states.get(&succ) {
                    Some(existing) => existing.meet(&state),
                    None => state.clone(),
                };
                if entry_states.get(&succ) != Some(&merged) || !exit_states.contains_key(&succ) {
                    entry_states.insert(succ, merged);
                    if queued.insert(succ) {
                        worklist.push_back(succ);
                    }
                }
            }
        }

        ConstantFixpoint {
            entry_states,
            exit_states,
            iterations,
        }
    }

    /// Returns the state on entry to `block`, or `None` if it was never reached.
    #[must_use]
    pub fn env_at_entry(&self, block: BlockId) -> Option<&ConstantEnvironment> {
        self.entry_states.get(&block)
    }

    /// Returns the state after the last instruction of `block`.
    #[must_use]
    pub fn env_at_exit(&self, block: BlockId) -> Option<&ConstantEnvironment> {
        self.exit_states.get(&block)
    }

    /// Returns the state immediately before instruction `index` of `block`.
    #[must_use]
    pub fn env_before(
        &self,
        cfg: &ControlFlowGraph,
        block: BlockId,
        index: usize,
    ) -> Option<ConstantEnvironment> {
        let mut state = self.entry_states.get(&block)?.clone();
        for insn in cfg.block(block)?.insns().iter().take(index) {
            state.transfer(insn);
        }
        Some(state)
    }

    /// Returns the number of block visits the solver needed.
    #[must_use]
    pub const fn iterations(&self) -> usize {
        self.iterations
    }
}
