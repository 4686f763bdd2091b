//! Discovery of const-class decision trees within a method.
//!
//! Blocks are walked depth-first from the entry so that a chain is found from its topmost
//! comparison even when block numbering does not follow control flow. Every block ending in
//! `if-eq`/`if-ne` that is not yet part of a discovered chain seeds a
//! [`SwitchEquivFinder`] run; accepted chains become [`DecisionTree`]s.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::{
    analysis::{
        dataflow::{ConstantEnvironment, ConstantFixpoint},
        find_determining_reg, simplify_moves, BlockId, ControlFlowGraph, KeyKind,
        SwitchEquivFinder,
    },
    assembly::Reg,
    compiler::passes::constclass::ConstClassBranchesConfig,
    metadata::{DexMethod, MethodRef, Program, TypeName},
};

/// An accepted chain of class comparisons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionTree {
    /// Block holding the first comparison; its terminator is replaced on rewrite.
    pub root: BlockId,
    /// Register compared against the class constants.
    pub discriminant: Reg,
    /// Target block per class key.
    pub cases: BTreeMap<TypeName, BlockId>,
    /// Block reached when no key matches.
    pub default: BlockId,
    /// Blocks making up the comparison chain, root included.
    pub visited: BTreeSet<BlockId>,
}

impl DecisionTree {
    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns `true` if the tree has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

/// All accepted trees of one method, with the private copy of its code they refer to.
///
/// The method itself is untouched until the plan is committed as a whole.
#[derive(Debug, Clone)]
pub struct TransformPlan {
    /// The method the plan rewrites.
    pub method: MethodRef,
    /// Private copy of the method's code.
    pub code: ControlFlowGraph,
    /// Accepted trees, in discovery order, with pairwise disjoint block sets.
    pub trees: Vec<DecisionTree>,
}

/// Returns the blocks reachable from the entry in depth-first order.
///
/// Successors are pushed in edge order onto a stack, so the last successor of a block is
/// visited first.
#[must_use]
pub fn order_blocks(cfg: &ControlFlowGraph) -> Vec<BlockId> {
    let mut ordered = Vec::new();
    let mut visited = BTreeSet::new();
    let mut stack = vec![cfg.entry_block()];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        ordered.push(id);
        if let Some(block) = cfg.block(id) {
            stack.extend(block.succs().iter().map(|edge| edge.target));
        }
    }
    ordered
}

/// Applies the acceptance policy to finder results.
pub struct DecisionTreeMatcher<'a> {
    config: &'a ConstClassBranchesConfig,
    program: &'a Program,
}

impl<'a> DecisionTreeMatcher<'a> {
    /// Creates a matcher resolving classes against `program`.
    #[must_use]
    pub fn new(config: &'a ConstClassBranchesConfig, program: &'a Program) -> Self {
        DecisionTreeMatcher { config, program }
    }

    /// Matches `method` and returns a plan if at least one tree was accepted.
    ///
    /// Moves of block-local constants in the private copy are simplified before matching.
    #[must_use]
    pub fn match_method(&self, method: &DexMethod) -> Option<TransformPlan> {
        let mut code = method.code()?.clone();
        let simplified = simplify_moves(&mut code);
        if simplified > 0 {
            trace!("{}: simplified {simplified} move(s)", method.reference);
        }
        let trees = self.find_trees(&code);
        if trees.is_empty() {
            return None;
        }
        debug!(
            "{}: accepted {} decision tree(s)",
            method.reference,
            trees.len()
        );
        Some(TransformPlan {
            method: method.reference.clone(),
            code,
            trees,
        })
    }

    /// Finds all acceptable trees in `code`.
    #[must_use]
    pub fn find_trees(&self, code: &ControlFlowGraph) -> Vec<DecisionTree> {
        let mut fixpoint: Option<ConstantFixpoint> = None;
        let mut considered: BTreeSet<BlockId> = BTreeSet::new();
        let mut trees = Vec::new();

        for id in order_blocks(code) {
            if considered.contains(&id) {
                continue;
            }
            let Some(block) = code.block(id) else {
                continue;
            };
            if !block.ends_in_equality_branch() {
                continue;
            }

            let fixpoint = fixpoint
                .get_or_insert_with(|| ConstantFixpoint::run(code, ConstantEnvironment::new()));
            let Some(reg) = find_determining_reg(fixpoint, code, id) else {
                trace!("{id}: no determining register");
                continue;
            };

            let finder = SwitchEquivFinder::find(code, id, reg, fixpoint);
            if let Some(reason) = unsupported(&finder) {
                debug!("{id}: rejected, {reason}");
                continue;
            }
            if !finder.visited().is_disjoint(&considered) {
                debug!("{id}: rejected, overlaps an earlier chain");
                continue;
            }
            considered.extend(finder.visited().iter().copied());

            let relevant = self.relevant_case_count(&finder);
            if relevant < self.config.min_cases || relevant > self.config.max_cases {
                debug!(
                    "{id}: rejected, {relevant} relevant cases outside [{}, {}]",
                    self.config.min_cases, self.config.max_cases
                );
                continue;
            }

            if let Some(tree) = into_tree(&finder) {
                trace!("{id}: accepted {} cases", tree.len());
                trees.push(tree);
            }
        }
        trees
    }

    fn relevant_case_count(&self, finder: &SwitchEquivFinder) -> usize {
        finder
            .key_to_case()
            .keys()
            .filter_map(|key| key.as_class())
            .filter(|ty| {
                self.config.consider_external_classes || self.program.is_internal_class(ty)
            })
            .count()
    }
}

/// Returns why finder results cannot be turned into a tree, if they cannot.
fn unsupported(finder: &SwitchEquivFinder) -> Option<String> {
    if let Some(failure) = finder.failure() {
        return Some(format!("no switch equivalent ({failure})"));
    }
    if !finder.are_keys_uniform(KeyKind::Class) {
        return Some("keys are not all classes".to_string());
    }
    if finder.has_extra_loads() {
        return Some("chain loads are used after the chain".to_string());
    }
    if finder.default_case().is_none() {
        return Some("no default case".to_string());
    }
    None
}

fn into_tree(finder: &SwitchEquivFinder) -> Option<DecisionTree> {
    let cases = finder
        .key_to_case()
        .iter()
        .map(|(key, leaf)| Some((key.as_class()?.clone(), *leaf)))
        .collect::<Option<BTreeMap<_, _>>>()?;
    Some(DecisionTree {
        root: finder.root(),
        discriminant: finder.reg(),
        cases,
        default: finder.default_case()?,
        visited: finder.visited().clone(),
    })
}
