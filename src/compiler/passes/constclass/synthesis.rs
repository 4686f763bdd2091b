//! Code generation for accepted decision trees.
//!
//! Each tree is replaced by a table lookup followed by a `switch`:
//!
//! ```text
//! root:
//!     ...                               ; original non-branch instructions
//!     const          vD, 0
//!     invoke-static  {vD}, Host.__get_encoded_table_N:(I)Ljava/lang/String;
//!     move-result-object vS
//!     const          vZ, 0
//!     invoke-static  {vDiscriminant, vS, vZ}, <lookup>
//!     move-result    vR
//!     switch         vR                 ; case k -> leaf of the k-th class, goto -> default
//! ```
//!
//! The table itself lives in a private static helper of the same class that returns the
//! encoded string constant. The helper reloads the constant through a depth-bounded
//! self-call when the load yields `null`, and throws once the depth reaches
//! [`MAX_HELPER_DEPTH`].

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::{
    analysis::{BlockId, ControlFlowGraph},
    assembly::Insn,
    compiler::passes::constclass::{DecisionTree, TransformPlan},
    metadata::{AccessFlags, DexMethod, MethodRef, Program, Proto, TypeName},
    utils::stringtree,
    Result,
};

/// Name prefix of the generated table getters.
pub const HELPER_BASE_NAME: &str = "__get_encoded_table";

/// Recursion depth at which the table getter gives up.
pub const MAX_HELPER_DEPTH: i64 = 10;

/// Message of the exception thrown by the table getter.
pub const HELPER_ERROR_MESSAGE: &str = "Unexpected";

/// Outcome of committing one plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Number of trees rewritten.
    pub trees: usize,
    /// Number of `const-class` instructions that disappeared from the method.
    pub const_class_removed: usize,
    /// Total length of the encoded tables.
    pub string_size: usize,
}

/// Assigns ordinals `1..=N` to the keys of `tree` in class order.
///
/// # Errors
///
/// Returns an invariant error if the tree has more keys than the ordinal range holds.
pub fn assign_ordinals(tree: &DecisionTree) -> Result<BTreeMap<TypeName, i16>> {
    tree.cases
        .keys()
        .enumerate()
        .map(|(index, ty)| {
            let ordinal = i16::try_from(index + 1)
                .map_err(|_| invariant_error!("ordinal {} out of range", index + 1))?;
            Ok((ty.clone(), ordinal))
        })
        .collect()
}

/// Encodes ordinals keyed by the external (`java.lang.Object`) form of each class name.
///
/// # Errors
///
/// Returns an invariant error if two classes share an external name or an ordinal.
pub fn encode_table(ordinals: &BTreeMap<TypeName, i16>) -> Result<String> {
    let mut table = BTreeMap::new();
    let mut seen = BTreeSet::new();
    for (ty, ordinal) in ordinals {
        if *ordinal <= 0 || !seen.insert(*ordinal) {
            return Err(invariant_error!("ordinal {} assigned twice or reserved", ordinal));
        }
        if table.insert(ty.external_name(), *ordinal).is_some() {
            return Err(invariant_error!("duplicate class name {}", ty.external_name()));
        }
    }
    stringtree::encode(&table)
}

/// Returns the reference of a table getter named `name` in `class`.
#[must_use]
pub fn helper_ref(class: &TypeName, name: &str) -> MethodRef {
    MethodRef::new(
        class.clone(),
        name,
        Proto::new(TypeName::string(), vec![TypeName::int()]),
    )
}

/// Builds the table getter `reference`, returning `encoded`.
///
/// # Errors
///
/// Returns an invariant error if the graph rejects the generated shape.
pub fn build_helper(reference: MethodRef, encoded: &str) -> Result<DexMethod> {
    let mut code = ControlFlowGraph::new(1);
    let depth = 0;
    let limit = code.allocate_temp();
    let value = code.allocate_temp();
    let exception = code.allocate_temp();
    let message = code.allocate_temp();
    let next_depth = code.allocate_temp();

    let entry = code.entry_block();
    let fail = code.create_block();
    let load = code.create_block();
    let found = code.create_block();
    let retry = code.create_block();

    code.push(
        entry,
        Insn::Const {
            dest: limit,
            literal: MAX_HELPER_DEPTH,
        },
    )?;
    code.create_conditional(
        entry,
        Insn::IfGe {
            left: depth,
            right: limit,
        },
        load,
        fail,
    )?;

    let runtime_exception = TypeName::runtime_exception();
    let constructor = MethodRef::new(
        runtime_exception.clone(),
        "<init>",
        Proto::new(TypeName::void(), vec![TypeName::string()]),
    );
    code.push(
        fail,
        Insn::NewInstance {
            dest: exception,
            ty: runtime_exception,
        },
    )?;
    code.push(
        fail,
        Insn::ConstString {
            dest: message,
            value: HELPER_ERROR_MESSAGE.into(),
        },
    )?;
    code.push(
        fail,
        Insn::InvokeDirect {
            method: constructor,
            args: vec![exception, message],
        },
    )?;
    code.push(fail, Insn::Throw { src: exception })?;

    code.push(
        load,
        Insn::ConstString {
            dest: value,
            value: encoded.into(),
        },
    )?;
    code.create_conditional(load, Insn::IfNez { src: value }, retry, found)?;
    code.push(found, Insn::ReturnObject { src: value })?;

    code.push(
        retry,
        Insn::AddIntLit {
            dest: next_depth,
            src: depth,
            literal: 1,
        },
    )?;
    code.push(
        retry,
        Insn::InvokeStatic {
            method: reference.clone(),
            args: vec![next_depth],
        },
    )?;
    code.push(retry, Insn::MoveResultObject { dest: value })?;
    code.push(retry, Insn::ReturnObject { src: value })?;

    let mut helper = DexMethod::new(
        reference,
        AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::SYNTHETIC,
        code,
    );
    helper.no_optimizations = true;
    helper.generated = true;
    Ok(helper)
}

/// Rewrites trees and commits plans into the program.
pub struct CodeSynthesizer<'a> {
    lookup: &'a MethodRef,
}

impl<'a> CodeSynthesizer<'a> {
    /// Creates a synthesizer calling `lookup` to query tables.
    #[must_use]
    pub fn new(lookup: &'a MethodRef) -> Self {
        CodeSynthesizer { lookup }
    }

    /// Rewrites every tree of `plan`, prunes unreachable blocks and installs the code into the
    /// method. One getter per tree is added to the method's class.
    ///
    /// `transform_index` is the running number used to name getters; it is advanced by the
    /// number of trees.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the plan is inconsistent: overlapping trees, a method
    /// missing from the program, a leaf lost by the rewrite, or a growing `const-class` count.
    pub fn commit_plan(
        &self,
        program: &mut Program,
        plan: TransformPlan,
        transform_index: &mut usize,
    ) -> Result<CommitStats> {
        let TransformPlan {
            method,
            mut code,
            trees,
        } = plan;

        let mut claimed = BTreeSet::new();
        for tree in &trees {
            if let Some(block) = tree.visited.iter().find(|id| !claimed.insert(**id)) {
                return Err(invariant_error!(
                    "{} is consumed by two decision trees in {}",
                    block,
                    method
                ));
            }
        }

        let before = code.count_const_class();
        let mut stats = CommitStats::default();
        for tree in &trees {
            let ordinals = assign_ordinals(tree)?;
            let encoded = encode_table(&ordinals)?;

            let class = program
                .class_mut(&method.class)
                .ok_or_else(|| invariant_error!("class of {} is not in the program", method))?;
            let name =
                class.unique_method_name(&format!("{HELPER_BASE_NAME}_{}", *transform_index));
            let helper = helper_ref(&method.class, &name);
            class.add_method(build_helper(helper.clone(), &encoded)?);
            *transform_index += 1;

            self.rewrite_tree(&mut code, tree, &ordinals, &helper)?;
            trace!("{}: {} rewritten through {}", method, tree.root, helper.name);

            stats.trees += 1;
            stats.string_size += encoded.chars().count();
        }

        code.remove_unreachable_blocks();
        for tree in &trees {
            let lost = tree
                .cases
                .values()
                .chain(std::iter::once(&tree.default))
                .find(|leaf| !code.is_reachable(**leaf));
            if let Some(leaf) = lost {
                return Err(invariant_error!("{} lost {} while rewriting", method, leaf));
            }
        }

        let after = code.count_const_class();
        stats.const_class_removed = before.checked_sub(after).ok_or_else(|| {
            invariant_error!(
                "{}: const-class count grew from {} to {}",
                method,
                before,
                after
            )
        })?;

        program
            .method_mut(&method)
            .ok_or_else(|| invariant_error!("{} is not in the program", method))?
            .set_code(code);
        debug!(
            "{}: committed {} tree(s), {} const-class removed",
            method, stats.trees, stats.const_class_removed
        );
        Ok(stats)
    }

    /// Replaces the comparison ending the root of `tree` with the lookup and `switch`.
    ///
    /// # Errors
    ///
    /// Returns an invariant error if the root no longer ends in a branch.
    pub fn rewrite_tree(
        &self,
        code: &mut ControlFlowGraph,
        tree: &DecisionTree,
        ordinals: &BTreeMap<TypeName, i16>,
        helper: &MethodRef,
    ) -> Result<()> {
        let depth = code.allocate_temp();
        let table = code.allocate_temp();
        let sentinel = code.allocate_temp();
        let ordinal = code.allocate_temp();

        code.replace_terminator(
            tree.root,
            vec![
                Insn::Const {
                    dest: depth,
                    literal: 0,
                },
                Insn::InvokeStatic {
                    method: helper.clone(),
                    args: vec![depth],
                },
                Insn::MoveResultObject { dest: table },
                Insn::Const {
                    dest: sentinel,
                    literal: 0,
                },
                Insn::InvokeStatic {
                    method: self.lookup.clone(),
                    args: vec![tree.discriminant, table, sentinel],
                },
                Insn::MoveResult { dest: ordinal },
            ],
        )?;

        let cases = tree
            .cases
            .iter()
            .map(|(ty, leaf)| {
                let key = ordinals
                    .get(ty)
                    .ok_or_else(|| invariant_error!("{} has no ordinal", ty))?;
                Ok((i32::from(*key), *leaf))
            })
            .collect::<Result<Vec<(i32, BlockId)>>>()?;
        code.create_branch(tree.root, Insn::Switch { src: ordinal }, None, &cases)?;

        if code.redirect_gotos(tree.root, tree.default)? == 0 {
            return Err(invariant_error!("{} has no fall-through edge", tree.root));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::EdgeKind,
        compiler::passes::constclass::{ConstClassBranchesConfig, DecisionTreeMatcher},
        metadata::DexClass,
        test::helpers::{
            chain_method, method_ref, program_with, six_keys, ChainBuilder, LOOKUP_METHOD,
        },
        Error,
    };

    fn names(keys: &[String]) -> Vec<&str> {
        keys.iter().map(String::as_str).collect()
    }

    fn host_program() -> (Program, MethodRef) {
        let keys = six_keys();
        let mut host = DexClass::new(TypeName::class("com/example/Host"));
        let method = chain_method("com/example/Host", "pick", &names(&keys));
        let reference = method.reference.clone();
        host.add_method(method);
        (program_with(vec![host], &keys), reference)
    }

    fn plan_for(program: &Program, method: &MethodRef) -> TransformPlan {
        let config = ConstClassBranchesConfig::default();
        DecisionTreeMatcher::new(&config, program)
            .match_method(program.method(method).unwrap())
            .unwrap()
    }

    #[test]
    fn test_ordinals_follow_class_order() {
        let (program, method) = host_program();
        let plan = plan_for(&program, &method);
        let ordinals = assign_ordinals(&plan.trees[0]).unwrap();

        let values: Vec<i16> = ordinals.values().copied().collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            ordinals.get(&TypeName::class("com/example/k/K0")),
            Some(&1)
        );
    }

    #[test]
    fn test_encoded_table_uses_external_names() {
        let (program, method) = host_program();
        let plan = plan_for(&program, &method);
        let ordinals = assign_ordinals(&plan.trees[0]).unwrap();
        let encoded = encode_table(&ordinals).unwrap();

        assert_eq!(stringtree::lookup(&encoded, "com.example.k.K3", 0), 4);
        assert_eq!(stringtree::lookup(&encoded, "com/example/k/K3", 0), 0);
    }

    #[test]
    fn test_encode_table_rejects_duplicate_ordinals() {
        let mut ordinals = BTreeMap::new();
        ordinals.insert(TypeName::class("a/A"), 1);
        ordinals.insert(TypeName::class("a/B"), 1);
        assert!(matches!(
            encode_table(&ordinals),
            Err(Error::Invariant { .. })
        ));
    }

    #[test]
    fn test_helper_shape() {
        let reference = helper_ref(&TypeName::class("com/example/Host"), "__get_encoded_table_0");
        assert_eq!(reference.proto.to_string(), "(I)Ljava/lang/String;");

        let helper = build_helper(reference.clone(), "table").unwrap();
        assert!(helper.no_optimizations);
        assert!(helper.generated);
        assert!(helper
            .access
            .contains(AccessFlags::PRIVATE | AccessFlags::STATIC | AccessFlags::SYNTHETIC));

        let code = helper.code().unwrap();
        let insns: Vec<&Insn> = code.instructions().map(|(_, insn)| insn).collect();
        assert!(insns.contains(&&Insn::Const {
            dest: 1,
            literal: MAX_HELPER_DEPTH
        }));
        assert!(insns
            .iter()
            .any(|insn| matches!(insn, Insn::ConstString { value, .. } if &**value == "table")));
        assert!(insns.iter().any(|insn| insn.callee() == Some(&reference)));
        assert!(insns.iter().any(|insn| matches!(insn, Insn::Throw { .. })));
        assert_eq!(code.reachable().len(), code.block_count());
    }

    #[test]
    fn test_commit_rewrites_root() {
        let (mut program, method) = host_program();
        let plan = plan_for(&program, &method);
        let tree = plan.trees[0].clone();
        let lookup = MethodRef::parse(LOOKUP_METHOD).unwrap();
        let synthesizer = CodeSynthesizer::new(&lookup);

        let mut index = 0;
        let stats = synthesizer
            .commit_plan(&mut program, plan, &mut index)
            .unwrap();
        assert_eq!(index, 1);
        assert_eq!(stats.trees, 1);
        // The root keeps its own load; the five other chain blocks are gone.
        assert_eq!(stats.const_class_removed, 5);
        assert!(stats.string_size > 0);

        let code = program.method(&method).unwrap().code().unwrap();
        let root = code.block(tree.root).unwrap();
        assert_eq!(root.last_insn().map(Insn::mnemonic), Some("switch"));
        assert_eq!(root.goto_target(), Some(tree.default));
        let cases: Vec<i32> = root
            .succs()
            .iter()
            .filter_map(|edge| match edge.kind {
                EdgeKind::Branch { case } => case,
                _ => None,
            })
            .collect();
        assert_eq!(cases, vec![1, 2, 3, 4, 5, 6]);

        for leaf in tree.cases.values() {
            assert!(code.is_reachable(*leaf));
        }
        for block in tree.visited.iter().filter(|id| **id != tree.root) {
            assert!(!code.contains(*block));
        }

        let host = program.class(&method.class).unwrap();
        assert!(host.has_method_named("__get_encoded_table_0"));
    }

    #[test]
    fn test_commit_rewrites_not_equal_chain() {
        let keys = six_keys();
        let chain = ChainBuilder::new(&names(&keys)).not_equal().build();
        let mut host = DexClass::new(TypeName::class("com/example/Host"));
        let method = DexMethod::new(
            method_ref("com/example/Host", "pick"),
            AccessFlags::PUBLIC | AccessFlags::STATIC,
            chain.cfg.clone(),
        );
        let reference = method.reference.clone();
        host.add_method(method);
        let mut program = program_with(vec![host], &keys);

        let plan = plan_for(&program, &reference);
        assert_eq!(plan.trees.len(), 1);
        let lookup = MethodRef::parse(LOOKUP_METHOD).unwrap();
        let mut index = 0;
        let stats = CodeSynthesizer::new(&lookup)
            .commit_plan(&mut program, plan, &mut index)
            .unwrap();
        assert_eq!(stats.const_class_removed, 5);

        let code = program.method(&reference).unwrap().code().unwrap();
        let root = code.block(chain.chain[0]).unwrap();
        // The fall-through of the first if-ne led to the first leaf; it now leads to the default.
        assert_eq!(root.goto_target(), Some(chain.default));
        let cases: Vec<(i32, BlockId)> = root
            .succs()
            .iter()
            .filter_map(|edge| match edge.kind {
                EdgeKind::Branch { case: Some(case) } => Some((case, edge.target)),
                _ => None,
            })
            .collect();
        let expected: Vec<(i32, BlockId)> = chain
            .leaves
            .iter()
            .enumerate()
            .map(|(i, leaf)| (i as i32 + 1, *leaf))
            .collect();
        assert_eq!(cases, expected);
        for leaf in &chain.leaves {
            assert!(code.is_reachable(*leaf));
        }
        assert!(code.is_reachable(chain.default));
    }

    #[test]
    fn test_helper_names_are_unique() {
        let (mut program, method) = host_program();
        let plan = plan_for(&program, &method);
        let lookup = MethodRef::parse(LOOKUP_METHOD).unwrap();
        program
            .class_mut(&method.class)
            .unwrap()
            .add_method(DexMethod::abstract_method(
                helper_ref(&method.class, "__get_encoded_table_0"),
                AccessFlags::PRIVATE,
            ));

        let mut index = 0;
        CodeSynthesizer::new(&lookup)
            .commit_plan(&mut program, plan, &mut index)
            .unwrap();
        let host = program.class(&method.class).unwrap();
        assert!(host.has_method_named("__get_encoded_table_0_1"));
    }

    #[test]
    fn test_overlapping_trees_are_fatal() {
        let (mut program, method) = host_program();
        let mut plan = plan_for(&program, &method);
        let duplicate = plan.trees[0].clone();
        plan.trees.push(duplicate);
        let lookup = MethodRef::parse(LOOKUP_METHOD).unwrap();

        let mut index = 0;
        let result = CodeSynthesizer::new(&lookup).commit_plan(&mut program, plan, &mut index);
        assert!(matches!(result, Err(Error::Invariant { .. })));
        // Nothing was committed.
        assert_eq!(index, 0);
        assert_eq!(
            program
                .method(&method)
                .unwrap()
                .code()
                .unwrap()
                .count_const_class(),
            6
        );
    }
}
