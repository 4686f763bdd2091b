//! Builders for the control flow shapes and programs used across unit tests.

use crate::{
    analysis::{BlockId, ControlFlowGraph},
    assembly::{Insn, Reg},
    metadata::{
        AccessFlags, DexClass, DexFile, DexMethod, FieldRef, MethodRef, Program, Proto, TypeName,
    },
};

/// Runtime lookup routine the tests configure.
pub const LOOKUP_METHOD: &str =
    "Lcom/example/runtime/StringTreeSet;.lookup:(Ljava/lang/Object;Ljava/lang/String;I)I";

/// A key compared by one link of a chain.
#[derive(Debug, Clone)]
pub enum CaseKey {
    Class(TypeName),
    Int(i64),
}

/// Builds an if/else chain comparing one register against a list of constants.
///
/// ```text
/// B0:  sget-object v0, Registry.kind     (or invoke + move-result for int keys)
///      const-class v1, K0
///      if-eq v0, v1 -> leaf0 else B1
/// B1:  const-class v1, K1
///      if-eq v0, v1 -> leaf1 else B2
/// ...
/// leafN:   const v2, 100 + N; return v2
/// default: const v2, -1; return v2
/// ```
pub struct ChainBuilder {
    keys: Vec<CaseKey>,
    not_equal: bool,
    staged: bool,
}

/// A built chain and the blocks of interest.
pub struct Chain {
    pub cfg: ControlFlowGraph,
    pub discriminant: Reg,
    pub scratch: Reg,
    pub chain: Vec<BlockId>,
    pub leaves: Vec<BlockId>,
    pub default: BlockId,
}

impl ChainBuilder {
    /// Chain over class constants named by internal name, e.g. `com/example/A`.
    pub fn new(classes: &[&str]) -> Self {
        ChainBuilder {
            keys: classes
                .iter()
                .map(|name| CaseKey::Class(TypeName::class(name)))
                .collect(),
            not_equal: false,
            staged: false,
        }
    }

    /// Chain over integer constants.
    pub fn with_ints(values: &[i64]) -> Self {
        ChainBuilder {
            keys: values.iter().map(|v| CaseKey::Int(*v)).collect(),
            not_equal: false,
            staged: false,
        }
    }

    /// Chain over arbitrary keys.
    pub fn with_keys(keys: Vec<CaseKey>) -> Self {
        ChainBuilder {
            keys,
            not_equal: false,
            staged: false,
        }
    }

    /// Uses `if-ne` comparisons whose taken edge continues the chain.
    pub fn not_equal(mut self) -> Self {
        self.not_equal = true;
        self
    }

    /// Loads every key into a staging register first and moves it into the compared one.
    pub fn staged(mut self) -> Self {
        self.staged = true;
        self
    }

    pub fn build(self) -> Chain {
        let (discriminant, scratch, result, staging) = (0, 1, 2, 3);
        let mut cfg = ControlFlowGraph::new(if self.staged { 4 } else { 3 });
        let root = cfg.entry_block();

        let int_keys = matches!(self.keys.first(), Some(CaseKey::Int(_)));
        if int_keys {
            let next = MethodRef::new(
                TypeName::class("com/example/Registry"),
                "next",
                Proto::new(TypeName::int(), vec![]),
            );
            cfg.push(
                root,
                Insn::InvokeStatic {
                    method: next,
                    args: vec![],
                },
            )
            .unwrap();
            cfg.push(root, Insn::MoveResult { dest: discriminant })
                .unwrap();
        } else {
            let field = FieldRef::new(
                TypeName::class("com/example/Registry"),
                "kind",
                TypeName::java_class(),
            );
            cfg.push(
                root,
                Insn::SGetObject {
                    dest: discriminant,
                    field,
                },
            )
            .unwrap();
        }

        let mut chain = vec![root];
        for _ in 1..self.keys.len() {
            chain.push(cfg.create_block());
        }
        let leaves: Vec<BlockId> = self.keys.iter().map(|_| cfg.create_block()).collect();
        let default = cfg.create_block();

        for (i, key) in self.keys.iter().enumerate() {
            let block = chain[i];
            let target = if self.staged { staging } else { scratch };
            let load = match key {
                CaseKey::Class(ty) => Insn::ConstClass {
                    dest: target,
                    ty: ty.clone(),
                },
                CaseKey::Int(value) => Insn::Const {
                    dest: target,
                    literal: *value,
                },
            };
            cfg.push(block, load).unwrap();
            if self.staged {
                let stage = match key {
                    CaseKey::Class(_) => Insn::MoveObject {
                        dest: scratch,
                        src: staging,
                    },
                    CaseKey::Int(_) => Insn::Move {
                        dest: scratch,
                        src: staging,
                    },
                };
                cfg.push(block, stage).unwrap();
            }

            let next = chain.get(i + 1).copied().unwrap_or(default);
            if self.not_equal {
                let insn = Insn::IfNe {
                    left: discriminant,
                    right: scratch,
                };
                cfg.create_conditional(block, insn, leaves[i], next).unwrap();
            } else {
                let insn = Insn::IfEq {
                    left: discriminant,
                    right: scratch,
                };
                cfg.create_conditional(block, insn, next, leaves[i]).unwrap();
            }

            cfg.push(
                leaves[i],
                Insn::Const {
                    dest: result,
                    literal: 100 + i as i64,
                },
            )
            .unwrap();
            cfg.push(leaves[i], Insn::Return { src: result }).unwrap();
        }

        cfg.push(
            default,
            Insn::Const {
                dest: result,
                literal: -1,
            },
        )
        .unwrap();
        cfg.push(default, Insn::Return { src: result }).unwrap();

        Chain {
            cfg,
            discriminant,
            scratch,
            chain,
            leaves,
            default,
        }
    }
}

/// Reference of a static `()I` method.
pub fn method_ref(class: &str, name: &str) -> MethodRef {
    MethodRef::new(
        TypeName::class(class),
        name,
        Proto::new(TypeName::int(), vec![]),
    )
}

/// A public static `()I` method whose body is a chain over `classes`.
pub fn chain_method(class: &str, name: &str, classes: &[&str]) -> DexMethod {
    DexMethod::new(
        method_ref(class, name),
        AccessFlags::PUBLIC | AccessFlags::STATIC,
        ChainBuilder::new(classes).build().cfg,
    )
}

/// Six internal class names `com/example/k/K0` .. `K5`.
pub fn six_keys() -> Vec<String> {
    (0..6).map(|i| format!("com/example/k/K{i}")).collect()
}

/// External class declaring [`LOOKUP_METHOD`].
pub fn lookup_class() -> DexClass {
    let reference = MethodRef::parse(LOOKUP_METHOD).unwrap();
    let mut class = DexClass::external(reference.class.clone());
    class.add_method(DexMethod::abstract_method(
        reference,
        AccessFlags::PUBLIC | AccessFlags::STATIC,
    ));
    class
}

/// Classes for every key, so that they count as program classes.
pub fn key_classes(keys: &[String]) -> Vec<DexClass> {
    keys.iter()
        .map(|name| DexClass::new(TypeName::class(name)))
        .collect()
}

/// A one-container program holding `classes`, the key classes and the lookup routine.
pub fn program_with(classes: Vec<DexClass>, keys: &[String]) -> Program {
    let mut dex = DexFile::new("classes.dex");
    for class in classes.into_iter().chain(key_classes(keys)) {
        dex = dex.with_class(class);
    }
    let mut program = Program::new();
    program.add_container(dex);
    program.add_external(lookup_class());
    program
}
