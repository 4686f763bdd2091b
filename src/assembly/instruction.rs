//! Register-based instruction model.
//!
//! Instructions operate on numbered, method-local registers. Branch targets are not part of
//! the instruction itself; they are carried by the typed edges of the control-flow graph that
//! owns the block (see [`crate::analysis::cfg`]). A conditional branch therefore has exactly
//! two successors (the taken `Branch` edge and the `Goto` fall-through) and a switch has one
//! `Branch` edge per case plus an optional `Goto` default.
//!
//! Results of invocations are picked up by a following `move-result` instruction, as in the
//! dex format. Constant loads and allocations write their destination directly.

use std::{fmt, sync::Arc};

use strum::IntoStaticStr;

use crate::metadata::{FieldRef, MethodRef, TypeName};

/// A method-local register number.
pub type Reg = u32;

/// A single instruction.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Insn {
    /// `dest = literal`
    Const {
        /// Destination register.
        dest: Reg,
        /// Literal value.
        literal: i64,
    },
    /// `dest = "value"`
    ConstString {
        /// Destination register.
        dest: Reg,
        /// String constant.
        value: Arc<str>,
    },
    /// `dest = Type.class`
    ConstClass {
        /// Destination register.
        dest: Reg,
        /// Loaded class.
        ty: TypeName,
    },
    /// `dest = src` for primitives.
    Move {
        /// Destination register.
        dest: Reg,
        /// Source register.
        src: Reg,
    },
    /// `dest = src` for references.
    MoveObject {
        /// Destination register.
        dest: Reg,
        /// Source register.
        src: Reg,
    },
    /// Picks up the primitive result of the preceding invocation.
    MoveResult {
        /// Destination register.
        dest: Reg,
    },
    /// Picks up the reference result of the preceding invocation.
    MoveResultObject {
        /// Destination register.
        dest: Reg,
    },
    /// `dest = src + literal`
    #[strum(serialize = "add-int/lit")]
    AddIntLit {
        /// Destination register.
        dest: Reg,
        /// Source register.
        src: Reg,
        /// Addend.
        literal: i32,
    },
    /// `dest = object.field`
    #[strum(serialize = "iget-object")]
    IGetObject {
        /// Destination register.
        dest: Reg,
        /// Receiver register.
        object: Reg,
        /// Loaded field.
        field: FieldRef,
    },
    /// `dest = Class.field`
    #[strum(serialize = "sget-object")]
    SGetObject {
        /// Destination register.
        dest: Reg,
        /// Loaded field.
        field: FieldRef,
    },
    /// `dest = new Type` (uninitialized).
    NewInstance {
        /// Destination register.
        dest: Reg,
        /// Allocated type.
        ty: TypeName,
    },
    /// Static call.
    InvokeStatic {
        /// Callee.
        method: MethodRef,
        /// Argument registers.
        args: Vec<Reg>,
    },
    /// Non-virtual instance call (constructors, private methods).
    InvokeDirect {
        /// Callee.
        method: MethodRef,
        /// Argument registers, receiver first.
        args: Vec<Reg>,
    },
    /// Virtual call.
    InvokeVirtual {
        /// Callee.
        method: MethodRef,
        /// Argument registers, receiver first.
        args: Vec<Reg>,
    },
    /// Branch if `left == right`.
    IfEq {
        /// Left operand.
        left: Reg,
        /// Right operand.
        right: Reg,
    },
    /// Branch if `left != right`.
    IfNe {
        /// Left operand.
        left: Reg,
        /// Right operand.
        right: Reg,
    },
    /// Branch if `left >= right`.
    IfGe {
        /// Left operand.
        left: Reg,
        /// Right operand.
        right: Reg,
    },
    /// Branch if `src == 0` / `src == null`.
    IfEqz {
        /// Tested register.
        src: Reg,
    },
    /// Branch if `src != 0` / `src != null`.
    IfNez {
        /// Tested register.
        src: Reg,
    },
    /// Multi-way branch on an integer.
    Switch {
        /// Switched register.
        src: Reg,
    },
    /// Return from a `void` method.
    ReturnVoid,
    /// Return a primitive.
    Return {
        /// Returned register.
        src: Reg,
    },
    /// Return a reference.
    ReturnObject {
        /// Returned register.
        src: Reg,
    },
    /// Throw the exception in `src`.
    Throw {
        /// Exception register.
        src: Reg,
    },
}

impl Insn {
    /// Returns the dex mnemonic, e.g. `const-class` or `if-eq`.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Returns the register written by this instruction, if any.
    #[must_use]
    pub fn dest(&self) -> Option<Reg> {
        match self {
            Self::Const { dest, .. }
            | Self::ConstString { dest, .. }
            | Self::ConstClass { dest, .. }
            | Self::Move { dest, .. }
            | Self::MoveObject { dest, .. }
            | Self::MoveResult { dest }
            | Self::MoveResultObject { dest }
            | Self::AddIntLit { dest, .. }
            | Self::IGetObject { dest, .. }
            | Self::SGetObject { dest, .. }
            | Self::NewInstance { dest, .. } => Some(*dest),
            _ => None,
        }
    }

    /// Returns the registers read by this instruction.
    #[must_use]
    pub fn uses(&self) -> Vec<Reg> {
        match self {
            Self::Const { .. }
            | Self::ConstString { .. }
            | Self::ConstClass { .. }
            | Self::MoveResult { .. }
            | Self::MoveResultObject { .. }
            | Self::SGetObject { .. }
            | Self::NewInstance { .. }
            | Self::ReturnVoid => vec![],

            Self::Move { src, .. }
            | Self::MoveObject { src, .. }
            | Self::AddIntLit { src, .. }
            | Self::IfEqz { src }
            | Self::IfNez { src }
            | Self::Switch { src }
            | Self::Return { src }
            | Self::ReturnObject { src }
            | Self::Throw { src } => vec![*src],

            Self::IGetObject { object, .. } => vec![*object],

            Self::IfEq { left, right } | Self::IfNe { left, right } | Self::IfGe { left, right } => {
                vec![*left, *right]
            }

            Self::InvokeStatic { args, .. }
            | Self::InvokeDirect { args, .. }
            | Self::InvokeVirtual { args, .. } => args.clone(),
        }
    }

    /// Returns `true` for conditional branches (`if-*`).
    #[must_use]
    pub fn is_conditional_branch(&self) -> bool {
        matches!(
            self,
            Self::IfEq { .. }
                | Self::IfNe { .. }
                | Self::IfGe { .. }
                | Self::IfEqz { .. }
                | Self::IfNez { .. }
        )
    }

    /// Returns `true` for `if-eq` and `if-ne`, the comparisons of two registers for identity.
    #[must_use]
    pub fn is_equality_branch(&self) -> bool {
        matches!(self, Self::IfEq { .. } | Self::IfNe { .. })
    }

    /// Returns `true` for any instruction with branch edges (`if-*` and `switch`).
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.is_conditional_branch() || matches!(self, Self::Switch { .. })
    }

    /// Returns `true` for instructions that never fall through to a successor.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            Self::ReturnVoid | Self::Return { .. } | Self::ReturnObject { .. } | Self::Throw { .. }
        )
    }

    /// Returns `true` for instructions that may only appear last in a block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.is_branch() || self.is_exit()
    }

    /// Returns `true` for side-effect free constant loads.
    #[must_use]
    pub fn is_const_load(&self) -> bool {
        matches!(
            self,
            Self::Const { .. } | Self::ConstString { .. } | Self::ConstClass { .. }
        )
    }

    /// Returns `true` for `const-class`.
    #[must_use]
    pub fn is_const_class(&self) -> bool {
        matches!(self, Self::ConstClass { .. })
    }

    /// Returns the callee of an invocation.
    #[must_use]
    pub fn callee(&self) -> Option<&MethodRef> {
        match self {
            Self::InvokeStatic { method, .. }
            | Self::InvokeDirect { method, .. }
            | Self::InvokeVirtual { method, .. } => Some(method),
            _ => None,
        }
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.mnemonic();
        match self {
            Self::Const { dest, literal } => write!(f, "{name} v{dest}, {literal}"),
            Self::ConstString { dest, value } => write!(f, "{name} v{dest}, {value:?}"),
            Self::ConstClass { dest, ty } | Self::NewInstance { dest, ty } => {
                write!(f, "{name} v{dest}, {ty}")
            }
            Self::Move { dest, src } | Self::MoveObject { dest, src } => {
                write!(f, "{name} v{dest}, v{src}")
            }
            Self::MoveResult { dest } | Self::MoveResultObject { dest } => {
                write!(f, "{name} v{dest}")
            }
            Self::AddIntLit { dest, src, literal } => write!(f, "{name} v{dest}, v{src}, {literal}"),
            Self::IGetObject {
                dest,
                object,
                field,
            } => write!(f, "{name} v{dest}, v{object}, {field}"),
            Self::SGetObject { dest, field } => write!(f, "{name} v{dest}, {field}"),
            Self::InvokeStatic { method, args }
            | Self::InvokeDirect { method, args }
            | Self::InvokeVirtual { method, args } => {
                let regs: Vec<String> = args.iter().map(|r| format!("v{r}")).collect();
                write!(f, "{name} {{{}}}, {method}", regs.join(", "))
            }
            Self::IfEq { left, right } | Self::IfNe { left, right } | Self::IfGe { left, right } => {
                write!(f, "{name} v{left}, v{right}")
            }
            Self::IfEqz { src }
            | Self::IfNez { src }
            | Self::Switch { src }
            | Self::Return { src }
            | Self::ReturnObject { src }
            | Self::Throw { src } => write!(f, "{name} v{src}"),
            Self::ReturnVoid => f.write_str(name),
        }
    }
}
