//! Methods and their access flags.

use bitflags::bitflags;

use crate::{analysis::ControlFlowGraph, metadata::MethodRef};

bitflags! {
    /// Method access flags, with the bit values of the dex format.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        /// Visible everywhere.
        const PUBLIC = 0x0001;
        /// Visible only to the defining class.
        const PRIVATE = 0x0002;
        /// Visible to the package and subclasses.
        const PROTECTED = 0x0004;
        /// Not called with a receiver.
        const STATIC = 0x0008;
        /// Cannot be overridden.
        const FINAL = 0x0010;
        /// Holds a monitor for the duration of the call.
        const SYNCHRONIZED = 0x0020;
        /// Not present in the source.
        const SYNTHETIC = 0x1000;
        /// Constructor.
        const CONSTRUCTOR = 0x10000;
    }
}

/// A method definition, optionally carrying code.
#[derive(Debug, Clone)]
pub struct DexMethod {
    /// The method's identity.
    pub reference: MethodRef,
    /// Access flags.
    pub access: AccessFlags,
    /// The method body, `None` for abstract and native methods.
    pub code: Option<ControlFlowGraph>,
    /// Set when no optimization pass may touch this method.
    pub no_optimizations: bool,
    /// Set for methods created by the optimizer itself.
    pub generated: bool,
}

impl DexMethod {
    /// Creates a method definition with code.
    #[must_use]
    pub fn new(reference: MethodRef, access: AccessFlags, code: ControlFlowGraph) -> Self {
        DexMethod {
            reference,
            access,
            code: Some(code),
            no_optimizations: false,
            generated: false,
        }
    }

    /// Creates a method definition without a body.
    #[must_use]
    pub fn abstract_method(reference: MethodRef, access: AccessFlags) -> Self {
        DexMethod {
            reference,
            access,
            code: None,
            no_optimizations: false,
            generated: false,
        }
    }

    /// Returns the method body, if any.
    #[must_use]
    pub fn code(&self) -> Option<&ControlFlowGraph> {
        self.code.as_ref()
    }

    /// Replaces the method body, returning the previous one.
    pub fn set_code(&mut self, code: ControlFlowGraph) -> Option<ControlFlowGraph> {
        self.code.replace(code)
    }
}
