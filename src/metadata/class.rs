//! Class definitions.

use crate::metadata::{DexMethod, MethodRef, TypeName};

/// A class definition.
///
/// External classes are known to the optimizer (for example platform classes referenced by
/// the program) but are not part of the program's own output.
#[derive(Debug, Clone)]
pub struct DexClass {
    /// The class type.
    pub name: TypeName,
    /// `true` if the class is defined outside the program.
    pub external: bool,
    /// Declared methods, in declaration order.
    pub methods: Vec<DexMethod>,
}

impl DexClass {
    /// Creates an empty class owned by the program.
    #[must_use]
    pub fn new(name: TypeName) -> Self {
        DexClass {
            name,
            external: false,
            methods: Vec::new(),
        }
    }

    /// Creates an empty external class.
    #[must_use]
    pub fn external(name: TypeName) -> Self {
        DexClass {
            name,
            external: true,
            methods: Vec::new(),
        }
    }

    /// Adds a method to the class.
    pub fn add_method(&mut self, method: DexMethod) {
        self.methods.push(method);
    }

    /// Looks up a declared method.
    #[must_use]
    pub fn method(&self, reference: &MethodRef) -> Option<&DexMethod> {
        self.methods.iter().find(|m| &m.reference == reference)
    }

    /// Looks up a declared method for modification.
    pub fn method_mut(&mut self, reference: &MethodRef) -> Option<&mut DexMethod> {
        self.methods.iter_mut().find(|m| &m.reference == reference)
    }

    /// Returns `true` if any declared method carries the given name.
    #[must_use]
    pub fn has_method_named(&self, name: &str) -> bool {
        self.methods.iter().any(|m| &*m.reference.name == name)
    }

    /// Returns `base` if no method of this class has that name, otherwise the first of
    /// `base_1`, `base_2`, ... that is free.
    #[must_use]
    pub fn unique_method_name(&self, base: &str) -> String {
        if !self.has_method_named(base) {
            return base.to_string();
        }
        (1..)
            .map(|suffix| format!("{base}_{suffix}"))
            .find(|candidate| !self.has_method_named(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}
