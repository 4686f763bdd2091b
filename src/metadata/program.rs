//! Whole-program container model.
//!
//! A [`Program`] is an ordered list of [`DexFile`] containers, each an ordered list of classes
//! that are linked into one physical output file. Classes defined outside the program (for
//! example platform classes) are registered separately as external classes; they can be
//! resolved but never belong to a container.

use std::collections::HashMap;

use crate::metadata::{DexClass, DexMethod, MethodRef, TypeName};

/// One physical output container.
#[derive(Debug, Clone, Default)]
pub struct DexFile {
    /// Human readable name, e.g. `classes2.dex`.
    pub name: String,
    /// Classes in output order.
    pub classes: Vec<DexClass>,
}

impl DexFile {
    /// Creates an empty container.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        DexFile {
            name: name.into(),
            classes: Vec::new(),
        }
    }

    /// Adds a class, builder style.
    #[must_use]
    pub fn with_class(mut self, class: DexClass) -> Self {
        self.classes.push(class);
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum ClassLocation {
    Container { dex: usize, index: usize },
    External(usize),
}

/// The whole program under optimization.
#[derive(Debug, Clone, Default)]
pub struct Program {
    containers: Vec<DexFile>,
    externals: Vec<DexClass>,
    index: HashMap<TypeName, ClassLocation>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a container. Classes already known by name keep their first definition.
    pub fn add_container(&mut self, dex: DexFile) {
        let dex_idx = self.containers.len();
        for (index, class) in dex.classes.iter().enumerate() {
            self.index
                .entry(class.name.clone())
                .or_insert(ClassLocation::Container {
                    dex: dex_idx,
                    index,
                });
        }
        self.containers.push(dex);
    }

    /// Registers a class defined outside the program.
    pub fn add_external(&mut self, mut class: DexClass) {
        class.external = true;
        self.index
            .entry(class.name.clone())
            .or_insert(ClassLocation::External(self.externals.len()));
        self.externals.push(class);
    }

    /// Returns the containers in output order.
    #[must_use]
    pub fn containers(&self) -> &[DexFile] {
        &self.containers
    }

    /// Resolves a class, internal or external.
    #[must_use]
    pub fn class(&self, name: &TypeName) -> Option<&DexClass> {
        match *self.index.get(name)? {
            ClassLocation::Container { dex, index } => self.containers[dex].classes.get(index),
            ClassLocation::External(index) => self.externals.get(index),
        }
    }

    /// Resolves a class owned by the program for modification.
    pub fn class_mut(&mut self, name: &TypeName) -> Option<&mut DexClass> {
        match *self.index.get(name)? {
            ClassLocation::Container { dex, index } => {
                self.containers[dex].classes.get_mut(index)
            }
            ClassLocation::External(_) => None,
        }
    }

    /// Returns the index of the container defining `name`.
    #[must_use]
    pub fn container_of(&self, name: &TypeName) -> Option<usize> {
        match self.index.get(name)? {
            ClassLocation::Container { dex, .. } => Some(*dex),
            ClassLocation::External(_) => None,
        }
    }

    /// Returns `true` if `name` resolves to a class that is part of the program itself.
    #[must_use]
    pub fn is_internal_class(&self, name: &TypeName) -> bool {
        self.class(name).is_some_and(|class| !class.external)
    }

    /// Iterates over all methods of all program-owned classes, in container order.
    pub fn methods(&self) -> impl Iterator<Item = &DexMethod> + '_ {
        self.containers
            .iter()
            .flat_map(|dex| dex.classes.iter())
            .flat_map(|class| class.methods.iter())
    }

    /// Looks up a program-owned method definition.
    #[must_use]
    pub fn method(&self, reference: &MethodRef) -> Option<&DexMethod> {
        self.class(&reference.class)?.method(reference)
    }

    /// Looks up a program-owned method definition for modification.
    pub fn method_mut(&mut self, reference: &MethodRef) -> Option<&mut DexMethod> {
        self.class_mut(&reference.class)?.method_mut(reference)
    }

    /// Resolves a textual method reference against the declared methods of all known classes,
    /// external ones included.
    ///
    /// Returns `None` if the descriptor is malformed or nothing declares the method.
    #[must_use]
    pub fn resolve_method(&self, descriptor: &str) -> Option<MethodRef> {
        let reference = MethodRef::parse(descriptor).ok()?;
        self.class(&reference.class)?
            .method(&reference)
            .map(|method| method.reference.clone())
    }
}
