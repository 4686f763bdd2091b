//! Type, field and method references.
//!
//! References are identified by their descriptor strings, exactly as they appear in a dex
//! container: `Lcom/example/Foo;` for classes, `[I` for arrays, `I` for primitives and
//! `Lcom/example/Foo;.bar:(ILjava/lang/String;)V` for methods.
//!
//! The derived orderings are the canonical orderings used throughout the optimizer. Classes
//! order by descriptor, methods by `(class, name, prototype)`. Any decision that must be
//! deterministic across runs (ordinal assignment, scheduling) is expressed in terms of these.

use std::{fmt, sync::Arc};

use crate::{Error, Result};

const PRIMITIVES: &[(char, &str)] = &[
    ('V', "void"),
    ('Z', "boolean"),
    ('B', "byte"),
    ('S', "short"),
    ('C', "char"),
    ('I', "int"),
    ('J', "long"),
    ('F', "float"),
    ('D', "double"),
];

/// A type descriptor such as `Lcom/example/Foo;`.
///
/// Cloning is cheap; the descriptor text is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Parses and validates a type descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if `descriptor` is not exactly one well-formed
    /// type descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        match split_type(descriptor) {
            Some((ty, "")) => Ok(ty),
            _ => Err(Error::InvalidReference(descriptor.to_string())),
        }
    }

    /// Creates a class type from a fully qualified internal name (`com/example/Foo`).
    #[must_use]
    pub fn class(internal_name: &str) -> Self {
        TypeName(Arc::from(format!("L{internal_name};")))
    }

    /// The primitive `int` type.
    #[must_use]
    pub fn int() -> Self {
        TypeName(Arc::from("I"))
    }

    /// The `void` type.
    #[must_use]
    pub fn void() -> Self {
        TypeName(Arc::from("V"))
    }

    /// `java.lang.String`.
    #[must_use]
    pub fn string() -> Self {
        TypeName::class("java/lang/String")
    }

    /// `java.lang.Class`.
    #[must_use]
    pub fn java_class() -> Self {
        TypeName::class("java/lang/Class")
    }

    /// `java.lang.RuntimeException`.
    #[must_use]
    pub fn runtime_exception() -> Self {
        TypeName::class("java/lang/RuntimeException")
    }

    /// Returns the raw descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.0
    }

    /// Returns `true` for class (object, non-array) types.
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.0.starts_with('L')
    }

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.0.starts_with('[')
    }

    /// Returns the name the runtime reports for this type, e.g. from `Class.getName()`.
    ///
    /// - `Lcom/example/Foo;` becomes `com.example.Foo`
    /// - `[Lcom/example/Foo;` becomes `[Lcom.example.Foo;`
    /// - primitives become their keyword (`I` becomes `int`)
    #[must_use]
    pub fn external_name(&self) -> String {
        let descriptor = self.descriptor();
        if self.is_array() {
            return descriptor.replace('/', ".");
        }
        if let Some(inner) = descriptor
            .strip_prefix('L')
            .and_then(|rest| rest.strip_suffix(';'))
        {
            return inner.replace('/', ".");
        }
        let mut chars = descriptor.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if let Some((_, keyword)) = PRIMITIVES.iter().find(|(p, _)| *p == c) {
                return (*keyword).to_string();
            }
        }
        descriptor.to_string()
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeName({})", self.0)
    }
}

/// Splits one type descriptor off the front of `input`.
///
/// Returns the parsed type and the remaining input, or `None` if the input does not start with
/// a well-formed descriptor.
fn split_type(input: &str) -> Option<(TypeName, &str)> {
    let first = input.chars().next()?;
    let len = match first {
        'L' => {
            let end = input.find(';')?;
            // `L;` names nothing
            if end < 2 {
                return None;
            }
            end + 1
        }
        '[' => {
            let (_, rest) = split_type(&input[1..])?;
            input.len() - rest.len()
        }
        c if PRIMITIVES.iter().any(|(p, _)| *p == c) => 1,
        _ => return None,
    };
    Some((TypeName(Arc::from(&input[..len])), &input[len..]))
}

/// A method prototype: return type plus argument types.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Proto {
    /// Return type.
    pub ret: TypeName,
    /// Argument types in declaration order, not including the receiver.
    pub args: Vec<TypeName>,
}

impl Proto {
    /// Creates a new prototype.
    #[must_use]
    pub fn new(ret: TypeName, args: Vec<TypeName>) -> Self {
        Proto { ret, args }
    }

    /// Parses a prototype descriptor such as `(ILjava/lang/String;)V`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if the descriptor is malformed.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || Error::InvalidReference(descriptor.to_string());

        let mut rest = descriptor.strip_prefix('(').ok_or_else(invalid)?;
        let mut args = Vec::new();
        while !rest.starts_with(')') {
            let (arg, tail) = split_type(rest).ok_or_else(invalid)?;
            if arg.descriptor() == "V" {
                return Err(invalid());
            }
            args.push(arg);
            rest = tail;
        }

        let ret = TypeName::parse(&rest[1..]).map_err(|_| invalid())?;
        Ok(Proto { ret, args })
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for arg in &self.args {
            write!(f, "{arg}")?;
        }
        write!(f, "){}", self.ret)
    }
}

impl fmt::Debug for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A reference to a field, `Lcls;.name:Ltype;`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct FieldRef {
    /// Declaring class.
    pub class: TypeName,
    /// Field name.
    pub name: Arc<str>,
    /// Field type.
    pub ty: TypeName,
}

impl FieldRef {
    /// Creates a new field reference.
    #[must_use]
    pub fn new(class: TypeName, name: &str, ty: TypeName) -> Self {
        FieldRef {
            class,
            name: Arc::from(name),
            ty,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.ty)
    }
}

/// A reference to a method, `Lcls;.name:(args)ret`.
///
/// The derived ordering compares class, then name, then prototype, which makes it a total
/// order over all methods of a program.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodRef {
    /// Declaring class.
    pub class: TypeName,
    /// Method name.
    pub name: Arc<str>,
    /// Method prototype.
    pub proto: Proto,
}

impl MethodRef {
    /// Creates a new method reference.
    #[must_use]
    pub fn new(class: TypeName, name: &str, proto: Proto) -> Self {
        MethodRef {
            class,
            name: Arc::from(name),
            proto,
        }
    }

    /// Parses a fully qualified method descriptor, e.g.
    /// `Lcom/example/Lookup;.find:(Ljava/lang/Object;Ljava/lang/String;I)I`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidReference`] if the descriptor is malformed.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let invalid = || Error::InvalidReference(descriptor.to_string());

        let (class, rest) = split_type(descriptor).ok_or_else(invalid)?;
        let rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        let (name, proto) = rest.split_once(':').ok_or_else(invalid)?;
        if name.is_empty() {
            return Err(invalid());
        }

        Ok(MethodRef {
            class,
            name: Arc::from(name),
            proto: Proto::parse(proto).map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.class, self.name, self.proto)
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodRef({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse() {
        assert!(TypeName::parse("Lcom/example/Foo;").is_ok());
        assert!(TypeName::parse("[[I").is_ok());
        assert!(TypeName::parse("I").is_ok());
        assert!(TypeName::parse("L;").is_err());
        assert!(TypeName::parse("Lcom/example/Foo").is_err());
        assert!(TypeName::parse("II").is_err());
        assert!(TypeName::parse("").is_err());
    }

    #[test]
    fn test_external_name() {
        assert_eq!(
            TypeName::class("com/example/Foo").external_name(),
            "com.example.Foo"
        );
        assert_eq!(
            TypeName::parse("[Lcom/example/Foo;").unwrap().external_name(),
            "[Lcom.example.Foo;"
        );
        assert_eq!(TypeName::int().external_name(), "int");
    }

    #[test]
    fn test_type_ordering_is_descriptor_order() {
        let a = TypeName::class("com/a/Zed");
        let b = TypeName::class("com/b/Alpha");
        assert!(a < b);
    }

    #[test]
    fn test_method_parse_roundtrip() {
        let text = "Lcom/example/Lookup;.find:(Ljava/lang/Object;Ljava/lang/String;I)I";
        let method = MethodRef::parse(text).unwrap();
        assert_eq!(method.class, TypeName::class("com/example/Lookup"));
        assert_eq!(&*method.name, "find");
        assert_eq!(method.proto.args.len(), 3);
        assert_eq!(method.proto.ret, TypeName::int());
        assert_eq!(method.to_string(), text);
    }

    #[test]
    fn test_method_parse_rejects_garbage() {
        assert!(MethodRef::parse("").is_err());
        assert!(MethodRef::parse("Lcom/Foo;.bar").is_err());
        assert!(MethodRef::parse("Lcom/Foo;.:()V").is_err());
        assert!(MethodRef::parse("Lcom/Foo;.bar:(V)V").is_err());
        assert!(MethodRef::parse("Lcom/Foo;.bar:(I").is_err());
    }

    #[test]
    fn test_method_ordering() {
        let proto = Proto::new(TypeName::void(), vec![]);
        let a = MethodRef::new(TypeName::class("A"), "z", proto.clone());
        let b = MethodRef::new(TypeName::class("B"), "a", proto.clone());
        let c = MethodRef::new(TypeName::class("B"), "b", proto);
        assert!(a < b);
        assert!(b < c);
    }
}
