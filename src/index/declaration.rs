//! Declaration records stored in the index.

use std::fmt;

use bitflags::bitflags;
use once_cell::sync::OnceCell;
use smol_str::SmolStr;

use super::value::Value;
use crate::scope::{EntityKind, Scope};

/// The kinds of declarations a file index tracks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Namespace,
    Use,
    Constant,
    Function,
    Interface,
    Trait,
    Class,
    Enum,
}

impl DeclarationKind {
    /// The kind indexed for declarations that open a scope.
    pub fn from_entity(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::File => None,
            EntityKind::Namespace => Some(Self::Namespace),
            EntityKind::Class => Some(Self::Class),
            EntityKind::Interface => Some(Self::Interface),
            EntityKind::Trait => Some(Self::Trait),
            EntityKind::Enum => Some(Self::Enum),
            EntityKind::Function => Some(Self::Function),
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Self::Namespace => "namespace",
            Self::Use => "use alias",
            Self::Constant => "constant",
            Self::Function => "function",
            Self::Interface => "interface",
            Self::Trait => "trait",
            Self::Class => "class",
            Self::Enum => "enum",
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

bitflags! {
    /// A set of declaration kinds a name may be resolved against.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct DeclarationKinds: u8 {
        const CONSTANT = 1 << 0;
        const FUNCTION = 1 << 1;
        const INTERFACE = 1 << 2;
        const TRAIT = 1 << 3;
        const CLASS = 1 << 4;
        const ENUM = 1 << 5;

        const CLASS_LIKE = Self::INTERFACE.bits()
            | Self::TRAIT.bits()
            | Self::CLASS.bits()
            | Self::ENUM.bits();
    }
}

impl From<DeclarationKind> for DeclarationKinds {
    fn from(kind: DeclarationKind) -> Self {
        match kind {
            DeclarationKind::Constant => Self::CONSTANT,
            DeclarationKind::Function => Self::FUNCTION,
            DeclarationKind::Interface => Self::INTERFACE,
            DeclarationKind::Trait => Self::TRAIT,
            DeclarationKind::Class => Self::CLASS,
            DeclarationKind::Enum => Self::ENUM,
            DeclarationKind::Namespace | DeclarationKind::Use => Self::empty(),
        }
    }
}

/// `class or interface`; `declaration` when every kind (or none) is asked for.
impl fmt::Display for DeclarationKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SINGLE: [(DeclarationKinds, DeclarationKind); 6] = [
            (DeclarationKinds::CONSTANT, DeclarationKind::Constant),
            (DeclarationKinds::FUNCTION, DeclarationKind::Function),
            (DeclarationKinds::INTERFACE, DeclarationKind::Interface),
            (DeclarationKinds::TRAIT, DeclarationKind::Trait),
            (DeclarationKinds::CLASS, DeclarationKind::Class),
            (DeclarationKinds::ENUM, DeclarationKind::Enum),
        ];
        if self.is_empty() || self.is_all() {
            return f.write_str("declaration");
        }
        let mut first = true;
        for (flag, kind) in SINGLE {
            if self.contains(flag) {
                if !first {
                    f.write_str(" or ")?;
                }
                f.write_str(kind.display())?;
                first = false;
            }
        }
        Ok(())
    }
}

bitflags! {
    /// Modifiers written before a class declaration.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const ABSTRACT = 1 << 0;
        const FINAL = 1 << 1;
        const READONLY = 1 << 2;
    }
}

/// A namespace, function, interface, trait, class or enum declaration.
#[derive(Clone, Debug)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// Fully qualified name without a leading separator.
    pub name: SmolStr,
    /// Name as written after the keyword.
    pub short_name: SmolStr,
    /// Enclosing namespace, `None` at file level or in the global namespace.
    pub namespace: Option<SmolStr>,
    /// Index of the declaring keyword token.
    pub token: usize,
    pub line: u32,
    /// The scope the declaration opened, closed.
    pub scope: Scope,
    pub(crate) details: OnceCell<Details>,
}

impl Declaration {
    /// Details computed so far, without triggering the computation.
    pub fn cached_details(&self) -> Option<&Details> {
        self.details.get()
    }
}

impl PartialEq for Declaration {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.token == other.token
            && self.scope == other.scope
    }
}

/// Introspection data for a class-like declaration or a function.
///
/// Names in `extends`, `implements` and `traits` are fully qualified.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Details {
    pub modifiers: Modifiers,
    pub extends: Vec<SmolStr>,
    pub implements: Vec<SmolStr>,
    pub traits: Vec<SmolStr>,
    pub methods: Vec<SmolStr>,
    /// Class constants and enum cases.
    pub constants: Vec<SmolStr>,
    /// Declared properties, without the `$`.
    pub properties: Vec<SmolStr>,
    /// Function parameters, without the `$`.
    pub parameters: Vec<SmolStr>,
}

impl Details {
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(name))
    }
}

/// The value recorded for a constant.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstantValue {
    /// Source text of the value expression.
    Raw(SmolStr),
    /// The evaluated expression (safe mode).
    Evaluated(Value),
}

impl ConstantValue {
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            Self::Evaluated(_) => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Raw(_) => None,
            Self::Evaluated(value) => Some(value),
        }
    }
}

/// A `const NAME = expr;` declaration at file or namespace level.
#[derive(Clone, Debug, PartialEq)]
pub struct Constant {
    /// Fully qualified name without a leading separator.
    pub name: SmolStr,
    pub short_name: SmolStr,
    pub namespace: Option<SmolStr>,
    /// Index of the name token.
    pub token: usize,
    pub line: u32,
    /// Source text of the value expression, trivia removed.
    pub source: SmolStr,
    pub value: ConstantValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(DeclarationKind::Use.to_string(), "use alias");
        assert_eq!(DeclarationKind::Enum.to_string(), "enum");
    }

    #[test]
    fn test_kinds_from_kind() {
        assert_eq!(
            DeclarationKinds::from(DeclarationKind::Trait),
            DeclarationKinds::TRAIT
        );
        assert!(DeclarationKinds::from(DeclarationKind::Namespace).is_empty());
        assert!(DeclarationKinds::CLASS_LIKE.contains(DeclarationKinds::ENUM));
        assert!(!DeclarationKinds::CLASS_LIKE.contains(DeclarationKinds::FUNCTION));
    }

    #[test]
    fn test_from_entity() {
        assert_eq!(DeclarationKind::from_entity(EntityKind::File), None);
        assert_eq!(
            DeclarationKind::from_entity(EntityKind::Interface),
            Some(DeclarationKind::Interface)
        );
    }

    #[test]
    fn test_constant_value_accessors() {
        let raw = ConstantValue::Raw(SmolStr::new("3"));
        assert_eq!(raw.as_raw(), Some("3"));
        assert_eq!(raw.as_value(), None);

        let evaluated = ConstantValue::Evaluated(Value::Int(3));
        assert_eq!(evaluated.as_value(), Some(&Value::Int(3)));
    }
}
