//! Scope frames and the declarations that open them.

use std::fmt;

/// What kind of declaration opened a scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// The implicit top-level scope opened by `<?php`.
    File,
    Namespace,
    Class,
    Interface,
    Trait,
    Enum,
    Function,
}

impl EntityKind {
    /// Contexts where a `function` keyword declares a function or method
    /// rather than a closure.
    pub fn hosts_functions(self) -> bool {
        !matches!(self, EntityKind::Function)
    }

    /// Contexts whose functions are free functions rather than methods.
    pub fn is_top_level(self) -> bool {
        matches!(self, EntityKind::File | EntityKind::Namespace)
    }

    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            EntityKind::Class | EntityKind::Interface | EntityKind::Trait | EntityKind::Enum
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::File => "file",
            EntityKind::Namespace => "namespace",
            EntityKind::Class => "class",
            EntityKind::Interface => "interface",
            EntityKind::Trait => "trait",
            EntityKind::Enum => "enum",
            EntityKind::Function => "function",
        };
        f.write_str(name)
    }
}

/// The token whose declaration opened a scope.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entity {
    /// Index of the keyword token (`class`, `namespace`, `<?php`, ...).
    pub token: usize,
    pub kind: EntityKind,
}

/// How a scope is delimited.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Delimiter {
    /// Opened by the file's open tag, closed at end of stream.
    File,
    /// `{ ... }`
    Brace,
    /// `namespace Foo;` up to the next namespace or end of stream.
    Terminator,
}

/// One lexical nesting level.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Nesting depth; 0 at file top level.
    pub level: u32,
    /// Index of the token that opened the scope.
    pub start: usize,
    /// Index of the token that closed the scope, set on exit.
    pub end: Option<usize>,
    /// Declaration that opened this scope; `None` for plain blocks.
    pub entity: Option<Entity>,
    /// Entity of the nearest enclosing scope that has one.
    pub parent_entity: Option<Entity>,
    pub delimiter: Delimiter,
}

impl Scope {
    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.entity.map(|e| e.kind)
    }

    pub fn parent_kind(&self) -> Option<EntityKind> {
        self.parent_entity.map(|e| e.kind)
    }

    /// The entity that governs code directly inside this scope: its own, or
    /// the enclosing one for plain blocks.
    pub fn context(&self) -> Option<Entity> {
        self.entity.or(self.parent_entity)
    }

    /// Whether `index` lies within the scope's delimiters.
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && self.end.is_none_or(|end| index <= end)
    }
}
