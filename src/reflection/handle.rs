//! Query results: a bare name or a handle carrying declaration details.

use smol_str::SmolStr;

use crate::index::{Declaration, DeclarationKind, Details, Modifiers};

/// A declaration returned by a [`ReflectionFile`](super::ReflectionFile)
/// getter.
///
/// Files opened without `AUTOLOADABLE` or `LOADED` only report names.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reflected<'f> {
    Name(&'f str),
    Handle(Handle<'f>),
}

impl<'f> Reflected<'f> {
    /// Qualified name, whichever form this is.
    pub fn name(&self) -> &'f str {
        match *self {
            Reflected::Name(name) => name,
            Reflected::Handle(handle) => handle.name(),
        }
    }

    pub fn handle(&self) -> Option<&Handle<'f>> {
        match self {
            Reflected::Name(_) => None,
            Reflected::Handle(handle) => Some(handle),
        }
    }

    pub fn into_handle(self) -> Option<Handle<'f>> {
        match self {
            Reflected::Name(_) => None,
            Reflected::Handle(handle) => Some(handle),
        }
    }
}

/// Introspection handle for a class-like or function declaration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Handle<'f> {
    declaration: &'f Declaration,
    details: &'f Details,
}

impl<'f> Handle<'f> {
    pub(crate) fn new(declaration: &'f Declaration, details: &'f Details) -> Self {
        Self { declaration, details }
    }

    pub fn declaration(&self) -> &'f Declaration {
        self.declaration
    }

    pub fn details(&self) -> &'f Details {
        self.details
    }

    pub fn name(&self) -> &'f str {
        &self.declaration.name
    }

    pub fn short_name(&self) -> &'f str {
        &self.declaration.short_name
    }

    pub fn namespace(&self) -> Option<&'f str> {
        self.declaration.namespace.as_deref()
    }

    pub fn kind(&self) -> DeclarationKind {
        self.declaration.kind
    }

    pub fn line(&self) -> u32 {
        self.declaration.line
    }

    pub fn is_abstract(&self) -> bool {
        self.details.modifiers.contains(Modifiers::ABSTRACT)
            || self.declaration.kind == DeclarationKind::Interface
    }

    pub fn is_final(&self) -> bool {
        self.details.modifiers.contains(Modifiers::FINAL)
    }

    /// Parent class. Interfaces may extend several; see [`Handle::interfaces`].
    pub fn parent(&self) -> Option<&'f str> {
        match self.declaration.kind {
            DeclarationKind::Class => self.details.extends.first().map(SmolStr::as_str),
            _ => None,
        }
    }

    /// Implemented interfaces, or extended ones for an interface.
    pub fn interfaces(&self) -> &'f [SmolStr] {
        match self.declaration.kind {
            DeclarationKind::Interface => &self.details.extends,
            _ => &self.details.implements,
        }
    }

    pub fn traits(&self) -> &'f [SmolStr] {
        &self.details.traits
    }

    pub fn methods(&self) -> &'f [SmolStr] {
        &self.details.methods
    }

    /// Method names compare case-insensitively, as in PHP.
    pub fn has_method(&self, name: &str) -> bool {
        self.details.has_method(name)
    }

    pub fn constants(&self) -> &'f [SmolStr] {
        &self.details.constants
    }

    pub fn properties(&self) -> &'f [SmolStr] {
        &self.details.properties
    }

    pub fn parameters(&self) -> &'f [SmolStr] {
        &self.details.parameters
    }
}
