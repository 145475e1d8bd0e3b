//! [`ReflectionFile`]: the query surface over one PHP file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitflags::bitflags;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use smol_str::SmolStr;

use super::handle::{Handle, Reflected};
use crate::error::{ReflectionError, Result};
use crate::index::{
    Constant, Declaration, DeclarationIndex, DeclarationKind, DeclarationKinds, IndexOptions,
    Indexer, Resolver, inspect,
};
use crate::syntax::{Token, tokenize};

bitflags! {
    /// How much a [`ReflectionFile`] may do beyond reading tokens.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ReflectionFlags: u8 {
        /// Evaluate constant initializers.
        const SAFE = 1 << 0;
        /// Return handles, computing details on first access.
        const AUTOLOADABLE = 1 << 1;
        /// Return handles, computing every declaration's details during
        /// the build.
        const LOADED = 1 << 2;
    }
}

impl ReflectionFlags {
    fn returns_handles(self) -> bool {
        self.intersects(Self::AUTOLOADABLE | Self::LOADED)
    }
}

/// A PHP source file and its lazily built declaration index.
///
/// Tokens and the index are each computed at most once. A build that
/// fails is reported to the caller and retried on the next query.
#[derive(Debug)]
pub struct ReflectionFile {
    path: Option<PathBuf>,
    source: Arc<str>,
    flags: ReflectionFlags,
    tokens: OnceCell<Vec<Token>>,
    index: OnceCell<DeclarationIndex>,
}

impl ReflectionFile {
    /// Read a file from disk. Nothing is tokenized yet.
    pub fn open(path: impl AsRef<Path>, flags: ReflectionFlags) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ReflectionError::Io {
            path: path.to_owned(),
            source,
        })?;
        let mut file = Self::from_source(source, flags);
        file.path = Some(path.to_owned());
        Ok(file)
    }

    pub fn from_source(source: impl Into<Arc<str>>, flags: ReflectionFlags) -> Self {
        Self {
            path: None,
            source: source.into(),
            flags,
            tokens: OnceCell::new(),
            index: OnceCell::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> ReflectionFlags {
        self.flags
    }

    /// The token stream, tokenized on first use.
    pub fn tokens(&self) -> &[Token] {
        self.tokens.get_or_init(|| tokenize(&self.source))
    }

    /// Build the declaration index if it has not been built yet.
    pub fn build(&self) -> Result<&DeclarationIndex> {
        self.index.get_or_try_init(|| {
            let tokens = self.tokens();
            let options = IndexOptions {
                evaluate_constants: self.flags.contains(ReflectionFlags::SAFE),
            };
            let index = Indexer::build(tokens, options).inspect_err(|err| {
                tracing::debug!(path = ?self.path, error = %err, "index build failed");
            })?;
            if self.flags.contains(ReflectionFlags::LOADED) {
                for declaration in index.all_declarations() {
                    declaration
                        .details
                        .get_or_init(|| inspect(tokens, declaration, &index));
                }
            }
            Ok(index)
        })
    }

    pub fn is_built(&self) -> bool {
        self.index.get().is_some()
    }

    // ------------------------------------------------------------------------
    // Namespaces and imports
    // ------------------------------------------------------------------------

    /// Declared namespace names in order. The global namespace is not listed.
    pub fn namespaces(&self) -> Result<Vec<&str>> {
        Ok(self.build()?.namespaces.keys().map(SmolStr::as_str).collect())
    }

    /// Class imports: alias → qualified name.
    pub fn uses(&self) -> Result<&IndexMap<SmolStr, SmolStr>> {
        Ok(&self.build()?.uses)
    }

    /// Target of a class import alias.
    pub fn use_target(&self, alias: &str) -> Result<&str> {
        self.build()?
            .uses
            .get(alias)
            .map(SmolStr::as_str)
            .ok_or_else(|| ReflectionError::not_found(DeclarationKind::Use, alias))
    }

    // ------------------------------------------------------------------------
    // Constants
    // ------------------------------------------------------------------------

    pub fn constants(&self) -> Result<&IndexMap<SmolStr, Constant>> {
        Ok(&self.build()?.constants)
    }

    pub fn constant(&self, name: &str) -> Result<&Constant> {
        let index = self.build()?;
        let qualified = name.trim_start_matches('\\');
        if let Some(constant) = index.constants.get(qualified) {
            return Ok(constant);
        }
        Resolver::new(index)
            .with_kinds(DeclarationKinds::CONSTANT)
            .resolve(name)
            .and_then(|resolved| index.constants.get(resolved.as_str()))
            .ok_or_else(|| ReflectionError::not_found(DeclarationKind::Constant, name))
    }

    pub fn has_constant(&self, name: &str) -> Result<bool> {
        match self.constant(name) {
            Ok(_) => Ok(true),
            Err(err) if err.is_lookup_failure() => Ok(false),
            Err(err) => Err(err),
        }
    }

    // ------------------------------------------------------------------------
    // Functions and class-likes
    // ------------------------------------------------------------------------

    pub fn functions(&self) -> Result<Vec<Reflected<'_>>> {
        self.declarations(DeclarationKind::Function)
    }

    pub fn function(&self, name: &str) -> Result<Reflected<'_>> {
        self.get(DeclarationKind::Function, name)
    }

    pub fn has_function(&self, name: &str) -> Result<bool> {
        self.has(DeclarationKind::Function, name)
    }

    pub fn interfaces(&self) -> Result<Vec<Reflected<'_>>> {
        self.declarations(DeclarationKind::Interface)
    }

    pub fn interface(&self, name: &str) -> Result<Reflected<'_>> {
        self.get(DeclarationKind::Interface, name)
    }

    pub fn has_interface(&self, name: &str) -> Result<bool> {
        self.has(DeclarationKind::Interface, name)
    }

    pub fn traits(&self) -> Result<Vec<Reflected<'_>>> {
        self.declarations(DeclarationKind::Trait)
    }

    pub fn trait_(&self, name: &str) -> Result<Reflected<'_>> {
        self.get(DeclarationKind::Trait, name)
    }

    pub fn has_trait(&self, name: &str) -> Result<bool> {
        self.has(DeclarationKind::Trait, name)
    }

    pub fn classes(&self) -> Result<Vec<Reflected<'_>>> {
        self.declarations(DeclarationKind::Class)
    }

    pub fn class(&self, name: &str) -> Result<Reflected<'_>> {
        self.get(DeclarationKind::Class, name)
    }

    pub fn has_class(&self, name: &str) -> Result<bool> {
        self.has(DeclarationKind::Class, name)
    }

    pub fn enums(&self) -> Result<Vec<Reflected<'_>>> {
        self.declarations(DeclarationKind::Enum)
    }

    pub fn enum_(&self, name: &str) -> Result<Reflected<'_>> {
        self.get(DeclarationKind::Enum, name)
    }

    pub fn has_enum(&self, name: &str) -> Result<bool> {
        self.has(DeclarationKind::Enum, name)
    }

    /// Every declaration of `kind`, in source order. `Use` and `Constant`
    /// have dedicated getters and yield nothing here.
    pub fn declarations(&self, kind: DeclarationKind) -> Result<Vec<Reflected<'_>>> {
        let index = self.build()?;
        Ok(index
            .declarations(kind)
            .into_iter()
            .flat_map(|map| map.values())
            .map(|declaration| self.reflect(index, declaration))
            .collect())
    }

    /// Resolve a name used in this file to its qualified form.
    pub fn qualified_name(&self, name: &str, kinds: DeclarationKinds) -> Result<SmolStr> {
        let index = self.build()?;
        Resolver::new(index)
            .with_kinds(kinds)
            .resolve(name)
            .ok_or_else(|| ReflectionError::Unresolved {
                kinds,
                name: SmolStr::new(name),
            })
    }

    fn get(&self, kind: DeclarationKind, name: &str) -> Result<Reflected<'_>> {
        let index = self.build()?;
        self.lookup(index, kind, name)
            .map(|declaration| self.reflect(index, declaration))
            .ok_or_else(|| ReflectionError::not_found(kind, name))
    }

    fn has(&self, kind: DeclarationKind, name: &str) -> Result<bool> {
        let index = self.build()?;
        Ok(self.lookup(index, kind, name).is_some())
    }

    /// Exact qualified name first, then the resolver restricted to `kind`.
    fn lookup<'i>(
        &self,
        index: &'i DeclarationIndex,
        kind: DeclarationKind,
        name: &str,
    ) -> Option<&'i Declaration> {
        let map = index.declarations(kind)?;
        if let Some(declaration) = map.get(name.trim_start_matches('\\')) {
            return Some(declaration);
        }
        let resolved = Resolver::new(index).with_kinds(kind.into()).resolve(name)?;
        map.get(resolved.as_str())
    }

    fn reflect<'f>(&'f self, index: &'f DeclarationIndex, declaration: &'f Declaration) -> Reflected<'f> {
        if !self.flags.returns_handles() {
            return Reflected::Name(&declaration.name);
        }
        let details = declaration
            .details
            .get_or_init(|| inspect(self.tokens(), declaration, index));
        Reflected::Handle(Handle::new(declaration, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_is_lazy_and_cached() {
        let file = ReflectionFile::from_source("<?php class A {}", ReflectionFlags::empty());
        assert!(!file.is_built());
        let first = file.build().unwrap() as *const DeclarationIndex;
        let second = file.build().unwrap() as *const DeclarationIndex;
        assert_eq!(first, second);
        assert!(file.is_built());
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let file = ReflectionFile::from_source("<?php const X;", ReflectionFlags::empty());
        assert!(file.build().is_err());
        assert!(!file.is_built());
        assert!(matches!(
            file.classes(),
            Err(ReflectionError::MalformedConstant { .. })
        ));
    }

    #[test]
    fn test_names_without_handle_flags() {
        let file = ReflectionFile::from_source("<?php class A {}", ReflectionFlags::SAFE);
        assert_eq!(file.class("A").unwrap(), Reflected::Name("A"));
    }

    #[test]
    fn test_autoloadable_computes_details_on_access() {
        let file = ReflectionFile::from_source(
            "<?php final class A { function run() {} }",
            ReflectionFlags::AUTOLOADABLE,
        );
        let index = file.build().unwrap();
        assert!(index.classes["A"].cached_details().is_none());

        let handle = file.class("A").unwrap().into_handle().unwrap();
        assert!(handle.is_final());
        assert_eq!(handle.methods(), ["run"]);
        assert!(index.classes["A"].cached_details().is_some());
    }

    #[test]
    fn test_loaded_computes_details_during_build() {
        let file = ReflectionFile::from_source(
            "<?php interface I {} class A implements I {}",
            ReflectionFlags::LOADED,
        );
        let index = file.build().unwrap();
        assert!(index.classes["A"].cached_details().is_some());
        assert!(index.interfaces["I"].cached_details().is_some());

        let handle = file.class("A").unwrap().into_handle().unwrap();
        assert_eq!(handle.interfaces(), ["I"]);
        assert!(file.interface("I").unwrap().handle().unwrap().is_abstract());
    }

    #[test]
    fn test_getters_resolve_short_names() {
        let file = ReflectionFile::from_source(
            "<?php namespace App; use Lib\\Remote as Alias; class Local {}",
            ReflectionFlags::empty(),
        );
        assert_eq!(file.class("Local").unwrap().name(), "App\\Local");
        assert_eq!(file.class("\\App\\Local").unwrap().name(), "App\\Local");
        assert!(!file.has_class("Alias").unwrap());
        assert_eq!(file.use_target("Alias").unwrap(), "Lib\\Remote");
        assert!(matches!(
            file.use_target("Nope"),
            Err(ReflectionError::NotFound { kind: DeclarationKind::Use, .. })
        ));
    }

    #[test]
    fn test_not_found_names_kind_and_name() {
        let file = ReflectionFile::from_source("<?php", ReflectionFlags::empty());
        let err = file.class("Y").unwrap_err();
        assert_eq!(err.to_string(), "class `Y` does not exist");
        let err = file.constant("X").unwrap_err();
        assert_eq!(err.to_string(), "constant `X` does not exist");
        assert!(!file.has_constant("X").unwrap());
    }

    #[test]
    fn test_qualified_name_unresolved() {
        let file = ReflectionFile::from_source("<?php", ReflectionFlags::empty());
        assert!(matches!(
            file.qualified_name("Ghost", DeclarationKinds::all()),
            Err(ReflectionError::Unresolved { .. })
        ));
        let err = file.qualified_name("Ghost", DeclarationKinds::TRAIT).unwrap_err();
        assert_eq!(err.to_string(), "cannot resolve trait `Ghost` to a qualified name");
    }
}
