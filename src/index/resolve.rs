//! Short name → qualified name resolution.

use smol_str::SmolStr;

use super::declaration::DeclarationKinds;
use super::indexer::DeclarationIndex;

/// Resolves names referenced inside a file against that file's index.
///
/// Lookup order:
/// 1. a leading `\` means the name is already qualified;
/// 2. `use` aliases for the requested kinds, including a qualified name
///    whose first segment is an imported namespace;
/// 3. each declared namespace in order;
/// 4. the bare name, for files without a namespace.
#[derive(Clone, Copy, Debug)]
pub struct Resolver<'i> {
    index: &'i DeclarationIndex,
    kinds: DeclarationKinds,
}

impl<'i> Resolver<'i> {
    /// A resolver searching every declaration kind.
    pub fn new(index: &'i DeclarationIndex) -> Self {
        Self {
            index,
            kinds: DeclarationKinds::all(),
        }
    }

    /// Restrict resolution to `kinds`. An empty set means all kinds.
    pub fn with_kinds(mut self, kinds: DeclarationKinds) -> Self {
        self.kinds = if kinds.is_empty() {
            DeclarationKinds::all()
        } else {
            kinds
        };
        self
    }

    pub fn kinds(&self) -> DeclarationKinds {
        self.kinds
    }

    pub fn resolve(&self, name: &str) -> Option<SmolStr> {
        if let Some(qualified) = name.strip_prefix('\\') {
            return Some(SmolStr::new(qualified));
        }
        if name.is_empty() {
            return None;
        }

        if let Some(target) = self.alias(name) {
            tracing::trace!(name, %target, "resolved through use alias");
            return Some(target);
        }

        for namespace in self.index.namespaces.keys() {
            let candidate = format!("{namespace}\\{name}");
            if self.index.contains(self.kinds, &candidate) {
                tracing::trace!(name, %namespace, "resolved in declared namespace");
                return Some(SmolStr::new(candidate));
            }
        }

        if self.index.contains(self.kinds, name) {
            tracing::trace!(name, "resolved as global name");
            return Some(SmolStr::new(name));
        }

        tracing::trace!(name, kinds = ?self.kinds, "unresolved");
        None
    }

    fn alias(&self, name: &str) -> Option<SmolStr> {
        match name.split_once('\\') {
            None => self
                .index
                .alias_tables(self.kinds)
                .find_map(|table| table.get(name))
                .cloned(),
            // Namespace imports live in the class table whatever is resolved.
            Some((first, rest)) => self
                .index
                .uses
                .get(first)
                .map(|prefix| SmolStr::new(format!("{prefix}\\{rest}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexOptions, Indexer};
    use crate::syntax::tokenize;

    fn index(source: &str) -> DeclarationIndex {
        Indexer::build(&tokenize(source), IndexOptions::default()).unwrap()
    }

    #[test]
    fn test_leading_separator_is_stripped() {
        let idx = index("<?php");
        assert_eq!(Resolver::new(&idx).resolve("\\Foo\\Bar").as_deref(), Some("Foo\\Bar"));
    }

    #[test]
    fn test_alias_wins_over_namespace() {
        let idx = index("<?php namespace App; use Vendor\\Lib\\Thing; class Thing {}");
        let resolver = Resolver::new(&idx);
        assert_eq!(resolver.resolve("Thing").as_deref(), Some("Vendor\\Lib\\Thing"));
    }

    #[test]
    fn test_alias_prefix_expands_first_segment() {
        let idx = index("<?php use Vendor\\Lib as L;");
        let resolver = Resolver::new(&idx).with_kinds(DeclarationKinds::CLASS);
        assert_eq!(resolver.resolve("L\\Sub\\Thing").as_deref(), Some("Vendor\\Lib\\Sub\\Thing"));
    }

    #[test]
    fn test_namespaces_are_tried_in_order() {
        let idx = index("<?php namespace A { class Only {} } namespace B { class Only {} function f() {} }");
        let resolver = Resolver::new(&idx);
        assert_eq!(resolver.resolve("Only").as_deref(), Some("A\\Only"));
        assert_eq!(resolver.resolve("f").as_deref(), Some("B\\f"));
    }

    #[test]
    fn test_kind_restriction() {
        let idx = index("<?php namespace N; function helper() {} use function Other\\fn_alias;");
        let classes = Resolver::new(&idx).with_kinds(DeclarationKinds::CLASS_LIKE);
        assert_eq!(classes.resolve("helper"), None);
        assert_eq!(classes.resolve("fn_alias"), None);

        let functions = Resolver::new(&idx).with_kinds(DeclarationKinds::FUNCTION);
        assert_eq!(functions.resolve("helper").as_deref(), Some("N\\helper"));
        assert_eq!(functions.resolve("fn_alias").as_deref(), Some("Other\\fn_alias"));
    }

    #[test]
    fn test_global_fallback_and_miss() {
        let idx = index("<?php class Plain {}");
        let resolver = Resolver::new(&idx);
        assert_eq!(resolver.resolve("Plain").as_deref(), Some("Plain"));
        assert_eq!(resolver.resolve("Missing"), None);
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn test_empty_kind_set_searches_everything() {
        let idx = index("<?php const LIMIT = 3;");
        let resolver = Resolver::new(&idx).with_kinds(DeclarationKinds::empty());
        assert_eq!(resolver.kinds(), DeclarationKinds::all());
        assert_eq!(resolver.resolve("LIMIT").as_deref(), Some("LIMIT"));
    }
}
