//! # phpscope
//!
//! Scope-tracking scanner and declaration index for PHP source files.
//!
//! A [`ReflectionFile`] tokenizes a file once, walks the tokens once with a
//! [`ScopeVisitor`](scope::ScopeVisitor), and indexes the namespaces,
//! imports, constants, functions, interfaces, traits, classes and enums it
//! declares. Nothing is executed and no syntax tree is built.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! project     → FileSet + WorkspaceLoader (many files, parallel load)
//!   ↓
//! reflection  → ReflectionFile (lazy build, queries, flags)
//!   ↓
//! index       → Indexer, constant evaluator, details, Resolver
//!   ↓
//! scope       → ScopeVisitor (single-pass scope stack)
//!   ↓
//! syntax      → Lexer producing an indexable token stream
//!   ↓
//! base        → Primitives (FileId, TextRange, LineIndex)
//! ```
//!
//! ## Example
//!
//! ```
//! use phpscope::{DeclarationKinds, ReflectionFile, ReflectionFlags};
//!
//! let file = ReflectionFile::from_source(
//!     "<?php namespace Food\\Fruit; use Vendor\\Basket as B; class Apple {}",
//!     ReflectionFlags::empty(),
//! );
//! assert_eq!(file.namespaces()?, ["Food\\Fruit"]);
//! assert!(file.has_class("Apple")?);
//! assert_eq!(file.qualified_name("B", DeclarationKinds::all())?, "Vendor\\Basket");
//! # Ok::<(), phpscope::ReflectionError>(())
//! ```

/// Foundation types: FileId, TextRange, LineIndex
pub mod base;

/// Error type shared by every layer
pub mod error;

/// Declaration index, constant evaluation and name resolution
pub mod index;

/// Multi-file workspaces
pub mod project;

/// Per-file query API
pub mod reflection;

/// Scope tracking over token streams
pub mod scope;

/// PHP tokenizer
pub mod syntax;

// Re-export the types most callers need
pub use base::{FileId, LineIndex, TextRange, TextSize};
pub use error::{ReflectionError, Result};
pub use index::{
    Constant, ConstantValue, Declaration, DeclarationKind, DeclarationKinds, Details, Resolver,
    Value,
};
pub use project::{FileSet, LoaderOptions, WorkspaceLoader};
pub use reflection::{Handle, Reflected, ReflectionFile, ReflectionFlags};
