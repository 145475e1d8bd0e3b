//! Single-pass lexical scope tracking over a token stream.
//!
//! [`ScopeVisitor`] walks tokens once and keeps a stack of open [`Scope`]s,
//! reporting every scope start and end to a [`ScopeListener`]. It knows
//! nothing about correct PHP: it balances braces and declaration
//! terminators heuristically and closes whatever is left open at the end of
//! the stream.

mod scope;
mod visitor;

pub use scope::{Delimiter, Entity, EntityKind, Scope};
pub use visitor::{ScopeEvent, ScopeListener, ScopeVisitor, Silent, VisitorView};
