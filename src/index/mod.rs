//! Declaration index for a single file.
//!
//! - [`Indexer`] builds a [`DeclarationIndex`] in one scope-tracking pass
//! - [`Resolver`] maps names used in the file to qualified names
//! - [`evaluate`] computes constant initializers in safe mode
//!
//! Type details ([`Details`]) are not part of the pass; they are computed per
//! declaration when a caller asks for them.

mod declaration;
mod details;
mod eval;
mod indexer;
mod resolve;
mod value;

pub use declaration::{
    Constant, ConstantValue, Declaration, DeclarationKind, DeclarationKinds, Details, Modifiers,
};
pub use eval::{EvalError, evaluate, evaluate_source};
pub use indexer::{DeclarationIndex, IndexOptions, Indexer};
pub use resolve::Resolver;
pub use value::{ArrayKey, Number, Value};

pub(crate) use details::inspect;
