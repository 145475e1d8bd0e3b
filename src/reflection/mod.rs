//! Per-file reflection API.
//!
//! [`ReflectionFile`] owns a file's source, tokenizes it once and builds its
//! [`DeclarationIndex`](crate::index::DeclarationIndex) once, on first query.

mod file;
mod handle;

pub use file::{ReflectionFile, ReflectionFlags};
pub use handle::{Handle, Reflected};
