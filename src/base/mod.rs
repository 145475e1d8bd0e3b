//! Foundation types shared by every layer.
//!
//! - [`FileId`] - handle for a file registered in a [`FileSet`](crate::project::FileSet)
//! - [`TextRange`], [`TextSize`] - byte positions of tokens
//! - [`LineIndex`] - byte offset to line number conversion
//!
//! This module has NO dependencies on other phpscope modules.

mod file_id;
mod span;

pub use file_id::FileId;
pub use span::{LineIndex, TextRange, TextSize, offset_size};

// Re-export text-size types for convenience
pub use text_size;
