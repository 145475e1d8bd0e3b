//! PHP tokenization.
//!
//! [`tokenize`] turns a source file into an indexable, immutable token
//! stream. Everything above this layer reads tokens only.

mod lexer;
mod token;

pub use lexer::{tokenize, tokenize_code};
pub use token::{Token, TokenKind, next_significant, prev_significant};
