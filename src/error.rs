//! Error type shared by the whole crate.

use std::io;
use std::path::PathBuf;

use smol_str::SmolStr;
use thiserror::Error;

use crate::index::{DeclarationKind, DeclarationKinds, EvalError};

/// Everything that can go wrong while reading, indexing or querying a file.
///
/// Lookup failures are ordinary outcomes: they name the declaration kind and
/// the name that was asked for so tooling can report them as-is.
#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("cannot read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed constant declaration `{name}` at line {line}: expected {expected}")]
    MalformedConstant {
        name: SmolStr,
        line: u32,
        expected: &'static str,
    },

    #[error("cannot evaluate constant `{name}` at line {line}: {source}")]
    Evaluation {
        name: SmolStr,
        line: u32,
        #[source]
        source: EvalError,
    },

    #[error("{kind} `{name}` does not exist")]
    NotFound { kind: DeclarationKind, name: SmolStr },

    #[error("cannot resolve {kinds} `{name}` to a qualified name")]
    Unresolved {
        kinds: DeclarationKinds,
        name: SmolStr,
    },

    #[error("failed to load {count} file(s):\n  {details}")]
    Load { count: usize, details: String },
}

impl ReflectionError {
    pub(crate) fn not_found(kind: DeclarationKind, name: &str) -> Self {
        Self::NotFound {
            kind,
            name: SmolStr::new(name),
        }
    }

    /// Whether this is a definite "no such declaration" answer rather than
    /// a failure to read or index the file.
    pub fn is_lookup_failure(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Unresolved { .. })
    }
}

pub type Result<T, E = ReflectionError> = std::result::Result<T, E>;
