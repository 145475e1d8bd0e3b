//! Many files at once: a shared [`FileSet`] and a parallel [`WorkspaceLoader`].

mod file_set;
mod workspace_loader;

pub use file_set::FileSet;
pub use workspace_loader::{LoaderOptions, WorkspaceLoader};
