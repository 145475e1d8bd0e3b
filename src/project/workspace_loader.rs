//! Directory loading into a shared [`FileSet`].

use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use super::FileSet;
use crate::base::FileId;
use crate::error::{ReflectionError, Result};
use crate::reflection::{ReflectionFile, ReflectionFlags};

/// What a [`WorkspaceLoader`] picks up and how it opens files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderOptions {
    /// File extensions to load, without the dot. Compared case-insensitively.
    pub extensions: Vec<String>,
    pub flags: ReflectionFlags,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["php".to_owned()],
            flags: ReflectionFlags::empty(),
        }
    }
}

/// Loads PHP files from disk into a [`FileSet`], indexing them in parallel.
#[derive(Clone, Debug, Default)]
pub struct WorkspaceLoader {
    options: LoaderOptions,
}

impl WorkspaceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Loads every matching file under `path` into `files`.
    ///
    /// Files that load are registered even when others fail; the failures
    /// are reported together. Returns the number of files registered.
    pub fn load_directory(&self, path: impl AsRef<Path>, files: &FileSet) -> Result<usize> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(ReflectionError::Io {
                path: path.to_owned(),
                source: io::Error::new(io::ErrorKind::NotFound, "directory not found"),
            });
        }

        let paths = self.collect_file_paths(path);
        let flags = self.options.flags;
        // Parse files in parallel
        let results: Vec<_> = paths
            .par_iter()
            .map(|path| (path, load_and_build(path, flags)))
            .collect();

        let mut loaded = 0;
        let mut errors = Vec::new();
        for (path, result) in results {
            match result {
                Ok(file) => {
                    files.insert(path, file);
                    loaded += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "file skipped");
                    errors.push(format!("{}: {}", path.display(), err));
                }
            }
        }
        tracing::debug!(
            root = %path.display(),
            loaded,
            failed = errors.len(),
            "workspace directory loaded"
        );

        if errors.is_empty() {
            Ok(loaded)
        } else {
            Err(ReflectionError::Load {
                count: errors.len(),
                details: errors.join("\n  "),
            })
        }
    }

    /// Loads and indexes a single file.
    pub fn load_file(&self, path: impl AsRef<Path>, files: &FileSet) -> Result<FileId> {
        let path = path.as_ref();
        let file = load_and_build(path, self.options.flags)?;
        Ok(files.insert(path, file))
    }

    /// Matching files under `dir`, sorted by name within each directory.
    fn collect_file_paths(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "unreadable directory entry skipped");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.matches(entry.path()))
            .map(|entry| entry.into_path())
            .collect()
    }

    fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.options
                    .extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

fn load_and_build(path: &Path, flags: ReflectionFlags) -> Result<ReflectionFile> {
    let file = ReflectionFile::open(path, flags)?;
    file.build()?;
    Ok(file)
}
