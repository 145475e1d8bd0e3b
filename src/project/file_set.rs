//! Registry of the files loaded into a workspace.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::base::FileId;
use crate::index::DeclarationKinds;
use crate::reflection::ReflectionFile;

/// Maps paths to stable [`FileId`]s and holds each file's reflection.
///
/// Shared freely between threads; ids are never reused within one set.
#[derive(Debug, Default)]
pub struct FileSet {
    inner: RwLock<FileSetInner>,
}

#[derive(Debug, Default)]
struct FileSetInner {
    /// Path → FileId mapping
    path_to_id: FxHashMap<PathBuf, FileId>,
    /// FileId → entry, in registration order
    files: IndexMap<FileId, Entry>,
    /// Next FileId to assign
    next_id: u32,
}

#[derive(Debug)]
struct Entry {
    path: PathBuf,
    file: Option<Arc<ReflectionFile>>,
}

impl FileSetInner {
    fn id_for(&mut self, path: &Path) -> FileId {
        if let Some(&id) = self.path_to_id.get(path) {
            return id;
        }
        let id = FileId::new(self.next_id);
        self.next_id += 1;
        self.path_to_id.insert(path.to_owned(), id);
        self.files.insert(
            id,
            Entry {
                path: path.to_owned(),
                file: None,
            },
        );
        id
    }
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the FileId for a path.
    pub fn file_id(&self, path: &Path) -> FileId {
        // Fast path: read lock
        if let Some(&id) = self.inner.read().path_to_id.get(path) {
            return id;
        }
        self.inner.write().id_for(path)
    }

    /// Register a file under `path`, replacing any earlier reflection of it.
    pub fn insert(&self, path: &Path, file: ReflectionFile) -> FileId {
        let mut inner = self.inner.write();
        let id = inner.id_for(path);
        if let Some(entry) = inner.files.get_mut(&id) {
            entry.file = Some(Arc::new(file));
        }
        id
    }

    pub fn get(&self, file: FileId) -> Option<Arc<ReflectionFile>> {
        self.inner.read().files.get(&file)?.file.clone()
    }

    pub fn path(&self, file: FileId) -> Option<PathBuf> {
        self.inner.read().files.get(&file).map(|e| e.path.clone())
    }

    pub fn remove(&self, file: FileId) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.files.shift_remove(&file) {
            inner.path_to_id.remove(&entry.path);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All file ids in registration order.
    pub fn files(&self) -> Vec<FileId> {
        self.inner.read().files.keys().copied().collect()
    }

    /// The first file that declares the qualified `name` as one of `kinds`.
    ///
    /// Files whose index fails to build are skipped.
    pub fn locate(&self, name: &str, kinds: DeclarationKinds) -> Option<FileId> {
        let name = name.trim_start_matches('\\');
        let candidates: Vec<(FileId, Arc<ReflectionFile>)> = self
            .inner
            .read()
            .files
            .iter()
            .filter_map(|(id, entry)| Some((*id, entry.file.clone()?)))
            .collect();

        candidates.into_iter().find_map(|(id, file)| match file.build() {
            Ok(index) => index.contains(kinds, name).then_some(id),
            Err(err) => {
                tracing::warn!(%id, error = %err, "skipping file that failed to index");
                None
            }
        })
    }
}
