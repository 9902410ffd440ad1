//! Where rendered documents come from and go back to.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use walkdir::WalkDir;

use crate::error::StoreError;

/// A collection of rendered documents keyed by logical path.
///
/// Shared between worker threads, so methods take `&self`. Each path is only
/// ever touched by one worker during a run.
pub trait OutputStore: Sync {
    /// Every document path to process.
    fn paths(&self) -> Result<Vec<PathBuf>, StoreError>;

    fn read(&self, path: &Path) -> Result<String, StoreError>;

    fn write(&self, path: &Path, text: &str) -> Result<(), StoreError>;
}

/// Documents held in memory. Handy for build tools that never hit the disk,
/// and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<PathBuf, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), text.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path.as_ref())
            .cloned()
    }

    pub fn into_inner(self) -> BTreeMap<PathBuf, String> {
        self.documents.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<P: Into<PathBuf>, S: Into<String>> FromIterator<(P, S)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (P, S)>>(iter: I) -> Self {
        let documents = iter
            .into_iter()
            .map(|(path, text)| (path.into(), text.into()))
            .collect();
        Self {
            documents: RwLock::new(documents),
        }
    }
}

impl OutputStore for MemoryStore {
    fn paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        Ok(self
            .documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect())
    }

    fn read(&self, path: &Path) -> Result<String, StoreError> {
        self.get(path)
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), StoreError> {
        self.insert(path, text);
        Ok(())
    }
}

/// The `*.html` files of a generated site directory.
///
/// Paths are relative to the root. `include` restricts processing to some
/// subtrees (e.g. only `posts/`); empty means the whole site.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
    include: Vec<PathBuf>,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: Vec::new(),
        }
    }

    pub fn with_include<I, P>(mut self, include: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_included(&self, relative: &Path) -> bool {
        self.include.is_empty() || self.include.iter().any(|prefix| relative.starts_with(prefix))
    }

    fn io_error(&self, path: &Path, source: io::Error) -> StoreError {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: self.root.join(path),
                source,
            }
        }
    }
}

impl OutputStore for DirStore {
    fn paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut paths = Vec::new();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| StoreError::Walk {
                path: e.path().unwrap_or(&self.root).to_path_buf(),
                message: e.to_string(),
            })?;

            if !entry.file_type().is_file()
                || entry.path().extension().is_none_or(|ext| ext != "html")
            {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.is_included(relative) {
                paths.push(relative.to_path_buf());
            }
        }

        Ok(paths)
    }

    fn read(&self, path: &Path) -> Result<String, StoreError> {
        fs::read_to_string(self.root.join(path)).map_err(|e| self.io_error(path, e))
    }

    fn write(&self, path: &Path, text: &str) -> Result<(), StoreError> {
        fs::write(self.root.join(path), text).map_err(|e| self.io_error(path, e))
    }
}
