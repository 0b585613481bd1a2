//! File-content loaders used by `then_return_file`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read mock file '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mock file '{0}' not found")]
    NotFound(String),
}

/// Reads mock response bodies by path.
pub trait FileLoader: Send + Sync {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, LoadError>;
}

/// Reads files relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsFileLoader {
    root: PathBuf,
}

impl FsFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for FsFileLoader {
    fn default() -> Self {
        Self::new(".")
    }
}

impl FileLoader for FsFileLoader {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        let full_path = self.root.join(path.trim_start_matches('/'));
        std::fs::read(&full_path).map_err(|source| LoadError::Io {
            path: full_path.display().to_string(),
            source,
        })
    }
}

/// In-memory loader, mostly for tests and embedded fixtures.
#[derive(Debug, Default)]
pub struct StaticFileLoader {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl StaticFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.write().insert(path.into(), contents.into());
    }
}

impl FileLoader for StaticFileLoader {
    fn read_file(&self, path: &str) -> Result<Vec<u8>, LoadError> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(path.to_string()))
    }
}
