//! Shared file catalog: an ordered list of descriptors, replaced wholesale.
//!
//! When constructed with a `persist_path`, the catalog is loaded from disk on
//! startup. `persist` writes it back; the hub awaits it after every
//! replacement, before broadcasting.

use std::path::PathBuf;

use vlink_core::FileDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog update not authorized")]
    Unauthorized,
    #[error("no catalog entry at index {0}")]
    NotFound(usize),
    #[error("catalog entry {0:?} has no backing resource")]
    NoBackingResource(String),
}

#[derive(Debug, Default)]
pub struct FileCatalog {
    files: Vec<FileDescriptor>,
    persist_path: Option<PathBuf>,
}

impl FileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog that persists to the given file path.
    /// Loads the existing catalog from disk if the file exists.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut catalog = Self {
            files: Vec::new(),
            persist_path: Some(path),
        };
        catalog.load_from_disk();
        catalog
    }

    pub fn snapshot(&self) -> Vec<FileDescriptor> {
        self.files.clone()
    }

    /// Replace the whole catalog. No merging with the previous contents.
    pub fn replace(&mut self, files: Vec<FileDescriptor>) {
        self.files = files;
    }

    pub fn get(&self, index: usize) -> Option<&FileDescriptor> {
        self.files.get(index)
    }

    /// Resolve an entry to its backing path. Existence is checked by the caller.
    pub fn locate(&self, index: usize) -> Result<(FileDescriptor, PathBuf), CatalogError> {
        let entry = self.get(index).ok_or(CatalogError::NotFound(index))?;
        let reference = entry
            .reference
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| CatalogError::NoBackingResource(entry.name.clone()))?;
        Ok((entry.clone(), PathBuf::from(reference)))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileCatalog {
    /// Write the catalog to its persist path as JSON. The file write runs on
    /// the blocking pool. Logs on failure.
    pub async fn persist(&self) {
        let Some(path) = self.persist_path.clone() else {
            return;
        };
        let json = match serde_json::to_string_pretty(&self.files) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize catalog");
                return;
            }
        };
        let target = path.clone();
        match tokio::task::spawn_blocking(move || std::fs::write(target, json)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to persist catalog");
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "catalog write task failed");
            }
        }
    }

    /// Load the catalog from disk. Called once during construction.
    fn load_from_disk(&mut self) {
        let path = match self.persist_path.as_ref() {
            Some(p) => p,
            None => return,
        };
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to read catalog");
                return;
            }
        };
        match serde_json::from_str::<Vec<FileDescriptor>>(&text) {
            Ok(files) => {
                tracing::info!(count = files.len(), path = %path.display(), "loaded persisted catalog");
                self.files = files;
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path.display(), "failed to parse catalog");
            }
        }
    }
}
