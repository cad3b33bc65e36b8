//! Key→bytes storage seam for binary blobs (extracted figures).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::StoreError;

/// Opaque blob store. Keys are slash-separated paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key` and returns the key actually used.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Storage key for a paper's extracted image.
pub fn image_key(paper_id: &str, xref: u32) -> String {
    format!("{paper_id}/{xref}.png")
}

/// Filesystem-backed object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys stay inside the root; traversal segments are dropped.
        let sanitized: PathBuf = key
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .collect();
        self.root.join(sanitized)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
