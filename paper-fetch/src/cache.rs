//! Disk cache for downloaded PDFs.
//!
//! Repeated runs reuse previously downloaded papers instead of hitting
//! the network, which is also what makes orchestrator restarts after a
//! crash idempotent on the fetch stage.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

use crate::FetchError;

/// Filesystem-backed cache keyed by paper id.
#[derive(Debug, Clone)]
pub struct PdfCache {
    root: PathBuf,
}

impl PdfCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache file path for a paper id. Ids may contain '/' (Semantic
    /// Scholar) which is flattened into the file name.
    pub fn path_for(&self, paper_id: &str) -> PathBuf {
        self.root.join(format!("{}.pdf", sanitize_component(paper_id)))
    }

    /// Returns the cached file path when the paper is already present.
    pub async fn lookup(&self, paper_id: &str) -> Option<PathBuf> {
        let path = self.path_for(paper_id);
        fs::metadata(&path).await.ok().map(|_| path)
    }

    /// Writes downloaded bytes into the cache and returns the path.
    pub async fn store(&self, paper_id: &str, bytes: &[u8]) -> Result<PathBuf, FetchError> {
        fs::create_dir_all(&self.root).await?;
        let path = self.path_for(paper_id);
        fs::write(&path, bytes).await?;
        tracing::debug!(
            paper_id,
            bytes = bytes.len(),
            sha256 = %sha256_hex(bytes),
            "cached pdf"
        );
        Ok(path)
    }
}

/// SHA-256 of content as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Downloads `url` into the cache for `paper_id`, returning the local
/// path. Non-success statuses surface as [`FetchError::Status`].
pub async fn download_pdf(
    client: &reqwest::Client,
    cache: &PdfCache,
    paper_id: &str,
    url: &str,
) -> Result<PathBuf, FetchError> {
    if let Some(path) = cache.lookup(paper_id).await {
        tracing::debug!(paper_id, "pdf already cached");
        return Ok(path);
    }
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let bytes = response.bytes().await?;
    cache.store(paper_id, &bytes).await
}
