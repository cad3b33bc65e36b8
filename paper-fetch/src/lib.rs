//! Paper acquisition: the `PaperSource` capability trait and its arXiv
//! and Semantic Scholar implementations, plus the on-disk PDF cache.

pub mod arxiv;
pub mod cache;
pub mod semantic_scholar;

use std::path::PathBuf;

use async_trait::async_trait;
use paper_model::PaperMeta;

pub use arxiv::ArxivSource;
pub use cache::PdfCache;
pub use semantic_scholar::SemanticScholarSource;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("paper {0} unknown to this source; fetch papers first")]
    UnknownPaper(String),
}

impl FetchError {
    /// Whether a retry with backoff is worthwhile. Network failures and
    /// server-side throttling are; malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            FetchError::Io(_) => true,
            FetchError::Malformed(_) | FetchError::UnknownPaper(_) => false,
        }
    }
}

/// Downloaded paper content handed to the segmentation pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub path: PathBuf,
    /// "pdf" for every current source.
    pub source_type: String,
    pub url: String,
}

/// Capability implemented by every paper source. Listing produces
/// metadata records; content fetching produces a local file. A content
/// result of `None` means the paper is permanently unavailable and
/// should be skipped, not retried.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn fetch_papers(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<PaperMeta>, FetchError>;

    async fn fetch_content(&self, paper_id: &str) -> Result<Option<FetchedContent>, FetchError>;
}
