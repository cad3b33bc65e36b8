//! Storage seams for the paper pipeline: the vector-index and
//! object-store traits the external engines implement, plus metadata
//! packing and retrieval-context reconstruction.

pub mod memory_index;
pub mod metadata;
pub mod object_store;
pub mod retrieval;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use memory_index::MemoryVectorIndex;
pub use object_store::{image_key, FsObjectStore, ObjectStore};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One record handed to the index. Metadata values must be primitive
/// scalars; composite data is JSON-encoded by the caller (see
/// [`metadata`]) and decoded again on the way out.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub document: String,
    pub metadata: Map<String, Value>,
}

/// A ranked hit from a similarity query.
#[derive(Debug, Clone)]
pub struct QueryHit {
    pub document: String,
    pub metadata: Map<String, Value>,
    /// Cosine distance in [0, 2]; smaller is closer.
    pub distance: f32,
}

/// Narrow seam over the external vector database. Inserting the same
/// id twice replaces the previous record, which is what makes
/// re-indexing after a crash idempotent.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError>;
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>, IndexError>;
    async fn count(&self) -> Result<usize, IndexError>;
}
