//! Paper indexing and retrieval service.
//!
//! [`RagService`] composes the collaborator seams: it embeds chunks,
//! packs their metadata for the scalar-only index, stores extracted
//! figures, and reconstructs typed contexts at query time.
//! [`batch`] drives many papers through the full pipeline.

pub mod batch;

use std::sync::Arc;

use embedding_provider::{Embedder, EmbedderError};
use paper_model::{ExtractedImage, PaperChunk, PaperMeta, RetrievedContext, Section};
use rag_store::metadata::pack_chunk_metadata;
use rag_store::retrieval::build_contexts;
use rag_store::{image_key, IndexEntry, IndexError, ObjectStore, StoreError, VectorIndex};
use serde_json::{json, Map, Value};

pub use batch::{BatchIngester, IngestReport, IngesterConfig, SkipReason, Stage};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("embedder error: {0}")]
    Embed(#[from] EmbedderError),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("fetch error: {0}")]
    Fetch(#[from] paper_fetch::FetchError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Handles to the external collaborators, injected at construction so
/// the pipeline stays independently testable and restartable.
pub struct RagService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    images: Arc<dyn ObjectStore>,
}

impl RagService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        images: Arc<dyn ObjectStore>,
    ) -> Self {
        Self { embedder, index, images }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Indexes one segmented paper: stores its figures, packs per-chunk
    /// metadata, embeds all chunk texts, and inserts the records.
    ///
    /// Chunk ids are `{paper_id}_{position}`, so re-adding the same
    /// paper replaces rather than duplicates.
    pub async fn add_paper(
        &self,
        chunks: &[PaperChunk],
        sections: &[Section],
        images: &[ExtractedImage],
        paper_meta: &PaperMeta,
    ) -> Result<(), ServiceError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut image_records: Vec<Value> = Vec::with_capacity(images.len());
        for image in images {
            let key = image_key(&paper_meta.id, image.xref);
            let stored = self.images.put(&key, &image.image_bytes).await?;
            image_records.push(json!({
                "paper_id": paper_meta.id,
                "paper_url": paper_meta.paper_url,
                "xref": image.xref,
                "page_num": image.page_num,
                "width": image.width,
                "height": image.height,
                "section_id": image.section_id,
                "storage_path": stored,
            }));
        }

        let mut paper_map: Map<String, Value> = match serde_json::to_value(paper_meta) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        paper_map.insert("images".into(), Value::Array(image_records));

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        let entries: Vec<IndexEntry> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(position, (chunk, vector))| {
                let section = chunk
                    .metadata
                    .section_id
                    .as_deref()
                    .and_then(|id| sections.iter().find(|s| s.section_id() == id));
                IndexEntry {
                    id: format!("{}_{}", paper_meta.id, position),
                    vector,
                    document: chunk.text.clone(),
                    metadata: pack_chunk_metadata(chunk, &paper_map, section),
                }
            })
            .collect();

        let inserted = entries.len();
        self.index.insert(entries).await?;
        tracing::info!(paper_id = %paper_meta.id, chunks = inserted, "indexed paper");
        Ok(())
    }

    /// Embeds the query, runs the similarity lookup, and reconstructs
    /// ordered typed contexts from the raw hits.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedContext>, ServiceError> {
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, top_k).await?;
        Ok(build_contexts(hits))
    }
}
