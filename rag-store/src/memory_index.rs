//! Brute-force in-memory vector index.
//!
//! Reference implementation of [`VectorIndex`] used by tests and local
//! runs; a deployment points the same trait at a real engine.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{IndexEntry, IndexError, QueryHit, VectorIndex};

#[derive(Debug, Clone)]
struct StoredEntry {
    vector: Vec<f32>,
    document: String,
    metadata: Map<String, Value>,
}

/// Flat cosine-distance index keyed by entry id. Upserts by id.
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - dot / denom
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| IndexError::Backend("index lock poisoned".into()))?;
        for entry in entries {
            guard.insert(
                entry.id,
                StoredEntry {
                    vector: entry.vector,
                    document: entry.document,
                    metadata: entry.metadata,
                },
            );
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>, IndexError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| IndexError::Backend("index lock poisoned".into()))?;
        let mut hits: Vec<QueryHit> = guard
            .values()
            .map(|entry| QueryHit {
                document: entry.document.clone(),
                metadata: entry.metadata.clone(),
                distance: cosine_distance(vector, &entry.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize, IndexError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| IndexError::Backend("index lock poisoned".into()))?;
        Ok(guard.len())
    }
}
