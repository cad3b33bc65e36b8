//! Reconstruction of typed retrieval contexts from raw index hits, and
//! the paper-grouped ordering used for prompt assembly.

use std::cmp::Ordering;

use paper_model::{parse_numeric_path, ChunkMetadata, PaperChunk, RetrievedContext, Section};
use serde_json::{Map, Value};

use crate::QueryHit;

/// Rebuilds typed contexts from ranked query hits.
///
/// Each packed sub-document is decoded independently; a malformed or
/// incomplete payload degrades that one field to absent and the rest
/// of the record survives. The whole retrieval never fails here.
pub fn build_contexts(hits: Vec<QueryHit>) -> Vec<RetrievedContext> {
    hits.into_iter().map(build_context).collect()
}

fn build_context(hit: QueryHit) -> RetrievedContext {
    let flat_paper_id = hit
        .metadata
        .get("paper_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let chunk_metadata = match decode_embedded(&hit.metadata, "chunk_metadata") {
        Some(value) => match serde_json::from_value::<ChunkMetadata>(value) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(error = %e, "malformed chunk metadata; using defaults");
                ChunkMetadata::new(flat_paper_id.clone(), "")
            }
        },
        None => ChunkMetadata::new(flat_paper_id.clone(), ""),
    };

    let paper_metadata = match decode_embedded(&hit.metadata, "paper_metadata") {
        Some(Value::Object(map)) => map,
        Some(_) | None => {
            tracing::warn!(paper_id = %flat_paper_id, "malformed paper metadata; using empty record");
            Map::new()
        }
    };

    let section = decode_embedded(&hit.metadata, "section_data").and_then(parse_section);

    RetrievedContext {
        chunk: PaperChunk::new(hit.document, chunk_metadata),
        paper_metadata,
        section,
        // Cosine distance is bounded in [0, 2]; similarity is its complement.
        score: 1.0 - hit.distance,
    }
}

/// Decodes a packed sub-document: JSON strings are parsed, inline
/// values pass through, empty strings (the packed form of null) and
/// parse failures yield `None`.
fn decode_embedded(metadata: &Map<String, Value>, key: &str) -> Option<Value> {
    match metadata.get(key)? {
        Value::String(raw) if raw.is_empty() => None,
        Value::String(raw) => match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "malformed packed metadata field");
                None
            }
        },
        Value::Null => None,
        other => Some(other.clone()),
    }
}

/// A section payload is usable only when every required field is
/// present; incomplete payloads are logged and dropped.
fn parse_section(value: Value) -> Option<Section> {
    let object = value.as_object()?;
    let required = ["name", "title", "start_page", "is_subsection"];
    if !required.iter().all(|field| object.contains_key(*field)) {
        tracing::warn!("incomplete section data: {object:?}");
        return None;
    }
    match serde_json::from_value::<Section>(value) {
        Ok(section) => Some(section),
        Err(e) => {
            tracing::warn!(error = %e, "unparseable section data");
            None
        }
    }
}

/// One paper's share of a retrieval, in prompt order.
#[derive(Debug)]
pub struct PaperGroup<'a> {
    pub paper_id: String,
    pub metadata: &'a Map<String, Value>,
    pub contexts: Vec<&'a RetrievedContext>,
}

/// Orders two contexts for prompting: ascending numeric section path,
/// then chunk index; section-less contexts sort last.
fn prompt_order(a: &RetrievedContext, b: &RetrievedContext) -> Ordering {
    let key = |ctx: &RetrievedContext| ctx.section.as_ref().map(|s| parse_numeric_path(&s.name));
    match (key(a), key(b)) {
        (Some(pa), Some(pb)) => pa
            .cmp(&pb)
            .then(a.chunk.metadata.chunk_index.cmp(&b.chunk.metadata.chunk_index)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.chunk.metadata.chunk_index.cmp(&b.chunk.metadata.chunk_index),
    }
}

/// Groups contexts by paper (first-retrieved paper first) and orders
/// each group for prompting.
pub fn group_by_paper(contexts: &[RetrievedContext]) -> Vec<PaperGroup<'_>> {
    let mut groups: Vec<PaperGroup<'_>> = Vec::new();
    for ctx in contexts {
        let paper_id = ctx
            .paper_metadata
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(ctx.chunk.metadata.paper_id.as_str())
            .to_string();
        match groups.iter().position(|g| g.paper_id == paper_id) {
            Some(i) => groups[i].contexts.push(ctx),
            None => groups.push(PaperGroup {
                paper_id,
                metadata: &ctx.paper_metadata,
                contexts: vec![ctx],
            }),
        }
    }
    for group in &mut groups {
        group.contexts.sort_by(|a, b| prompt_order(a, b));
    }
    groups
}

/// Renders grouped contexts as the retrieval block of a prompt:
/// per-paper headers, section lines with any relevant figures, then
/// the chunk text in prompt order.
pub fn format_prompt_context(query: &str, contexts: &[RetrievedContext]) -> String {
    let mut prompt = format!(
        "Answer this research question: {query}\n\nRetrieved content from academic papers:"
    );

    for group in group_by_paper(contexts) {
        let title = group
            .metadata
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)");
        prompt.push_str(&format!("\n\nPaper [{}]: {}", group.paper_id, title));
        if let Some(url) = group.metadata.get("paper_url").and_then(Value::as_str) {
            if !url.is_empty() {
                prompt.push_str(&format!("\nSource: {url}"));
            }
        }
        if let Some(authors) = group.metadata.get("authors").and_then(Value::as_array) {
            let names: Vec<&str> = authors.iter().filter_map(Value::as_str).collect();
            prompt.push_str(&format!("\nAuthors: {}", names.join(", ")));
        }
        if let Some(published) = group.metadata.get("published").and_then(Value::as_str) {
            prompt.push_str(&format!("\nPublished: {published}"));
        }
        if let Some(categories) = group.metadata.get("categories").and_then(Value::as_array) {
            let cats: Vec<&str> = categories.iter().filter_map(Value::as_str).collect();
            prompt.push_str(&format!("\nCategories: {}", cats.join(", ")));
        }
        if let Some(abstract_text) = group.metadata.get("abstract").and_then(Value::as_str) {
            prompt.push_str(&format!("\nAbstract: {abstract_text}\n"));
        }

        for ctx in &group.contexts {
            prompt.push('\n');
            if let Some(section) = &ctx.section {
                prompt.push_str(&format!(
                    "From section {}: {}",
                    section.name, section.title
                ));
                if section.is_subsection {
                    if let Some(parent) = &section.parent_name {
                        prompt.push_str(&format!(" (subsection of {parent})"));
                    }
                }
                let images = ctx.relevant_images();
                if !images.is_empty() {
                    prompt.push_str("\nRelevant figures in this section:");
                    for img in images {
                        let path = img.get("storage_path").and_then(Value::as_str).unwrap_or("?");
                        let width = img.get("width").and_then(Value::as_u64).unwrap_or(0);
                        let height = img.get("height").and_then(Value::as_u64).unwrap_or(0);
                        prompt.push_str(&format!("\n- Figure {path}: {width}x{height} image"));
                    }
                }
            }
            prompt.push_str(&format!("\n{}\n", ctx.chunk.text));
        }
    }

    prompt
}
