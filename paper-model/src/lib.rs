//! Shared models used across the paper ingestion and retrieval crates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A numbered, heading-delimited region of a paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Dotted numeric path, e.g. "3" or "3.2".
    pub name: String,
    /// Heading title with any leading numeric label stripped.
    pub title: String,
    /// Page on which the section heading appears (1-based).
    pub start_page: u32,
    /// True iff `name` contains a dot.
    pub is_subsection: bool,
    /// `name` with its last dotted component removed, when nested.
    #[serde(default)]
    pub parent_name: Option<String>,
}

impl Section {
    /// Unique identifier tying chunks and images to this section.
    pub fn section_id(&self) -> String {
        format!("{}: {}", self.name, self.title)
    }

    /// Numeric components of `name` for ordering ("3.2" -> [3, 2]).
    pub fn numeric_path(&self) -> Vec<u32> {
        parse_numeric_path(&self.name)
    }
}

/// Parses a dotted numeric path into its components. Non-numeric
/// segments terminate the path early.
pub fn parse_numeric_path(name: &str) -> Vec<u32> {
    let mut out = Vec::new();
    for part in name.split('.') {
        match part.parse::<u32>() {
            Ok(n) => out.push(n),
            Err(_) => break,
        }
    }
    out
}

/// Derives the parent path of a dotted section name ("3.2.1" -> "3.2").
pub fn parent_of(name: &str) -> Option<String> {
    name.rfind('.').map(|idx| name[..idx].to_string())
}

/// Contextual metadata carried by every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub paper_id: String,
    /// Estimated page; `None` when no page marker was available and the
    /// unpaged policy is in effect.
    pub page_num: Option<u32>,
    /// Section identifier ("3.2: Implementation Details"), if any.
    pub section_id: Option<String>,
    /// Parent section identifier ("3: Methods"), if any.
    pub parent_section_id: Option<String>,
    /// Position of the chunk within its section.
    pub chunk_index: u32,
    /// Whether the chunk contains display math ($$...$$).
    pub has_equations: bool,
    /// Origin of the text, e.g. "pdf".
    pub source_type: String,
}

impl ChunkMetadata {
    pub fn new(paper_id: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            page_num: None,
            section_id: None,
            parent_section_id: None,
            chunk_index: 0,
            has_equations: false,
            source_type: source_type.into(),
        }
    }
}

/// A bounded, possibly overlapping span of paper text prepared for
/// embedding and indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl PaperChunk {
    pub fn new(text: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self { text: text.into(), metadata }
    }
}

/// An embedded image lifted out of a paper, associated with the section
/// active at its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedImage {
    /// Source-local object reference; unique within one document.
    pub xref: u32,
    pub page_num: u32,
    pub width: u32,
    pub height: u32,
    pub image_bytes: Vec<u8>,
    /// Output encoding extension, e.g. "png".
    pub extension: String,
    pub section_id: Option<String>,
}

/// Externally supplied paper metadata. Opaque to the pipeline except
/// for `id`, which ties chunks, sections, and images together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperMeta {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub pdf_url: String,
    #[serde(default)]
    pub paper_url: String,
    /// Which fetcher produced this record ("arxiv", "semantic_scholar").
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

/// A retrieved chunk reconstructed with its full context. Ephemeral;
/// built per query from index hits, never persisted.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub chunk: PaperChunk,
    /// Paper metadata as stored alongside the chunk, including the
    /// `images` array appended at ingest time.
    pub paper_metadata: Map<String, Value>,
    pub section: Option<Section>,
    /// Similarity in [-1, 1]: 1 - cosine distance, higher is better.
    pub score: f32,
}

impl RetrievedContext {
    /// Images recorded for this context's section, if any.
    pub fn relevant_images(&self) -> Vec<&Map<String, Value>> {
        let section_id = match &self.section {
            Some(s) => s.section_id(),
            None => return Vec::new(),
        };
        let images = match self.paper_metadata.get("images").and_then(Value::as_array) {
            Some(arr) => arr,
            None => return Vec::new(),
        };
        images
            .iter()
            .filter_map(Value::as_object)
            .filter(|img| {
                img.get("section_id").and_then(Value::as_str) == Some(section_id.as_str())
            })
            .collect()
    }
}
