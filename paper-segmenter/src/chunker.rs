//! Paragraph-accumulating chunker with single-paragraph overlap.

use std::sync::OnceLock;

use paper_model::{ChunkMetadata, PaperChunk};
use regex::Regex;

use crate::section::parse_page_marker;

/// What page to report for chunks that never saw a `Page N` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagePolicy {
    /// Marker-free chunks are treated as page 1 and may therefore
    /// associate with the first section.
    #[default]
    AssumeFirstPage,
    /// Marker-free chunks carry no page and stay section-less.
    Unpaged,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    /// Preferred upper bound on accumulated characters per chunk.
    pub chunk_size: usize,
    /// When > 0, each sealed chunk's last paragraph seeds the next one.
    pub chunk_overlap: usize,
    pub page_policy: PagePolicy,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 100, page_policy: PagePolicy::AssumeFirstPage }
    }
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("static pattern"))
}

fn space_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r" +").expect("static pattern"))
}

fn equation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\$.+?\$\$").expect("static pattern"))
}

/// Collapses blank-line runs and repeated spaces while preserving
/// markdown structure.
pub fn clean_text(text: &str) -> String {
    let collapsed = blank_run_re().replace_all(text, "\n\n");
    let collapsed = space_run_re().replace_all(&collapsed, " ");
    collapsed.trim().to_string()
}

/// True when the text contains display math.
pub fn has_equations(text: &str) -> bool {
    equation_re().is_match(text)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Chunks one span of cleaned text. `start_page` is the page cursor
/// inherited from earlier in the document; `Page N` markers inside the
/// span advance it. Returned chunks carry page and equation metadata;
/// section identity and `chunk_index` are assigned by the caller.
pub fn chunk_span(
    text: &str,
    start_page: Option<u32>,
    paper_id: &str,
    source_type: &str,
    params: &ChunkParams,
) -> (Vec<PaperChunk>, Option<u32>) {
    let cleaned = clean_text(text);
    let mut chunks: Vec<PaperChunk> = Vec::new();
    let mut page = start_page;

    let mut buffer: Vec<String> = Vec::new();
    let mut buffer_len = 0usize;
    let mut buffer_page = page;

    let mut seal = |buffer: &mut Vec<String>, buffer_len: &mut usize, buffer_page: Option<u32>, chunks: &mut Vec<PaperChunk>| {
        if buffer.is_empty() {
            return;
        }
        let text = buffer.join("\n\n");
        let mut metadata = ChunkMetadata::new(paper_id, source_type);
        metadata.page_num = match params.page_policy {
            PagePolicy::AssumeFirstPage => Some(buffer_page.unwrap_or(1)),
            PagePolicy::Unpaged => buffer_page,
        };
        metadata.has_equations = has_equations(&text);
        chunks.push(PaperChunk::new(text, metadata));
        if params.chunk_overlap > 0 {
            // Keep the last paragraph as overlap seed.
            let last = buffer.pop().unwrap_or_default();
            buffer.clear();
            *buffer_len = char_len(&last);
            buffer.push(last);
        } else {
            buffer.clear();
            *buffer_len = 0;
        }
    };

    for para in cleaned.split("\n\n") {
        // Marker lines advance the page cursor and never become chunk
        // text; whatever surrounds them stays one paragraph.
        let mut marker: Option<u32> = None;
        let kept: Vec<&str> = para
            .lines()
            .filter(|line| match parse_page_marker(line) {
                Some(n) => {
                    marker = Some(n);
                    false
                }
                None => true,
            })
            .collect();
        let para = kept.join("\n").trim().to_string();
        if para.is_empty() {
            if let Some(n) = marker {
                page = Some(n);
            }
            continue;
        }

        if buffer_len + char_len(&para) > params.chunk_size && !buffer.is_empty() {
            seal(&mut buffer, &mut buffer_len, buffer_page, &mut chunks);
            buffer_page = page;
        }
        if buffer.is_empty() {
            buffer_page = page;
        }
        buffer_len += char_len(&para);
        buffer.push(para);
        if let Some(n) = marker {
            page = Some(n);
        }
    }
    seal(&mut buffer, &mut buffer_len, buffer_page, &mut chunks);

    (chunks, page)
}
