//! Text-extraction seam.
//!
//! The pipeline consumes markdown-like text with heading and `Page N`
//! markers; where that text comes from is a collaborator concern. The
//! bundled implementation uses lopdf's plain-text extraction and emits
//! page markers itself.

use std::path::Path;

use lopdf::Document;

use crate::SegmentError;

/// Turns a raw document into marker-annotated linear text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, SegmentError>;
}

/// Pure-Rust PDF text extractor. Emits a `Page N` marker line ahead of
/// each page's text so downstream page tracking works; heading markers
/// are whatever the source text carries.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, path: &Path) -> Result<String, SegmentError> {
        let doc = Document::load(path).map_err(|e| SegmentError::Pdf(e.to_string()))?;
        let mut out = String::new();
        for (page_num, _page_id) in doc.get_pages() {
            out.push_str(&format!("Page {}\n\n", page_num));
            match doc.extract_text(&[page_num]) {
                Ok(text) => {
                    out.push_str(&text);
                    if !text.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push('\n');
                }
                Err(e) => {
                    // A single unreadable page degrades to absent text.
                    tracing::warn!(page = page_num, error = %e, "page text extraction failed");
                }
            }
        }
        Ok(out)
    }
}
