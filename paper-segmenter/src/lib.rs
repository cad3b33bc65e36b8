//! Section-aware segmentation of academic papers.
//!
//! Three independent passes over one document: hierarchical section
//! extraction ([`section`]), overlapping paragraph chunking
//! ([`chunker`]), and embedded image association ([`images`]), tied
//! together by the page/structure bookkeeping in [`annotate`].

pub mod annotate;
pub mod chunker;
pub mod extract;
pub mod images;
pub mod section;

use std::path::Path;

use paper_model::{ExtractedImage, PaperChunk, Section};

pub use chunker::{ChunkParams, PagePolicy};
pub use extract::{PdfTextExtractor, TextExtractor};
pub use images::ImageFilter;

#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the pipeline derives from one document.
#[derive(Debug, Clone, Default)]
pub struct SegmentOutput {
    pub chunks: Vec<PaperChunk>,
    pub sections: Vec<Section>,
    pub images: Vec<ExtractedImage>,
}

/// Segments marker-annotated document text into section-tagged chunks.
///
/// Sections and chunks come from the same line scan, so a chunk is
/// tagged with the section whose heading preceded its text; documents
/// without headings yield section-less chunks. `chunk_index` counts
/// per section in document order.
pub fn segment_text(
    text: &str,
    paper_id: &str,
    source_type: &str,
    params: &ChunkParams,
) -> (Vec<PaperChunk>, Vec<Section>) {
    let (raw_sections, spans) = section::scan_document(text);
    let sections = section::validate_sections(raw_sections);

    let mut chunks: Vec<PaperChunk> = Vec::new();
    let mut cursor: Option<u32> = None;
    for span in &spans {
        let start = span.page_at_start.or(cursor);
        let (mut span_chunks, end) =
            chunker::chunk_span(&span.body, start, paper_id, source_type, params);
        cursor = end.or(start);

        let section = span
            .section_name
            .as_deref()
            .and_then(|name| sections.iter().find(|s| s.name == name));
        for chunk in &mut span_chunks {
            chunk.metadata.section_id = section.map(Section::section_id);
            chunk.metadata.parent_section_id =
                section.and_then(|s| annotate::parent_section_id(s, &sections));
        }
        chunks.append(&mut span_chunks);
    }
    annotate::assign_chunk_indices(&mut chunks);

    tracing::info!(
        paper_id,
        chunks = chunks.len(),
        sections = sections.len(),
        "segmented document"
    );
    (chunks, sections)
}

/// Full segmentation of a PDF on disk: extract text, derive sections
/// and chunks, then lift and associate embedded images. Images are
/// auxiliary; a document whose images cannot be read still segments.
pub fn segment_pdf(
    path: &Path,
    paper_id: &str,
    extractor: &dyn TextExtractor,
    params: &ChunkParams,
    image_filter: &ImageFilter,
) -> Result<SegmentOutput, SegmentError> {
    let text = extractor.extract_text(path)?;
    let (chunks, sections) = segment_text(&text, paper_id, "pdf", params);
    let images = match images::extract_images(path, &sections, image_filter) {
        Ok(images) => images,
        Err(e) => {
            tracing::warn!(paper_id, error = %e, "image extraction failed; continuing without images");
            Vec::new()
        }
    };
    Ok(SegmentOutput { chunks, sections, images })
}
