//! Page-based section containment and chunk/section bookkeeping.

use std::collections::HashMap;

use paper_model::{PaperChunk, Section};

/// Returns the sections stable-sorted by start page. Sections sharing a
/// start page keep extraction order, so a forward scan that keeps the
/// last match naturally prefers the later-emitted section.
pub fn sections_by_start_page(sections: &[Section]) -> Vec<&Section> {
    let mut sorted: Vec<&Section> = sections.iter().collect();
    sorted.sort_by_key(|s| s.start_page);
    sorted
}

/// The section active at `page`: the last section (in start-page order)
/// whose start page does not exceed it. `None` when the page precedes
/// every section.
pub fn section_for_page<'a>(sorted: &[&'a Section], page: u32) -> Option<&'a Section> {
    let mut found = None;
    for section in sorted {
        if section.start_page <= page {
            found = Some(*section);
        } else {
            break;
        }
    }
    found
}

/// Assigns every chunk the section containing its page, then renumbers
/// `chunk_index` per section and resolves parent identifiers. Chunks
/// without a page, or on a page before every section, stay section-less.
pub fn annotate_chunks_by_page(chunks: &mut [PaperChunk], sections: &[Section]) {
    let sorted = sections_by_start_page(sections);
    for chunk in chunks.iter_mut() {
        let section = chunk.metadata.page_num.and_then(|page| section_for_page(&sorted, page));
        chunk.metadata.section_id = section.map(Section::section_id);
        chunk.metadata.parent_section_id =
            section.and_then(|s| parent_section_id(s, sections));
    }
    assign_chunk_indices(chunks);
}

/// Identifier of a section's parent, when the parent was extracted.
pub fn parent_section_id(section: &Section, sections: &[Section]) -> Option<String> {
    let parent_name = section.parent_name.as_deref()?;
    sections
        .iter()
        .find(|s| s.name == parent_name)
        .map(Section::section_id)
}

/// Renumbers `chunk_index` within each section group, preserving
/// document order. Section-less chunks form their own group.
pub fn assign_chunk_indices(chunks: &mut [PaperChunk]) {
    let mut counters: HashMap<Option<String>, u32> = HashMap::new();
    for chunk in chunks.iter_mut() {
        let counter = counters.entry(chunk.metadata.section_id.clone()).or_insert(0);
        chunk.metadata.chunk_index = *counter;
        *counter += 1;
    }
}
