use paper_model::PaperChunk;
use paper_segmenter::annotate::{annotate_chunks_by_page, parent_section_id};
use paper_segmenter::chunker::{chunk_span, clean_text, ChunkParams, PagePolicy};
use paper_segmenter::section::extract_sections;
use paper_segmenter::segment_text;

fn params(chunk_size: usize, chunk_overlap: usize) -> ChunkParams {
    ChunkParams { chunk_size, chunk_overlap, page_policy: PagePolicy::AssumeFirstPage }
}

#[test]
fn intro_and_subsection_yield_two_tagged_chunks() {
    let text = "# 1 Intro\nfoo\n## 1.1 Sub\nbar";
    let (chunks, sections) = segment_text(text, "p1", "pdf", &params(100, 0));

    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].name, "1");
    assert_eq!(sections[0].title, "Intro");
    assert!(!sections[0].is_subsection);
    assert_eq!(sections[0].parent_name, None);
    assert_eq!(sections[1].name, "1.1");
    assert_eq!(sections[1].title, "Sub");
    assert!(sections[1].is_subsection);
    assert_eq!(sections[1].parent_name.as_deref(), Some("1"));

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "foo");
    assert_eq!(chunks[0].metadata.section_id.as_deref(), Some("1: Intro"));
    assert_eq!(chunks[0].metadata.chunk_index, 0);
    assert_eq!(chunks[1].text, "bar");
    assert_eq!(chunks[1].metadata.section_id.as_deref(), Some("1.1: Sub"));
    assert_eq!(chunks[1].metadata.chunk_index, 0);
    assert_eq!(
        chunks[1].metadata.parent_section_id.as_deref(),
        Some("1: Intro")
    );
}

#[test]
fn counter_names_ignore_source_numbering() {
    let text = "# 7 Results\nbody\n## 2.5 Oddly Numbered\nmore";
    let sections = extract_sections(text);
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].name, "1");
    assert_eq!(sections[0].title, "Results");
    assert_eq!(sections[1].name, "1.1");
    assert_eq!(sections[1].title, "Oddly Numbered");
}

#[test]
fn headingless_document_yields_sectionless_chunks() {
    let text = "just a paragraph of text\n\nand another one";
    let (chunks, sections) = segment_text(text, "p1", "pdf", &params(1000, 100));
    assert!(sections.is_empty());
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert_eq!(chunk.metadata.section_id, None);
        assert_eq!(chunk.metadata.parent_section_id, None);
    }
}

#[test]
fn deep_headings_stay_body_text() {
    let text = "# 1 Top\nintro body\n#### too deep\nmore body";
    let sections = extract_sections(text);
    assert_eq!(sections.len(), 1);

    let (chunks, _) = segment_text(text, "p1", "pdf", &params(1000, 0));
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].text.contains("#### too deep"));
}

#[test]
fn section_invariants_hold_for_nested_documents() {
    let text = "# A\na\n## B\nb\n### C\nc\n# D\nd\n## E\ne";
    let sections = extract_sections(text);
    let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["1", "1.1", "1.1.1", "2", "2.1"]);
    for section in &sections {
        assert_eq!(section.is_subsection, section.name.contains('.'));
        match &section.parent_name {
            Some(parent) => {
                let expected = &section.name[..section.name.rfind('.').expect("subsection has a dot")];
                assert_eq!(parent, expected);
            }
            None => assert!(!section.is_subsection),
        }
    }
}

#[test]
fn page_markers_drive_section_start_pages() {
    let text = "Page 1\n# One\nbody one\nPage 3\n# Two\nbody two";
    let sections = extract_sections(text);
    assert_eq!(sections[0].start_page, 1);
    assert_eq!(sections[1].start_page, 3);

    let (chunks, _) = segment_text(text, "p1", "pdf", &params(1000, 0));
    assert_eq!(chunks[0].metadata.page_num, Some(1));
    assert_eq!(chunks[1].metadata.page_num, Some(3));
    // Marker lines never leak into chunk text.
    for chunk in &chunks {
        assert!(!chunk.text.contains("Page "));
    }
}

#[test]
fn single_oversized_paragraph_is_one_chunk() {
    let long = "x".repeat(5000);
    let (chunks, _) = chunk_span(&long, None, "p1", "pdf", &params(1000, 100));
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text.len(), 5000);
}

#[test]
fn overlap_seeds_next_chunk_with_last_paragraph() {
    let text = "alpha alpha alpha\n\nbravo bravo bravo\n\ncharlie charlie";
    let (chunks, _) = chunk_span(text, None, "p1", "pdf", &params(40, 10));
    assert!(chunks.len() >= 2, "expected the buffer to seal at least once");
    for pair in chunks.windows(2) {
        let last_para = pair[0]
            .text
            .rsplit("\n\n")
            .next()
            .expect("chunks are never empty");
        assert!(
            pair[1].text.starts_with(last_para),
            "next chunk should start with the previous chunk's last paragraph"
        );
    }
}

#[test]
fn zero_overlap_reconstructs_cleaned_text() {
    let text = "first paragraph here\n\nsecond paragraph here\n\nthird paragraph here\n\nfourth one";
    let (chunks, _) = chunk_span(text, None, "p1", "pdf", &params(45, 0));
    let rejoined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    assert_eq!(rejoined, clean_text(text));
}

#[test]
fn equation_flag_set_for_display_math() {
    let text = "The loss is $$L = x^2$$ as shown\n\nplain paragraph";
    let (chunks, _) = chunk_span(text, None, "p1", "pdf", &params(30, 0));
    assert!(chunks[0].metadata.has_equations);
    assert!(!chunks[1].metadata.has_equations);
}

#[test]
fn unpaged_policy_leaves_marker_free_chunks_without_a_page() {
    let text = "no markers at all in this text";
    let params = ChunkParams { chunk_size: 1000, chunk_overlap: 0, page_policy: PagePolicy::Unpaged };
    let (chunks, _) = chunk_span(text, None, "p1", "pdf", &params);
    assert_eq!(chunks[0].metadata.page_num, None);
}

#[test]
fn page_rule_keeps_last_section_at_or_before_page() {
    let text = "Page 1\n# One\na\nPage 4\n# Two\nb";
    let sections = extract_sections(text);

    let mut chunks = vec![
        chunk_at_page("before", None),
        chunk_at_page("first", Some(2)),
        chunk_at_page("second", Some(4)),
        chunk_at_page("later", Some(9)),
    ];
    annotate_chunks_by_page(&mut chunks, &sections);

    assert_eq!(chunks[0].metadata.section_id, None);
    assert_eq!(chunks[1].metadata.section_id.as_deref(), Some("1: One"));
    assert_eq!(chunks[2].metadata.section_id.as_deref(), Some("2: Two"));
    assert_eq!(chunks[3].metadata.section_id.as_deref(), Some("2: Two"));
    // chunk_index restarts per section group.
    assert_eq!(chunks[2].metadata.chunk_index, 0);
    assert_eq!(chunks[3].metadata.chunk_index, 1);
}

#[test]
fn page_rule_tie_break_prefers_later_extraction_order() {
    let text = "# Outer\na\n## Inner\nb";
    let sections = extract_sections(text);
    assert_eq!(sections[0].start_page, sections[1].start_page);

    let mut chunks = vec![chunk_at_page("c", Some(1))];
    annotate_chunks_by_page(&mut chunks, &sections);
    assert_eq!(chunks[0].metadata.section_id.as_deref(), Some("1.1: Inner"));
    assert_eq!(
        chunks[0].metadata.parent_section_id.as_deref(),
        Some("1: Outer")
    );
}

#[test]
fn parent_id_resolution_requires_extracted_parent() {
    let text = "# Top\na\n## Nested\nb";
    let sections = extract_sections(text);
    let nested = sections.iter().find(|s| s.name == "1.1").expect("nested section exists");
    assert_eq!(
        parent_section_id(nested, &sections).as_deref(),
        Some("1: Top")
    );
}

fn chunk_at_page(text: &str, page: Option<u32>) -> PaperChunk {
    let mut metadata = paper_model::ChunkMetadata::new("p1", "pdf");
    metadata.page_num = page;
    PaperChunk::new(text, metadata)
}
