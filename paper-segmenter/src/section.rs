//! Section extraction from heading-marked document text.
//!
//! Input is the markdown-like output of a text extractor: lines with
//! `#`/`##`/`###` heading markers and optional standalone `Page N`
//! markers. Section names come from running per-depth counters, not
//! from any numbering embedded in the heading itself, so inconsistent
//! source numbering still yields a coherent hierarchy.

use std::collections::HashSet;
use std::sync::OnceLock;

use paper_model::{parent_of, Section};
use regex::Regex;

/// A contiguous run of body text belonging to one section (or to the
/// preamble before any heading).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawSpan {
    /// Name of the enclosing section; `None` for preamble text.
    pub section_name: Option<String>,
    /// Last page marker seen before the span started, if any.
    pub page_at_start: Option<u32>,
    pub body: String,
}

fn numeric_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+(.*)$").expect("static pattern"))
}

/// Parses a standalone `Page N` marker line.
pub(crate) fn parse_page_marker(line: &str) -> Option<u32> {
    let rest = line.trim().strip_prefix("Page ")?;
    let rest = rest.trim();
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Splits a heading line into (depth, title text). Lines that are not
/// well-formed headings return `None` and stay body text.
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_end();
    let depth = trimmed.bytes().take_while(|&b| b == b'#').count();
    if depth == 0 {
        return None;
    }
    let rest = &trimmed[depth..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    Some((depth, title))
}

/// Drops a leading numeric label ("3.", "3.2") from a heading title.
fn strip_numeric_label(title: &str) -> &str {
    if let Some(caps) = numeric_label_re().captures(title) {
        let rest = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if !rest.is_empty() {
            return rest;
        }
    }
    title
}

/// Single pass over the document producing sections in extraction order
/// plus the body spans between headings.
pub(crate) fn scan_document(text: &str) -> (Vec<Section>, Vec<RawSpan>) {
    let mut counters = [0u32; 3];
    let mut marker_page: Option<u32> = None;
    let mut sections: Vec<Section> = Vec::new();
    let mut spans: Vec<RawSpan> = Vec::new();
    let mut current = RawSpan { section_name: None, page_at_start: None, body: String::new() };

    for line in text.lines() {
        if let Some(page) = parse_page_marker(line) {
            marker_page = Some(page);
            // Keep the marker in the body so the chunker can track pages.
            current.body.push_str(line);
            current.body.push('\n');
            continue;
        }
        match parse_heading(line) {
            Some((depth, title)) if depth <= 3 => {
                counters[depth - 1] += 1;
                for c in counters.iter_mut().skip(depth) {
                    *c = 0;
                }
                let name = counters[..depth]
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(".");
                sections.push(Section {
                    name: name.clone(),
                    title: strip_numeric_label(title).to_string(),
                    start_page: marker_page.unwrap_or(1),
                    is_subsection: depth > 1,
                    parent_name: parent_of(&name),
                });
                spans.push(std::mem::replace(
                    &mut current,
                    RawSpan { section_name: Some(name), page_at_start: marker_page, body: String::new() },
                ));
            }
            _ => {
                // Deeper headings and malformed lines stay body text.
                current.body.push_str(line);
                current.body.push('\n');
            }
        }
    }
    spans.push(current);

    (sections, spans)
}

/// Drops incoherent sections: non-positive start pages and duplicate
/// numeric paths (first occurrence wins after numeric-path ordering).
pub(crate) fn validate_sections(mut sections: Vec<Section>) -> Vec<Section> {
    sections.retain(|s| s.start_page > 0);
    for section in &mut sections {
        section.is_subsection = section.name.contains('.');
        section.parent_name = if section.is_subsection { parent_of(&section.name) } else { None };
    }
    sections.sort_by(|a, b| a.numeric_path().cmp(&b.numeric_path()));
    let mut seen: HashSet<String> = HashSet::new();
    sections.retain(|s| seen.insert(s.name.clone()));
    sections
}

/// Extracts the ordered, validated section list from document text.
/// Never fails: documents without headings yield an empty list.
pub fn extract_sections(text: &str) -> Vec<Section> {
    let (sections, _) = scan_document(text);
    let validated = validate_sections(sections);
    tracing::debug!(sections = validated.len(), "extracted sections");
    validated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, title: &str, start_page: u32) -> Section {
        Section {
            name: name.into(),
            title: title.into(),
            start_page,
            is_subsection: false,
            parent_name: None,
        }
    }

    #[test]
    fn duplicate_names_keep_first_after_numeric_sort() {
        let validated = validate_sections(vec![
            section("2", "Later", 4),
            section("1", "First", 1),
            section("2", "Duplicate", 6),
        ]);
        let pairs: Vec<(&str, &str)> = validated
            .iter()
            .map(|s| (s.name.as_str(), s.title.as_str()))
            .collect();
        assert_eq!(pairs, [("1", "First"), ("2", "Later")]);
    }

    #[test]
    fn validation_recomputes_subsection_flags_and_parents() {
        let mut nested = section("3.2", "Nested", 5);
        nested.is_subsection = false;
        let validated = validate_sections(vec![nested]);
        assert!(validated[0].is_subsection);
        assert_eq!(validated[0].parent_name.as_deref(), Some("3"));
    }

    #[test]
    fn zero_start_pages_are_dropped() {
        let validated = validate_sections(vec![section("1", "Ghost", 0)]);
        assert!(validated.is_empty());
    }
}
