//! arXiv paper source backed by the Atom query API.

use async_trait::async_trait;
use paper_model::PaperMeta;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::cache::{download_pdf, PdfCache};
use crate::{FetchError, FetchedContent, PaperSource};

const DEFAULT_BASE_URL: &str = "https://export.arxiv.org";

/// Fetches paper metadata and PDFs from arXiv.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: reqwest::Client,
    cache: PdfCache,
    base_url: String,
}

impl ArxivSource {
    pub fn new(cache: PdfCache) -> Self {
        Self::with_base_url(cache, DEFAULT_BASE_URL)
    }

    /// Override the API host (tests point this at a local server).
    pub fn with_base_url(cache: PdfCache, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn pdf_url(&self, paper_id: &str) -> String {
        format!("{}/pdf/{}.pdf", self.base_url, paper_id)
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    async fn fetch_papers(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<PaperMeta>, FetchError> {
        let url = format!("{}/api/query", self.base_url);
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("search_query", query),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", "submittedDate"),
                ("sortOrder", "descending"),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let papers = parse_atom_feed(&body)?;
        tracing::info!(query, papers = papers.len(), "fetched arxiv metadata");
        Ok(papers)
    }

    async fn fetch_content(&self, paper_id: &str) -> Result<Option<FetchedContent>, FetchError> {
        let url = self.pdf_url(paper_id);
        match download_pdf(&self.client, &self.cache, paper_id, &url).await {
            Ok(path) => Ok(Some(FetchedContent {
                path,
                source_type: "pdf".into(),
                url,
            })),
            // A missing PDF is permanent unavailability, not a fault.
            Err(FetchError::Status(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn local_name(q: &[u8]) -> &[u8] {
    match q.iter().position(|&b| b == b':') {
        Some(i) => &q[i + 1..],
        None => q,
    }
}

fn attr_val(e: &BytesStart<'_>, key_local: &[u8]) -> Option<String> {
    for a in e.attributes().with_checks(false).flatten() {
        if local_name(a.key.as_ref()) == key_local {
            return Some(String::from_utf8_lossy(&a.value).into_owned());
        }
    }
    None
}

#[derive(Default)]
struct EntryBuilder {
    id: String,
    title: String,
    abstract_text: String,
    authors: Vec<String>,
    categories: Vec<String>,
    published: String,
    updated: String,
    pdf_url: String,
    paper_url: String,
}

impl EntryBuilder {
    fn finish(self) -> Option<PaperMeta> {
        if self.id.is_empty() {
            return None;
        }
        let pdf_url = if self.pdf_url.is_empty() {
            format!("https://arxiv.org/pdf/{}.pdf", self.id)
        } else {
            self.pdf_url
        };
        Some(PaperMeta {
            id: self.id,
            title: squash_whitespace(&self.title),
            abstract_text: squash_whitespace(&self.abstract_text),
            authors: self.authors,
            categories: self.categories,
            published: self.published,
            updated: self.updated,
            pdf_url,
            paper_url: self.paper_url,
            source: "arxiv".into(),
            citation_count: None,
            venue: None,
        })
    }
}

/// Atom titles/abstracts wrap lines; collapse to single spaces.
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Entry id element carries the abs URL; the paper id is its last path
/// segment (version suffix retained).
fn id_from_entry_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}

/// Parses an arXiv Atom feed into paper metadata records.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<PaperMeta>, FetchError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut papers: Vec<PaperMeta> = Vec::new();
    let mut entry: Option<EntryBuilder> = None;
    let mut in_author = false;
    let mut text_field: Option<&'static str> = None;
    let mut text_buf = String::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match local_name(e.name().as_ref()) {
                b"entry" => entry = Some(EntryBuilder::default()),
                b"author" => in_author = true,
                b"id" if entry.is_some() => text_field = Some("id"),
                b"title" if entry.is_some() => text_field = Some("title"),
                b"summary" if entry.is_some() => text_field = Some("summary"),
                b"published" if entry.is_some() => text_field = Some("published"),
                b"updated" if entry.is_some() => text_field = Some("updated"),
                b"name" if in_author => text_field = Some("name"),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if let Some(builder) = entry.as_mut() {
                    match local_name(e.name().as_ref()) {
                        b"category" => {
                            if let Some(term) = attr_val(&e, b"term") {
                                builder.categories.push(term);
                            }
                        }
                        b"link" => {
                            let href = attr_val(&e, b"href").unwrap_or_default();
                            let is_pdf = attr_val(&e, b"title").as_deref() == Some("pdf");
                            let is_abs = attr_val(&e, b"rel").as_deref() == Some("alternate");
                            if is_pdf {
                                builder.pdf_url = href;
                            } else if is_abs {
                                builder.paper_url = href;
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if text_field.is_some() {
                    if let Ok(cow) = t.unescape() {
                        text_buf.push_str(&cow);
                    }
                }
            }
            Ok(Event::End(e)) => {
                let qname = e.name();
                let name = local_name(qname.as_ref());
                if let (Some(field), Some(builder)) = (text_field, entry.as_mut()) {
                    let value = std::mem::take(&mut text_buf);
                    match field {
                        "id" if name == b"id" => builder.id = id_from_entry_url(value.trim()),
                        "title" if name == b"title" => builder.title = value,
                        "summary" if name == b"summary" => builder.abstract_text = value,
                        "published" if name == b"published" => {
                            builder.published = value.trim().to_string()
                        }
                        "updated" if name == b"updated" => {
                            builder.updated = value.trim().to_string()
                        }
                        "name" if name == b"name" => builder.authors.push(value.trim().to_string()),
                        _ => {
                            // Closing a different element: keep collecting.
                            text_buf = value;
                            continue;
                        }
                    }
                    text_field = None;
                    continue;
                }
                match name {
                    b"author" => in_author = false,
                    b"entry" => {
                        if let Some(meta) = entry.take().and_then(EntryBuilder::finish) {
                            papers.push(meta);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::Malformed(format!("atom parse error: {e}"))),
            _ => {}
        }
    }

    Ok(papers)
}
