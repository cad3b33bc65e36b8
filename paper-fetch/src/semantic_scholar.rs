//! Semantic Scholar paper source backed by the bulk search API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use paper_model::PaperMeta;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::cache::{download_pdf, PdfCache};
use crate::{FetchError, FetchedContent, PaperSource};

const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";
const FIELDS: &str = "title,abstract,year,authors,openAccessPdf,citationCount,venue,publicationDate,fieldsOfStudy";

/// Fetches highly cited open-access papers from Semantic Scholar.
///
/// Content fetching relies on the `openAccessPdf` URL carried by the
/// listing, so metadata for a paper must be fetched before its PDF.
#[derive(Debug)]
pub struct SemanticScholarSource {
    client: reqwest::Client,
    cache: PdfCache,
    base_url: String,
    min_citations: u64,
    /// Listing results kept for later content fetches.
    known: RwLock<HashMap<String, PaperMeta>>,
}

impl SemanticScholarSource {
    pub fn new(cache: PdfCache) -> Self {
        Self::with_base_url(cache, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(cache: PdfCache, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            min_citations: 100,
            known: RwLock::new(HashMap::new()),
        }
    }

    pub fn min_citations(mut self, min_citations: u64) -> Self {
        self.min_citations = min_citations;
        self
    }
}

#[async_trait]
impl PaperSource for SemanticScholarSource {
    async fn fetch_papers(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<PaperMeta>, FetchError> {
        let url = format!("{}/graph/v1/paper/search/bulk", self.base_url);
        let mut papers: Vec<PaperMeta> = Vec::new();
        let mut token: Option<String> = None;

        let limit = max_results.min(1000).to_string();
        let min_citations = self.min_citations.to_string();
        while papers.len() < max_results {
            let mut request = self.client.get(&url).query(&[
                ("query", query),
                ("limit", limit.as_str()),
                ("fields", FIELDS),
                ("sort", "citationCount:desc"),
                ("openAccessPdf", ""),
                ("fieldsOfStudy", "Computer Science"),
                ("minCitationCount", min_citations.as_str()),
            ]);
            if let Some(t) = &token {
                request = request.query(&[("token", t.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }
            let body: Value = response.json().await?;

            let data = body
                .get("data")
                .and_then(Value::as_array)
                .ok_or_else(|| FetchError::Malformed("missing data array".into()))?;
            for raw in data {
                if let Some(meta) = process_paper(raw) {
                    papers.push(meta);
                }
            }

            token = body.get("token").and_then(Value::as_str).map(str::to_string);
            if token.is_none() || papers.len() >= max_results {
                break;
            }
            // Be nice to the API between pagination requests.
            tokio::time::sleep(Duration::from_secs(3)).await;
        }

        papers.truncate(max_results);
        {
            let mut known = self.known.write().await;
            for paper in &papers {
                known.insert(paper.id.clone(), paper.clone());
            }
        }
        tracing::info!(query, papers = papers.len(), "fetched semantic scholar metadata");
        Ok(papers)
    }

    async fn fetch_content(&self, paper_id: &str) -> Result<Option<FetchedContent>, FetchError> {
        let paper = {
            let known = self.known.read().await;
            known.get(paper_id).cloned()
        };
        let paper = paper.ok_or_else(|| FetchError::UnknownPaper(paper_id.to_string()))?;
        if paper.pdf_url.is_empty() {
            return Ok(None);
        }
        match download_pdf(&self.client, &self.cache, paper_id, &paper.pdf_url).await {
            Ok(path) => Ok(Some(FetchedContent {
                path,
                source_type: "pdf".into(),
                url: paper.pdf_url,
            })),
            Err(FetchError::Status(404)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Maps one raw API record into [`PaperMeta`]. Records without an
/// open-access PDF are dropped.
pub fn process_paper(raw: &Value) -> Option<PaperMeta> {
    let pdf_url = raw
        .get("openAccessPdf")
        .and_then(|p| p.get("url"))
        .and_then(Value::as_str)?
        .to_string();
    let id = raw.get("paperId").and_then(Value::as_str)?.to_string();

    let year_date = raw
        .get("year")
        .and_then(Value::as_u64)
        .map(|y| format!("{y}-01-01"));
    let published = raw
        .get("publicationDate")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(year_date)
        .unwrap_or_default();

    Some(PaperMeta {
        paper_url: format!("https://www.semanticscholar.org/paper/{id}"),
        id,
        title: raw
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        abstract_text: raw
            .get("abstract")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        authors: raw
            .get("authors")
            .and_then(Value::as_array)
            .map(|authors| {
                authors
                    .iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        categories: raw
            .get("fieldsOfStudy")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        updated: published.clone(),
        published,
        pdf_url,
        source: "semantic_scholar".into(),
        citation_count: raw.get("citationCount").and_then(Value::as_u64),
        venue: raw
            .get("venue")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    })
}
