use paper_fetch::arxiv::parse_atom_feed;
use paper_fetch::cache::{sha256_hex, PdfCache};
use paper_fetch::semantic_scholar::process_paper;
use paper_fetch::FetchError;
use serde_json::json;

const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query Results</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
 You Need</title>
    <summary>The dominant sequence transduction models are based on complex
recurrent networks.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <published>2024-01-01T00:00:00Z</published>
    <title>Second Paper</title>
    <summary>Another abstract.</summary>
    <author><name>Solo Author</name></author>
    <category term="cs.AI" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

#[test]
fn atom_feed_parses_into_paper_metadata() {
    let papers = parse_atom_feed(ATOM_SAMPLE).expect("well-formed feed parses");
    assert_eq!(papers.len(), 2);

    let first = &papers[0];
    assert_eq!(first.id, "1706.03762v7");
    assert_eq!(first.title, "Attention Is All You Need");
    assert!(first.abstract_text.starts_with("The dominant sequence"));
    assert!(!first.abstract_text.contains('\n'));
    assert_eq!(first.authors, ["Ashish Vaswani", "Noam Shazeer"]);
    assert_eq!(first.categories, ["cs.CL", "cs.LG"]);
    assert_eq!(first.published, "2017-06-12T17:57:34Z");
    assert_eq!(first.pdf_url, "http://arxiv.org/pdf/1706.03762v7");
    assert_eq!(first.paper_url, "http://arxiv.org/abs/1706.03762v7");
    assert_eq!(first.source, "arxiv");

    // Entries without an explicit pdf link derive one from the id.
    let second = &papers[1];
    assert_eq!(second.id, "2401.00001v1");
    assert_eq!(second.pdf_url, "https://arxiv.org/pdf/2401.00001v1.pdf");
}

#[test]
fn empty_feed_parses_to_no_papers() {
    let xml = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"></feed>"#;
    let papers = parse_atom_feed(xml).expect("empty feed parses");
    assert!(papers.is_empty());
}

#[test]
fn semantic_scholar_record_maps_fields() {
    let raw = json!({
        "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
        "title": "Deep Residual Learning",
        "abstract": "We present residual learning.",
        "year": 2016,
        "publicationDate": "2015-12-10",
        "authors": [{"name": "Kaiming He"}, {"name": "Xiangyu Zhang"}],
        "fieldsOfStudy": ["Computer Science"],
        "openAccessPdf": {"url": "https://example.org/resnet.pdf"},
        "citationCount": 180000,
        "venue": "CVPR",
    });
    let paper = process_paper(&raw).expect("open-access record maps");
    assert_eq!(paper.id, "649def34f8be52c8b66281af98ae884c09aef38b");
    assert_eq!(paper.title, "Deep Residual Learning");
    assert_eq!(paper.authors, ["Kaiming He", "Xiangyu Zhang"]);
    assert_eq!(paper.categories, ["Computer Science"]);
    assert_eq!(paper.published, "2015-12-10");
    assert_eq!(paper.pdf_url, "https://example.org/resnet.pdf");
    assert_eq!(paper.citation_count, Some(180_000));
    assert_eq!(paper.venue.as_deref(), Some("CVPR"));
    assert_eq!(paper.source, "semantic_scholar");
}

#[test]
fn semantic_scholar_record_without_pdf_is_dropped() {
    let raw = json!({
        "paperId": "abc",
        "title": "Closed Access",
        "year": 2020,
    });
    assert!(process_paper(&raw).is_none());
}

#[test]
fn semantic_scholar_year_backfills_publication_date() {
    let raw = json!({
        "paperId": "abc",
        "title": "Undated",
        "year": 2019,
        "openAccessPdf": {"url": "https://example.org/a.pdf"},
    });
    let paper = process_paper(&raw).expect("record maps");
    assert_eq!(paper.published, "2019-01-01");
    assert_eq!(paper.updated, "2019-01-01");
}

#[test]
fn transient_classification_covers_throttling_and_server_errors() {
    assert!(FetchError::Status(429).is_transient());
    assert!(FetchError::Status(503).is_transient());
    assert!(!FetchError::Status(404).is_transient());
    assert!(!FetchError::Malformed("bad".into()).is_transient());
    assert!(!FetchError::UnknownPaper("p".into()).is_transient());
}

#[tokio::test]
async fn pdf_cache_stores_and_finds_papers_with_awkward_ids() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let cache = PdfCache::new(dir.path());

    let id = "arXiv:2401.00001/v1";
    assert!(cache.lookup(id).await.is_none());

    let path = cache.store(id, b"%PDF-1.5 fake").await.expect("store succeeds");
    assert!(path.file_name().is_some());
    assert!(!path.to_string_lossy().contains(':'));

    let found = cache.lookup(id).await.expect("stored paper is found");
    assert_eq!(found, path);
}

#[test]
fn sha256_digest_is_stable() {
    assert_eq!(
        sha256_hex(b"abc"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}
