use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use embedding_provider::{default_http_config, HttpEmbedder};
use paper_fetch::{ArxivSource, PaperSource, PdfCache, SemanticScholarSource};
use paper_segmenter::PdfTextExtractor;
use rag_service::{BatchIngester, IngesterConfig, RagService};
use rag_store::{FsObjectStore, MemoryVectorIndex};

fn print_usage() {
    eprintln!(
        "Usage:\n\
         ingest-cli ingest [--query Q | --category CAT [--date-from YYYYMMDD] [--date-to YYYYMMDD]]\n\
                   [--source arxiv|semantic-scholar] [--max-papers N] [--batch-size N]\n\
                   [--cache DIR] [--images DIR] [--cooldown SECS] [--force]\n\
                   [--embed-endpoint URL] [--ask QUESTION [--k N]]\n\
         \n\
         Notes: cache defaults to ./cache, images to ./images; --ask runs a retrieval\n\
         against this run's index after ingestion finishes.\n"
    );
}

struct IngestArgs {
    query: Option<String>,
    category: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
    source: String,
    max_papers: usize,
    batch_size: usize,
    cache_dir: PathBuf,
    image_dir: PathBuf,
    cooldown: u64,
    force: bool,
    embed_endpoint: Option<String>,
    ask: Option<String>,
    top_k: usize,
}

impl Default for IngestArgs {
    fn default() -> Self {
        Self {
            query: None,
            category: None,
            date_from: None,
            date_to: None,
            source: "arxiv".into(),
            max_papers: 50,
            batch_size: 10,
            cache_dir: PathBuf::from("./cache"),
            image_dir: PathBuf::from("./images"),
            cooldown: 30,
            force: false,
            embed_endpoint: None,
            ask: None,
            top_k: 4,
        }
    }
}

fn parse_ingest_args(rest: Vec<String>) -> Result<IngestArgs, String> {
    let mut args = IngestArgs::default();
    let mut i = 0;
    while i < rest.len() {
        match rest[i].as_str() {
            "--query" => { if i + 1 < rest.len() { args.query = Some(rest[i + 1].clone()); i += 2; } else { return Err("--query requires value".into()); } }
            "--category" => { if i + 1 < rest.len() { args.category = Some(rest[i + 1].clone()); i += 2; } else { return Err("--category requires value".into()); } }
            "--date-from" => { if i + 1 < rest.len() { args.date_from = Some(rest[i + 1].clone()); i += 2; } else { return Err("--date-from requires value".into()); } }
            "--date-to" => { if i + 1 < rest.len() { args.date_to = Some(rest[i + 1].clone()); i += 2; } else { return Err("--date-to requires value".into()); } }
            "--source" => { if i + 1 < rest.len() { args.source = rest[i + 1].clone(); i += 2; } else { return Err("--source requires value".into()); } }
            "--max-papers" => { if i + 1 < rest.len() { args.max_papers = rest[i + 1].parse().unwrap_or(args.max_papers); i += 2; } else { return Err("--max-papers requires number".into()); } }
            "--batch-size" => { if i + 1 < rest.len() { args.batch_size = rest[i + 1].parse().unwrap_or(args.batch_size); i += 2; } else { return Err("--batch-size requires number".into()); } }
            "--cache" => { if i + 1 < rest.len() { args.cache_dir = PathBuf::from(&rest[i + 1]); i += 2; } else { return Err("--cache requires dir".into()); } }
            "--images" => { if i + 1 < rest.len() { args.image_dir = PathBuf::from(&rest[i + 1]); i += 2; } else { return Err("--images requires dir".into()); } }
            "--cooldown" => { if i + 1 < rest.len() { args.cooldown = rest[i + 1].parse().unwrap_or(args.cooldown); i += 2; } else { return Err("--cooldown requires seconds".into()); } }
            "--force" => { args.force = true; i += 1; }
            "--embed-endpoint" => { if i + 1 < rest.len() { args.embed_endpoint = Some(rest[i + 1].clone()); i += 2; } else { return Err("--embed-endpoint requires url".into()); } }
            "--ask" => { if i + 1 < rest.len() { args.ask = Some(rest[i + 1].clone()); i += 2; } else { return Err("--ask requires question".into()); } }
            "--k" => { if i + 1 < rest.len() { args.top_k = rest[i + 1].parse().unwrap_or(args.top_k); i += 2; } else { return Err("--k requires number".into()); } }
            other => return Err(format!("unknown flag: {other}")),
        }
    }
    Ok(args)
}

/// Builds an arXiv query from category and date bounds when no raw
/// query is given.
fn build_query(args: &IngestArgs) -> Option<String> {
    if let Some(query) = &args.query {
        return Some(query.clone());
    }
    let category = args.category.as_ref()?;
    let mut query = format!("cat:{category}");
    if let (Some(from), Some(to)) = (&args.date_from, &args.date_to) {
        query.push_str(&format!(" AND submittedDate:[{from} TO {to}]"));
    }
    Some(query)
}

async fn do_ingest(args: IngestArgs) -> Result<(), String> {
    let cache = PdfCache::new(&args.cache_dir);
    let source: Arc<dyn PaperSource> = match args.source.as_str() {
        "arxiv" => Arc::new(ArxivSource::new(cache)),
        "semantic-scholar" => Arc::new(SemanticScholarSource::new(cache)),
        other => return Err(format!("unknown source: {other}")),
    };

    let mut embed_config = default_http_config();
    if let Some(endpoint) = &args.embed_endpoint {
        embed_config.endpoint = endpoint.clone();
    }
    let embedder = HttpEmbedder::new(embed_config).map_err(|e| format!("embedder init failed: {e}"))?;

    let service = Arc::new(RagService::new(
        Arc::new(embedder),
        Arc::new(MemoryVectorIndex::new()),
        Arc::new(FsObjectStore::new(&args.image_dir)),
    ));

    let config = IngesterConfig {
        cache_dir: args.cache_dir.clone(),
        batch_size: args.batch_size,
        cooldown: Duration::from_secs(args.cooldown),
        force_reprocess: args.force,
        ..IngesterConfig::default()
    };
    let error_log = config.error_log.clone();

    let mut ingester = BatchIngester::new(
        source,
        Arc::clone(&service),
        Arc::new(PdfTextExtractor),
        config,
    )
    .await
    .map_err(|e| format!("ingester init failed: {e}"))?;

    let query = build_query(&args);
    let report = ingester
        .ingest_papers(query.as_deref(), None, args.max_papers)
        .await
        .map_err(|e| format!("ingestion failed: {e}"))?;

    println!(
        "Ingested {} new papers ({} total processed, {} skipped, {} errored)",
        report.newly_processed, report.processed_total, report.skipped, report.errored
    );

    if report.errored > 0 {
        if let Ok(content) = std::fs::read_to_string(&error_log) {
            eprintln!("Most recent failures:");
            for line in content.lines().rev().take(report.errored.min(5)) {
                eprintln!("  {line}");
            }
        }
    }

    if let Some(question) = &args.ask {
        let contexts = service
            .retrieve(question, args.top_k)
            .await
            .map_err(|e| format!("retrieval failed: {e}"))?;
        println!("\nTop {} contexts for: {question}", contexts.len());
        for (i, ctx) in contexts.iter().enumerate() {
            let section = ctx
                .chunk
                .metadata
                .section_id
                .as_deref()
                .unwrap_or("(no section)");
            let preview = truncate_chars(&ctx.chunk.text, 80);
            println!(
                "{:>2}. [{}] score={:.4} {} | {}",
                i + 1,
                ctx.chunk.metadata.paper_id,
                ctx.score,
                section,
                preview
            );
        }
    }

    Ok(())
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let mut it = s.chars();
    let truncated: String = it.by_ref().take(max_chars).collect();
    if it.next().is_some() { format!("{}…", truncated) } else { truncated }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }
    let cmd = args.remove(0);
    let res = match cmd.as_str() {
        "ingest" => match parse_ingest_args(args) {
            Ok(parsed) => do_ingest(parsed).await,
            Err(e) => Err(e),
        },
        _ => {
            print_usage();
            return;
        }
    };
    if let Err(err) = res {
        eprintln!("Error: {}", err);
        print_usage();
    }
}
