//! Resumable batch orchestrator: fetch → segment → index over many
//! papers with checkpointing, bounded concurrency, retry, and
//! permanent-skip tracking.
//!
//! Batches run strictly sequentially; papers inside a batch run
//! concurrently and their results are gathered and partitioned, so one
//! paper's failure never blocks another's. The checkpoint is rewritten
//! atomically after each batch, making restarts at-least-once: a crash
//! mid-batch replays that batch's unfinished items against the on-disk
//! PDF cache and the id-stable index.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use paper_fetch::{FetchedContent, PaperSource, PdfCache};
use paper_model::PaperMeta;
use paper_segmenter::{ChunkParams, ImageFilter, SegmentOutput, TextExtractor};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{RagService, ServiceError};

/// Pipeline stage labels used in the error log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Process,
    Rag,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Process => "process",
            Stage::Rag => "rag",
        }
    }
}

/// Why a paper was permanently excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Fetch returned nothing, or transient failures exhausted retries.
    FetchFailed,
    /// Segmentation produced no chunks or no sections.
    ProcessingFailed,
    /// Segmentation raised an error.
    ProcessError,
    /// Index insertion raised an error.
    RagError,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::FetchFailed => "fetch_failed",
            SkipReason::ProcessingFailed => "processing_failed",
            SkipReason::ProcessError => "process_error",
            SkipReason::RagError => "rag_error",
        }
    }
}

/// Explicit stage result: the stage either produced its value or
/// classified the paper as a permanent skip.
enum StageOutcome<T> {
    Ready(T),
    Skip(SkipReason),
}

/// A fault raised by a stage, carried into the error log.
#[derive(Debug)]
struct StageFault {
    stage: Stage,
    message: String,
}

/// Terminal state of one paper within a run.
#[derive(Debug)]
enum PaperOutcome {
    Indexed,
    Skipped {
        reason: SkipReason,
        fault: Option<StageFault>,
    },
}

struct PaperRun {
    paper_id: String,
    outcome: PaperOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorRecord {
    timestamp: String,
    paper_id: String,
    stage: String,
    error: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SkipRecord {
    timestamp: String,
    paper_id: String,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// Directory for downloaded PDFs and the metadata cache.
    pub cache_dir: PathBuf,
    pub checkpoint_file: PathBuf,
    pub error_log: PathBuf,
    pub skip_log: PathBuf,
    /// Papers processed concurrently per batch.
    pub batch_size: usize,
    /// Pause between successive batches (upstream rate limits).
    pub cooldown: Duration,
    /// Fetch attempts before a transient failure becomes permanent.
    pub max_fetch_attempts: u32,
    /// First retry delay; doubles per attempt.
    pub retry_base_delay: Duration,
    /// Re-run papers already in the checkpoint or skip set.
    pub force_reprocess: bool,
    pub chunk_params: ChunkParams,
    pub image_filter: ImageFilter,
}

impl Default for IngesterConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            checkpoint_file: PathBuf::from("ingestion_checkpoint.json"),
            error_log: PathBuf::from("ingestion_errors.jsonl"),
            skip_log: PathBuf::from("ingestion_skipped.jsonl"),
            batch_size: 10,
            cooldown: Duration::from_secs(30),
            max_fetch_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            force_reprocess: false,
            chunk_params: ChunkParams::default(),
            image_filter: ImageFilter::default(),
        }
    }
}

/// Summary of one orchestrator run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Checkpoint size after the run.
    pub processed_total: usize,
    pub newly_processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

/// Drives paper ids through fetch → segment → index with durable
/// progress. Collaborators are injected and live for one run.
pub struct BatchIngester {
    source: Arc<dyn PaperSource>,
    service: Arc<RagService>,
    extractor: Arc<dyn TextExtractor>,
    cache: PdfCache,
    config: IngesterConfig,
    skipped: HashSet<String>,
    metadata_cache: HashMap<String, PaperMeta>,
}

impl BatchIngester {
    /// Builds an ingester, loading the skip set and metadata cache
    /// from previous runs.
    pub async fn new(
        source: Arc<dyn PaperSource>,
        service: Arc<RagService>,
        extractor: Arc<dyn TextExtractor>,
        config: IngesterConfig,
    ) -> Result<Self, ServiceError> {
        fs::create_dir_all(&config.cache_dir).await?;
        let skipped = load_skip_set(&config.skip_log).await?;
        let metadata_cache = load_metadata_cache(&metadata_cache_path(&config.cache_dir)).await?;
        if !skipped.is_empty() {
            tracing::info!(skipped = skipped.len(), "loaded skip set");
        }
        if !metadata_cache.is_empty() {
            tracing::info!(cached = metadata_cache.len(), "loaded metadata cache");
        }
        Ok(Self {
            cache: PdfCache::new(&config.cache_dir),
            source,
            service,
            extractor,
            config,
            skipped,
            metadata_cache,
        })
    }

    pub fn metadata_cache(&self) -> &HashMap<String, PaperMeta> {
        &self.metadata_cache
    }

    /// Ingests papers from an explicit list, or from a source query
    /// when no list is given. Returns the run summary; a failure to
    /// fetch the paper list aborts the call without touching the
    /// checkpoint.
    pub async fn ingest_papers(
        &mut self,
        query: Option<&str>,
        papers: Option<Vec<PaperMeta>>,
        max_papers: usize,
    ) -> Result<IngestReport, ServiceError> {
        let mut processed = load_checkpoint(&self.config.checkpoint_file).await?;
        if !processed.is_empty() {
            tracing::info!(processed = processed.len(), "resuming from checkpoint");
        }

        let papers = match papers {
            Some(papers) => papers,
            None => {
                let query = query.unwrap_or("cat:cs.AI");
                let papers = self.source.fetch_papers(query, max_papers).await?;
                for paper in &papers {
                    self.metadata_cache.insert(paper.id.clone(), paper.clone());
                }
                save_metadata_cache(
                    &metadata_cache_path(&self.config.cache_dir),
                    &self.metadata_cache,
                )
                .await?;
                papers
            }
        };

        let pending: Vec<PaperMeta> = papers
            .into_iter()
            .filter(|p| {
                self.config.force_reprocess
                    || (!processed.contains(&p.id) && !self.skipped.contains(&p.id))
            })
            .collect();

        let mut report = IngestReport {
            processed_total: processed.len(),
            ..IngestReport::default()
        };
        if pending.is_empty() {
            tracing::info!("no new papers to process");
            return Ok(report);
        }
        tracing::info!(
            papers = pending.len(),
            batch_size = self.config.batch_size,
            "processing new papers"
        );

        let batch_size = self.config.batch_size.max(1);
        let batch_count = pending.len().div_ceil(batch_size);
        for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
            let runs = join_all(batch.iter().map(|paper| self.process_single(paper))).await;

            let mut newly_processed: Vec<String> = Vec::new();
            for run in runs {
                match run.outcome {
                    PaperOutcome::Indexed => newly_processed.push(run.paper_id),
                    PaperOutcome::Skipped { reason, fault } => {
                        if let Some(fault) = fault {
                            report.errored += 1;
                            tracing::error!(
                                paper_id = %run.paper_id,
                                stage = fault.stage.as_str(),
                                error = %fault.message,
                                "paper failed"
                            );
                            append_jsonl(
                                &self.config.error_log,
                                &ErrorRecord {
                                    timestamp: Utc::now().to_rfc3339(),
                                    paper_id: run.paper_id.clone(),
                                    stage: fault.stage.as_str().into(),
                                    error: fault.message,
                                },
                            )
                            .await?;
                        }
                        report.skipped += 1;
                        append_jsonl(
                            &self.config.skip_log,
                            &SkipRecord {
                                timestamp: Utc::now().to_rfc3339(),
                                paper_id: run.paper_id.clone(),
                                reason: reason.as_str().into(),
                            },
                        )
                        .await?;
                        self.skipped.insert(run.paper_id);
                    }
                }
            }

            report.newly_processed += newly_processed.len();
            processed.extend(newly_processed);
            save_checkpoint(&self.config.checkpoint_file, &processed).await?;
            tracing::info!(
                batch = batch_index + 1,
                batches = batch_count,
                processed = processed.len(),
                "batch committed"
            );

            if batch_index + 1 < batch_count && !self.config.cooldown.is_zero() {
                tokio::time::sleep(self.config.cooldown).await;
            }
        }

        report.processed_total = processed.len();
        Ok(report)
    }

    /// Runs one paper through the three stages, classifying every exit.
    async fn process_single(&self, paper: &PaperMeta) -> PaperRun {
        let paper_id = paper.id.clone();

        let content = match self.fetch_stage(paper).await {
            Ok(StageOutcome::Ready(content)) => content,
            Ok(StageOutcome::Skip(reason)) => {
                return PaperRun {
                    paper_id,
                    outcome: PaperOutcome::Skipped { reason, fault: None },
                }
            }
            Err(fault) => {
                return PaperRun {
                    paper_id,
                    outcome: PaperOutcome::Skipped {
                        reason: SkipReason::FetchFailed,
                        fault: Some(fault),
                    },
                }
            }
        };

        let output = match self.process_stage(&paper_id, &content).await {
            Ok(StageOutcome::Ready(output)) => output,
            Ok(StageOutcome::Skip(reason)) => {
                return PaperRun {
                    paper_id,
                    outcome: PaperOutcome::Skipped { reason, fault: None },
                }
            }
            Err(fault) => {
                return PaperRun {
                    paper_id,
                    outcome: PaperOutcome::Skipped {
                        reason: SkipReason::ProcessError,
                        fault: Some(fault),
                    },
                }
            }
        };

        match self
            .service
            .add_paper(&output.chunks, &output.sections, &output.images, paper)
            .await
        {
            Ok(()) => PaperRun {
                paper_id,
                outcome: PaperOutcome::Indexed,
            },
            Err(e) => PaperRun {
                paper_id,
                outcome: PaperOutcome::Skipped {
                    reason: SkipReason::RagError,
                    fault: Some(StageFault {
                        stage: Stage::Rag,
                        message: e.to_string(),
                    }),
                },
            },
        }
    }

    /// Fetch with cache short-circuit and bounded exponential backoff.
    /// Only transient transport errors retry; an empty result is a
    /// permanent skip; exhausted retries escalate to a fault.
    async fn fetch_stage(
        &self,
        paper: &PaperMeta,
    ) -> Result<StageOutcome<FetchedContent>, StageFault> {
        if let Some(path) = self.cache.lookup(&paper.id).await {
            tracing::debug!(paper_id = %paper.id, "using cached pdf");
            return Ok(StageOutcome::Ready(FetchedContent {
                path,
                source_type: "pdf".into(),
                url: paper.pdf_url.clone(),
            }));
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.source.fetch_content(&paper.id).await {
                Ok(Some(content)) => return Ok(StageOutcome::Ready(content)),
                Ok(None) => return Ok(StageOutcome::Skip(SkipReason::FetchFailed)),
                Err(e) if e.is_transient() && attempt < self.config.max_fetch_attempts => {
                    let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        paper_id = %paper.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient fetch failure; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return Err(StageFault {
                        stage: Stage::Fetch,
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    /// Segmentation on a blocking thread; empty results are skips.
    async fn process_stage(
        &self,
        paper_id: &str,
        content: &FetchedContent,
    ) -> Result<StageOutcome<SegmentOutput>, StageFault> {
        let extractor = Arc::clone(&self.extractor);
        let path = content.path.clone();
        let id = paper_id.to_string();
        let params = self.config.chunk_params;
        let filter = self.config.image_filter;

        let joined = tokio::task::spawn_blocking(move || {
            paper_segmenter::segment_pdf(&path, &id, extractor.as_ref(), &params, &filter)
        })
        .await;

        match joined {
            Ok(Ok(output)) => {
                if output.chunks.is_empty() || output.sections.is_empty() {
                    Ok(StageOutcome::Skip(SkipReason::ProcessingFailed))
                } else {
                    Ok(StageOutcome::Ready(output))
                }
            }
            Ok(Err(e)) => Err(StageFault {
                stage: Stage::Process,
                message: e.to_string(),
            }),
            Err(e) => Err(StageFault {
                stage: Stage::Process,
                message: format!("segmentation task failed: {e}"),
            }),
        }
    }
}

fn metadata_cache_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("metadata_cache.json")
}

async fn load_checkpoint(path: &Path) -> Result<HashSet<String>, ServiceError> {
    match fs::read(path).await {
        Ok(bytes) => {
            let ids: Vec<String> = serde_json::from_slice(&bytes)?;
            Ok(ids.into_iter().collect())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(e.into()),
    }
}

/// Atomic rewrite: serialize to a sibling temp file, then rename over
/// the checkpoint so readers never observe a partial write.
async fn save_checkpoint(path: &Path, processed: &HashSet<String>) -> Result<(), ServiceError> {
    let mut ids: Vec<&String> = processed.iter().collect();
    ids.sort();
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, serde_json::to_vec(&ids)?).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn load_skip_set(path: &Path) -> Result<HashSet<String>, ServiceError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };
    let mut skipped = HashSet::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<SkipRecord>(line) {
            Ok(record) => {
                skipped.insert(record.paper_id);
            }
            Err(e) => tracing::warn!(error = %e, "unreadable skip log line"),
        }
    }
    Ok(skipped)
}

async fn load_metadata_cache(path: &Path) -> Result<HashMap<String, PaperMeta>, ServiceError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

async fn save_metadata_cache(
    path: &Path,
    cache: &HashMap<String, PaperMeta>,
) -> Result<(), ServiceError> {
    fs::write(path, serde_json::to_vec(cache)?).await?;
    Ok(())
}

/// Appends one record to a JSON-lines log. Logs are append-only and
/// never rewritten.
async fn append_jsonl<T: Serialize>(path: &Path, record: &T) -> Result<(), ServiceError> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}
