//! Harvester orchestrating the network pipeline
//!
//! For every partition key: walk the search pages, skip documents whose
//! snapshot already exists, fetch and extract the rest, map their
//! classifiers, and checkpoint after every document attempt. At the end of
//! a partition the buffered records are flushed to the sink and dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::artifact::{self, ArtifactError};
use super::batch::{self, BatchError};
use super::checkpoint::{self, CheckpointError, ResumeCursor};
use super::extractor::DocumentExtractor;
use super::fetcher::{CrawlContext, FetchOutcome, RequestKind, Transport, TransportError};
use super::taxonomy::{Granularity, LabelMapping, TaxonomyError};
use super::terms::TermError;
use super::walker::{PageWalker, WalkSettings, WalkState};
use crate::types::{DocId, DocumentRecord, PartitionKey, SearchResultStub};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("Taxonomy error: {0}")]
    Taxonomy(#[from] TaxonomyError),
    #[error("Term error: {0}")]
    Term(#[from] TermError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Snapshot replay failed: {0}")]
    Batch(#[from] BatchError),
    #[error("Checkpoint points at {0}, which is not among the requested keys")]
    ResumeKeyMissing(String),
}

/// Runtime settings of a harvest
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub walk: WalkSettings,
    pub granularities: BTreeSet<Granularity>,
    /// Skip documents whose snapshot already exists
    pub skip_existing: bool,
    /// Flush each finished partition to `<json_dir>/<key>.json.gz`
    pub save_data: bool,
    /// Pause after every fetched document
    pub pacing: Duration,
}

impl HarvestConfig {
    pub fn from_config(
        config: &crate::config::Config,
        walk: WalkSettings,
        granularities: BTreeSet<Granularity>,
    ) -> Self {
        Self {
            walk,
            granularities,
            skip_existing: config.crawl.skip_existing,
            save_data: config.crawl.save_data,
            pacing: Duration::from_millis(config.crawl.sleep_ms),
        }
    }

    /// Language segment replacing `AUTO` in document links, e.g. `IT/ALL`
    fn language_segment(&self) -> String {
        format!("/{}/ALL/", self.walk.language.to_uppercase())
    }
}

/// What happened to one stub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// Snapshot already on disk; placeholder record kept
    Skipped,
    Extracted,
    /// Fetch gave up (404 or retries exhausted); placeholder record kept
    Failed,
}

/// Result of harvesting one partition
#[derive(Debug, Clone)]
pub struct PartitionReport {
    pub key: PartitionKey,
    /// Buffered records; empty once flushed to the sink
    pub documents: BTreeMap<DocId, DocumentRecord>,
    pub pages: u32,
    pub extracted: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Records seen in the partition, flushed or not
    pub total_documents: usize,
    pub without_classifiers: usize,
    pub mean_classifiers: f64,
    pub flushed: bool,
    pub final_state: WalkState,
}

impl PartitionReport {
    fn new(key: PartitionKey) -> Self {
        Self {
            key,
            documents: BTreeMap::new(),
            pages: 0,
            extracted: 0,
            skipped: 0,
            failed: 0,
            total_documents: 0,
            without_classifiers: 0,
            mean_classifiers: 0.0,
            flushed: false,
            final_state: WalkState::Exhausted,
        }
    }

    fn summarize(&mut self) {
        let total = self.documents.len();
        let classifiers: usize = self
            .documents
            .values()
            .map(|d| d.eurovoc_classifiers.len())
            .sum();
        self.total_documents = total;
        self.without_classifiers = self
            .documents
            .values()
            .filter(|d| d.eurovoc_classifiers.is_empty())
            .count();
        self.mean_classifiers = if total > 0 {
            classifiers as f64 / total as f64
        } else {
            0.0
        };
    }
}

/// Network harvester over one crawl context
pub struct Harvester<T: Transport> {
    ctx: CrawlContext<T>,
    config: HarvestConfig,
    extractor: Arc<DocumentExtractor>,
    mapping: Arc<LabelMapping>,
}

impl<T: Transport> Harvester<T> {
    pub fn new(ctx: CrawlContext<T>, config: HarvestConfig) -> Self {
        Self {
            ctx,
            config,
            extractor: Arc::new(DocumentExtractor::new()),
            mapping: Arc::new(LabelMapping::default()),
        }
    }

    /// Use `mapping` for mid-level and domain labels
    pub fn with_mapping(mut self, mapping: LabelMapping) -> Self {
        self.mapping = Arc::new(mapping);
        self
    }

    /// Harvest every key in order.
    ///
    /// With a resume cursor, keys before the recorded one are skipped and
    /// the recorded key starts at the recorded page.
    pub async fn harvest(
        &mut self,
        keys: &[PartitionKey],
        resume: Option<ResumeCursor>,
    ) -> Result<Vec<PartitionReport>, HarvestError> {
        self.ctx.layout().ensure_root()?;

        let start = match resume {
            Some(cursor) => {
                let position = cursor
                    .partition_key()
                    .and_then(|key| keys.iter().position(|k| *k == key))
                    .ok_or_else(|| HarvestError::ResumeKeyMissing(cursor.key.clone()))?;
                Some((position, cursor.page))
            }
            None => None,
        };

        let mut reports = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let page = match start {
                Some((position, _)) if index < position => continue,
                Some((position, page)) if index == position => page,
                _ => 1,
            };
            reports.push(self.harvest_partition(key, page).await?);
        }

        Ok(reports)
    }

    /// Harvest one partition starting at `start_page`
    pub async fn harvest_partition(
        &mut self,
        key: &PartitionKey,
        start_page: u32,
    ) -> Result<PartitionReport, HarvestError> {
        tracing::info!("Scraping {} {}...", key.mode(), key);
        self.ctx.layout().ensure_partition(key)?;

        let mut report = PartitionReport::new(key.clone());
        if start_page > 1 {
            report.documents = self.seed_from_snapshots(key).await?;
            tracing::info!(
                "Resuming {} at page {} with {} documents from earlier pages",
                key,
                start_page,
                report.documents.len()
            );
        }
        let mut walker = PageWalker::starting_at(key.clone(), self.config.walk.clone(), start_page);

        while let Some(walked) = walker.next_page(&mut self.ctx).await {
            report.pages += 1;
            let mut fetched_any = false;

            for stub in &walked.stubs {
                let outcome = self
                    .harvest_document(key, stub, walked.page, &walked.url, &mut report.documents)
                    .await?;
                match outcome {
                    DocumentOutcome::Skipped => report.skipped += 1,
                    DocumentOutcome::Extracted => report.extracted += 1,
                    DocumentOutcome::Failed => report.failed += 1,
                }
                if outcome != DocumentOutcome::Skipped {
                    fetched_any = true;
                    tokio::time::sleep(self.config.pacing).await;
                }
            }

            if !walked.stubs.is_empty() && !fetched_any {
                tracing::debug!("All documents on page {} already downloaded", walked.page);
                tokio::time::sleep(self.config.pacing).await;
            }
        }
        report.final_state = walker.state();

        report.summarize();
        tracing::info!(
            "Scraping for {} completed. Documents scraped: {}, without classifiers: {}, average classifiers per document: {:.2}",
            key,
            report.total_documents,
            report.without_classifiers,
            report.mean_classifiers
        );

        if self.config.save_data {
            if report.final_state == WalkState::Failed {
                tracing::warn!(
                    "Search results for {} ended early, saving a partial partition",
                    key
                );
            }
            let path = self.ctx.layout().data_path(key);
            artifact::write_json_gz(&path, &report.documents)?;
            tracing::info!("Saved {} documents to {}", report.documents.len(), path.display());
            report.documents.clear();
            report.flushed = true;
        }

        Ok(report)
    }

    async fn harvest_document(
        &mut self,
        key: &PartitionKey,
        stub: &SearchResultStub,
        page: u32,
        search_url: &str,
        documents: &mut BTreeMap<DocId, DocumentRecord>,
    ) -> Result<DocumentOutcome, HarvestError> {
        if self.config.skip_existing && self.ctx.layout().should_skip(key, &stub.doc_id) {
            tracing::debug!("Skipping {}, already downloaded", stub.doc_id);
            documents
                .entry(stub.doc_id.clone())
                .or_insert_with(|| DocumentRecord::from_stub(stub));
            return Ok(DocumentOutcome::Skipped);
        }

        let doc_url = stub.link.replacen("/AUTO/", &self.config.language_segment(), 1);
        let outcome = self
            .ctx
            .fetch(&doc_url, self.config.walk.max_retries, RequestKind::Document)
            .await;

        let (record, result) = match outcome {
            FetchOutcome::Ok(body) => {
                let path = self.ctx.layout().doc_path(key, &stub.doc_id);
                if let Err(e) = artifact::write_gz(&path, body.as_bytes()) {
                    tracing::error!("Failed to save document {}: {}", path.display(), e);
                }
                let (labels, full_text) = self.extract(body).await?;
                (
                    DocumentRecord::from_stub(stub).with_content(labels, full_text),
                    DocumentOutcome::Extracted,
                )
            }
            FetchOutcome::NotFound | FetchOutcome::Exhausted => {
                (DocumentRecord::from_stub(stub), DocumentOutcome::Failed)
            }
        };
        documents.insert(stub.doc_id.clone(), record);

        checkpoint::record(
            self.ctx.layout(),
            search_url,
            &doc_url,
            ResumeCursor::new(key, page),
        )?;

        Ok(result)
    }

    /// Records of documents already downloaded for `key`, rebuilt from their snapshots
    async fn seed_from_snapshots(
        &self,
        key: &PartitionKey,
    ) -> Result<BTreeMap<DocId, DocumentRecord>, HarvestError> {
        let extractor = Arc::clone(&self.extractor);
        let mapping = Arc::clone(&self.mapping);
        let granularities = self.config.granularities.clone();
        let dir = self.ctx.layout().docs_dir(key);
        let documents = tokio::task::spawn_blocking(move || {
            batch::replay_dir(&extractor, &mapping, &granularities, &dir)
        })
        .await??;
        Ok(documents)
    }

    /// Parse on a blocking thread, then project the classifiers
    async fn extract(&self, body: String) -> Result<(BTreeSet<String>, String), HarvestError> {
        let extractor = Arc::clone(&self.extractor);
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&body)).await?;
        let labels = self
            .mapping
            .map(&extraction.classifiers, &self.config.granularities);
        Ok((labels, extraction.full_text))
    }

    /// Fetch and extract one document by URL
    pub async fn fetch_single(&mut self, url: &str) -> Result<Option<DocumentRecord>, HarvestError> {
        let outcome = self
            .ctx
            .fetch(url, self.config.walk.max_retries, RequestKind::Document)
            .await;
        let FetchOutcome::Ok(body) = outcome else {
            return Ok(None);
        };

        let title = self.extractor.original_title(&body).unwrap_or_default();
        let (labels, full_text) = self.extract(body).await?;
        Ok(Some(DocumentRecord {
            title,
            link: url.to_string(),
            eurovoc_classifiers: labels,
            full_text,
        }))
    }

    pub fn context(&self) -> &CrawlContext<T> {
        &self.ctx
    }

    pub fn into_context(self) -> CrawlContext<T> {
        self.ctx
    }
}
