//! Offline replay of saved document snapshots
//!
//! Re-runs extraction and taxonomy mapping over `docsHTML/<key>/*.html.gz`
//! without touching the network. With a parallelism above one, snapshots
//! are parsed on blocking worker threads gated by a semaphore; each worker
//! returns its own record and the caller merges them.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::artifact::{self, ArtifactError};
use super::extractor::DocumentExtractor;
use super::layout::CrawlLayout;
use super::progress::ReplayProgress;
use super::taxonomy::{Granularity, LabelMapping};
use crate::types::{DocId, DocumentRecord, PartitionKey};

/// Prefix of rebuilt document links
const DOCUMENT_LINK_PREFIX: &str = "https://eur-lex.europa.eu/legal-content/AUTO/?uri=";

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No snapshots for {key} at {path}")]
    MissingPartition { key: String, path: String },
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Worker pool closed: {0}")]
    PoolClosed(#[from] tokio::sync::AcquireError),
    #[error("Extraction panicked: {0}")]
    Panicked(String),
}

/// Link of a document rebuilt from its id (`CELEX-32019R0001` -> `...?uri=CELEX:32019R0001`).
///
/// Ids flatten both `/` and `:` to `-`, so the link is a best effort: OJ
/// references (`OJ-C-2019-001` -> `OJ:C:2019:001`) use `:` between every
/// segment, any other scheme only after its prefix.
pub fn document_link(doc_id: &str) -> String {
    let uri = if doc_id.starts_with("OJ-") {
        doc_id.replace('-', ":")
    } else {
        doc_id.replacen('-', ":", 1)
    };
    format!("{}{}", DOCUMENT_LINK_PREFIX, uri)
}

/// Snapshot replayer
#[derive(Clone)]
pub struct BatchExtractor {
    extractor: Arc<DocumentExtractor>,
    mapping: Arc<LabelMapping>,
    granularities: Arc<BTreeSet<Granularity>>,
    parallelism: usize,
    quiet: bool,
}

impl BatchExtractor {
    pub fn new(mapping: LabelMapping, granularities: BTreeSet<Granularity>, parallelism: usize) -> Self {
        Self {
            extractor: Arc::new(DocumentExtractor::new()),
            mapping: Arc::new(mapping),
            granularities: Arc::new(granularities),
            parallelism: parallelism.max(1),
            quiet: false,
        }
    }

    /// Disable the progress bar
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Replay every snapshot of one partition
    pub async fn extract_all(
        &self,
        layout: &CrawlLayout,
        key: &PartitionKey,
    ) -> Result<BTreeMap<DocId, DocumentRecord>, BatchError> {
        let dir = layout.docs_dir(key);
        if !dir.is_dir() {
            return Err(BatchError::MissingPartition {
                key: key.to_string(),
                path: dir.display().to_string(),
            });
        }
        let files = snapshot_files(&dir)?;

        tracing::info!(
            "Replaying {} documents for {} ({} worker{})",
            files.len(),
            key,
            self.parallelism,
            if self.parallelism == 1 { "" } else { "s" }
        );

        let progress = Arc::new(ReplayProgress::new(&key.to_string(), files.len() as u64, self.quiet));
        let documents = if self.parallelism == 1 {
            self.sequential(files, &progress)
        } else {
            self.parallel(files, &progress).await?
        };
        progress.finish();

        let without = documents
            .values()
            .filter(|d| d.eurovoc_classifiers.is_empty())
            .count();
        tracing::info!(
            "Replay for {} completed. Documents: {}, without classifiers: {}",
            key,
            documents.len(),
            without
        );

        Ok(documents)
    }

    fn sequential(
        &self,
        files: Vec<PathBuf>,
        progress: &ReplayProgress,
    ) -> BTreeMap<DocId, DocumentRecord> {
        let mut documents = BTreeMap::new();
        for path in files {
            let result = guarded(|| replay_document(&self.extractor, &self.mapping, &self.granularities, &path));
            merge(&mut documents, &path, result, progress);
        }
        documents
    }

    async fn parallel(
        &self,
        files: Vec<PathBuf>,
        progress: &Arc<ReplayProgress>,
    ) -> Result<BTreeMap<DocId, DocumentRecord>, BatchError> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for path in files {
            let permit = Arc::clone(&semaphore).acquire_owned().await?;
            let extractor = Arc::clone(&self.extractor);
            let mapping = Arc::clone(&self.mapping);
            let granularities = Arc::clone(&self.granularities);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = guarded(|| replay_document(&extractor, &mapping, &granularities, &path));
                (path, result)
            });
        }

        let mut documents = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, result)) => merge(&mut documents, &path, result, progress),
                Err(e) => {
                    tracing::warn!("Replay worker failed: {}", e);
                    progress.document_error("worker");
                }
            }
        }
        Ok(documents)
    }
}

fn merge(
    documents: &mut BTreeMap<DocId, DocumentRecord>,
    path: &Path,
    result: Result<(DocId, DocumentRecord), BatchError>,
    progress: &ReplayProgress,
) {
    match result {
        Ok((doc_id, record)) => {
            progress.document_extracted(&doc_id);
            documents.insert(doc_id, record);
        }
        Err(e) => {
            tracing::warn!("Skipping snapshot {}: {}", path.display(), e);
            progress.document_error(&path.display().to_string());
        }
    }
}

/// Snapshot files of a partition directory, sorted by name
fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "gz") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Replay every snapshot in `dir` on the current thread.
///
/// A missing directory yields nothing; unreadable snapshots are logged and excluded.
pub(crate) fn replay_dir(
    extractor: &DocumentExtractor,
    mapping: &LabelMapping,
    granularities: &BTreeSet<Granularity>,
    dir: &Path,
) -> Result<BTreeMap<DocId, DocumentRecord>, BatchError> {
    let mut documents = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(documents);
    }
    for path in snapshot_files(dir)? {
        match guarded(|| replay_document(extractor, mapping, granularities, &path)) {
            Ok((doc_id, record)) => {
                documents.insert(doc_id, record);
            }
            Err(e) => tracing::warn!("Skipping snapshot {}: {}", path.display(), e),
        }
    }
    Ok(documents)
}

/// Run one replay, turning a panic inside the parser into an error for that snapshot
fn guarded<F>(replay: F) -> Result<(DocId, DocumentRecord), BatchError>
where
    F: FnOnce() -> Result<(DocId, DocumentRecord), BatchError>,
{
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(replay)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(BatchError::Panicked(message))
    })
}

/// Turn one snapshot into a record
fn replay_document(
    extractor: &DocumentExtractor,
    mapping: &LabelMapping,
    granularities: &BTreeSet<Granularity>,
    path: &Path,
) -> Result<(DocId, DocumentRecord), BatchError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let doc_id = artifact::doc_id_from_file_name(&name)?;

    let bytes = artifact::read_gz(path)?;
    let html = String::from_utf8_lossy(&bytes);

    let extraction = extractor.extract(&html);
    let record = DocumentRecord {
        title: extractor.original_title(&html).unwrap_or_default(),
        link: document_link(&doc_id),
        eurovoc_classifiers: mapping.map(&extraction.classifiers, granularities),
        full_text: extraction.full_text,
    };
    Ok((doc_id, record))
}
