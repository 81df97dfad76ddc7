//! Progress tracking for snapshot replays

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Replay counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayStats {
    pub documents_processed: usize,
    pub documents_extracted: usize,
    pub documents_errored: usize,
    pub elapsed_seconds: f64,
    pub docs_per_second: f64,
}

/// Progress tracker shared by replay workers
pub struct ReplayProgress {
    /// Progress bar (None in quiet mode)
    progress_bar: Option<ProgressBar>,
    start_time: Instant,
    processed: AtomicUsize,
    extracted: AtomicUsize,
    errored: AtomicUsize,
}

impl ReplayProgress {
    pub fn new(label: &str, total: u64, quiet: bool) -> Self {
        let progress_bar = if !quiet {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb.set_prefix(label.to_string());
            Some(pb)
        } else {
            None
        };

        Self {
            progress_bar,
            start_time: Instant::now(),
            processed: AtomicUsize::new(0),
            extracted: AtomicUsize::new(0),
            errored: AtomicUsize::new(0),
        }
    }

    /// Count one snapshot replayed into a record
    pub fn document_extracted(&self, doc_id: &str) {
        self.extracted.fetch_add(1, Ordering::Relaxed);
        self.advance(doc_id);
    }

    /// Count one snapshot that could not be replayed
    pub fn document_error(&self, doc_id: &str) {
        self.errored.fetch_add(1, Ordering::Relaxed);
        self.advance(doc_id);
    }

    fn advance(&self, doc_id: &str) {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = self.progress_bar {
            pb.set_position(processed as u64);
            let elapsed = self.start_time.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                processed as f64 / elapsed
            } else {
                0.0
            };
            pb.set_message(format!(
                "{:.1} docs/s | {}",
                rate,
                crate::util::truncate_str(doc_id, 30)
            ));
        }
    }

    pub fn stats(&self) -> ReplayStats {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let processed = self.processed.load(Ordering::Relaxed);
        ReplayStats {
            documents_processed: processed,
            documents_extracted: self.extracted.load(Ordering::Relaxed),
            documents_errored: self.errored.load(Ordering::Relaxed),
            elapsed_seconds: elapsed,
            docs_per_second: if elapsed > 0.0 {
                processed as f64 / elapsed
            } else {
                0.0
            },
        }
    }

    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            let stats = self.stats();
            pb.finish_with_message(format!(
                "Done! {} extracted, {} errors, {:.1} docs/s",
                stats.documents_extracted, stats.documents_errored, stats.docs_per_second
            ));
        }
    }
}
