//! Legislative catalog harvesting pipeline
//!
//! Walks the paginated search results of the catalog partition by partition
//! (publication year or document category), downloads each document page,
//! extracts its full text and subject classifiers, and maps the classifiers
//! onto coarser taxonomy levels. A crawl can be interrupted and resumed, and
//! raw snapshots can be replayed offline without touching the network.
//!
//! Key components:
//! - `CrawlContext`: retrying fetches with escalating cooldowns
//! - `PageWalker`: pagination state machine for one partition
//! - `DocumentExtractor`: layout-aware full text and classifier extraction
//! - `LabelMapping`: taxonomy projection (leaf, mid-level, domain)
//! - `Harvester`: per-partition orchestration with checkpoints
//! - `BatchExtractor`: offline replay over saved snapshots

pub mod artifact;
pub mod backoff;
pub mod batch;
pub mod checkpoint;
pub mod extractor;
pub mod fetcher;
pub mod harvester;
pub mod layout;
pub mod progress;
pub mod search;
pub mod taxonomy;
pub mod terms;
pub mod walker;

pub use backoff::{CooldownState, RetryPolicy};
pub use checkpoint::{Checkpoint, CheckpointError, ResumeCursor};
pub use extractor::{DocumentExtractor, DocumentLayout, Extraction};
pub use fetcher::{CrawlContext, FetchOutcome, HttpTransport, RequestKind, Transport};
pub use harvester::{HarvestError, Harvester, PartitionReport};
pub use layout::CrawlLayout;
pub use search::{SearchPage, SearchPageParser};
pub use taxonomy::{Granularity, LabelMapping, TaxonomyError};
pub use walker::{PageWalker, WalkState};

use scraper::Selector;

/// Compile a selector from a literal.
///
/// Only called with constant CSS in this crate; an invalid literal is a
/// programming error caught by the module tests.
pub(crate) fn selector(css: &'static str) -> Selector {
    match Selector::parse(css) {
        Ok(selector) => selector,
        Err(e) => panic!("invalid selector {:?}: {}", css, e),
    }
}
