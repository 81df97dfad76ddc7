//! lexharvest: resumable harvester for paginated legal-document catalogs
//!
//! Crawls a public legislative catalog partition by partition, featuring:
//! - Year or document-category enumeration with resumable checkpoints
//! - Retrying fetches with escalating cooldowns and session resets
//! - Layout-aware full text and subject classifier extraction
//! - Taxonomy projection of classifiers (leaf, mid-level, domain)
//! - Offline replay of saved snapshots on a worker pool

pub mod config;
pub mod scraping;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
