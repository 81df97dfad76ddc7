//! Crawl, retry, and replay configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::DEFAULT_USER_AGENT;

/// Catalog crawl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Two-letter site language
    pub language: String,
    /// Catalog root URL
    pub base_url: String,
    /// Root directory for snapshots, checkpoints, and logs
    pub directory: PathBuf,
    /// Directory for extracted partitions (defaults to the crawl directory)
    pub json_folder: Option<PathBuf>,
    /// Save every fetched search page
    pub save_html: bool,
    /// Write each finished partition to `<key>.json.gz`
    pub save_data: bool,
    /// Skip documents already downloaded
    pub skip_existing: bool,
    /// Pause between document requests (milliseconds)
    pub sleep_ms: u64,
    /// Request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Connect timeout (seconds)
    pub connect_timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Comma-separated label granularities: TC, MT, DO
    pub label_types: String,
    /// JSON object mapping leaf classifier codes to mid-level codes
    pub label_mapping: Option<PathBuf>,
    /// Category table overriding the built-in one (`Name (CODE)` per line)
    pub categories_file: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            language: "it".to_string(),
            base_url: "https://eur-lex.europa.eu/".to_string(),
            directory: PathBuf::from("./eurlexdata"),
            json_folder: None,
            save_html: false,
            save_data: false,
            skip_existing: true,
            sleep_ms: 1000,
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            label_types: "TC".to_string(),
            label_mapping: None,
            categories_file: None,
        }
    }
}

/// Retry and cooldown configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Failed attempts allowed per request
    pub max_retries: u32,
    /// Unit of the short linear backoff (milliseconds)
    pub short_backoff_ms: u64,
    /// Long cooldown after repeated failures (seconds)
    pub cooldown_secs: u64,
    /// Consecutive cooldowns tolerated before the session is reset
    pub cooldown_threshold: u32,
    /// Retries of a search page whose next link vanished before the last page
    pub max_page_anomaly_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            short_backoff_ms: 1000,
            cooldown_secs: 60,
            cooldown_threshold: 5,
            max_page_anomaly_retries: 10,
        }
    }
}

/// Offline replay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Worker threads; 1 replays sequentially
    pub parallelism: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}
