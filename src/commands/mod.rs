//! CLI subcommands

pub mod crawl;
pub mod document;
pub mod list;
pub mod replay;

use anyhow::{Context, Result};
use chrono::Datelike;
use lexharvest::{
    config::Config,
    scraping::{
        fetcher::{FetchConfig, HttpTransport},
        search::session_url,
        taxonomy::LabelMapping,
        terms::CategoryTable,
    },
    util::split_list,
};
use std::time::Duration;
use url::Url;

/// Current calendar year, the exclusive upper bound of year partitions
pub fn current_year() -> u16 {
    u16::try_from(chrono::Local::now().year()).unwrap_or(u16::MAX)
}

/// Split a key list given on the command line; `all` selects every key
pub fn requested_keys(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(raw) if !raw.trim().eq_ignore_ascii_case("all") => split_list(raw),
        _ => Vec::new(),
    }
}

/// Category table from the configured file, or the built-in one
pub fn category_table(config: &Config) -> Result<CategoryTable> {
    match &config.crawl.categories_file {
        Some(path) => CategoryTable::load(path).context("Failed to load category table"),
        None => Ok(CategoryTable::default()),
    }
}

/// Label mapping from the configured file, or an empty one
pub fn label_mapping(config: &Config) -> Result<LabelMapping> {
    match &config.crawl.label_mapping {
        Some(path) => {
            let mapping = LabelMapping::load(path).context("Failed to load label mapping")?;
            tracing::debug!("Loaded {} label mappings from {}", mapping.len(), path.display());
            Ok(mapping)
        }
        None => Ok(LabelMapping::default()),
    }
}

pub fn base_url(config: &Config) -> Result<Url> {
    Url::parse(&config.crawl.base_url)
        .with_context(|| format!("Invalid base URL '{}'", config.crawl.base_url))
}

/// Open an HTTP session against the catalog
pub async fn connect(config: &Config, qid: i64) -> Result<HttpTransport> {
    let language = &config.crawl.language;
    let fetch = FetchConfig {
        user_agent: config.crawl.user_agent.clone(),
        accept_language: format!("{},en-US;q=0.7,en;q=0.3", language),
        timeout: Duration::from_secs(config.crawl.request_timeout_secs),
        connect_timeout: Duration::from_secs(config.crawl.connect_timeout_secs),
        session_url: Some(session_url(&base_url(config)?, language, qid).to_string()),
    };
    HttpTransport::connect(fetch)
        .await
        .context("Failed to open a session with the catalog")
}
