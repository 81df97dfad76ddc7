use anyhow::{Context, Result};
use lexharvest::{
    config::Config,
    scraping::{
        artifact::write_json_gz,
        batch::{BatchError, BatchExtractor},
        layout::CrawlLayout,
        taxonomy::parse_granularities,
        terms::resolve_keys,
    },
    types::EnumerationMode,
};
use std::path::PathBuf;
use tracing::{info, warn};

/// Command-line overrides for an offline replay
#[derive(Debug, Default)]
pub struct ReplayArgs {
    pub years: Option<String>,
    pub categories: Option<String>,
    pub language: Option<String>,
    pub label_types: Option<String>,
    pub parallelism: Option<usize>,
    pub json_folder: Option<PathBuf>,
    pub directory: Option<PathBuf>,
    pub dry_run: bool,
}

pub async fn replay(mut config: Config, args: ReplayArgs) -> Result<()> {
    if let Some(ref language) = args.language {
        config.crawl.language = language.clone();
    }
    if let Some(ref label_types) = args.label_types {
        config.crawl.label_types = label_types.clone();
    }
    if let Some(parallelism) = args.parallelism {
        config.replay.parallelism = parallelism;
    }
    if let Some(ref dir) = args.json_folder {
        config.crawl.json_folder = Some(dir.clone());
    }
    if let Some(ref dir) = args.directory {
        config.crawl.directory = dir.clone();
    }
    config.validate()?;

    let (mode, requested) = match args.categories.as_deref() {
        Some(raw) => (EnumerationMode::Category, super::requested_keys(Some(raw))),
        None => (EnumerationMode::Year, super::requested_keys(args.years.as_deref())),
    };
    let categories = super::category_table(&config)?;
    let keys = resolve_keys(mode, &requested, super::current_year(), &categories)?;
    let granularities = parse_granularities(&config.crawl.label_types)?;
    let mapping = super::label_mapping(&config)?;

    let layout = CrawlLayout::new(&config.crawl.directory, &config.crawl.language)
        .with_json_dir(config.crawl.json_folder.clone());
    let replayer = BatchExtractor::new(mapping, granularities, config.replay.parallelism);

    let mut replayed = 0usize;
    let mut documents = 0usize;
    for key in &keys {
        let records = match replayer.extract_all(&layout, key).await {
            Ok(records) => records,
            Err(BatchError::MissingPartition { path, .. }) => {
                // Requesting every year routinely hits partitions never crawled
                if requested.is_empty() {
                    tracing::debug!("No snapshots for {} at {}", key, path);
                } else {
                    warn!("No snapshots for {} at {}", key, path);
                }
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Replay of {} failed", key)),
        };

        replayed += 1;
        documents += records.len();
        if args.dry_run {
            continue;
        }
        let path = layout.data_path(key);
        write_json_gz(&path, &records)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved {} documents to {}", records.len(), path.display());
    }

    println!(
        "Replayed {} partition(s), {} document(s){}",
        replayed,
        documents,
        if args.dry_run { " (dry run, nothing written)" } else { "" }
    );
    Ok(())
}
