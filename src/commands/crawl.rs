use anyhow::{Context, Result};
use lexharvest::{
    config::Config,
    scraping::{
        checkpoint,
        fetcher::CrawlContext,
        harvester::{HarvestConfig, Harvester},
        layout::CrawlLayout,
        taxonomy::parse_granularities,
        terms::{language_alpha3, resolve_keys},
        walker::WalkSettings,
        RetryPolicy,
    },
    types::EnumerationMode,
};
use std::path::PathBuf;
use tracing::info;

/// Command-line overrides for a crawl
#[derive(Debug, Default)]
pub struct CrawlArgs {
    pub years: Option<String>,
    pub categories: Option<String>,
    pub language: Option<String>,
    pub label_types: Option<String>,
    pub save_data: bool,
    pub json_folder: Option<PathBuf>,
    pub save_html: bool,
    pub resume: bool,
    pub clean: bool,
    pub max_retries: Option<u32>,
    pub sleep_ms: Option<u64>,
    pub directory: Option<PathBuf>,
}

impl CrawlArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(ref language) = self.language {
            config.crawl.language = language.clone();
        }
        if let Some(ref label_types) = self.label_types {
            config.crawl.label_types = label_types.clone();
        }
        if let Some(ref dir) = self.json_folder {
            config.crawl.json_folder = Some(dir.clone());
        }
        if let Some(ref dir) = self.directory {
            config.crawl.directory = dir.clone();
        }
        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if let Some(sleep_ms) = self.sleep_ms {
            config.crawl.sleep_ms = sleep_ms;
        }
        config.crawl.save_data |= self.save_data;
        config.crawl.save_html |= self.save_html;
        if self.clean {
            config.crawl.skip_existing = false;
        }
    }
}

pub async fn crawl(mut config: Config, args: CrawlArgs) -> Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let (mode, requested) = match args.categories.as_deref() {
        Some(raw) => (EnumerationMode::Category, super::requested_keys(Some(raw))),
        None => (EnumerationMode::Year, super::requested_keys(args.years.as_deref())),
    };

    let language = config.crawl.language.clone();
    let categories = super::category_table(&config)?;
    let keys = resolve_keys(mode, &requested, super::current_year(), &categories)?;
    let granularities = parse_granularities(&config.crawl.label_types)?;
    let mapping = super::label_mapping(&config)?;

    let layout = CrawlLayout::new(&config.crawl.directory, &language)
        .with_json_dir(config.crawl.json_folder.clone());
    let resume = if args.resume {
        Some(checkpoint::plan(&layout, mode).context("Cannot resume")?)
    } else {
        None
    };

    info!(
        "Crawling {} {} partition(s) in '{}' into {}",
        keys.len(),
        mode,
        language,
        layout.root().display()
    );

    let qid = chrono::Utc::now().timestamp();
    let transport = super::connect(&config, qid).await?;
    let ctx = CrawlContext::new(transport, RetryPolicy::from_config(&config.retry), layout);

    let walk = WalkSettings {
        base_url: super::base_url(&config)?,
        language: language.clone(),
        alpha3: language_alpha3(&language)?.to_string(),
        qid,
        max_retries: config.retry.max_retries,
        save_html: config.crawl.save_html,
    };
    let harvest_config = HarvestConfig::from_config(&config, walk, granularities);
    let mut harvester = Harvester::new(ctx, harvest_config).with_mapping(mapping);

    let reports = harvester.harvest(&keys, resume).await?;

    println!("\nCrawl Summary");
    println!("=============");
    for report in &reports {
        println!(
            "{:>10}: {} pages, {} extracted, {} skipped, {} failed, {:.2} classifiers/doc{}",
            report.key.to_string(),
            report.pages,
            report.extracted,
            report.skipped,
            report.failed,
            report.mean_classifiers,
            if report.flushed { " (saved)" } else { "" }
        );
    }

    let ctx = harvester.context();
    println!(
        "Requests: {} ({} failed), cooldowns: {}, session resets: {}",
        ctx.stats().requests,
        ctx.stats().failures,
        ctx.cooldowns().total(),
        ctx.cooldowns().resets()
    );

    Ok(())
}
