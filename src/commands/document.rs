use anyhow::{Context, Result};
use lexharvest::{
    config::Config,
    scraping::{
        fetcher::CrawlContext,
        harvester::{HarvestConfig, Harvester},
        layout::CrawlLayout,
        taxonomy::parse_granularities,
        terms::language_alpha3,
        walker::WalkSettings,
        RetryPolicy,
    },
};

/// Fetch one document page and print its record as JSON
pub async fn document(config: Config, url: &str) -> Result<()> {
    config.validate()?;

    let language = config.crawl.language.clone();
    let granularities = parse_granularities(&config.crawl.label_types)?;
    let mapping = super::label_mapping(&config)?;
    let layout = CrawlLayout::new(&config.crawl.directory, &language);
    layout
        .ensure_root()
        .with_context(|| format!("Failed to create {}", layout.root().display()))?;

    let qid = chrono::Utc::now().timestamp();
    let transport = super::connect(&config, qid).await?;
    let ctx = CrawlContext::new(transport, RetryPolicy::from_config(&config.retry), layout);

    let walk = WalkSettings {
        base_url: super::base_url(&config)?,
        language: language.clone(),
        alpha3: language_alpha3(&language)?.to_string(),
        qid,
        max_retries: config.retry.max_retries,
        save_html: false,
    };
    let harvest_config = HarvestConfig::from_config(&config, walk, granularities);
    let mut harvester = Harvester::new(ctx, harvest_config).with_mapping(mapping);

    match harvester.fetch_single(url).await? {
        Some(record) => {
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        None => anyhow::bail!("Document {} could not be fetched", url),
    }
}
