//! lexharvest: resumable harvester for a paginated legal-document catalog

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{crawl::CrawlArgs, list::ListTarget, replay::ReplayArgs};
use lexharvest::config::{Config, LogFormat};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "lexharvest")]
#[command(about = "Resumable harvester for paginated legal-document catalogs")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "lexharvest.toml")]
    config: PathBuf,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the catalog partition by partition
    Crawl {
        /// Years to crawl, comma separated ("all" for every year)
        #[arg(short, long, conflicts_with = "categories")]
        years: Option<String>,

        /// Document categories to crawl, comma separated ("all" for every category)
        #[arg(long)]
        categories: Option<String>,

        /// Catalog language code
        #[arg(short, long)]
        language: Option<String>,

        /// Classifier granularities: TC, MT, DO (comma separated)
        #[arg(long)]
        label_types: Option<String>,

        /// Save each finished partition as compressed JSON
        #[arg(long)]
        save_data: bool,

        /// Directory for the compressed JSON sink
        #[arg(long)]
        json_folder: Option<PathBuf>,

        /// Keep search result page snapshots
        #[arg(long)]
        save_html: bool,

        /// Resume from the last checkpoint
        #[arg(long)]
        resume: bool,

        /// Refetch documents even when a snapshot exists
        #[arg(long)]
        clean: bool,

        /// Attempts per request
        #[arg(long)]
        max_retries: Option<u32>,

        /// Pause after each document, in milliseconds
        #[arg(long)]
        sleep_ms: Option<u64>,

        /// Crawl output directory
        #[arg(short, long)]
        directory: Option<PathBuf>,
    },

    /// Rebuild the JSON sink from saved document snapshots
    Replay {
        /// Years to replay, comma separated ("all" for every year)
        #[arg(short, long, conflicts_with = "categories")]
        years: Option<String>,

        /// Document categories to replay, comma separated
        #[arg(long)]
        categories: Option<String>,

        /// Catalog language code
        #[arg(short, long)]
        language: Option<String>,

        /// Classifier granularities: TC, MT, DO (comma separated)
        #[arg(long)]
        label_types: Option<String>,

        /// Number of extraction workers
        #[arg(short, long)]
        parallelism: Option<usize>,

        /// Directory for the compressed JSON sink
        #[arg(long)]
        json_folder: Option<PathBuf>,

        /// Crawl output directory
        #[arg(short, long)]
        directory: Option<PathBuf>,

        /// Extract without writing the sink
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch a single document and print it as JSON
    Document {
        /// Document URL
        url: String,
    },

    /// List languages, years or categories
    List {
        #[arg(value_enum)]
        target: ListTarget,
    },
}

fn init_logging(config: &Config, verbose: u8) -> Result<()> {
    let level = config.logging.level.raised(verbose);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);
    match config.logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_or_default(&cli.config)?;
    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Crawl {
            years,
            categories,
            language,
            label_types,
            save_data,
            json_folder,
            save_html,
            resume,
            clean,
            max_retries,
            sleep_ms,
            directory,
        } => {
            let args = CrawlArgs {
                years,
                categories,
                language,
                label_types,
                save_data,
                json_folder,
                save_html,
                resume,
                clean,
                max_retries,
                sleep_ms,
                directory,
            };
            commands::crawl::crawl(config, args).await
        }
        Commands::Replay {
            years,
            categories,
            language,
            label_types,
            parallelism,
            json_folder,
            directory,
            dry_run,
        } => {
            let args = ReplayArgs {
                years,
                categories,
                language,
                label_types,
                parallelism,
                json_folder,
                directory,
                dry_run,
            };
            commands::replay::replay(config, args).await
        }
        Commands::Document { url } => commands::document::document(config, &url).await,
        Commands::List { target } => commands::list::list(&config, target),
    }
}
