use anyhow::Result;
use clap::ValueEnum;
use lexharvest::{config::Config, scraping::terms};

/// What to list
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListTarget {
    /// Supported catalog languages
    Languages,
    /// Year partitions, newest first
    Years,
    /// Document category partitions
    Categories,
}

pub fn list(config: &Config, target: ListTarget) -> Result<()> {
    match target {
        ListTarget::Languages => {
            for lang in terms::available_languages() {
                println!("{}  {}", lang, terms::language_alpha3(lang)?);
            }
        }
        ListTarget::Years => {
            for key in terms::available_years(super::current_year()) {
                println!("{}", key);
            }
        }
        ListTarget::Categories => {
            let table = super::category_table(config)?;
            for (code, name) in table.iter() {
                println!("{:<6} {}", code, name);
            }
            println!("\n{} categories", table.len());
        }
    }
    Ok(())
}
