//! Configuration for lexharvest

mod crawl;
mod logging;

pub use crawl::{CrawlConfig, ReplayConfig, RetryConfig};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::scraping::taxonomy::{self, Granularity};
use crate::scraping::terms;

/// Default user agent for catalog requests
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; rv:108.0) Gecko/20100101 Firefox/108.0";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl configuration
    #[serde(default)]
    pub crawl: CrawlConfig,
    /// Retry and cooldown configuration
    #[serde(default)]
    pub retry: RetryConfig,
    /// Offline replay configuration
    #[serde(default)]
    pub replay: ReplayConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise start from the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate all configuration fields.
    ///
    /// Collects every problem and reports them together.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        // Crawl validation
        if let Err(e) = terms::validate_language(&self.crawl.language) {
            errors.push(e.to_string());
        }
        if let Err(e) = url::Url::parse(&self.crawl.base_url) {
            errors.push(format!("base_url '{}' is not a valid URL: {}", self.crawl.base_url, e));
        }
        if self.crawl.directory.as_os_str().is_empty() {
            errors.push("directory must not be empty".to_string());
        }
        if self.crawl.user_agent.trim().is_empty() {
            errors.push("user_agent must not be empty".to_string());
        }
        if self.crawl.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }
        match taxonomy::parse_granularities(&self.crawl.label_types) {
            Ok(levels) => {
                let needs_mapping =
                    levels.contains(&Granularity::Mid) || levels.contains(&Granularity::Domain);
                if needs_mapping && self.crawl.label_mapping.is_none() {
                    errors.push("label_types MT and DO require a label_mapping file".to_string());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }

        // Retry validation
        if self.retry.max_retries == 0 {
            errors.push("max_retries must be positive".to_string());
        }
        if self.retry.cooldown_threshold == 0 {
            errors.push("cooldown_threshold must be positive".to_string());
        }

        // Replay validation
        if self.replay.parallelism == 0 {
            errors.push("parallelism must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(valid_config().validate().is_ok(), "default config should be valid");
    }

    #[test]
    fn validate_rejects_unknown_language() {
        let mut cfg = valid_config();
        cfg.crawl.language = "xx".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("xx"), "unexpected error message: {}", err);
    }

    #[test]
    fn validate_rejects_unknown_label_type() {
        let mut cfg = valid_config();
        cfg.crawl.label_types = "TC,ZZ".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("ZZ"), "unexpected error message: {}", err);
    }

    #[test]
    fn validate_requires_mapping_for_coarse_labels() {
        let mut cfg = valid_config();
        cfg.crawl.label_types = "TC,DO".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("label_mapping"));

        cfg.crawl.label_mapping = Some(PathBuf::from("mapping.json"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_reports_all_errors_together() {
        let mut cfg = valid_config();
        cfg.retry.max_retries = 0;
        cfg.replay.parallelism = 0;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("max_retries must be positive"));
        assert!(err.contains("parallelism must be positive"));
    }

    #[test]
    fn load_partial_toml_keeps_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("lexharvest.toml");
        std::fs::write(
            &path,
            r#"
            [crawl]
            language = "en"
            save_data = true

            [retry]
            cooldown_secs = 5

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.crawl.language, "en");
        assert!(cfg.crawl.save_data);
        assert!(cfg.crawl.skip_existing);
        assert_eq!(cfg.retry.cooldown_secs, 5);
        assert_eq!(cfg.retry.max_retries, 10);
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn load_or_default_without_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/lexharvest.toml")).unwrap();
        assert_eq!(cfg.crawl.language, "it");
    }
}
