//! Core types for the harvesting pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a document inside a partition (derived from its canonical URI)
pub type DocId = String;

/// Query value the catalog uses for documents without a known year
pub const UNKNOWN_YEAR_QUERY: &str = "FV_OTHER";

/// Directory name used for documents without a known year
pub const UNKNOWN_YEAR_DIR: &str = "unknown";

// ============================================================================
// Partitioning
// ============================================================================

/// How the catalog is partitioned for a crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumerationMode {
    /// Partition by publication year
    Year,
    /// Partition by document category code
    Category,
}

impl EnumerationMode {
    /// Name of the search query parameter carrying the partition key
    pub fn query_param(&self) -> &'static str {
        match self {
            Self::Year => "DD_YEAR",
            Self::Category => "FM_CODED",
        }
    }

    /// Detect the mode from a query parameter name
    pub fn from_query_param(name: &str) -> Option<Self> {
        match name {
            "DD_YEAR" => Some(Self::Year),
            "FM_CODED" => Some(Self::Category),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Category => "category",
        }
    }
}

impl fmt::Display for EnumerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partition of the catalog: a year, the unknown-year sentinel, or a category code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionKey {
    Year(u16),
    UnknownYear,
    Category(String),
}

impl PartitionKey {
    /// Parse a key as written by a user, in a checkpoint, or in a search URL.
    ///
    /// Year mode accepts `unknown`, `?` and `FV_OTHER` for the unknown-year sentinel.
    pub fn parse(mode: EnumerationMode, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match mode {
            EnumerationMode::Year => match raw {
                UNKNOWN_YEAR_DIR | "?" | UNKNOWN_YEAR_QUERY => Some(Self::UnknownYear),
                _ => raw.parse::<u16>().ok().map(Self::Year),
            },
            EnumerationMode::Category => Some(Self::Category(raw.to_string())),
        }
    }

    /// The mode this key belongs to
    pub fn mode(&self) -> EnumerationMode {
        match self {
            Self::Year(_) | Self::UnknownYear => EnumerationMode::Year,
            Self::Category(_) => EnumerationMode::Category,
        }
    }

    /// Value sent in the search query
    pub fn query_value(&self) -> String {
        match self {
            Self::Year(year) => year.to_string(),
            Self::UnknownYear => UNKNOWN_YEAR_QUERY.to_string(),
            Self::Category(code) => code.clone(),
        }
    }

    /// Name used for directories and sink files
    pub fn dir_name(&self) -> String {
        match self {
            Self::Year(year) => year.to_string(),
            Self::UnknownYear => UNKNOWN_YEAR_DIR.to_string(),
            Self::Category(code) => code.clone(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Lightweight entry parsed from a search-results listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResultStub {
    pub doc_id: DocId,
    pub title: String,
    pub link: String,
}

/// A harvested document.
///
/// Skipped documents keep empty classifiers and text as placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub eurovoc_classifiers: BTreeSet<String>,
    #[serde(default)]
    pub full_text: String,
}

impl DocumentRecord {
    /// Placeholder record for a stub whose document has not been extracted
    pub fn from_stub(stub: &SearchResultStub) -> Self {
        Self {
            title: stub.title.clone(),
            link: stub.link.clone(),
            ..Default::default()
        }
    }

    /// Set the extracted body and labels
    pub fn with_content(mut self, classifiers: BTreeSet<String>, full_text: String) -> Self {
        self.eurovoc_classifiers = classifiers;
        self.full_text = full_text;
        self
    }
}
