//! Term enumeration: partition keys, languages, and document categories
//!
//! Produces the ordered sequence of partition keys a crawl walks through.
//! Years run from last year backwards to 1801, followed by the `1001`
//! sentinel the catalog uses for undated acts and the unknown-year bucket.

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::types::{EnumerationMode, PartitionKey};

/// Oldest year the catalog exposes as a regular year filter
pub const FIRST_YEAR: u16 = 1801;

/// Year value the catalog uses for undated acts
pub const UNDATED_YEAR: u16 = 1001;

/// Supported site languages with their ISO 639-2 codes
const LANGUAGES: &[(&str, &str)] = &[
    ("bg", "BUL"),
    ("cs", "CES"),
    ("da", "DAN"),
    ("de", "DEU"),
    ("el", "ELL"),
    ("en", "ENG"),
    ("es", "SPA"),
    ("et", "EST"),
    ("fi", "FIN"),
    ("fr", "FRA"),
    ("ga", "GLE"),
    ("hr", "HRV"),
    ("hu", "HUN"),
    ("it", "ITA"),
    ("lt", "LIT"),
    ("lv", "LAV"),
    ("mt", "MLT"),
    ("nl", "NLD"),
    ("pl", "POL"),
    ("pt", "POR"),
    ("ro", "RON"),
    ("sk", "SLK"),
    ("sl", "SLV"),
    ("sv", "SWE"),
];

/// Built-in document categories (code, name)
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("REG", "Regulation"),
    ("REG_IMPL", "Implementing regulation"),
    ("REG_DEL", "Delegated regulation"),
    ("DIR", "Directive"),
    ("DIR_IMPL", "Implementing directive"),
    ("DIR_DEL", "Delegated directive"),
    ("DEC", "Decision"),
    ("DEC_IMPL", "Implementing decision"),
    ("DEC_DEL", "Delegated decision"),
    ("RECO", "Recommendation"),
    ("OPIN", "Opinion"),
    ("GUIDELINE", "Guideline"),
];

#[derive(Debug, Error)]
pub enum TermError {
    #[error("Invalid language: {0} (see `list languages`)")]
    UnknownLanguage(String),
    #[error("Invalid {mode} key: {value}")]
    InvalidKey { mode: EnumerationMode, value: String },
    #[error("Failed to read category table '{path}': {source}")]
    CategoryFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// All supported language codes
pub fn available_languages() -> Vec<&'static str> {
    LANGUAGES.iter().map(|(code, _)| *code).collect()
}

/// Fail if `lang` is not one of the supported site languages
pub fn validate_language(lang: &str) -> Result<(), TermError> {
    language_alpha3(lang).map(|_| ())
}

/// ISO 639-2 code used by the search form for a site language
pub fn language_alpha3(lang: &str) -> Result<&'static str, TermError> {
    LANGUAGES
        .iter()
        .find(|(code, _)| *code == lang)
        .map(|(_, alpha3)| *alpha3)
        .ok_or_else(|| TermError::UnknownLanguage(lang.to_string()))
}

/// Year partitions, newest first, ending with the undated and unknown buckets
pub fn available_years(current_year: u16) -> Vec<PartitionKey> {
    let mut years: Vec<PartitionKey> = (FIRST_YEAR..current_year)
        .rev()
        .map(PartitionKey::Year)
        .collect();
    years.push(PartitionKey::Year(UNDATED_YEAR));
    years.push(PartitionKey::UnknownYear);
    years
}

/// Document categories that can be used as partition keys
#[derive(Debug, Clone)]
pub struct CategoryTable {
    /// code -> human readable name
    entries: BTreeMap<String, String>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            entries: DEFAULT_CATEGORIES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl CategoryTable {
    /// Parse a table with one `Name (CODE)` entry per line
    pub fn parse(content: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // The code is inside the last parenthesis group; names may contain parentheses
            if let Some((name, code)) = line.rsplit_once('(') {
                let code = code.trim_end_matches(')').trim();
                let name = name.trim();
                if !code.is_empty() {
                    entries.insert(code.to_string(), name.to_string());
                }
            } else {
                tracing::debug!("Ignoring category line without code: {}", line);
            }
        }
        Self { entries }
    }

    /// Load a table from a file
    pub fn load(path: &Path) -> Result<Self, TermError> {
        let content = std::fs::read_to_string(path).map_err(|source| TermError::CategoryFile {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn keys(&self) -> Vec<PartitionKey> {
        self.entries
            .keys()
            .map(|code| PartitionKey::Category(code.clone()))
            .collect()
    }

    pub fn name(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(c, n)| (c.as_str(), n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the partition keys for a crawl.
///
/// An empty `requested` list selects every key of the mode, in enumeration order.
pub fn resolve_keys(
    mode: EnumerationMode,
    requested: &[String],
    current_year: u16,
    categories: &CategoryTable,
) -> Result<Vec<PartitionKey>, TermError> {
    if requested.is_empty() {
        return Ok(match mode {
            EnumerationMode::Year => available_years(current_year),
            EnumerationMode::Category => categories.keys(),
        });
    }

    requested
        .iter()
        .map(|raw| {
            PartitionKey::parse(mode, raw).ok_or_else(|| TermError::InvalidKey {
                mode,
                value: raw.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_years_order() {
        let years = available_years(2024);
        assert_eq!(years.first(), Some(&PartitionKey::Year(2023)));
        assert_eq!(years[years.len() - 3], PartitionKey::Year(FIRST_YEAR));
        assert_eq!(years[years.len() - 2], PartitionKey::Year(UNDATED_YEAR));
        assert_eq!(years.last(), Some(&PartitionKey::UnknownYear));
        assert_eq!(years.len(), (2023 - 1801 + 1) + 2);
    }

    #[test]
    fn test_language_validation() {
        assert!(validate_language("it").is_ok());
        assert_eq!(language_alpha3("de").unwrap(), "DEU");
        assert!(matches!(
            validate_language("xx"),
            Err(TermError::UnknownLanguage(l)) if l == "xx"
        ));
        assert_eq!(available_languages().len(), 24);
    }

    #[test]
    fn test_category_table_parse() {
        let table = CategoryTable::parse(
            "# comment\nRegulation (REG)\nDecision (sui generis) (DEC_SG)\n\nbroken line\n",
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.name("REG"), Some("Regulation"));
        assert_eq!(table.name("DEC_SG"), Some("Decision (sui generis)"));
    }

    #[test]
    fn test_resolve_keys() {
        let table = CategoryTable::default();
        let keys = resolve_keys(
            EnumerationMode::Year,
            &["2020".to_string(), "unknown".to_string()],
            2024,
            &table,
        )
        .unwrap();
        assert_eq!(keys, vec![PartitionKey::Year(2020), PartitionKey::UnknownYear]);

        let all = resolve_keys(EnumerationMode::Category, &[], 2024, &table).unwrap();
        assert_eq!(all.len(), table.len());

        assert!(resolve_keys(EnumerationMode::Year, &["abc".to_string()], 2024, &table).is_err());
    }
}
