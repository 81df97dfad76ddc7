//! Taxonomy projection of leaf classifiers
//!
//! Leaf codes map to a mid-level code through a static table; the first two
//! characters of the mid-level code name the top-level domain. Mid-level and
//! domain labels carry `_mt` and `_do` suffixes so the three levels can share
//! one label set.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const MID_SUFFIX: &str = "_mt";
const DOMAIN_SUFFIX: &str = "_do";
const DOMAIN_PREFIX_LEN: usize = 2;

#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("Invalid label type '{0}', expected TC, MT or DO")]
    InvalidGranularity(String),
    #[error("No label types given")]
    Empty,
    #[error("Failed to read label mapping {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Label mapping is not a JSON object of strings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Taxonomy level requested for the output labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    /// Thesaurus concept: the raw leaf code (`TC`)
    Leaf,
    /// Micro-thesaurus (`MT`)
    Mid,
    /// Domain (`DO`)
    Domain,
}

impl Granularity {
    pub fn code(&self) -> &'static str {
        match self {
            Granularity::Leaf => "TC",
            Granularity::Mid => "MT",
            Granularity::Domain => "DO",
        }
    }
}

impl FromStr for Granularity {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TC" => Ok(Granularity::Leaf),
            "MT" => Ok(Granularity::Mid),
            "DO" => Ok(Granularity::Domain),
            _ => Err(TaxonomyError::InvalidGranularity(s.trim().to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parse a comma-separated list such as `TC,MT`
pub fn parse_granularities(raw: &str) -> Result<BTreeSet<Granularity>, TaxonomyError> {
    let set = crate::util::split_list(raw)
        .iter()
        .map(|s| s.parse())
        .collect::<Result<BTreeSet<_>, _>>()?;
    if set.is_empty() {
        return Err(TaxonomyError::Empty);
    }
    Ok(set)
}

/// Leaf code to mid-level code table
#[derive(Debug, Clone, Default)]
pub struct LabelMapping {
    leaf_to_mid: HashMap<String, String>,
}

impl LabelMapping {
    pub fn from_map(leaf_to_mid: HashMap<String, String>) -> Self {
        Self { leaf_to_mid }
    }

    /// Load the table from a JSON object file
    pub fn load(path: &Path) -> Result<Self, TaxonomyError> {
        let json = std::fs::read_to_string(path).map_err(|source| TaxonomyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_map(serde_json::from_str(&json)?))
    }

    pub fn len(&self) -> usize {
        self.leaf_to_mid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_to_mid.is_empty()
    }

    /// Project leaf codes onto the requested levels.
    ///
    /// The result is the union over every requested level. Codes missing
    /// from the table only ever contribute at the leaf level.
    pub fn map(
        &self,
        codes: &BTreeSet<String>,
        granularities: &BTreeSet<Granularity>,
    ) -> BTreeSet<String> {
        let mut labels = BTreeSet::new();

        if granularities.contains(&Granularity::Leaf) {
            labels.extend(codes.iter().cloned());
        }

        let mids = codes.iter().filter_map(|code| self.leaf_to_mid.get(code));
        for mid in mids {
            if granularities.contains(&Granularity::Mid) {
                labels.insert(format!("{}{}", mid, MID_SUFFIX));
            }
            if granularities.contains(&Granularity::Domain) {
                let domain: String = mid.chars().take(DOMAIN_PREFIX_LEN).collect();
                labels.insert(format!("{}{}", domain, DOMAIN_SUFFIX));
            }
        }

        labels
    }
}
