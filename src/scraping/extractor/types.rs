//! Document extraction types

use std::collections::BTreeSet;

/// Marker inserted at horizontal rules while assembling text
pub(crate) const SEPARATOR: &str = "[SEP]";

/// What one document page yields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Leaf subject-classifier codes
    pub classifiers: BTreeSet<String>,
    /// Post-processed full text; empty when no known layout matched
    pub full_text: String,
}

/// Classes whose elements never contribute text in a consolidated act
pub(crate) const CONSOLIDATED_SUPPRESSED: &[&str] =
    &["reference", "disclaimer", "hd-modifiers", "arrow"];

/// Paragraph classes never contributing text in a consolidated act
pub(crate) const CONSOLIDATED_SUPPRESSED_PARAGRAPHS: &[&str] = &["footnote", "modref"];

/// Paragraph class opening the body of a consolidated act
pub(crate) const CONSOLIDATED_FIRST_TITLE: &str = "title-doc-first";
