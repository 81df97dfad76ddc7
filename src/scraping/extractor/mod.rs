//! Document page extraction
//!
//! Produces the full text and the leaf subject classifiers of one document
//! page. Extraction is pure: the same HTML always yields the same result,
//! and a page matching none of the known layouts yields empty text rather
//! than an error.

mod layout;
mod text;
mod types;

pub use layout::DocumentLayout;
pub use types::Extraction;

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

use super::selector;

/// Base used to resolve relative classifier links
const CATALOG_BASE: &str = "https://eur-lex.europa.eu/";

/// Query key carrying a classifier code
const CLASSIFIER_QUERY_KEY: &str = "DC_CODED";

/// Normalize non-breaking spaces and typographic apostrophes
pub fn clean_text(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .replace('\u{2019}', "'")
        .replace('\u{b4}', "'")
}

/// Document extractor with pre-compiled selectors
pub struct DocumentExtractor {
    pub(crate) plain_text_marker: Selector,
    pub(crate) title_marker: Selector,
    pub(crate) disclaimer_marker: Selector,
    pub(crate) plain_text_container: Selector,
    pub(crate) plain_text_heading: Selector,
    pub(crate) content_container: Selector,
    pub(crate) paragraph: Selector,
    pub(crate) table_row: Selector,
    classifier_item: Selector,
    link: Selector,
    original_title: Selector,
    base: Option<Url>,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor {
    pub fn new() -> Self {
        Self {
            plain_text_marker: selector("div#TexteOnly"),
            title_marker: selector("p.oj-doc-ti, p.doc-ti"),
            disclaimer_marker: selector("p.disclaimer"),
            plain_text_container: selector("div#TexteOnly txt_te"),
            plain_text_heading: selector("#document1 div.tabContent strong"),
            content_container: selector("#document1 div.tabContent div"),
            paragraph: selector("p"),
            table_row: selector("tr"),
            classifier_item: selector("#PPClass_Contents li"),
            link: selector("a[href]"),
            original_title: selector("p#originalTitle"),
            base: Url::parse(CATALOG_BASE).ok(),
        }
    }

    /// Extract classifiers and full text from a document page
    pub fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let classifiers = self.classifiers(&document);

        let Some(layout) = DocumentLayout::classify(self, &document) else {
            tracing::debug!("No known document layout, text left empty");
            return Extraction {
                classifiers,
                full_text: String::new(),
            };
        };

        let mut raw = String::new();
        if layout == DocumentLayout::PlainText {
            if let Some(heading) = self.plain_text_heading(&document) {
                raw.push_str(&clean_text(&heading));
                raw.push(' ');
            }
        }
        if let Some(container) = self.container(&document, layout) {
            raw.push_str(&self.assemble(container, layout));
        }

        Extraction {
            classifiers,
            full_text: text::finish(&raw),
        }
    }

    /// Title shown on the document page, used when replaying snapshots
    pub fn original_title(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.original_title)
            .next()
            .map(|p| clean_text(&p.text().collect::<String>()).trim().to_string())
    }

    fn classifiers(&self, document: &Html) -> BTreeSet<String> {
        document
            .select(&self.classifier_item)
            .filter_map(|item| item.select(&self.link).next())
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.classifier_code(href))
            .collect()
    }

    fn classifier_code(&self, href: &str) -> Option<String> {
        let url = match &self.base {
            Some(base) => base.join(href).ok()?,
            None => Url::parse(href).ok()?,
        };
        url.query_pairs()
            .find(|(k, _)| k == CLASSIFIER_QUERY_KEY)
            .map(|(_, v)| v.trim().to_string())
            .filter(|code| !code.is_empty())
    }
}
