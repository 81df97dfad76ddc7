//! Layout detection
//!
//! The catalog renders documents in three mutually exclusive layouts. Each
//! is recognized by a marker element, checked in priority order.

use scraper::{ElementRef, Html, Selector};

use super::DocumentExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLayout {
    /// Legacy plain-text rendering (`div#TexteOnly`)
    PlainText,
    /// Official-journal rendering with a document title paragraph
    Standard,
    /// Consolidated act with a disclaimer and amendment markup
    Consolidated,
}

impl DocumentLayout {
    /// Pick the layout of a parsed document, or `None` when no marker is present
    pub fn classify(extractor: &DocumentExtractor, document: &Html) -> Option<Self> {
        let present = |sel: &Selector| document.select(sel).next().is_some();

        if present(&extractor.plain_text_marker) {
            Some(Self::PlainText)
        } else if present(&extractor.title_marker) {
            Some(Self::Standard)
        } else if present(&extractor.disclaimer_marker) {
            Some(Self::Consolidated)
        } else {
            None
        }
    }
}

impl DocumentExtractor {
    /// Element whose children carry the text for `layout`
    pub(super) fn container<'a>(
        &self,
        document: &'a Html,
        layout: DocumentLayout,
    ) -> Option<ElementRef<'a>> {
        match layout {
            DocumentLayout::PlainText => document.select(&self.plain_text_container).next(),
            DocumentLayout::Standard | DocumentLayout::Consolidated => {
                document.select(&self.content_container).next()
            }
        }
    }

    /// Bold heading preceding a plain-text rendering
    pub(super) fn plain_text_heading(&self, document: &Html) -> Option<String> {
        document
            .select(&self.plain_text_heading)
            .next()
            .map(|strong| strong.text().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(html: &str) -> Option<DocumentLayout> {
        DocumentLayout::classify(&DocumentExtractor::new(), &Html::parse_document(html))
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(
            classify(r#"<div id="TexteOnly"></div><p class="doc-ti">T</p><p class="disclaimer">D</p>"#),
            Some(DocumentLayout::PlainText)
        );
        assert_eq!(
            classify(r#"<p class="oj-doc-ti">T</p><p class="disclaimer">D</p>"#),
            Some(DocumentLayout::Standard)
        );
        assert_eq!(
            classify(r#"<p class="doc-ti">T</p>"#),
            Some(DocumentLayout::Standard)
        );
        assert_eq!(
            classify(r#"<p class="disclaimer">D</p>"#),
            Some(DocumentLayout::Consolidated)
        );
        assert_eq!(classify("<p>nothing</p>"), None);
    }
}
