//! Text assembly and normalization

use regex::Regex;
use scraper::ElementRef;
use std::sync::OnceLock;

use super::types::{
    CONSOLIDATED_FIRST_TITLE, CONSOLIDATED_SUPPRESSED, CONSOLIDATED_SUPPRESSED_PARAGRAPHS,
    SEPARATOR,
};
use super::{clean_text, DocumentExtractor, DocumentLayout};

static RE_AMENDMENT: OnceLock<Regex> = OnceLock::new();
static RE_SPACES: OnceLock<Regex> = OnceLock::new();

/// Skip-until-title filter of consolidated acts; a no-op for other layouts
struct ConsolidatedFilter {
    active: bool,
    started: bool,
}

impl ConsolidatedFilter {
    fn new(layout: DocumentLayout) -> Self {
        let active = layout == DocumentLayout::Consolidated;
        Self {
            active,
            started: !active,
        }
    }

    fn has_class(element: ElementRef<'_>, classes: &[&str]) -> bool {
        element.value().classes().any(|c| classes.contains(&c))
    }

    /// Whether a block element (div, table) is suppressed outright
    fn suppresses(&self, element: ElementRef<'_>) -> bool {
        self.active && Self::has_class(element, CONSOLIDATED_SUPPRESSED)
    }

    /// Whether a paragraph contributes text, opening the body at the first title
    fn admit_paragraph(&mut self, p: ElementRef<'_>) -> bool {
        if !self.active {
            return true;
        }
        if Self::has_class(p, CONSOLIDATED_SUPPRESSED)
            || Self::has_class(p, CONSOLIDATED_SUPPRESSED_PARAGRAPHS)
        {
            return false;
        }
        if Self::has_class(p, &[CONSOLIDATED_FIRST_TITLE]) {
            self.started = true;
        }
        self.started
    }
}

impl DocumentExtractor {
    /// Walk the immediate children of the container and assemble raw text
    pub(super) fn assemble(&self, container: ElementRef<'_>, layout: DocumentLayout) -> String {
        let mut text = String::new();
        let mut filter = ConsolidatedFilter::new(layout);

        for child in container.children().filter_map(ElementRef::wrap) {
            match child.value().name() {
                "p" => {
                    if filter.admit_paragraph(child) {
                        push_cleaned(&mut text, child);
                    }
                }
                "div" => {
                    if filter.suppresses(child) {
                        continue;
                    }
                    for p in child.select(&self.paragraph) {
                        if filter.admit_paragraph(p) {
                            push_cleaned(&mut text, p);
                        }
                    }
                }
                "table" => {
                    if filter.suppresses(child) || !filter.started {
                        continue;
                    }
                    for row in child.select(&self.table_row) {
                        push_cleaned(&mut text, row);
                    }
                }
                "hr" => {
                    if filter.started {
                        text.push_str(SEPARATOR);
                    }
                }
                _ => {}
            }
        }

        text
    }
}

fn push_cleaned(text: &mut String, element: ElementRef<'_>) {
    text.push_str(&clean_text(&element.text().collect::<String>()));
    text.push(' ');
}

/// Turn assembled text into the final full text.
///
/// Everything up to and including the first separator is preamble and
/// dropped; remaining separators vanish. Amendment arrows (`◄`, `►M1`) are
/// stripped and whitespace is collapsed.
pub(super) fn finish(raw: &str) -> String {
    let text = raw.replace('\n', " ");
    let text = match text.split_once(SEPARATOR) {
        Some((_, body)) => body.replace(SEPARATOR, ""),
        None => text,
    };

    let amendment = RE_AMENDMENT.get_or_init(|| Regex::new(r"►[A-Z]?\d*|◄").unwrap());
    let spaces = RE_SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());

    let text = amendment.replace_all(&text, " ");
    spaces.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_drops_preamble_before_first_separator() {
        assert_eq!(
            finish("Preamble [SEP] Article 1 [SEP] Article 2 "),
            "Article 1 Article 2"
        );
    }

    #[test]
    fn test_finish_without_separator_keeps_everything() {
        assert_eq!(finish("  Line one\nLine   two  "), "Line one Line two");
        assert_eq!(finish(""), "");
    }

    #[test]
    fn test_finish_strips_amendment_markers() {
        assert_eq!(
            finish("►M1 The Member States shall ◄ ensure ►B that"),
            "The Member States shall ensure that"
        );
    }

    #[test]
    fn test_finish_is_idempotent() {
        let once = finish("a [SEP] b ►M2 c ◄  d\n e");
        assert_eq!(finish(&once), once);
    }
}
