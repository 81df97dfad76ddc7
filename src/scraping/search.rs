//! Search-result page parsing and search URL construction

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::extractor::clean_text;
use super::selector;
use crate::types::{EnumerationMode, PartitionKey, SearchResultStub};

/// Advanced-search filter selecting documents available in a given language
const MANIFESTATION_FILTER: &str = "orEMBEDDED_MANIFESTATION-TYPE=pdf;EMBEDDED_MANIFESTATION-TYPE=pdfa1a;\
EMBEDDED_MANIFESTATION-TYPE=pdfa1b;EMBEDDED_MANIFESTATION-TYPE=pdfa2a;EMBEDDED_MANIFESTATION-TYPE=pdfx;\
EMBEDDED_MANIFESTATION-TYPE=pdf1x;EMBEDDED_MANIFESTATION-TYPE=html;EMBEDDED_MANIFESTATION-TYPE=xhtml;\
EMBEDDED_MANIFESTATION-TYPE=doc;EMBEDDED_MANIFESTATION-TYPE=docx";

/// Everything the walker needs from one search-results page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    /// Document stubs, in page order
    pub stubs: Vec<SearchResultStub>,
    /// Whether a "next page" link is present
    pub has_next: bool,
    /// Declared number of pages, if the "last page" link is present
    pub total_pages: Option<u32>,
}

/// Parser for search-result pages with pre-compiled selectors
pub struct SearchPageParser {
    base: Url,
    result: Selector,
    heading_link: Selector,
    not_linkable: Selector,
    title_link: Selector,
    next_icon: Selector,
    last_icon: Selector,
}

impl SearchPageParser {
    /// Create a parser resolving relative links against `base`
    pub fn new(base: Url) -> Self {
        Self {
            base,
            result: selector("div.SearchResult"),
            heading_link: selector("h2 a"),
            not_linkable: selector("h2 a.not-linkable-portion"),
            title_link: selector("h2 a.title"),
            next_icon: selector("i.fa.fa-angle-right"),
            last_icon: selector("i.fa.fa-angle-double-right"),
        }
    }

    pub fn parse(&self, html: &str) -> SearchPage {
        let document = Html::parse_document(html);

        let stubs = document
            .select(&self.result)
            .filter_map(|result| self.parse_result(result))
            .collect();

        let has_next = document.select(&self.next_icon).next().is_some();
        let total_pages = document
            .select(&self.last_icon)
            .next()
            .and_then(|icon| icon.parent())
            .and_then(ElementRef::wrap)
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| self.query_value(href, "page"))
            .and_then(|page| page.parse().ok());

        SearchPage {
            stubs,
            has_next,
            total_pages,
        }
    }

    fn parse_result(&self, result: ElementRef<'_>) -> Option<SearchResultStub> {
        if result.select(&self.not_linkable).next().is_some() {
            return None;
        }

        let heading = result.select(&self.heading_link).next()?;
        let title = clean_text(&heading.text().collect::<String>()).trim().to_string();

        let href = result
            .select(&self.title_link)
            .next()
            .and_then(|a| a.value().attr("href"));
        let Some(uri) = href.and_then(|h| self.query_value(h, "uri")) else {
            tracing::debug!("Search result without document URI: {}", title);
            return None;
        };

        let link = heading.value().attr("name").unwrap_or_default().to_string();

        Some(SearchResultStub {
            doc_id: doc_id_from_uri(&uri),
            title,
            link,
        })
    }

    fn query_value(&self, href: &str, key: &str) -> Option<String> {
        let url = self.base.join(href).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}

/// Derive a document id from its canonical URI, e.g. `CELEX:32019R0001` -> `CELEX-32019R0001`
pub fn doc_id_from_uri(uri: &str) -> String {
    uri.trim().replace(['/', ':'], "-")
}

/// Build the search URL for one page of a partition
pub fn search_url(
    base: &Url,
    language: &str,
    alpha3: &str,
    key: &PartitionKey,
    page: u32,
    qid: i64,
) -> Url {
    let mut url = base.join("search.html").unwrap_or_else(|_| base.clone());
    {
        let mut query = url.query_pairs_mut();
        query
            .clear()
            .append_pair("SUBDOM_INIT", "ALL_ALL")
            .append_pair("DTS_SUBDOM", "ALL_ALL")
            .append_pair("DTS_DOM", "ALL")
            .append_pair("lang", language)
            .append_pair("locale", language)
            .append_pair("type", "advanced")
            .append_pair("wh0", &format!("andCOMPOSE={},{}", alpha3, MANIFESTATION_FILTER));

        if key.mode() == EnumerationMode::Category {
            query
                .append_pair("DB_TYPE_OF_ACT", "")
                .append_pair("typeOfActStatus", "OTHER");
        }

        query
            .append_pair(key.mode().query_param(), &key.query_value())
            .append_pair("qid", &qid.to_string())
            .append_pair("page", &page.to_string());
    }
    url
}

/// URL of the quick-search page used to obtain session cookies
pub fn session_url(base: &Url, language: &str, qid: i64) -> Url {
    let mut url = base.join("search.html").unwrap_or_else(|_| base.clone());
    url.query_pairs_mut()
        .clear()
        .append_pair("scope", "EURLEX")
        .append_pair("lang", language)
        .append_pair("type", "quick")
        .append_pair("qid", &qid.to_string());
    url
}
