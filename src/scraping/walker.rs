//! Pagination walker
//!
//! Enumerates the search-result pages of one partition. The walker is a
//! small state machine driven by `next_page`; once it reaches `Exhausted`
//! or `Failed` it yields nothing more, and a new walk needs a new walker.

use url::Url;

use super::artifact;
use super::fetcher::{CrawlContext, FetchOutcome, RequestKind, Transport};
use super::search::{search_url, SearchPageParser};
use crate::types::{PartitionKey, SearchResultStub};

/// Walker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    /// The given page is next to be fetched
    FetchingPage { page: u32 },
    /// The last page was reached
    Exhausted,
    /// A search page could not be fetched; the partition ends early
    Failed,
}

/// Parameters shared by every walk of a crawl
#[derive(Debug, Clone)]
pub struct WalkSettings {
    pub base_url: Url,
    pub language: String,
    pub alpha3: String,
    /// Query id sent with every search request
    pub qid: i64,
    pub max_retries: u32,
    /// Save every fetched search page under `searchHTML/`
    pub save_html: bool,
}

/// One fetched search-result page
#[derive(Debug, Clone)]
pub struct WalkedPage {
    pub page: u32,
    pub url: String,
    pub stubs: Vec<SearchResultStub>,
}

pub struct PageWalker {
    key: PartitionKey,
    settings: WalkSettings,
    parser: SearchPageParser,
    state: WalkState,
    /// Declared page count, taken from the first page that declares one
    total_pages: Option<u32>,
    anomaly_retries: u32,
    cooldown_pending: bool,
}

impl PageWalker {
    /// Start a walk at page 1
    pub fn new(key: PartitionKey, settings: WalkSettings) -> Self {
        Self::starting_at(key, settings, 1)
    }

    /// Start a walk at `page`, as when resuming
    pub fn starting_at(key: PartitionKey, settings: WalkSettings, page: u32) -> Self {
        let parser = SearchPageParser::new(settings.base_url.clone());
        Self {
            key,
            settings,
            parser,
            state: WalkState::FetchingPage { page: page.max(1) },
            total_pages: None,
            anomaly_retries: 0,
            cooldown_pending: false,
        }
    }

    pub fn state(&self) -> WalkState {
        self.state
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }

    /// Declared total page count, once resolved
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }

    /// Fetch the next page of the partition, or `None` once the walk is over
    pub async fn next_page<T: Transport>(&mut self, ctx: &mut CrawlContext<T>) -> Option<WalkedPage> {
        let WalkState::FetchingPage { page } = self.state else {
            return None;
        };

        if self.cooldown_pending {
            self.cooldown_pending = false;
            ctx.cool_down().await;
        }

        let url = search_url(
            &self.settings.base_url,
            &self.settings.language,
            &self.settings.alpha3,
            &self.key,
            page,
            self.settings.qid,
        )
        .to_string();

        let body = match ctx.fetch(&url, self.settings.max_retries, RequestKind::SearchPage).await {
            FetchOutcome::Ok(body) => body,
            FetchOutcome::NotFound | FetchOutcome::Exhausted => {
                tracing::error!("Search page {} of {} unavailable, ending partition", page, self.key);
                self.state = WalkState::Failed;
                return None;
            }
        };

        if self.settings.save_html {
            let path = ctx.layout().search_page_path(&self.key, page);
            if let Err(e) = artifact::write_gz(&path, body.as_bytes()) {
                tracing::error!("Failed to save search page {}: {}", path.display(), e);
            }
        }

        let parsed = self.parser.parse(&body);
        if self.total_pages.is_none() {
            self.total_pages = parsed.total_pages;
        }
        let total = self.total_pages;

        self.state = self.advance(page, parsed.has_next, total, &url, ctx);

        if page % 10 == 0 {
            match total {
                Some(total) => tracing::info!("Currently at {}/{} pages for {}", page, total, self.key),
                None => tracing::info!("Currently at page {} for {}", page, self.key),
            }
        }

        Some(WalkedPage {
            page,
            url,
            stubs: parsed.stubs,
        })
    }

    fn advance<T: Transport>(
        &mut self,
        page: u32,
        has_next: bool,
        total: Option<u32>,
        url: &str,
        ctx: &CrawlContext<T>,
    ) -> WalkState {
        if has_next {
            if total.is_some_and(|total| page + 1 > total) {
                tracing::warn!(
                    "Next page link present past the declared total ({:?}) at page {} for {}",
                    total,
                    page,
                    self.key
                );
            }
            self.anomaly_retries = 0;
            return WalkState::FetchingPage { page: page + 1 };
        }

        match total {
            Some(total) if page < total => {
                self.anomaly_retries += 1;
                if self.anomaly_retries > ctx.policy().max_page_anomaly_retries {
                    tracing::error!(
                        "Next page link still missing at page {}/{} for {}, giving up",
                        page,
                        total,
                        self.key
                    );
                    ctx.layout().record_unreachable(url);
                    return WalkState::Failed;
                }
                tracing::warn!(
                    "Next page link missing at page {}/{} for {}, retrying the page",
                    page,
                    total,
                    self.key
                );
                self.cooldown_pending = true;
                WalkState::FetchingPage { page }
            }
            _ => {
                tracing::info!("Reached end of search results at page {}", page);
                WalkState::Exhausted
            }
        }
    }
}
