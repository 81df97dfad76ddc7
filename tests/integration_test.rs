//! Integration tests for lexharvest
//!
//! These tests drive whole crawls against a scripted in-memory catalog.

use async_trait::async_trait;
use lexharvest::{
    scraping::{
        artifact,
        batch::BatchExtractor,
        checkpoint,
        fetcher::{CrawlContext, RawResponse, Transport, TransportError},
        harvester::{HarvestConfig, Harvester},
        layout::CrawlLayout,
        taxonomy::{Granularity, LabelMapping},
        walker::WalkSettings,
        ResumeCursor, RetryPolicy, WalkState,
    },
    types::{DocumentRecord, PartitionKey},
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

/// Catalog answering search pages from per-page scripts and documents by URI.
///
/// A page script pops one response per request and repeats its last one.
/// Unscripted search pages answer 500, unknown documents 404.
#[derive(Default)]
struct ScriptedCatalog {
    pages: HashMap<(String, u32), VecDeque<RawResponse>>,
    documents: HashMap<String, RawResponse>,
    urls: Vec<String>,
}

impl ScriptedCatalog {
    fn page(mut self, key: &str, page: u32, responses: Vec<RawResponse>) -> Self {
        self.pages.insert((key.to_string(), page), responses.into());
        self
    }

    fn document(mut self, id: &str, code: &str, text: &str) -> Self {
        let body = format!(
            r#"<html><body>
            <div id="PPClass_Contents"><ul><li><a href="./search.html?DC_CODED={code}">x</a></li></ul></div>
            <p id="originalTitle">Original {id}</p>
            <p class="doc-ti">Title</p>
            <div id="document1"><div class="tabContent"><div><p>{text}</p></div></div></div>
            </body></html>"#
        );
        self.documents
            .insert(format!("CELEX:{}", id), RawResponse::new(200, body));
        self
    }

    fn search_requests(&self) -> usize {
        self.urls.iter().filter(|u| u.contains("search.html")).count()
    }

    fn document_requests(&self) -> usize {
        self.urls.iter().filter(|u| u.contains("legal-content")).count()
    }
}

#[async_trait]
impl Transport for ScriptedCatalog {
    async fn get(&mut self, url: &str) -> Result<RawResponse, TransportError> {
        self.urls.push(url.to_string());
        let parsed = Url::parse(url).map_err(|e| TransportError::Connection(e.to_string()))?;
        let query: HashMap<String, String> = parsed.query_pairs().into_owned().collect();

        if parsed.path().ends_with("search.html") {
            let key = query
                .get("DD_YEAR")
                .or_else(|| query.get("FM_CODED"))
                .cloned()
                .unwrap_or_default();
            let page = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
            let response = match self.pages.get_mut(&(key, page)) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            };
            return Ok(response.unwrap_or_else(|| RawResponse::new(500, "")));
        }

        Ok(query
            .get("uri")
            .and_then(|uri| self.documents.get(uri))
            .cloned()
            .unwrap_or_else(|| RawResponse::new(404, "")))
    }

    async fn reset_session(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

fn results(ids: &[&str], next: Option<u32>, total: Option<u32>) -> RawResponse {
    let mut html = String::from("<html><body>");
    for id in ids {
        html.push_str(&format!(
            r#"<div class="SearchResult"><h2><a class="title" name="https://eur-lex.europa.eu/legal-content/AUTO/?uri=CELEX:{id}" href="./legal-content/AUTO/?uri=CELEX:{id}">Act {id}</a></h2></div>"#
        ));
    }
    if let Some(next) = next {
        html.push_str(&format!(
            r#"<a href="./search.html?page={next}"><i class="fa fa-angle-right"></i></a>"#
        ));
    }
    if let Some(total) = total {
        html.push_str(&format!(
            r#"<a href="./search.html?page={total}"><i class="fa fa-angle-double-right"></i></a>"#
        ));
    }
    html.push_str("</body></html>");
    RawResponse::new(200, html)
}

fn granularities() -> BTreeSet<Granularity> {
    [Granularity::Leaf, Granularity::Domain].into_iter().collect()
}

fn mapping() -> LabelMapping {
    LabelMapping::from_map(HashMap::from([
        ("1015".to_string(), "10_20".to_string()),
        ("2030".to_string(), "20_30".to_string()),
    ]))
}

fn layout(tmp: &TempDir) -> CrawlLayout {
    CrawlLayout::new(tmp.path(), "it").with_json_dir(Some(tmp.path().join("json")))
}

fn harvester(tmp: &TempDir, catalog: ScriptedCatalog, save_data: bool) -> Harvester<ScriptedCatalog> {
    let ctx = CrawlContext::new(catalog, RetryPolicy::immediate(), layout(tmp));
    let config = HarvestConfig {
        walk: WalkSettings {
            base_url: Url::parse("https://eur-lex.europa.eu/").unwrap(),
            language: "it".to_string(),
            alpha3: "ITA".to_string(),
            qid: 1,
            max_retries: 2,
            save_html: false,
        },
        granularities: granularities(),
        skip_existing: true,
        save_data,
        pacing: Duration::ZERO,
    };
    Harvester::new(ctx, config).with_mapping(mapping())
}

fn two_page_catalog() -> ScriptedCatalog {
    ScriptedCatalog::default()
        .page("2020", 1, vec![results(&["A", "B"], Some(2), Some(2))])
        .page("2020", 2, vec![results(&["C"], None, None)])
        .document("A", "1015", "Alpha")
        .document("B", "2030", "Beta ►M1 amended")
        .document("C", "4444", "Gamma")
}

/// The sink written during a crawl and the one rebuilt from snapshots agree
#[tokio::test]
async fn test_crawl_and_replay_agree() {
    let tmp = TempDir::new().unwrap();
    let key = PartitionKey::Year(2020);

    let mut crawler = harvester(&tmp, two_page_catalog(), true);
    let report = crawler.harvest_partition(&key, 1).await.unwrap();
    assert_eq!(report.final_state, WalkState::Exhausted);
    assert_eq!(report.extracted, 3);

    let crawled: BTreeMap<String, DocumentRecord> =
        artifact::read_json_gz(&layout(&tmp).data_path(&key)).unwrap();
    let replayed = BatchExtractor::new(mapping(), granularities(), 2)
        .with_quiet(true)
        .extract_all(&layout(&tmp), &key)
        .await
        .unwrap();

    assert_eq!(
        crawled.keys().collect::<Vec<_>>(),
        replayed.keys().collect::<Vec<_>>()
    );
    for (id, record) in &crawled {
        assert_eq!(record.full_text, replayed[id].full_text, "text of {}", id);
        assert_eq!(
            record.eurovoc_classifiers, replayed[id].eurovoc_classifiers,
            "labels of {}",
            id
        );
    }

    assert_eq!(crawled["CELEX-B"].full_text, "Beta amended");
    assert_eq!(crawled["CELEX-A"].title, "Act A");
    assert_eq!(replayed["CELEX-A"].title, "Original A");
    assert_eq!(
        replayed["CELEX-A"].link,
        "https://eur-lex.europa.eu/legal-content/AUTO/?uri=CELEX:A"
    );
    let labels: Vec<&str> = crawled["CELEX-C"]
        .eurovoc_classifiers
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(labels, vec!["4444"]);
}

/// A rerun fetches nothing already on disk; a clean rerun fetches everything
#[tokio::test]
async fn test_skip_filter_round_trip() {
    let tmp = TempDir::new().unwrap();
    let key = PartitionKey::Year(2020);
    harvester(&tmp, two_page_catalog(), false)
        .harvest_partition(&key, 1)
        .await
        .unwrap();

    let mut rerun = harvester(&tmp, two_page_catalog(), false);
    let report = rerun.harvest_partition(&key, 1).await.unwrap();
    assert_eq!(report.skipped, 3);
    assert_eq!(rerun.context().transport().document_requests(), 0);
    assert_eq!(report.documents.len(), 3);
    assert_eq!(report.documents["CELEX-A"].title, "Act A");

    let ctx = CrawlContext::new(two_page_catalog(), RetryPolicy::immediate(), layout(&tmp));
    let clean_config = HarvestConfig {
        walk: WalkSettings {
            base_url: Url::parse("https://eur-lex.europa.eu/").unwrap(),
            language: "it".to_string(),
            alpha3: "ITA".to_string(),
            qid: 1,
            max_retries: 2,
            save_html: false,
        },
        granularities: granularities(),
        skip_existing: false,
        save_data: false,
        pacing: Duration::ZERO,
    };
    let mut clean = Harvester::new(ctx, clean_config).with_mapping(mapping());
    let report = clean.harvest_partition(&key, 1).await.unwrap();
    assert_eq!(report.extracted, 3);
    assert_eq!(clean.context().transport().document_requests(), 3);
}

/// An interrupted partition resumes from the last checkpointed page
#[tokio::test]
async fn test_resume_after_failed_search_page() {
    let tmp = TempDir::new().unwrap();
    let keys = vec![PartitionKey::Year(2021), PartitionKey::Year(2020)];

    let flaky = ScriptedCatalog::default()
        .page("2021", 1, vec![results(&["D"], None, None)])
        .page("2020", 1, vec![results(&["A", "B"], Some(2), Some(2))])
        .document("A", "1015", "Alpha")
        .document("B", "2030", "Beta")
        .document("D", "1015", "Delta");
    let mut first = harvester(&tmp, flaky, false);
    let reports = first.harvest(&keys, None).await.unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].final_state, WalkState::Exhausted);
    assert_eq!(reports[1].final_state, WalkState::Failed);

    let errors = std::fs::read_to_string(layout(&tmp).errors_path()).unwrap();
    assert!(errors.contains("page=2"), "unexpected error log: {}", errors);

    let cursor = checkpoint::plan(&layout(&tmp), keys[0].mode()).unwrap();
    assert_eq!(cursor, ResumeCursor::new(&PartitionKey::Year(2020), 1));

    let mut second = harvester(&tmp, two_page_catalog(), false);
    let reports = second.harvest(&keys, Some(cursor)).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].key, PartitionKey::Year(2020));
    assert_eq!(reports[0].skipped, 2);
    assert_eq!(reports[0].extracted, 1);
    assert_eq!(reports[0].final_state, WalkState::Exhausted);

    let transport = second.context().transport();
    assert!(transport.urls.iter().all(|u| !u.contains("DD_YEAR=2021")));
    assert_eq!(transport.document_requests(), 1);

    let cursor = checkpoint::plan(&layout(&tmp), keys[0].mode()).unwrap();
    assert_eq!(cursor, ResumeCursor::new(&PartitionKey::Year(2020), 2));
}

/// A page that drops its "next" link mid-walk is retried after a cooldown
#[tokio::test]
async fn test_missing_next_link_is_retried() {
    let tmp = TempDir::new().unwrap();
    let key = PartitionKey::Year(2020);
    let catalog = ScriptedCatalog::default()
        .page(
            "2020",
            1,
            vec![
                results(&["A"], None, Some(2)),
                results(&["A"], Some(2), Some(2)),
            ],
        )
        .page("2020", 2, vec![results(&["C"], None, None)])
        .document("A", "1015", "Alpha")
        .document("C", "4444", "Gamma");

    let mut harvester = harvester(&tmp, catalog, false);
    let report = harvester.harvest_partition(&key, 1).await.unwrap();

    assert_eq!(report.final_state, WalkState::Exhausted);
    assert_eq!(report.pages, 3);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.total_documents, 2);
    assert_eq!(harvester.context().cooldowns().total(), 1);
    assert_eq!(harvester.context().transport().search_requests(), 3);
}

/// A page that never recovers its "next" link ends the partition
#[tokio::test]
async fn test_missing_next_link_gives_up() {
    let tmp = TempDir::new().unwrap();
    let key = PartitionKey::Year(2020);
    let catalog = ScriptedCatalog::default()
        .page("2020", 1, vec![results(&["A"], None, Some(3))])
        .document("A", "1015", "Alpha");

    let mut harvester = harvester(&tmp, catalog, false);
    let report = harvester.harvest_partition(&key, 1).await.unwrap();

    let limit = RetryPolicy::immediate().max_page_anomaly_retries;
    assert_eq!(report.final_state, WalkState::Failed);
    assert_eq!(report.pages, limit + 1);
    assert_eq!(report.extracted, 1);
    assert_eq!(harvester.context().cooldowns().total(), u64::from(limit));

    let errors = std::fs::read_to_string(layout(&tmp).errors_path()).unwrap();
    assert!(errors.contains("page=1"));
}

/// Resuming mid-partition yields the same sink as an uninterrupted crawl
#[tokio::test]
async fn test_resumed_sink_matches_uninterrupted_run() {
    let key = PartitionKey::Year(2020);

    let reference = TempDir::new().unwrap();
    harvester(&reference, two_page_catalog(), true)
        .harvest_partition(&key, 1)
        .await
        .unwrap();
    let uninterrupted: BTreeMap<String, DocumentRecord> =
        artifact::read_json_gz(&layout(&reference).data_path(&key)).unwrap();

    // First attempt: the page-two document is unavailable
    let tmp = TempDir::new().unwrap();
    let degraded = ScriptedCatalog::default()
        .page("2020", 1, vec![results(&["A", "B"], Some(2), Some(2))])
        .page("2020", 2, vec![results(&["C"], None, None)])
        .document("A", "1015", "Alpha")
        .document("B", "2030", "Beta ►M1 amended");
    harvester(&tmp, degraded, false)
        .harvest_partition(&key, 1)
        .await
        .unwrap();
    let cursor = checkpoint::plan(&layout(&tmp), key.mode()).unwrap();
    assert_eq!(cursor, ResumeCursor::new(&key, 2));

    let mut second = harvester(&tmp, two_page_catalog(), true);
    let reports = second.harvest(&[key.clone()], Some(cursor)).await.unwrap();
    assert_eq!(reports[0].pages, 1);
    assert_eq!(second.context().transport().document_requests(), 1);

    let resumed: BTreeMap<String, DocumentRecord> =
        artifact::read_json_gz(&layout(&tmp).data_path(&key)).unwrap();
    assert_eq!(
        resumed.keys().collect::<Vec<_>>(),
        uninterrupted.keys().collect::<Vec<_>>()
    );
    for (id, record) in &uninterrupted {
        assert_eq!(resumed[id].full_text, record.full_text, "text of {}", id);
        assert_eq!(
            resumed[id].eurovoc_classifiers, record.eurovoc_classifiers,
            "labels of {}",
            id
        );
    }
}

/// A partition whose search results break off is still flushed, marked as failed
#[tokio::test]
async fn test_failed_partition_is_flushed() {
    let tmp = TempDir::new().unwrap();
    let key = PartitionKey::Year(2020);
    let catalog = ScriptedCatalog::default()
        .page("2020", 1, vec![results(&["A"], Some(2), Some(2))])
        .document("A", "1015", "Alpha");

    let report = harvester(&tmp, catalog, true)
        .harvest_partition(&key, 1)
        .await
        .unwrap();
    assert_eq!(report.final_state, WalkState::Failed);
    assert!(report.flushed);

    let saved: BTreeMap<String, DocumentRecord> =
        artifact::read_json_gz(&layout(&tmp).data_path(&key)).unwrap();
    assert_eq!(saved.keys().collect::<Vec<_>>(), vec!["CELEX-A"]);
}
