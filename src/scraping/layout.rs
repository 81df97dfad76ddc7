//! On-disk layout of a crawl
//!
//! ```text
//! <directory>/<language>/
//!     checkpoint.json                 last position, overwritten per document
//!     errors.txt                      unreachable URLs with timestamps (append-only)
//!     not_found.txt                   URLs answered with 404 (append-only)
//!     searchHTML/<key>/<page>.html.gz optional search page snapshots
//!     docsHTML/<key>/<doc_id>.html.gz document snapshots, the skip-filter signal
//! <json_dir>/<key>.json.gz            extracted partition
//! ```

use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::types::PartitionKey;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const ERRORS_FILE: &str = "errors.txt";
const NOT_FOUND_FILE: &str = "not_found.txt";
const SEARCH_DIR: &str = "searchHTML";
const DOCS_DIR: &str = "docsHTML";

/// Paths of one crawl (one language) and its partitions
#[derive(Debug, Clone)]
pub struct CrawlLayout {
    root: PathBuf,
    json_dir: PathBuf,
}

impl CrawlLayout {
    /// Layout rooted at `<directory>/<language>`; the sink defaults to the root
    pub fn new(directory: impl AsRef<Path>, language: &str) -> Self {
        let root = directory.as_ref().join(language);
        Self {
            json_dir: root.clone(),
            root,
        }
    }

    /// Write extracted partitions to `json_dir` instead of the crawl root
    pub fn with_json_dir(mut self, json_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = json_dir {
            self.json_dir = dir;
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.root.join(CHECKPOINT_FILE)
    }

    pub fn errors_path(&self) -> PathBuf {
        self.root.join(ERRORS_FILE)
    }

    pub fn not_found_path(&self) -> PathBuf {
        self.root.join(NOT_FOUND_FILE)
    }

    pub fn search_dir(&self, key: &PartitionKey) -> PathBuf {
        self.root.join(SEARCH_DIR).join(key.dir_name())
    }

    pub fn docs_dir(&self, key: &PartitionKey) -> PathBuf {
        self.root.join(DOCS_DIR).join(key.dir_name())
    }

    pub fn search_page_path(&self, key: &PartitionKey, page: u32) -> PathBuf {
        self.search_dir(key).join(format!("{}.html.gz", page))
    }

    pub fn doc_path(&self, key: &PartitionKey, doc_id: &str) -> PathBuf {
        self.docs_dir(key).join(format!("{}.html.gz", doc_id))
    }

    /// Sink file for an extracted partition
    pub fn data_path(&self, key: &PartitionKey) -> PathBuf {
        self.json_dir.join(format!("{}.json.gz", key.dir_name()))
    }

    /// Create the crawl root
    pub fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Create the snapshot directories of a partition
    pub fn ensure_partition(&self, key: &PartitionKey) -> std::io::Result<()> {
        fs::create_dir_all(self.search_dir(key))?;
        fs::create_dir_all(self.docs_dir(key))
    }

    /// Incremental skip filter: a document is skipped when its snapshot already exists
    pub fn should_skip(&self, key: &PartitionKey, doc_id: &str) -> bool {
        self.doc_path(key, doc_id).exists()
    }

    /// Append an unreachable URL to the error log
    pub fn record_unreachable(&self, url: &str) {
        let line = format!("{} unreachable at {}\n", url, Local::now().format("%Y-%m-%d %H:%M:%S%.6f"));
        self.append(&self.errors_path(), &line);
    }

    /// Append a URL answered with "not found"
    pub fn record_not_found(&self, url: &str) {
        self.append(&self.not_found_path(), &format!("{}\n", url));
    }

    fn append(&self, path: &Path, line: &str) {
        let result = fs::create_dir_all(&self.root).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?
                .write_all(line.as_bytes())
        });
        if let Err(e) = result {
            tracing::error!("Failed to append to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = CrawlLayout::new("/data", "it");
        let key = PartitionKey::UnknownYear;
        assert_eq!(layout.checkpoint_path(), PathBuf::from("/data/it/checkpoint.json"));
        assert_eq!(
            layout.search_page_path(&key, 3),
            PathBuf::from("/data/it/searchHTML/unknown/3.html.gz")
        );
        assert_eq!(
            layout.doc_path(&PartitionKey::Year(2019), "CELEX-1"),
            PathBuf::from("/data/it/docsHTML/2019/CELEX-1.html.gz")
        );
        assert_eq!(layout.data_path(&key), PathBuf::from("/data/it/unknown.json.gz"));

        let layout = layout.with_json_dir(Some(PathBuf::from("/out")));
        assert_eq!(
            layout.data_path(&PartitionKey::Year(2020)),
            PathBuf::from("/out/2020.json.gz")
        );
    }

    #[test]
    fn test_skip_filter_is_existence_check() {
        let tmp = TempDir::new().unwrap();
        let layout = CrawlLayout::new(tmp.path(), "en");
        let key = PartitionKey::Year(2020);
        layout.ensure_partition(&key).unwrap();

        assert!(!layout.should_skip(&key, "doc-1"));
        std::fs::write(layout.doc_path(&key, "doc-1"), b"x").unwrap();
        assert!(layout.should_skip(&key, "doc-1"));
        assert!(!layout.should_skip(&PartitionKey::Year(2021), "doc-1"));
    }

    #[test]
    fn test_error_sinks_append() {
        let tmp = TempDir::new().unwrap();
        let layout = CrawlLayout::new(tmp.path(), "en");

        layout.record_unreachable("https://a");
        layout.record_unreachable("https://b");
        layout.record_not_found("https://c");

        let errors = std::fs::read_to_string(layout.errors_path()).unwrap();
        let lines: Vec<&str> = errors.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("https://a unreachable at "));

        let not_found = std::fs::read_to_string(layout.not_found_path()).unwrap();
        assert_eq!(not_found, "https://c\n");
    }
}
