//! Checkpoint recording and resume planning
//!
//! A single checkpoint record per crawl directory is overwritten after every
//! document attempt. It carries the typed position `(mode, key, page)` plus
//! the last search and document URLs for humans. Resume restarts at the
//! recorded page; the skip filter avoids re-fetching what that page already
//! produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;
use url::Url;

use super::layout::CrawlLayout;
use crate::types::{EnumerationMode, PartitionKey};

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint unavailable at {0}; run without resume")]
    ResumeUnavailable(String),
    #[error("Cannot resume a {requested} crawl from a {found} checkpoint")]
    ResumeIncompatible {
        requested: EnumerationMode,
        found: String,
    },
    #[error("Checkpoint is malformed: {0}")]
    Malformed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Typed crawl position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeCursor {
    pub mode: EnumerationMode,
    /// Partition key as its directory name (`2019`, `unknown`, `REG`)
    pub key: String,
    pub page: u32,
}

impl ResumeCursor {
    pub fn new(key: &PartitionKey, page: u32) -> Self {
        Self {
            mode: key.mode(),
            key: key.dir_name(),
            page,
        }
    }

    /// The partition key this cursor points into
    pub fn partition_key(&self) -> Option<PartitionKey> {
        PartitionKey::parse(self.mode, &self.key)
    }

    /// Recover a cursor from a search URL by reading its query parameters
    pub fn from_search_url(url: &str) -> Result<Self, CheckpointError> {
        let parsed = Url::parse(url).map_err(|e| CheckpointError::Malformed(e.to_string()))?;

        let mut page = None;
        let mut position = None;
        for (name, value) in parsed.query_pairs() {
            if name == "page" {
                page = value.parse::<u32>().ok();
            } else if let Some(mode) = EnumerationMode::from_query_param(&name) {
                position = Some((mode, value.into_owned()));
            }
        }

        let (mode, raw_key) = position.ok_or_else(|| CheckpointError::ResumeIncompatible {
            requested: EnumerationMode::Year,
            found: "unrecognized".to_string(),
        })?;
        let key = PartitionKey::parse(mode, &raw_key)
            .ok_or_else(|| CheckpointError::Malformed(format!("invalid {} key '{}'", mode, raw_key)))?;
        let page = page.ok_or_else(|| CheckpointError::Malformed("missing page parameter".to_string()))?;

        Ok(Self::new(&key, page))
    }
}

/// Persisted checkpoint record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_search_endpoint: String,
    pub last_doc_endpoint: String,
    /// Absent in checkpoints written before typed positions were recorded
    #[serde(default)]
    pub position: Option<ResumeCursor>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Cursor of this checkpoint, falling back to parsing the search URL
    pub fn cursor(&self) -> Result<ResumeCursor, CheckpointError> {
        match &self.position {
            Some(cursor) => Ok(cursor.clone()),
            None => ResumeCursor::from_search_url(&self.last_search_endpoint),
        }
    }
}

/// Overwrite the checkpoint of a crawl.
///
/// The record is written to a temporary file and renamed into place so an
/// interruption never leaves a truncated checkpoint behind.
pub fn record(
    layout: &CrawlLayout,
    search_endpoint: &str,
    doc_endpoint: &str,
    cursor: ResumeCursor,
) -> Result<(), CheckpointError> {
    let checkpoint = Checkpoint {
        last_search_endpoint: search_endpoint.to_string(),
        last_doc_endpoint: doc_endpoint.to_string(),
        position: Some(cursor),
        updated_at: Some(Utc::now()),
    };

    let path = layout.checkpoint_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(&checkpoint)?)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

/// Load the checkpoint of a crawl, if any
pub fn load(layout: &CrawlLayout) -> Result<Option<Checkpoint>, CheckpointError> {
    let path = layout.checkpoint_path();
    if !path.exists() {
        return Ok(None);
    }
    let json = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

/// Work out where a resumed crawl in `mode` must restart
pub fn plan(layout: &CrawlLayout, mode: EnumerationMode) -> Result<ResumeCursor, CheckpointError> {
    let checkpoint = load(layout)?.ok_or_else(|| {
        CheckpointError::ResumeUnavailable(layout.checkpoint_path().display().to_string())
    })?;

    let cursor = match checkpoint.cursor() {
        Ok(cursor) => cursor,
        Err(CheckpointError::ResumeIncompatible { found, .. }) => {
            return Err(CheckpointError::ResumeIncompatible { requested: mode, found })
        }
        Err(e) => return Err(e),
    };

    if cursor.mode != mode {
        return Err(CheckpointError::ResumeIncompatible {
            requested: mode,
            found: cursor.mode.to_string(),
        });
    }

    tracing::info!("Resuming from {}", checkpoint.last_search_endpoint);
    Ok(cursor)
}
