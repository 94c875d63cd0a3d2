//! Direct mirroring of parseable documents into the remote search index.
//!
//! This path runs beside the worker task pipeline: the same debounced
//! changes are extracted to plain text here and written through the
//! index's insert/delete primitives.

pub mod extract;
mod zinc;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use extract::{Extractor, PlainTextExtractor, is_parseable};
pub use zinc::ZincClient;

/// Errors from extraction or the search backend.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Search request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Search backend at {url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

/// Document written to the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub name: String,
    /// Full path of the source file.
    #[serde(rename = "where")]
    pub location: String,
    pub content: String,
    pub size: u64,
    /// Unix seconds.
    pub created: i64,
    pub updated: i64,
    pub format_name: String,
}

impl SearchDocument {
    /// Build a document for `path` from extracted `content`.
    pub fn new(path: &Path, content: String, size: u64) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let now = chrono::Utc::now().timestamp();
        Self {
            format_name: format_name(&name),
            name,
            location: path.to_string_lossy().into_owned(),
            content,
            size,
            created: now,
            updated: now,
        }
    }
}

/// Searchable rendering of a file name: lowercase, separators as spaces.
pub fn format_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if matches!(c, '.' | '-' | '_') { ' ' } else { c })
        .collect()
}

/// Insert/delete primitives of the remote search index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or overwrite the document stored under `id`.
    async fn insert(&self, id: &str, document: &SearchDocument) -> Result<(), SearchError>;

    /// Delete the document stored under `id`. Missing documents are not an error.
    async fn delete(&self, id: &str) -> Result<(), SearchError>;

    /// Startup reachability check.
    async fn probe(&self) -> Result<(), SearchError> {
        Ok(())
    }
}
