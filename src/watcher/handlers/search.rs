//! Handler mirroring parseable documents straight into the search index.
//!
//! Every change is a full delete-then-reinsert keyed by the file id, so a
//! document never carries stale content from an earlier version.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::search::{Extractor, SearchDocument, SearchError, SearchIndex, is_parseable};
use crate::tasks::file_id;
use crate::watcher::event::ChangeKind;
use crate::watcher::{ChangeHandler, WatchError};

pub struct SearchHandler {
    index: Arc<dyn SearchIndex>,
    extractor: Arc<dyn Extractor>,
}

impl SearchHandler {
    pub fn new(index: Arc<dyn SearchIndex>, extractor: Arc<dyn Extractor>) -> Self {
        Self { index, extractor }
    }

    /// Extract text and size on the blocking pool.
    async fn read_document(&self, path: &Path) -> Result<Option<(String, u64)>, WatchError> {
        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        let read = tokio::task::spawn_blocking(move || {
            let Some(content) = extractor.extract(&owned)? else {
                return Ok::<_, SearchError>(None);
            };
            let size = std::fs::metadata(&owned)
                .map(|meta| meta.len())
                .unwrap_or(content.len() as u64);
            Ok(Some((content, size)))
        })
        .await
        .map_err(|e| self.failed(path, e))?;
        read.map_err(|e| self.failed(path, e))
    }

    fn failed(&self, path: &Path, reason: impl ToString) -> WatchError {
        WatchError::HandlerFailed {
            handler: self.name().to_string(),
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl ChangeHandler for SearchHandler {
    fn name(&self) -> &str {
        "search"
    }

    fn matches(&self, path: &Path) -> bool {
        is_parseable(path)
    }

    async fn on_upsert(&self, path: &Path, kind: ChangeKind) -> Result<(), WatchError> {
        let Some((content, size)) = self.read_document(path).await? else {
            crate::debug_event!("search", "no extractor", "{}", path.display());
            return Ok(());
        };

        let id = file_id(path);
        let document = SearchDocument::new(path, content, size);

        self.index
            .delete(&id)
            .await
            .map_err(|e| self.failed(path, e))?;
        self.index
            .insert(&id, &document)
            .await
            .map_err(|e| self.failed(path, e))?;

        crate::log_event!("search", "indexed", "{kind:?} {}", path.display());
        Ok(())
    }

    async fn on_remove(&self, path: &Path) -> Result<(), WatchError> {
        self.index
            .delete(&file_id(path))
            .await
            .map_err(|e| self.failed(path, e))?;
        crate::log_event!("search", "removed", "{}", path.display());
        Ok(())
    }
}
