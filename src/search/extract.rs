//! Plain-text extraction keyed by file extension.

use std::path::Path;

use super::SearchError;

/// Extensions the pipeline treats as documents.
const PARSEABLE: &[&str] = &["doc", "docx", "pdf", "txt", "md", "markdown"];

/// Extensions whose bytes are already text.
const PLAIN_TEXT: &[&str] = &["txt", "md", "markdown"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

/// Whether `path` has a document extension (case-insensitive).
pub fn is_parseable(path: &Path) -> bool {
    extension(path).is_some_and(|ext| PARSEABLE.contains(&ext.as_str()))
}

/// Turns a file into indexable plain text.
pub trait Extractor: Send + Sync {
    /// Extract text from `path`. `Ok(None)` means the format is not handled.
    fn extract(&self, path: &Path) -> Result<Option<String>, SearchError>;
}

/// Reads text formats directly; binary document formats are left to an
/// external converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Option<String>, SearchError> {
        let Some(ext) = extension(path) else {
            return Ok(None);
        };
        if !PLAIN_TEXT.contains(&ext.as_str()) {
            return Ok(None);
        }

        let bytes = std::fs::read(path).map_err(|source| SearchError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
