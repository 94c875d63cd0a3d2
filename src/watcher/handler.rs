//! Subscriber trait for resolved file changes.

use std::path::Path;

use async_trait::async_trait;

use super::WatchError;
use super::event::ChangeKind;

/// Downstream consumer of per-file changes.
///
/// The event source resolves each debounced event to individual files
/// (a removed directory becomes one removal per tracked file) and hands
/// them to every handler whose [`ChangeHandler::matches`] accepts the path.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &str;

    /// Check if this handler should process changes for the given file.
    fn matches(&self, _path: &Path) -> bool {
        true
    }

    /// A file was created or modified. `kind` is never [`ChangeKind::Removed`].
    async fn on_upsert(&self, path: &Path, kind: ChangeKind) -> Result<(), WatchError>;

    /// A previously tracked file is gone.
    async fn on_remove(&self, path: &Path) -> Result<(), WatchError>;
}
