//! Debounced event source over the watched tree.
//!
//! Wraps a `notify` watcher, feeds raw events through the per-path
//! [`Debouncer`], classifies each released path and resolves it into
//! per-file changes for the registered handlers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::debouncer::Debouncer;
use super::error::WatchError;
use super::event::{ChangeKind, DebouncedEvent, RawEventKind};
use super::handler::ChangeHandler;
use super::path_tracker::PathTracker;

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// Produces index changes from filesystem notifications under one root.
pub struct EventSource {
    root: PathBuf,
    ignore_hidden: bool,
    /// Registered handlers.
    handlers: Vec<Box<dyn ChangeHandler>>,
    /// Files seen so far, for resolving directory removals.
    tracker: PathTracker,
    debouncer: Debouncer,
    /// Channel for receiving raw notify events.
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// The underlying file watcher.
    watcher: notify::RecommendedWatcher,
}

impl EventSource {
    /// Create a builder for configuring the source.
    pub fn builder() -> EventSourceBuilder {
        EventSourceBuilder::new()
    }

    /// Walk the root, watch every directory and register every file.
    ///
    /// With `announce`, each discovered file is also handed to the handlers
    /// as created. Fails only if the root itself cannot be watched.
    pub async fn start(&mut self, announce: bool) -> Result<usize, WatchError> {
        if !self.root.is_dir() {
            return Err(WatchError::InitFailed {
                reason: format!("watch root {} is not a directory", self.root.display()),
            });
        }
        self.watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;

        let root = self.root.clone();
        let files = self.scan_directory(&root);
        crate::log_event!(
            "watcher",
            "monitoring",
            "{} files under {}",
            files.len(),
            root.display()
        );

        if announce {
            for file in &files {
                self.dispatch_upsert(file, ChangeKind::Created).await;
            }
        }
        Ok(files.len())
    }

    /// Run the event loop until `shutdown` is cancelled.
    pub async fn watch(mut self, shutdown: CancellationToken) -> Result<(), WatchError> {
        crate::log_event!("watcher", "started");

        loop {
            let debouncing = self.debouncer.has_pending();

            tokio::select! {
                _ = shutdown.cancelled() => break,

                res = self.event_rx.recv() => match res {
                    Some(Ok(event)) => self.record(event),
                    Some(Err(e)) => tracing::error!("[watcher] file watch error: {e}"),
                    None => return Err(WatchError::ChannelClosed),
                },

                Some(ready) = self.debouncer.next_ready(), if debouncing => {
                    self.apply(ready).await;
                }
            }
        }

        crate::log_event!("watcher", "stopped");
        Ok(())
    }

    /// Feed a raw notify event into the debouncer.
    pub fn record(&mut self, event: Event) {
        let Some(kind) = RawEventKind::from_notify(&event.kind) else {
            return;
        };
        for path in event.paths {
            if self.ignore_hidden && is_hidden(&path) {
                continue;
            }
            self.debouncer.record(path, kind);
        }
    }

    /// Apply one debounced event: classify it and notify handlers per file.
    pub async fn apply(&mut self, event: DebouncedEvent) {
        let metadata = std::fs::symlink_metadata(&event.path).ok();
        let kind = ChangeKind::classify(event.kind, metadata.is_some());
        let is_dir = metadata.as_ref().is_some_and(|meta| meta.is_dir());
        crate::debug_event!(
            "watcher",
            "fired",
            "{:?} -> {kind:?} {}",
            event.kind,
            event.path.display()
        );

        match kind {
            ChangeKind::Removed => {
                let depth = self.tracker.depth(&event.path);
                let files = self.tracker.delete_path(&event.path);
                match depth {
                    Some(depth) => crate::debug_event!(
                        "tracker",
                        "pruned",
                        "{} at depth {depth} ({} files)",
                        event.path.display(),
                        files.len()
                    ),
                    None => crate::debug_event!("tracker", "unknown", "{}", event.path.display()),
                }
                for file in files {
                    self.dispatch_remove(&file).await;
                }
            }
            ChangeKind::Created if is_dir => {
                let files = self.scan_directory(&event.path);
                crate::log_event!(
                    "watcher",
                    "directory created",
                    "{} ({} files)",
                    event.path.display(),
                    files.len()
                );
                for file in files {
                    self.dispatch_upsert(&file, ChangeKind::Created).await;
                }
            }
            ChangeKind::Modified if is_dir => {
                crate::debug_event!("watcher", "directory touched", "{}", event.path.display());
            }
            ChangeKind::Created | ChangeKind::Modified => {
                self.tracker.add_file(&event.path);
                self.dispatch_upsert(&event.path, kind).await;
            }
        }
    }

    /// Recursively register files under `dir` and watch its directories.
    ///
    /// Unreadable entries are logged and skipped; siblings are still walked.
    fn scan_directory(&mut self, dir: &Path) -> Vec<PathBuf> {
        let ignore_hidden = self.ignore_hidden;
        let mut files = Vec::new();

        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !ignore_hidden || !is_hidden(entry.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("[watcher] walk error under {}: {e}", dir.display());
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if entry.path() != self.root {
                    self.watch_directory(entry.path());
                }
            } else if entry.file_type().is_file() {
                self.tracker.add_file(entry.path());
                files.push(entry.into_path());
            }
        }

        files
    }

    /// Watch a single directory. Failures are logged, not fatal.
    fn watch_directory(&mut self, dir: &Path) {
        match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => crate::debug_event!("watcher", "watching", "{}", dir.display()),
            Err(e) => tracing::warn!("[watcher] failed to watch {}: {e}", dir.display()),
        }
    }

    async fn dispatch_upsert(&self, path: &Path, kind: ChangeKind) {
        for handler in &self.handlers {
            if !handler.matches(path) {
                continue;
            }
            if let Err(e) = handler.on_upsert(path, kind).await {
                tracing::error!("[{}] handler error: {e}", handler.name());
            }
        }
    }

    async fn dispatch_remove(&self, path: &Path) {
        for handler in &self.handlers {
            if !handler.matches(path) {
                continue;
            }
            if let Err(e) = handler.on_remove(path).await {
                tracing::error!("[{}] handler error: {e}", handler.name());
            }
        }
    }

    /// Files currently known to the tracker.
    pub fn tracker(&self) -> &PathTracker {
        &self.tracker
    }
}

/// Builder for constructing an EventSource.
pub struct EventSourceBuilder {
    root: Option<PathBuf>,
    handlers: Vec<Box<dyn ChangeHandler>>,
    debounce: Duration,
    ignore_hidden: bool,
}

impl EventSourceBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            root: None,
            handlers: Vec::new(),
            debounce: Duration::from_secs(1),
            ignore_hidden: true,
        }
    }

    /// Set the watched root.
    pub fn root(mut self, path: PathBuf) -> Self {
        self.root = Some(path);
        self
    }

    /// Add a handler.
    pub fn handler(mut self, handler: impl ChangeHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Set the per-path quiet window.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn ignore_hidden(mut self, ignore: bool) -> Self {
        self.ignore_hidden = ignore;
        self
    }

    /// Build the EventSource.
    pub fn build(self) -> Result<EventSource, WatchError> {
        let root = self.root.ok_or_else(|| WatchError::InitFailed {
            reason: "Watch root is required".to_string(),
        })?;

        // Create channel for events
        let (tx, rx) = mpsc::channel(1024);

        // Create the notify watcher
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        Ok(EventSource {
            root,
            ignore_hidden: self.ignore_hidden,
            handlers: self.handlers,
            tracker: PathTracker::new(),
            debouncer: Debouncer::new(self.debounce),
            event_rx: rx,
            watcher,
        })
    }
}

impl Default for EventSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
    enum Seen {
        Upsert(PathBuf, String),
        Remove(PathBuf),
    }

    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<Seen>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Seen> {
            let mut seen = std::mem::take(&mut *self.seen.lock().unwrap());
            seen.sort();
            seen
        }
    }

    #[async_trait]
    impl ChangeHandler for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn on_upsert(&self, path: &Path, kind: ChangeKind) -> Result<(), WatchError> {
            self.seen
                .lock()
                .unwrap()
                .push(Seen::Upsert(path.to_path_buf(), format!("{kind:?}")));
            Ok(())
        }

        async fn on_remove(&self, path: &Path) -> Result<(), WatchError> {
            self.seen.lock().unwrap().push(Seen::Remove(path.to_path_buf()));
            Ok(())
        }
    }

    fn source(root: &Path, recorder: &Recorder) -> EventSource {
        EventSource::builder()
            .root(root.to_path_buf())
            .debounce(Duration::from_millis(50))
            .handler(recorder.clone())
            .build()
            .unwrap()
    }

    fn fired(path: &Path, kind: RawEventKind) -> DebouncedEvent {
        DebouncedEvent {
            path: path.to_path_buf(),
            kind,
        }
    }

    #[tokio::test]
    async fn test_start_registers_and_announces_existing_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("docs/deep")).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("docs/deep/b.md"), "b").unwrap();
        fs::write(root.join(".hidden"), "h").unwrap();

        let recorder = Recorder::default();
        let mut source = source(root, &recorder);
        assert_eq!(source.start(true).await.unwrap(), 2);

        assert!(source.tracker().is_file(&root.join("docs/deep/b.md")));
        assert!(!source.tracker().contains(&root.join(".hidden")));
        assert_eq!(
            recorder.take(),
            vec![
                Seen::Upsert(root.join("a.txt"), "Created".into()),
                Seen::Upsert(root.join("docs/deep/b.md"), "Created".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_fails_for_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut source = source(&temp_dir.path().join("absent"), &recorder);
        assert!(matches!(
            source.start(false).await,
            Err(WatchError::InitFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_created_directory_is_walked() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let recorder = Recorder::default();
        let mut source = source(root, &recorder);
        source.start(false).await.unwrap();

        fs::create_dir_all(root.join("new/sub")).unwrap();
        fs::write(root.join("new/one.txt"), "1").unwrap();
        fs::write(root.join("new/sub/two.txt"), "2").unwrap();

        source.apply(fired(&root.join("new"), RawEventKind::Created)).await;

        assert_eq!(
            recorder.take(),
            vec![
                Seen::Upsert(root.join("new/one.txt"), "Created".into()),
                Seen::Upsert(root.join("new/sub/two.txt"), "Created".into()),
            ]
        );
        assert_eq!(source.tracker().file_count(), 2);
    }

    #[tokio::test]
    async fn test_removed_directory_cascades_to_known_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("dir")).unwrap();
        fs::write(root.join("dir/x.txt"), "x").unwrap();
        fs::write(root.join("dir/y.txt"), "y").unwrap();
        fs::write(root.join("keep.txt"), "k").unwrap();

        let recorder = Recorder::default();
        let mut source = source(root, &recorder);
        source.start(false).await.unwrap();

        fs::remove_dir_all(root.join("dir")).unwrap();
        source.apply(fired(&root.join("dir"), RawEventKind::Removed)).await;

        assert_eq!(
            recorder.take(),
            vec![
                Seen::Remove(root.join("dir/x.txt")),
                Seen::Remove(root.join("dir/y.txt")),
            ]
        );

        // A duplicate delete event resolves to nothing
        source.apply(fired(&root.join("dir"), RawEventKind::Removed)).await;
        assert!(recorder.take().is_empty());
        assert!(source.tracker().is_file(&root.join("keep.txt")));
    }

    #[tokio::test]
    async fn test_written_file_becomes_update_and_vanished_file_a_removal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let file = root.join("f.txt");
        fs::write(&file, "v1").unwrap();

        let recorder = Recorder::default();
        let mut source = source(root, &recorder);
        source.start(false).await.unwrap();

        source.apply(fired(&file, RawEventKind::Written)).await;
        assert_eq!(recorder.take(), vec![Seen::Upsert(file.clone(), "Modified".into())]);

        // A write whose file disappeared before the timer fired is a removal
        fs::remove_file(&file).unwrap();
        source.apply(fired(&file, RawEventKind::Written)).await;
        assert_eq!(recorder.take(), vec![Seen::Remove(file)]);
    }

    #[tokio::test]
    async fn test_record_skips_hidden_and_access_events() {
        use notify::EventKind;
        use notify::event::{AccessKind, CreateKind};

        let temp_dir = TempDir::new().unwrap();
        let recorder = Recorder::default();
        let mut source = source(temp_dir.path(), &recorder);

        source.record(
            Event::new(EventKind::Create(CreateKind::File))
                .add_path(temp_dir.path().join(".swap"))
                .add_path(temp_dir.path().join("real.txt")),
        );
        source.record(
            Event::new(EventKind::Access(AccessKind::Any)).add_path(temp_dir.path().join("x")),
        );

        assert_eq!(source.debouncer.pending_count(), 1);
    }
}
