//! Service bootstrap: wires the event source, scheduler, callback endpoint
//! and search mirror together from [`Settings`].

use std::sync::Arc;

use anyhow::{Context, bail};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::search::{PlainTextExtractor, SearchIndex, ZincClient};
use crate::tasks::{HttpWorkerClient, IndexWorker, Scheduler, SchedulerConfig, SchedulerHandle};
use crate::watcher::EventSource;
use crate::watcher::handlers::{SearchHandler, TaskHandler};

/// A fully initialized service, ready to run.
pub struct Service {
    settings: Settings,
    scheduler: Scheduler,
    handle: SchedulerHandle,
    source: EventSource,
}

impl Service {
    /// Probe the collaborators and build the pipeline.
    ///
    /// Any failure here aborts startup: the service never runs degraded.
    pub async fn init(settings: Settings) -> anyhow::Result<Self> {
        let root = &settings.watch.root;
        if !root.is_dir() {
            bail!("watch root {} is not a readable directory", root.display());
        }

        let worker = HttpWorkerClient::new(&settings.worker.url, settings.worker.request_timeout())
            .context("failed to create worker client")?;
        worker
            .probe()
            .await
            .context("indexing worker is unreachable")?;
        crate::log_event!("worker", "reachable", "{}", worker.url());

        let search = if settings.search.enabled {
            let client = ZincClient::new(&settings.search).context("failed to create search client")?;
            client
                .probe()
                .await
                .context("search backend is unreachable")?;
            crate::log_event!("search", "reachable", "{}", settings.search.url);
            Some(Arc::new(client) as Arc<dyn SearchIndex>)
        } else {
            None
        };

        Self::with_collaborators(settings, Arc::new(worker), search)
    }

    /// Build the pipeline around already constructed collaborators.
    pub fn with_collaborators(
        settings: Settings,
        worker: Arc<dyn IndexWorker>,
        search: Option<Arc<dyn SearchIndex>>,
    ) -> anyhow::Result<Self> {
        let (scheduler, handle) = Scheduler::new(
            worker,
            SchedulerConfig::from(&settings.worker),
            settings.worker.channel_capacity,
        );

        let mut builder = EventSource::builder()
            .root(settings.watch.root.clone())
            .debounce(settings.watch.debounce())
            .ignore_hidden(settings.watch.ignore_hidden)
            .handler(TaskHandler::new(handle.clone()));
        if let Some(index) = search {
            builder = builder.handler(SearchHandler::new(index, Arc::new(PlainTextExtractor)));
        }
        let source = builder.build().context("failed to create file watcher")?;

        Ok(Self {
            settings,
            scheduler,
            handle,
            source,
        })
    }

    /// Handle for pushing tasks and callbacks into the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Run every component until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let Self {
            settings,
            scheduler,
            handle,
            mut source,
        } = self;

        // The scheduler must drain intake before the startup walk fills it
        let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

        #[cfg(feature = "http-server")]
        let callback_task = {
            let bind = settings.callback.bind.clone();
            let path = settings.callback.path.clone();
            let ct = shutdown.clone();
            let handle = handle.clone();
            tokio::spawn(async move {
                let result = crate::tasks::callback::serve(&bind, &path, handle, ct.clone()).await;
                if let Err(e) = &result {
                    tracing::error!("[callback] server failed: {e}");
                    ct.cancel();
                }
                result
            })
        };
        #[cfg(not(feature = "http-server"))]
        {
            tracing::warn!("[callback] built without http-server; completions will not be received");
            drop(handle);
        }

        let files = source
            .start(settings.watch.index_on_startup)
            .await
            .context("failed to start watching")?;
        crate::log_event!(
            "service",
            "ready",
            "{files} files under {}",
            settings.watch.root.display()
        );

        let watch_result = source.watch(shutdown.clone()).await;
        // Stop the siblings too if the watcher ended on its own
        shutdown.cancel();

        if let Err(e) = scheduler_task.await {
            tracing::error!("[scheduler] task panicked: {e}");
        }
        #[cfg(feature = "http-server")]
        callback_task
            .await
            .context("callback server task panicked")??;

        watch_result.context("file watcher stopped")?;
        Ok(())
    }
}

/// Cancel `token` on ctrl-c.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => crate::log_event!("service", "shutdown", "ctrl-c received"),
            Err(e) => tracing::error!("[service] failed to listen for ctrl-c: {e}"),
        }
        token.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{IndexTask, WorkerError};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NullWorker;

    #[async_trait]
    impl IndexWorker for NullWorker {
        async fn submit(&self, _task: &IndexTask) -> Result<String, WorkerError> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_init_rejects_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.watch.root = temp_dir.path().join("missing");

        let err = Service::init(settings).await.err().unwrap();
        assert!(err.to_string().contains("not a readable directory"));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.watch.root = temp_dir.path().to_path_buf();
        settings.callback.bind = "127.0.0.1:0".to_string();

        let service = Service::with_collaborators(settings, Arc::new(NullWorker), None).unwrap();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(service.run(shutdown.clone()));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        shutdown.cancel();
        running.await.unwrap().unwrap();
    }
}
