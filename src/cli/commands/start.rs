//! Start command: run the watcher service in the foreground.

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::service::{Service, cancel_on_ctrl_c};

/// Command-line overrides applied on top of loaded settings.
#[derive(Debug, Default)]
pub struct StartOverrides {
    pub root: Option<PathBuf>,
    pub worker_url: Option<String>,
    pub bind: Option<String>,
    pub no_search: bool,
}

impl StartOverrides {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(root) = self.root {
            settings.watch.root = root;
        }
        if let Some(url) = self.worker_url {
            settings.worker.url = url;
        }
        if let Some(bind) = self.bind {
            settings.callback.bind = bind;
        }
        if self.no_search {
            settings.search.enabled = false;
        }
    }
}

/// Run start command until ctrl-c.
pub async fn run(mut settings: Settings, overrides: StartOverrides) -> anyhow::Result<()> {
    overrides.apply(&mut settings);

    crate::log_event!(
        "service",
        "starting",
        "root {} worker {}",
        settings.watch.root.display(),
        settings.worker.url
    );

    let service = Service::init(settings).await?;
    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    service.run(shutdown).await
}
