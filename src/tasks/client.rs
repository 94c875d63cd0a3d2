//! Client for the external indexing worker.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::task::IndexTask;

/// Errors from handing a task to the worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to build worker client: {reason}")]
    ClientBuild { reason: String },

    #[error("Worker request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Worker at {url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },
}

/// Submits tasks to an indexing worker.
///
/// A successful submission only means the request reached the worker;
/// the outcome arrives later through the completion callback. Only
/// transport failures (connect, timeout, body read) are errors.
#[async_trait]
pub trait IndexWorker: Send + Sync {
    /// Post one task. Returns the raw response body for logging.
    async fn submit(&self, task: &IndexTask) -> Result<String, WorkerError>;

    /// Startup reachability check.
    async fn probe(&self) -> Result<(), WorkerError> {
        Ok(())
    }
}

/// Posts tasks as JSON to a configured worker URL.
#[derive(Debug, Clone)]
pub struct HttpWorkerClient {
    http: reqwest::Client,
    url: String,
}

impl HttpWorkerClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, WorkerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WorkerError::ClientBuild {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IndexWorker for HttpWorkerClient {
    async fn submit(&self, task: &IndexTask) -> Result<String, WorkerError> {
        crate::log_event!(
            "worker",
            "call",
            "{} task {} name {} path {}",
            task.action,
            task.task_id,
            task.filename,
            task.filepath.display()
        );

        let transport = |e: reqwest::Error| WorkerError::Transport {
            url: self.url.clone(),
            reason: e.to_string(),
        };

        let response = self
            .http
            .post(&self.url)
            .json(task)
            .send()
            .await
            .map_err(transport)?;

        // Task state arrives through the callback; the status is only logged
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            tracing::warn!(
                "[worker] {} answered {status} for {}: {body}",
                self.url,
                task.filepath.display()
            );
        }
        Ok(body)
    }

    /// Any HTTP response counts as reachable; only connection failures fail.
    async fn probe(&self) -> Result<(), WorkerError> {
        self.http
            .get(&self.url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| WorkerError::Unreachable {
                url: self.url.clone(),
                reason: e.to_string(),
            })
    }
}
