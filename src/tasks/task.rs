//! Index mutation tasks and the worker callback payload.

use std::fmt;
use std::path::{Path, PathBuf};

use data_encoding::BASE32;
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// What the worker should do with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Add,
    Delete,
    Update,
}

impl TaskAction {
    pub fn is_insert(self) -> bool {
        !matches!(self, Self::Delete)
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "delete"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// A pending index mutation for one file.
///
/// Serializes to the request body posted to the indexing worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTask {
    pub filename: String,
    pub filepath: PathBuf,
    pub is_insert: bool,
    pub action: TaskAction,
    /// Assigned at dispatch; empty while queued.
    pub task_id: String,
    /// Unix seconds of the originating event.
    pub start_time: i64,
    pub file_id: String,
}

impl IndexTask {
    /// Build a task for `path` stamped with the current time.
    pub fn new(path: &Path, action: TaskAction) -> Self {
        Self::at(path, action, chrono::Utc::now().timestamp())
    }

    /// Build a task with an explicit originating timestamp.
    pub fn at(path: &Path, action: TaskAction, start_time: i64) -> Self {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            filename,
            filepath: path.to_path_buf(),
            is_insert: action.is_insert(),
            action,
            task_id: String::new(),
            start_time,
            file_id: file_id(path),
        }
    }

    pub fn insert(path: &Path) -> Self {
        Self::new(path, TaskAction::Add)
    }

    pub fn update(path: &Path) -> Self {
        Self::new(path, TaskAction::Update)
    }

    pub fn remove(path: &Path) -> Self {
        Self::new(path, TaskAction::Delete)
    }
}

/// Stable content-addressed id of a path: BASE32 of its SHA-256.
pub fn file_id(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    BASE32.encode(&digest)
}

/// Outcome reported by the worker for a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Done,
    Failed,
}

impl<'de> Deserialize<'de> for TaskStatus {
    /// Accepts `"done"`/`"failed"` or the numeric codes `0` (done) and
    /// anything else (failed).
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Code(i64),
            Name(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Code(0) => Ok(Self::Done),
            Wire::Code(_) => Ok(Self::Failed),
            Wire::Name(name) => match name.to_ascii_lowercase().as_str() {
                "done" => Ok(Self::Done),
                "failed" => Ok(Self::Failed),
                other => Err(serde::de::Error::unknown_variant(other, &["done", "failed"])),
            },
        }
    }
}

/// Completion callback delivered out of band by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCallback {
    pub task_id: String,
    pub status: TaskStatus,
}
