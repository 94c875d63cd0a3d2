pub mod cli;
pub mod config;
pub mod logging;
pub mod search;
pub mod service;
pub mod tasks;
pub mod watcher;

pub use config::Settings;
pub use search::{SearchDocument, SearchIndex};
pub use service::Service;
pub use tasks::{IndexTask, IndexWorker, Scheduler, SchedulerHandle, TaskAction, TaskQueue};
pub use watcher::{EventSource, PathTracker};
