//! Filesystem watcher feeding the index pipeline.
//!
//! A single notify watcher covers every directory under the root. Raw events
//! are debounced per path, classified once the path goes quiet, and resolved
//! to individual files before reaching the handlers.
//!
//! # Architecture
//!
//! ```text
//! EventSource
//!   - notify::RecommendedWatcher (one non-recursive watch per directory)
//!   - Debouncer (per-path quiet window)
//!   - PathTracker (known files, for directory removals)
//!         |
//!    +----+------+
//!    |           |
//! TaskHandler SearchHandler
//! ```

mod debouncer;
mod error;
pub mod event;
mod handler;
pub mod handlers;
mod path_tracker;
mod source;

pub use debouncer::Debouncer;
pub use error::WatchError;
pub use event::{ChangeKind, DebouncedEvent, RawEventKind};
pub use handler::ChangeHandler;
pub use path_tracker::PathTracker;
pub use source::{EventSource, EventSourceBuilder};
