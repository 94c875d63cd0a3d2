//! Index task pipeline: de-duplicating queue, dispatch scheduler and the
//! worker client it drives.
//!
//! # Architecture
//!
//! ```text
//! EventSource / startup walk
//!         |  SchedulerHandle::push
//!         v
//!   Scheduler (single loop)
//!     - TaskQueue        (one entry per path)
//!     - pending map      (one task in flight)
//!     - IndexWorker      (HTTP post)
//!         ^
//!         |  SchedulerHandle::complete
//!   callback endpoint (axum)
//! ```

#[cfg(feature = "http-server")]
pub mod callback;
mod client;
mod queue;
mod scheduler;
mod task;

pub use client::{HttpWorkerClient, IndexWorker, WorkerError};
pub use queue::{PushOutcome, TaskQueue};
pub use scheduler::{
    CallbackOutcome, DispatchOutcome, Scheduler, SchedulerClosed, SchedulerConfig,
    SchedulerHandle,
};
pub use task::{IndexTask, TaskAction, TaskCallback, TaskStatus, file_id};
