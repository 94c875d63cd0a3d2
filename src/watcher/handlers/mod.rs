//! Handler implementations for the event source.

mod search;
mod task;

pub use search::SearchHandler;
pub use task::TaskHandler;
