//! Job queue and worker infrastructure.
//!
//! The API owns the application state and implements [`JobHandlerContext`]; the queue
//! holds a weak reference to it and dispatches claimed jobs through it.

pub mod context;
pub mod progress;
pub mod queue;

pub use context::JobHandlerContext;
pub use progress::JobProgress;
pub use queue::{compute_retry_backoff, JobQueue, JobQueueConfig, MAX_RETRY_BACKOFF};
