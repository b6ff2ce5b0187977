//! Worker Pool + Job Scheduler (C7): a bounded thread pool running per-job
//! [`crate::entry_pipeline::EntryPipeline`]s, with cancellation, retry and
//! partial-failure accounting.
//!
//! No teacher module survived the retrieval pass for this component (the
//! teacher's own task scheduler lives in the server binaries trimmed from
//! this workspace); grounded instead on the teacher's own dependency
//! choice of `crossbeam-channel` for the pool's task queue, and on this
//! crate's established `thiserror`/`log` conventions for the rest.

mod job;
mod pool;
mod retry;

pub use job::{Job, JobState};
pub use pool::{JobHandle, ThreadPool, WorkerPanicked};
pub use retry::RetryPolicy;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::entry_pipeline::EntryPipelineError;
use crate::error::{Classify, ErrorClass};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job cancelled")]
    Cancelled,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    EntryPipeline(#[from] EntryPipelineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Panicked(#[from] WorkerPanicked),
}

impl Classify for WorkerError {
    fn class(&self) -> ErrorClass {
        match self {
            WorkerError::Cancelled => ErrorClass::Lifecycle,
            WorkerError::Catalog(e) => e.class(),
            WorkerError::EntryPipeline(e) => e.class(),
            WorkerError::Storage(e) => e.class(),
            WorkerError::Panicked(_) => ErrorClass::Lifecycle,
        }
    }
}
