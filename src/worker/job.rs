//! Per-job state machine and the retry/strict-mode glue the scheduler
//! wraps around an [`crate::entry_pipeline::EntryPipeline`] run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, EntityState, IndexId};
use crate::entry_pipeline::PipelineSummary;
use crate::storage::StorageError;

use super::retry::{is_transient, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Aborted,
}

impl JobState {
    fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
            JobState::Aborted => "Aborted",
        }
    }
}

/// One backup run: owns the cancellation flag every [`EntryPipeline`] it
/// drives polls at segment boundaries, and the retry policy applied to
/// transient storage failures encountered while uploading volumes.
///
/// [`EntryPipeline`]: crate::entry_pipeline::EntryPipeline
pub struct Job {
    pub uuid: Uuid,
    pub schedule_uuid: Option<Uuid>,
    pub host_name: String,
    pub user_name: String,
    pub strict: bool,
    pub retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
    state: Mutex<JobState>,
}

impl Job {
    pub fn new(
        uuid: Uuid,
        schedule_uuid: Option<Uuid>,
        host_name: impl Into<String>,
        user_name: impl Into<String>,
        strict: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            uuid,
            schedule_uuid,
            host_name: host_name.into(),
            user_name: user_name.into(),
            strict,
            retry,
            cancel: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(JobState::Pending),
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap()
    }

    fn transition(&self, to: JobState) {
        let mut state = self.state.lock().unwrap();
        info!("job {} {} -> {}", self.uuid, state.as_str(), to.as_str());
        *state = to;
    }

    /// Pending -> Running: inserts the entity row.
    pub fn start(&self, catalog: &dyn Catalog, uuid_id: IndexId, entity_type: &str, created: i64) -> crate::catalog::Result<IndexId> {
        self.transition(JobState::Running);
        catalog.new_entity(uuid_id, self.schedule_uuid, entity_type, created)
    }

    /// Running -> Completed: marks the entity row complete and appends history.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_completed(
        &self,
        catalog: &dyn Catalog,
        entity_id: IndexId,
        created: i64,
        duration_secs: u64,
        summary: PipelineSummary,
    ) -> crate::catalog::Result<IndexId> {
        catalog.set_entity_state(entity_id, EntityState::Complete)?;
        self.transition(JobState::Completed);
        catalog.new_history(
            self.uuid,
            self.schedule_uuid,
            &self.host_name,
            &self.user_name,
            "backup",
            created,
            None,
            duration_secs,
            summary.total_entry_count,
            summary.total_entry_size,
            summary.skipped_entry_count,
            summary.skipped_entry_size,
            summary.error_entry_count,
            summary.error_entry_size,
        )
    }

    /// Running -> Failed: an unrecoverable error, e.g. credential failure
    /// or disk full after retry exhaustion.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_failed(
        &self,
        catalog: &dyn Catalog,
        entity_id: IndexId,
        created: i64,
        duration_secs: u64,
        summary: PipelineSummary,
        error_message: &str,
    ) -> crate::catalog::Result<IndexId> {
        catalog.set_entity_state(entity_id, EntityState::Error)?;
        self.transition(JobState::Failed);
        catalog.new_history(
            self.uuid,
            self.schedule_uuid,
            &self.host_name,
            &self.user_name,
            "backup",
            created,
            Some(error_message),
            duration_secs,
            summary.total_entry_count,
            summary.total_entry_size,
            summary.skipped_entry_count,
            summary.skipped_entry_size,
            summary.error_entry_count,
            summary.error_entry_size,
        )
    }

    /// Running -> Aborted: cancellation was observed. In-flight work has
    /// already been flushed to a chunk boundary by the pipeline before this
    /// is called.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_aborted(
        &self,
        catalog: &dyn Catalog,
        entity_id: IndexId,
        created: i64,
        duration_secs: u64,
        summary: PipelineSummary,
    ) -> crate::catalog::Result<IndexId> {
        catalog.set_entity_state(entity_id, EntityState::Error)?;
        self.transition(JobState::Aborted);
        catalog.new_history(
            self.uuid,
            self.schedule_uuid,
            &self.host_name,
            &self.user_name,
            "backup",
            created,
            Some("cancelled"),
            duration_secs,
            summary.total_entry_count,
            summary.total_entry_size,
            summary.skipped_entry_count,
            summary.skipped_entry_size,
            summary.error_entry_count,
            summary.error_entry_size,
        )
    }

    /// Runs `op`, retrying on transient [`StorageError`]s per this job's
    /// [`RetryPolicy`]. Non-transient errors return immediately.
    pub fn with_retry<T>(&self, mut op: impl FnMut() -> Result<T, StorageError>) -> Result<T, StorageError> {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if is_transient(&err) && !self.retry.exhausted(attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "job {} retrying after transient storage error (attempt {}, delay {:?}): {}",
                        self.uuid, attempt, delay, err
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqliteCatalog;

    #[test]
    fn lifecycle_runs_pending_through_completed() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let job = Job::new(Uuid::new_v4(), None, "host", "user", false, RetryPolicy::default());
        assert_eq!(job.state(), JobState::Pending);

        let uuid_id = catalog.new_uuid(job.uuid).unwrap();
        let entity_id = job.start(&catalog, uuid_id, "backup", 1000).unwrap();
        assert_eq!(job.state(), JobState::Running);

        job.finish_completed(&catalog, entity_id, 1010, 10, PipelineSummary::default())
            .unwrap();
        assert_eq!(job.state(), JobState::Completed);

        let history = catalog.list_history(&crate::catalog::Query::new()).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].error_message.is_none());
    }

    #[test]
    fn with_retry_gives_up_on_non_transient_errors_immediately() {
        let job = Job::new(Uuid::new_v4(), None, "host", "user", false, RetryPolicy::default());
        let mut calls = 0;
        let result: Result<(), StorageError> = job.with_retry(|| {
            calls += 1;
            Err(StorageError::AuthFailed("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn with_retry_retries_transient_errors_until_exhausted() {
        let mut retry = RetryPolicy::default();
        retry.max_attempts = 3;
        retry.base_delay_ms = 1;
        let job = Job::new(Uuid::new_v4(), None, "host", "user", false, retry);
        let mut calls = 0;
        let result: Result<(), StorageError> = job.with_retry(|| {
            calls += 1;
            Err(StorageError::NotReachable("down".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }
}
