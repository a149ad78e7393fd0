//! Job storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Job, JobState, JobTransition, JobType};

/// Error type for job storage operations.
#[derive(Debug, Error)]
pub enum JobStoreError {
    /// Job not found (or no job of a type exists yet).
    #[error("job not found: {0}")]
    NotFound(String),

    /// A pending job of this type already exists.
    #[error("job of type {job_type} already pending (id {job_id})")]
    AlreadyPending { job_type: JobType, job_id: i64 },

    /// Job type outside the closed set.
    #[error("invalid job type: {0}")]
    InvalidJobType(String),

    /// Job state outside the closed set.
    #[error("invalid job state: {0}")]
    InvalidJobState(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub job_type: Option<JobType>,
    pub state: Option<JobState>,
    pub limit: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            job_type: None,
            state: None,
            limit: 100,
        }
    }

    pub fn with_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Trait for job storage backends.
///
/// Implementations must enforce that at most one job per type is pending,
/// surfacing the duplicate as [`JobStoreError::AlreadyPending`].
pub trait JobStore: Send + Sync {
    /// Insert a new job in the pending state.
    fn create_pending_job(&self, job_type: JobType) -> Result<Job, JobStoreError>;

    /// Get a job by ID.
    fn get_job(&self, id: i64) -> Result<Job, JobStoreError>;

    /// Most recently created job of a type. `NotFound` if none exists.
    fn latest_job(&self, job_type: JobType) -> Result<Job, JobStoreError>;

    /// List jobs matching the filter, newest first.
    fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError>;

    /// Append a state transition and return the updated job.
    fn update_job_state(
        &self,
        id: i64,
        state: JobState,
        error: Option<&str>,
    ) -> Result<Job, JobStoreError>;

    /// Move a job from pending to running in one conditional write.
    /// Returns `None` when the job exists but is no longer pending.
    fn start_pending_job(&self, id: i64) -> Result<Option<Job>, JobStoreError>;

    /// Full transition history of a job, oldest first.
    fn job_transitions(&self, id: i64) -> Result<Vec<JobTransition>, JobStoreError>;

    /// Delete jobs of a type created before `older_than`, always keeping the
    /// `keep_latest` most recently created ones. Returns the number deleted.
    fn prune_jobs(
        &self,
        job_type: JobType,
        older_than: DateTime<Utc>,
        keep_latest: usize,
    ) -> Result<usize, JobStoreError>;
}
