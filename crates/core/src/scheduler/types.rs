//! Scheduler error and executor types.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::job::JobStoreError;

/// Errors that can occur while scheduling or cancelling jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Job type outside the closed set.
    #[error("invalid job type: {0}")]
    InvalidJobType(String),

    /// A pending job of this type already exists.
    #[error("job already pending (id {job_id})")]
    AlreadyPending { job_id: i64 },

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("job store error: {0}")]
    Store(JobStoreError),
}

impl From<JobStoreError> for SchedulerError {
    fn from(err: JobStoreError) -> Self {
        match err {
            JobStoreError::InvalidJobType(s) => SchedulerError::InvalidJobType(s),
            JobStoreError::AlreadyPending { job_id, .. } => SchedulerError::AlreadyPending { job_id },
            JobStoreError::NotFound(s) => SchedulerError::NotFound(s),
            other => SchedulerError::Store(other),
        }
    }
}

/// Work run for one job.
///
/// Executors must watch `cancel` themselves; cancellation is cooperative.
/// The error text of a failed run is stored on the job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}

struct FnExecutor<F>(F);

#[async_trait]
impl<F, Fut> JobExecutor for FnExecutor<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn execute(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        (self.0)(cancel).await
    }
}

/// Wrap a closure as a [`JobExecutor`].
///
/// ```rust,ignore
/// let scheduler = JobScheduler::new(config, store).with_executor(
///     JobType::IndexerSync,
///     executor_fn(|_cancel| async { Ok(()) }),
/// );
/// ```
pub fn executor_fn<F, Fut>(f: F) -> Arc<dyn JobExecutor>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnExecutor(f))
}
