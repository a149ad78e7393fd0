//! Job executors backed by the reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::job::JobType;
use crate::reconciler::Reconciler;

use super::runner::JobScheduler;
use super::types::JobExecutor;

/// Runs the reconciler operation matching its job type.
pub struct ReconcileExecutor {
    job_type: JobType,
    reconciler: Arc<Reconciler>,
}

impl ReconcileExecutor {
    pub fn new(job_type: JobType, reconciler: Arc<Reconciler>) -> Self {
        Self {
            job_type,
            reconciler,
        }
    }
}

#[async_trait]
impl JobExecutor for ReconcileExecutor {
    async fn execute(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        match self.job_type {
            JobType::MovieIndex => {
                let summary = self.reconciler.index_movie_library(&cancel).await?;
                info!(added = summary.added, "Movie index finished");
            }
            JobType::SeriesIndex => {
                let summary = self.reconciler.index_series_library(&cancel).await?;
                info!(added = summary.added, "Series index finished");
            }
            JobType::MovieReconcile => self.reconciler.reconcile_movies(&cancel).await?,
            JobType::SeriesReconcile => self.reconciler.reconcile_series(&cancel).await?,
            JobType::IndexerSync => {
                self.reconciler.sync_indexers().await?;
            }
        }
        Ok(())
    }
}

impl JobScheduler {
    /// Register a [`ReconcileExecutor`] for every job type.
    pub fn with_reconciler(self, reconciler: Arc<Reconciler>) -> Self {
        JobType::ALL.into_iter().fold(self, |scheduler, job_type| {
            scheduler.with_executor(
                job_type,
                Arc::new(ReconcileExecutor::new(job_type, reconciler.clone())),
            )
        })
    }
}
