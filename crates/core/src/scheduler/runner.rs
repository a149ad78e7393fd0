//! Job scheduler implementation.
//!
//! Three loops share one scheduler:
//! - Pending poller: runs pending jobs one after another
//! - Cadence checker: creates a pending job per type when it is due
//! - Pruner: deletes old job history

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job::{Job, JobFilter, JobState, JobStore, JobStoreError, JobType};
use crate::metrics;

use super::config::SchedulerConfig;
use super::running::RunningJobs;
use super::types::{JobExecutor, SchedulerError};

/// Upper bound on pending jobs picked up by a single poll.
const PENDING_BATCH: i64 = 100;

/// Error recorded on jobs left running by a previous process.
const INTERRUPTED: &str = "interrupted by scheduler restart";

/// The job scheduler - creates, runs, cancels and prunes jobs.
pub struct JobScheduler {
    config: SchedulerConfig,
    store: Arc<dyn JobStore>,
    executors: HashMap<JobType, Arc<dyn JobExecutor>>,
    running: RunningJobs,
    shutdown: CancellationToken,
}

impl JobScheduler {
    pub fn new(config: SchedulerConfig, store: Arc<dyn JobStore>) -> Self {
        Self {
            config,
            store,
            executors: HashMap::new(),
            running: RunningJobs::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register the executor run for jobs of `job_type`.
    pub fn with_executor(mut self, job_type: JobType, executor: Arc<dyn JobExecutor>) -> Self {
        self.executors.insert(job_type, executor);
        self
    }

    /// Signal every loop to stop. `run` returns once running jobs have been
    /// cancelled.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run the scheduler loops until [`JobScheduler::shutdown`] is called.
    pub async fn run(self: Arc<Self>) {
        info!("Starting job scheduler");
        self.recover_interrupted_jobs();

        tokio::join!(
            self.pending_loop(),
            self.check_loop(),
            self.prune_loop(),
            async {
                self.shutdown.cancelled().await;
                self.cancel_running_jobs().await;
            },
        );

        info!("Job scheduler stopped");
    }

    async fn pending_loop(&self) {
        debug!("Pending job poller started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.pending_poll_interval()) => {
                    self.process_pending_jobs().await;
                }
            }
        }
    }

    async fn check_loop(&self) {
        debug!("Cadence checker started");
        loop {
            for job_type in JobType::ALL {
                if let Err(e) = self.check_and_schedule_job(job_type) {
                    warn!(job_type = %job_type, error = %e, "Failed to schedule job");
                }
            }
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.check_interval()) => {}
            }
        }
    }

    async fn prune_loop(&self) {
        if self.config.cleanup.retention().is_none() {
            info!("Job history pruning disabled");
            return;
        }
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.prune_interval()) => {
                    match self.prune_old_jobs() {
                        Ok(0) => {}
                        Ok(deleted) => info!(deleted, "Pruned job history"),
                        Err(e) => error!(error = %e, "Failed to prune job history"),
                    }
                }
            }
        }
    }

    /// Mark jobs stuck in `Running` from an earlier process as failed, so
    /// they do not block their type forever.
    fn recover_interrupted_jobs(&self) {
        let filter = JobFilter::new()
            .with_state(JobState::Running)
            .with_limit(PENDING_BATCH);
        match self.store.list_jobs(&filter) {
            Ok(jobs) => {
                for job in jobs.iter().filter(|j| !self.running.contains(j.id)) {
                    match self
                        .store
                        .update_job_state(job.id, JobState::Error, Some(INTERRUPTED))
                    {
                        Ok(_) => warn!(job_id = job.id, job_type = %job.job_type, "Recovered interrupted job"),
                        Err(e) => error!(job_id = job.id, error = %e, "Failed to recover interrupted job"),
                    }
                }
            }
            Err(e) => error!(error = %e, "Failed to list running jobs"),
        }
    }

    /// Create a pending job of `job_type` when it is due. Returns the new
    /// job, or `None` when nothing was scheduled.
    pub fn check_and_schedule_job(&self, job_type: JobType) -> Result<Option<Job>, SchedulerError> {
        let Some(cadence) = self.config.cadence(job_type) else {
            return Ok(None);
        };

        match self.store.latest_job(job_type) {
            Ok(last) if last.state.is_active() => return Ok(None),
            Ok(last) => {
                let elapsed = (Utc::now() - last.created_at).to_std().unwrap_or_default();
                if elapsed < cadence {
                    return Ok(None);
                }
            }
            Err(JobStoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        match self.create_pending_job(job_type) {
            Ok(job) => Ok(Some(job)),
            Err(SchedulerError::AlreadyPending { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert a pending job. A duplicate is logged and reported as
    /// [`SchedulerError::AlreadyPending`] with the existing job's id.
    pub fn create_pending_job(&self, job_type: JobType) -> Result<Job, SchedulerError> {
        match self.store.create_pending_job(job_type) {
            Ok(job) => {
                info!(job_id = job.id, job_type = %job_type, "Scheduled job");
                Ok(job)
            }
            Err(JobStoreError::AlreadyPending { job_id, .. }) => {
                debug!(job_id, job_type = %job_type, "Job already pending");
                Err(SchedulerError::AlreadyPending { job_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a job from its type name. A duplicate returns the job that is
    /// already pending.
    pub fn create_job(&self, job_type: &str) -> Result<Job, SchedulerError> {
        let job_type: JobType = job_type.parse()?;
        match self.create_pending_job(job_type) {
            Err(SchedulerError::AlreadyPending { job_id }) => Ok(self.store.get_job(job_id)?),
            other => other,
        }
    }

    pub fn get_job(&self, id: i64) -> Result<Job, SchedulerError> {
        Ok(self.store.get_job(id)?)
    }

    pub fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, SchedulerError> {
        Ok(self.store.list_jobs(filter)?)
    }

    /// Ids of jobs whose executor is running in this process.
    pub fn running_job_ids(&self) -> Vec<i64> {
        self.running.ids()
    }

    /// Run every pending job, oldest first, one at a time.
    pub async fn process_pending_jobs(&self) {
        let filter = JobFilter::new()
            .with_state(JobState::Pending)
            .with_limit(PENDING_BATCH);
        let mut jobs = match self.store.list_jobs(&filter) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to list pending jobs");
                return;
            }
        };
        jobs.reverse();

        for job in jobs {
            if self.shutdown.is_cancelled() {
                break;
            }
            self.execute_job(job).await;
        }
    }

    /// Run one job and record its outcome.
    ///
    /// The job is tracked as running before it is claimed, so a concurrent
    /// `cancel_job` either finds it pending or finds its cancel token.
    pub async fn execute_job(&self, job: Job) {
        let cancel = self.shutdown.child_token();
        let guard = self.running.register(job.id, cancel.clone());

        // The job may have been cancelled since it was listed.
        match self.store.start_pending_job(job.id) {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(job_id = job.id, "Job no longer pending, skipping");
                return;
            }
            Err(e) => {
                warn!(job_id = job.id, error = %e, "Failed to start job");
                return;
            }
        }

        let Some(executor) = self.executors.get(&job.job_type).cloned() else {
            let message = format!("no executor registered for job type {}", job.job_type);
            warn!(job_id = job.id, "{}", message);
            self.finish(&job, JobState::Error, Some(&message));
            return;
        };
        info!(job_id = job.id, job_type = %job.job_type, "Running job");

        let started = Instant::now();
        let result = executor.execute(cancel.clone()).await;
        metrics::JOB_DURATION
            .with_label_values(&[job.job_type.as_str()])
            .observe(started.elapsed().as_secs_f64());

        match result {
            _ if cancel.is_cancelled() => {
                info!(job_id = job.id, "Job cancelled");
                self.finish(&job, JobState::Cancelled, None);
            }
            Err(e) => {
                warn!(job_id = job.id, error = %e, "Job failed");
                self.finish(&job, JobState::Error, Some(&e.to_string()));
            }
            Ok(()) => {
                info!(job_id = job.id, elapsed_ms = started.elapsed().as_millis() as u64, "Job done");
                self.finish(&job, JobState::Done, None);
            }
        }

        // Released after the final state is stored, so a waiting
        // `cancel_job` observes it.
        drop(guard);
    }

    fn finish(&self, job: &Job, state: JobState, error: Option<&str>) {
        metrics::JOBS_EXECUTED
            .with_label_values(&[job.job_type.as_str(), state.as_str()])
            .inc();
        if let Err(e) = self.store.update_job_state(job.id, state, error) {
            error!(job_id = job.id, state = %state, error = %e, "Failed to record job outcome");
        }
    }

    /// Cancel a job.
    ///
    /// A pending job is cancelled directly. A running job is signalled and
    /// waited for up to the configured timeout; the call succeeds after the
    /// timeout even if the executor ignored the signal. Finished jobs are
    /// left alone.
    pub async fn cancel_job(&self, id: i64) -> Result<(), SchedulerError> {
        let job = self.store.get_job(id)?;
        match job.state {
            JobState::Pending => {
                self.store.update_job_state(id, JobState::Cancelled, None)?;
                // A runner may have claimed it since it was read.
                if let Some(handle) = self.running.get(id) {
                    handle.cancel.cancel();
                }
                info!(job_id = id, "Cancelled pending job");
                Ok(())
            }
            JobState::Running => match self.running.get(id) {
                Some(handle) => {
                    handle.cancel.cancel();
                    self.wait_for_exit(id, handle.finished).await;
                    Ok(())
                }
                None => {
                    // Not running in this process; nothing will finish it.
                    self.store.update_job_state(id, JobState::Cancelled, None)?;
                    warn!(job_id = id, "Cancelled orphaned running job");
                    Ok(())
                }
            },
            JobState::Done | JobState::Error | JobState::Cancelled => Ok(()),
        }
    }

    async fn wait_for_exit(&self, id: i64, finished: CancellationToken) {
        let timeout = self.config.cancel_timeout();
        if tokio::time::timeout(timeout, finished.cancelled())
            .await
            .is_err()
        {
            warn!(
                job_id = id,
                timeout_secs = timeout.as_secs(),
                "Job did not stop within cancel timeout"
            );
        }
    }

    /// Cancel every running job concurrently and wait for each to exit.
    async fn cancel_running_jobs(&self) {
        let handles: Vec<_> = self
            .running
            .ids()
            .into_iter()
            .filter_map(|id| self.running.get(id).map(|handle| (id, handle)))
            .collect();
        if handles.is_empty() {
            return;
        }

        info!(count = handles.len(), "Cancelling running jobs");
        join_all(handles.into_iter().map(|(id, handle)| async move {
            handle.cancel.cancel();
            self.wait_for_exit(id, handle.finished).await;
        }))
        .await;
    }

    /// Delete history older than the retention, keeping the latest jobs of
    /// each type. Returns the number of jobs deleted.
    pub fn prune_old_jobs(&self) -> Result<usize, SchedulerError> {
        let Some(retention) = self.config.cleanup.retention() else {
            return Ok(0);
        };
        let cutoff = Utc::now() - retention;

        let mut deleted = 0;
        for job_type in JobType::ALL {
            deleted += self
                .store
                .prune_jobs(job_type, cutoff, self.config.cleanup.keep_latest)?;
        }
        metrics::JOBS_PRUNED.inc_by(deleted as u64);
        Ok(deleted)
    }
}

/// Poll `check` every 10ms for up to `limit`.
#[cfg(test)]
pub(crate) async fn wait_until(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::job::SqliteJobStore;
    use crate::scheduler::executor_fn;

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            pending_poll_interval_ms: 10,
            check_interval_secs: 3600,
            cancel_timeout_secs: 1,
            ..Default::default()
        }
    }

    fn scheduler(config: SchedulerConfig) -> (JobScheduler, Arc<SqliteJobStore>) {
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        (JobScheduler::new(config, store.clone()), store)
    }

    /// Waits for cancellation, then reports it.
    fn cooperative() -> Arc<dyn JobExecutor> {
        executor_fn(|cancel: CancellationToken| async move {
            cancel.cancelled().await;
            Err::<(), _>(anyhow::anyhow!("stopped"))
        })
    }

    #[test]
    fn test_create_job_rejects_unknown_type() {
        let (scheduler, _) = scheduler(fast_config());
        let err = scheduler.create_job("movie_delete").unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidJobType(ref t) if t == "movie_delete"));
    }

    #[test]
    fn test_duplicate_create_returns_pending_job() {
        let (scheduler, store) = scheduler(fast_config());
        let first = scheduler.create_job("movie_reconcile").unwrap();
        let second = scheduler.create_job("movie_reconcile").unwrap();
        assert_eq!(first.id, second.id);

        let pending = store
            .list_jobs(&JobFilter::new().with_type(JobType::MovieReconcile))
            .unwrap();
        assert_eq!(pending.len(), 1);

        let err = scheduler
            .create_pending_job(JobType::MovieReconcile)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyPending { job_id } if job_id == first.id));
    }

    #[test]
    fn test_check_schedules_first_job_immediately() {
        let (scheduler, _) = scheduler(fast_config());
        let job = scheduler
            .check_and_schedule_job(JobType::SeriesIndex)
            .unwrap()
            .unwrap();
        assert_eq!(job.state, JobState::Pending);

        // Pending blocks another one.
        assert!(scheduler
            .check_and_schedule_job(JobType::SeriesIndex)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_check_waits_for_cadence_after_finished_job() {
        let (scheduler, store) = scheduler(fast_config());
        let job = scheduler.create_job("indexer_sync").unwrap();
        store.update_job_state(job.id, JobState::Done, None).unwrap();

        assert!(scheduler
            .check_and_schedule_job(JobType::IndexerSync)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_check_reschedules_once_cadence_elapsed() {
        let config = SchedulerConfig {
            movie_index_secs: 1,
            ..fast_config()
        };
        let (scheduler, store) = scheduler(config);
        let job = scheduler.create_job("movie_index").unwrap();
        store.update_job_state(job.id, JobState::Error, Some("boom")).unwrap();

        std::thread::sleep(Duration::from_millis(1100));
        let next = scheduler
            .check_and_schedule_job(JobType::MovieIndex)
            .unwrap()
            .unwrap();
        assert_ne!(next.id, job.id);
    }

    #[test]
    fn test_zero_cadence_disables_scheduling() {
        let config = SchedulerConfig {
            series_reconcile_secs: 0,
            ..fast_config()
        };
        let (scheduler, _) = scheduler(config);
        assert!(scheduler
            .check_and_schedule_job(JobType::SeriesReconcile)
            .unwrap()
            .is_none());
        // Manual creation still works.
        assert!(scheduler.create_job("series_reconcile").is_ok());
    }

    #[tokio::test]
    async fn test_execute_records_outcomes() {
        let (scheduler, store) = scheduler(fast_config());
        let scheduler = scheduler
            .with_executor(JobType::MovieIndex, executor_fn(|_| async { anyhow::Ok(()) }))
            .with_executor(
                JobType::SeriesIndex,
                executor_fn(|_| async { Err::<(), _>(anyhow::anyhow!("library unreachable")) }),
            );

        let ok = scheduler.create_job("movie_index").unwrap();
        let failed = scheduler.create_job("series_index").unwrap();
        let orphan = scheduler.create_job("indexer_sync").unwrap();
        scheduler.process_pending_jobs().await;

        assert_eq!(store.get_job(ok.id).unwrap().state, JobState::Done);

        let failed = store.get_job(failed.id).unwrap();
        assert_eq!(failed.state, JobState::Error);
        assert_eq!(failed.error.as_deref(), Some("library unreachable"));

        let orphan = store.get_job(orphan.id).unwrap();
        assert_eq!(orphan.state, JobState::Error);
        assert_eq!(
            orphan.error.as_deref(),
            Some("no executor registered for job type indexer_sync")
        );

        let states: Vec<JobState> = store
            .job_transitions(ok.id)
            .unwrap()
            .iter()
            .map(|t| t.to_state)
            .collect();
        assert_eq!(states, vec![JobState::Pending, JobState::Running, JobState::Done]);
        assert!(scheduler.running_job_ids().is_empty());
    }

    #[tokio::test]
    async fn test_pending_jobs_run_oldest_first() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler(fast_config());
        let mut scheduler = scheduler;
        for job_type in [JobType::MovieIndex, JobType::SeriesIndex] {
            let order = order.clone();
            scheduler = scheduler.with_executor(
                job_type,
                executor_fn(move |_| {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(job_type);
                        anyhow::Ok(())
                    }
                }),
            );
        }

        scheduler.create_job("series_index").unwrap();
        scheduler.create_job("movie_index").unwrap();
        scheduler.process_pending_jobs().await;

        assert_eq!(
            *order.lock().unwrap(),
            vec![JobType::SeriesIndex, JobType::MovieIndex]
        );
    }

    #[tokio::test]
    async fn test_cancel_pending_job() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (scheduler, store) = scheduler(fast_config());
        let scheduler = scheduler.with_executor(
            JobType::MovieReconcile,
            executor_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }
            }),
        );

        let job = scheduler.create_job("movie_reconcile").unwrap();
        scheduler.cancel_job(job.id).await.unwrap();
        assert_eq!(store.get_job(job.id).unwrap().state, JobState::Cancelled);

        scheduler.process_pending_jobs().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Finished jobs are a no-op.
        scheduler.cancel_job(job.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_job_cancelled_after_listing_is_not_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (scheduler, store) = scheduler(fast_config());
        let scheduler = scheduler.with_executor(
            JobType::IndexerSync,
            executor_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(()) }
            }),
        );

        let listed = scheduler.create_job("indexer_sync").unwrap();
        store
            .update_job_state(listed.id, JobState::Cancelled, None)
            .unwrap();
        scheduler.execute_job(listed.clone()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let states: Vec<JobState> = store
            .job_transitions(listed.id)
            .unwrap()
            .iter()
            .map(|t| t.to_state)
            .collect();
        assert_eq!(states, vec![JobState::Pending, JobState::Cancelled]);
        assert!(scheduler.running_job_ids().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let (scheduler, store) = scheduler(fast_config());
        let scheduler = Arc::new(scheduler.with_executor(JobType::SeriesReconcile, cooperative()));

        let job = scheduler.create_job("series_reconcile").unwrap();
        let runner = scheduler.clone();
        let task = tokio::spawn(async move { runner.process_pending_jobs().await });

        let observer = scheduler.clone();
        assert!(wait_until(Duration::from_secs(2), || observer.running_job_ids() == vec![job.id]).await);

        scheduler.cancel_job(job.id).await.unwrap();
        let job = store.get_job(job.id).unwrap();
        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.error.is_none());
        assert!(scheduler.running_job_ids().is_empty());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_ignored_by_executor_times_out() {
        let (scheduler, store) = scheduler(fast_config());
        let scheduler = Arc::new(scheduler.with_executor(
            JobType::MovieIndex,
            executor_fn(|_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                anyhow::Ok(())
            }),
        ));

        let job = scheduler.create_job("movie_index").unwrap();
        let runner = scheduler.clone();
        tokio::spawn(async move { runner.process_pending_jobs().await });

        let observer = store.clone();
        assert!(
            wait_until(Duration::from_secs(2), || {
                observer.get_job(job.id).unwrap().state == JobState::Running
            })
            .await
        );

        let started = Instant::now();
        scheduler.cancel_job(job.id).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert_eq!(store.get_job(job.id).unwrap().state, JobState::Running);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_not_found() {
        let (scheduler, _) = scheduler(fast_config());
        let err = scheduler.cancel_job(404).await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_run_executes_scheduled_jobs_until_shutdown() {
        let config = SchedulerConfig {
            check_interval_secs: 1,
            movie_reconcile_secs: 3600,
            ..fast_config()
        };
        let (scheduler, store) = scheduler(config);
        let scheduler = Arc::new(
            scheduler.with_executor(JobType::MovieReconcile, executor_fn(|_| async { anyhow::Ok(()) })),
        );

        let handle = tokio::spawn(scheduler.clone().run());

        let done = wait_until(Duration::from_secs(3), || {
            store
                .latest_job(JobType::MovieReconcile)
                .map(|job| job.state == JobState::Done)
                .unwrap_or(false)
        })
        .await;
        assert!(done);

        scheduler.shutdown();
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_jobs() {
        let (scheduler, store) = scheduler(fast_config());
        let scheduler = Arc::new(scheduler.with_executor(JobType::IndexerSync, cooperative()));
        let job = scheduler.create_job("indexer_sync").unwrap();

        let handle = tokio::spawn(scheduler.clone().run());
        let observer = scheduler.clone();
        assert!(wait_until(Duration::from_secs(2), || !observer.running_job_ids().is_empty()).await);

        scheduler.shutdown();
        tokio::time::timeout(Duration::from_secs(3), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.get_job(job.id).unwrap().state, JobState::Cancelled);
    }

    #[tokio::test]
    async fn test_run_recovers_interrupted_jobs() {
        let (scheduler, store) = scheduler(fast_config());
        let stale = scheduler.create_job("movie_index").unwrap();
        store
            .update_job_state(stale.id, JobState::Running, None)
            .unwrap();

        let scheduler = Arc::new(scheduler);
        let handle = tokio::spawn(scheduler.clone().run());
        let recovered = wait_until(Duration::from_secs(2), || {
            store
                .get_job(stale.id)
                .map(|job| job.state == JobState::Error)
                .unwrap_or(false)
        })
        .await;
        scheduler.shutdown();
        handle.await.unwrap();

        assert!(recovered);
        assert_eq!(
            store.get_job(stale.id).unwrap().error.as_deref(),
            Some(INTERRUPTED)
        );
    }

    #[test]
    fn test_prune_disabled_when_retention_zero() {
        let mut config = fast_config();
        config.cleanup.retention_hours = 0;
        let (scheduler, store) = scheduler(config);
        let job = scheduler.create_job("movie_index").unwrap();
        store.update_job_state(job.id, JobState::Done, None).unwrap();

        assert_eq!(scheduler.prune_old_jobs().unwrap(), 0);
        assert!(store.get_job(job.id).is_ok());
    }

    #[test]
    fn test_prune_keeps_recent_jobs() {
        let (scheduler, store) = scheduler(fast_config());
        let job = scheduler.create_job("movie_index").unwrap();
        store.update_job_state(job.id, JobState::Done, None).unwrap();

        assert_eq!(scheduler.prune_old_jobs().unwrap(), 0);
        assert!(store.get_job(job.id).is_ok());
    }
}
