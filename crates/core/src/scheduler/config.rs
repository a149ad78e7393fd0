//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::job::JobType;

/// Configuration for the job scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often to look for pending jobs (milliseconds).
    /// Pending jobs found in one poll run one after another.
    #[serde(default = "default_pending_poll_interval")]
    pub pending_poll_interval_ms: u64,

    /// How often to check whether a new job of each type is due (seconds).
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// How often to prune job history (seconds).
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// How long `cancel_job` waits for a running job to exit (seconds).
    /// The call succeeds after the timeout even if the job is still running.
    #[serde(default = "default_cancel_timeout")]
    pub cancel_timeout_secs: u64,

    /// Cadence per job type (seconds). 0 disables automatic scheduling of
    /// that type; jobs can still be created through the API.
    #[serde(default = "default_index_cadence")]
    pub movie_index_secs: u64,
    #[serde(default = "default_reconcile_cadence")]
    pub movie_reconcile_secs: u64,
    #[serde(default = "default_index_cadence")]
    pub series_index_secs: u64,
    #[serde(default = "default_reconcile_cadence")]
    pub series_reconcile_secs: u64,
    #[serde(default = "default_indexer_sync_cadence")]
    pub indexer_sync_secs: u64,

    /// Job history retention.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

fn default_pending_poll_interval() -> u64 {
    5000 // 5 seconds
}

fn default_check_interval() -> u64 {
    60
}

fn default_prune_interval() -> u64 {
    3600 // hourly
}

fn default_cancel_timeout() -> u64 {
    30
}

fn default_index_cadence() -> u64 {
    3600
}

fn default_reconcile_cadence() -> u64 {
    600
}

fn default_indexer_sync_cadence() -> u64 {
    86400 // daily
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pending_poll_interval_ms: default_pending_poll_interval(),
            check_interval_secs: default_check_interval(),
            prune_interval_secs: default_prune_interval(),
            cancel_timeout_secs: default_cancel_timeout(),
            movie_index_secs: default_index_cadence(),
            movie_reconcile_secs: default_reconcile_cadence(),
            series_index_secs: default_index_cadence(),
            series_reconcile_secs: default_reconcile_cadence(),
            indexer_sync_secs: default_indexer_sync_cadence(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Minimum time between two jobs of `job_type`, `None` when disabled.
    pub fn cadence(&self, job_type: JobType) -> Option<Duration> {
        let secs = match job_type {
            JobType::MovieIndex => self.movie_index_secs,
            JobType::MovieReconcile => self.movie_reconcile_secs,
            JobType::SeriesIndex => self.series_index_secs,
            JobType::SeriesReconcile => self.series_reconcile_secs,
            JobType::IndexerSync => self.indexer_sync_secs,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn pending_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pending_poll_interval_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_secs(self.cancel_timeout_secs)
    }
}

/// Job history pruning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Jobs older than this are deleted (hours). 0 = never prune.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Most recent jobs of each type kept regardless of age.
    #[serde(default = "default_keep_latest")]
    pub keep_latest: usize,
}

fn default_retention_hours() -> u64 {
    168 // one week
}

fn default_keep_latest() -> usize {
    10
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            keep_latest: default_keep_latest(),
        }
    }
}

impl CleanupConfig {
    /// `None` when pruning is disabled.
    pub fn retention(&self) -> Option<chrono::Duration> {
        if self.retention_hours == 0 {
            return None;
        }
        i64::try_from(self.retention_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
    }
}
