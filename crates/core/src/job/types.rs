//! Job types and state definitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::JobStoreError;

/// Kind of recurring work the scheduler knows how to run.
///
/// The set is closed: job types arriving as strings (API, database rows)
/// are validated through [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Scan the movie library for files not yet tracked.
    MovieIndex,
    /// Advance movies through their state machine.
    MovieReconcile,
    /// Scan the TV library for episode files not yet tracked.
    SeriesIndex,
    /// Advance series, seasons and episodes through their state machines.
    SeriesReconcile,
    /// Refresh the indexer list from the indexer manager.
    IndexerSync,
}

impl JobType {
    /// Every job type, in scheduling order.
    pub const ALL: [JobType; 5] = [
        JobType::MovieIndex,
        JobType::MovieReconcile,
        JobType::SeriesIndex,
        JobType::SeriesReconcile,
        JobType::IndexerSync,
    ];

    /// Returns the string representation used in storage and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::MovieIndex => "movie_index",
            JobType::MovieReconcile => "movie_reconcile",
            JobType::SeriesIndex => "series_index",
            JobType::SeriesReconcile => "series_reconcile",
            JobType::IndexerSync => "indexer_sync",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = JobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| JobStoreError::InvalidJobType(s.to_string()))
    }
}

/// Lifecycle state of a job. The current state is the most recent transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Error,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Error => "error",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Pending or running jobs block scheduling of another job of the same type.
    pub fn is_active(&self) -> bool {
        matches!(self, JobState::Pending | JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = JobStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "done" => Ok(JobState::Done),
            "error" => Ok(JobState::Error),
            "cancelled" => Ok(JobState::Cancelled),
            other => Err(JobStoreError::InvalidJobState(other.to_string())),
        }
    }
}

/// A scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Error message captured from the executor, if the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One row of a job's append-only state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTransition {
    pub job_id: i64,
    pub to_state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
