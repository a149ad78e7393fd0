//! Job API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use marquee_core::{Job, JobFilter, JobState, JobType, SchedulerError};

use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    /// Job type name, e.g. `movie_reconcile`
    #[serde(rename = "type")]
    pub job_type: String,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by job type
    #[serde(rename = "type")]
    pub job_type: Option<String>,
    /// Filter by state
    pub state: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub limit: i64,
    /// Ids of jobs executing in this process right now.
    pub running: Vec<i64>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<JobErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(JobErrorResponse {
            error: error.to_string(),
        }),
    )
}

impl From<SchedulerError> for JobErrorResponse {
    fn from(err: SchedulerError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

fn scheduler_error(err: SchedulerError) -> ApiError {
    let status = match &err {
        SchedulerError::InvalidJobType(_) => StatusCode::BAD_REQUEST,
        SchedulerError::NotFound(_) => StatusCode::NOT_FOUND,
        SchedulerError::AlreadyPending { .. } => StatusCode::CONFLICT,
        SchedulerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(JobErrorResponse::from(err)))
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a job. A job of the same type already pending is returned as is.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job_type: JobType = body
        .job_type
        .parse()
        .map_err(|e| scheduler_error(SchedulerError::from(e)))?;

    let scheduler = state.scheduler();
    match scheduler.create_pending_job(job_type) {
        Ok(job) => {
            info!(job_id = job.id, job_type = %job_type, "Job requested via API");
            Ok((StatusCode::CREATED, Json(job)))
        }
        Err(SchedulerError::AlreadyPending { job_id }) => {
            let job = scheduler.get_job(job_id).map_err(scheduler_error)?;
            Ok((StatusCode::OK, Json(job)))
        }
        Err(e) => Err(scheduler_error(e)),
    }
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    state
        .scheduler()
        .get_job(id)
        .map(Json)
        .map_err(scheduler_error)
}

/// List jobs, newest first, with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mut filter = JobFilter::new().with_limit(limit);

    if let Some(ref job_type) = params.job_type {
        let job_type: JobType = job_type
            .parse()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_type(job_type);
    }

    if let Some(ref job_state) = params.state {
        let job_state: JobState = job_state
            .parse()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        filter = filter.with_state(job_state);
    }

    let jobs = state
        .scheduler()
        .list_jobs(&filter)
        .map_err(scheduler_error)?;

    Ok(Json(ListJobsResponse {
        jobs,
        limit,
        running: state.scheduler().running_job_ids(),
    }))
}

/// Cancel a job. Returns the job as stored once cancellation settled; a job
/// that ignores cancellation may still be running.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    let scheduler = state.scheduler();
    scheduler.cancel_job(id).await.map_err(scheduler_error)?;
    scheduler.get_job(id).map(Json).map_err(scheduler_error)
}
