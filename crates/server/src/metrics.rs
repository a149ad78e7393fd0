//! Prometheus metrics for observability.
//!
//! HTTP request metrics live here; scheduler and reconciler metrics come
//! from `marquee_core::metrics` and are registered in the same registry.
//! Job counts per state are collected when `/metrics` is scraped.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use tracing::error;

use marquee_core::{JobFilter, JobState};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "marquee_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "marquee_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics (collected dynamically)
// =============================================================================

/// Stored jobs by state, counted from the most recent history.
pub static JOBS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("marquee_jobs_by_state", "Recent job count by state"),
        &["state"],
    )
    .unwrap()
});

/// Jobs whose executor is running in this process.
pub static JOBS_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "marquee_jobs_running",
        "Number of jobs currently executing",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Scheduler
    registry.register(Box::new(JOBS_BY_STATE.clone())).unwrap();
    registry.register(Box::new(JOBS_RUNNING.clone())).unwrap();

    // Core metrics (scheduler, reconciler, search)
    marquee_core::metrics::register_metrics(registry).unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Refresh gauges from the scheduler before a scrape.
///
/// Counts cover at most the last 1000 jobs of each state.
pub fn collect_dynamic_metrics(state: &AppState) {
    let scheduler = state.scheduler();
    JOBS_RUNNING.set(scheduler.running_job_ids().len() as i64);

    for job_state in [
        JobState::Pending,
        JobState::Running,
        JobState::Done,
        JobState::Error,
        JobState::Cancelled,
    ] {
        let filter = JobFilter::new().with_state(job_state).with_limit(1000);
        if let Ok(jobs) = scheduler.list_jobs(&filter) {
            JOBS_BY_STATE
                .with_label_values(&[job_state.as_str()])
                .set(jobs.len() as i64);
        }
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());

    // Run twice: adjacent ids share the separating slash.
    let result = NUMERIC.replace_all(path, "/{id}$1");
    NUMERIC.replace_all(&result, "/{id}$1").to_string()
}
