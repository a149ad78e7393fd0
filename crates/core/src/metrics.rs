//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job scheduler (executions, durations, pruning)
//! - Reconciler (releases rejected, downloads requested, state transitions)
//! - Indexer search

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Jobs executed by type and outcome.
pub static JOBS_EXECUTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("marquee_jobs_executed_total", "Total jobs executed"),
        &["type", "outcome"], // outcome: "done", "error", "cancelled"
    )
    .unwrap()
});

/// Job execution duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "marquee_job_duration_seconds",
            "Duration of job execution",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0]),
        &["type"],
    )
    .unwrap()
});

/// Jobs deleted by the history pruner.
pub static JOBS_PRUNED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("marquee_jobs_pruned_total", "Total jobs pruned from history").unwrap()
});

// =============================================================================
// Reconciler Metrics
// =============================================================================

/// Releases rejected during selection, by reason.
pub static RELEASES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "marquee_releases_rejected_total",
            "Total releases rejected during selection",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Downloads handed to a download client, by media kind.
pub static DOWNLOADS_REQUESTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "marquee_downloads_requested_total",
            "Total downloads requested",
        ),
        &["kind"], // "movie", "season_pack", "episode"
    )
    .unwrap()
});

/// Entity state transitions written by the reconciler.
pub static STATE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "marquee_state_transitions_total",
            "Total entity state transitions",
        ),
        &["entity", "to_state"],
    )
    .unwrap()
});

/// Per-entity reconcile failures (logged and skipped).
pub static RECONCILE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "marquee_reconcile_failures_total",
            "Total per-entity reconcile failures",
        ),
        &["entity"],
    )
    .unwrap()
});

// =============================================================================
// Search Metrics
// =============================================================================

/// Search results returned across indexers per query.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "marquee_search_results",
            "Number of search results returned per query",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(JOBS_EXECUTED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(JOBS_PRUNED.clone()),
        // Reconciler
        Box::new(RELEASES_REJECTED.clone()),
        Box::new(DOWNLOADS_REQUESTED.clone()),
        Box::new(STATE_TRANSITIONS.clone()),
        Box::new(RECONCILE_FAILURES.clone()),
        // Search
        Box::new(SEARCH_RESULTS.clone()),
    ]
}

/// Register every core metric with `registry`.
pub fn register_metrics(registry: &prometheus::Registry) -> prometheus::Result<()> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_once() {
        let registry = prometheus::Registry::new();
        register_metrics(&registry).unwrap();

        JOBS_EXECUTED.with_label_values(&["movie_index", "done"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "marquee_jobs_executed_total"));

        // A second registration of the same collectors is refused.
        assert!(register_metrics(&registry).is_err());
    }
}
