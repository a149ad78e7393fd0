//! Job API tests over an in-process router.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use marquee_core::{executor_fn, JobType};

use common::TestFixture;

/// Poll `GET /api/v1/jobs/{id}` until the job reaches `state`.
async fn wait_for_state(fixture: &TestFixture, id: i64, state: &str) -> bool {
    for _ in 0..500 {
        let response = fixture.get(&format!("/api/v1/jobs/{}", id)).await;
        if response.body["state"] == state {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_endpoint_hides_secrets() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);

    assert_eq!(response.body["server"]["port"], 8080);
    assert_eq!(response.body["prowlarr"]["api_key_configured"], true);
    assert_eq!(
        response.body["download_clients"][0]["url"],
        "http://localhost:8080"
    );
    assert_eq!(
        response.body["download_clients"][0]["credentials_configured"],
        true
    );
    assert!(!response.text.contains("prowlarr-secret"));
    assert!(!response.text.contains("hunter2"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("marquee_http_requests_total"));
    assert!(response.text.contains("marquee_jobs_by_state"));
}

// =============================================================================
// Job Creation
// =============================================================================

#[tokio::test]
async fn test_create_job() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/jobs", json!({ "type": "movie_reconcile" }))
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert!(response.body["id"].is_i64());
    assert_eq!(response.body["type"], "movie_reconcile");
    assert_eq!(response.body["state"], "pending");
    assert!(response.body.get("error").is_none());
}

#[tokio::test]
async fn test_create_duplicate_job_returns_pending_one() {
    let fixture = TestFixture::new();

    let first = fixture
        .post("/api/v1/jobs", json!({ "type": "indexer_sync" }))
        .await;
    assert_status!(first, StatusCode::CREATED);

    let second = fixture
        .post("/api/v1/jobs", json!({ "type": "indexer_sync" }))
        .await;
    assert_status!(second, StatusCode::OK);
    assert_eq!(second.body["id"], first.body["id"]);

    // A different type is independent.
    let other = fixture
        .post("/api/v1/jobs", json!({ "type": "series_index" }))
        .await;
    assert_status!(other, StatusCode::CREATED);
    assert_ne!(other.body["id"], first.body["id"]);
}

#[tokio::test]
async fn test_create_job_invalid_type() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/jobs", json!({ "type": "defragment_disk" }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("defragment_disk"));
}

// =============================================================================
// Job Queries
// =============================================================================

#[tokio::test]
async fn test_get_job_not_found() {
    let fixture = TestFixture::new();
    let response = fixture.get("/api/v1/jobs/4242").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_list_jobs_with_filters() {
    let fixture = TestFixture::new();
    for job_type in ["movie_index", "movie_reconcile", "series_index"] {
        let response = fixture.post("/api/v1/jobs", json!({ "type": job_type })).await;
        assert_status!(response, StatusCode::CREATED);
    }

    let all = fixture.get("/api/v1/jobs").await;
    assert_status!(all, StatusCode::OK);
    let jobs = all.body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 3);
    // Newest first
    assert_eq!(jobs[0]["type"], "series_index");

    let by_type = fixture.get("/api/v1/jobs?type=movie_index").await;
    assert_eq!(by_type.body["jobs"].as_array().unwrap().len(), 1);

    let by_state = fixture.get("/api/v1/jobs?state=done").await;
    assert!(by_state.body["jobs"].as_array().unwrap().is_empty());

    let limited = fixture.get("/api/v1/jobs?limit=2").await;
    assert_eq!(limited.body["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(limited.body["limit"], 2);
}

#[tokio::test]
async fn test_list_jobs_invalid_filter() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/jobs?state=sleeping").await;
    assert_status!(response, StatusCode::BAD_REQUEST);

    let response = fixture.get("/api/v1/jobs?type=nope").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Execution and Cancellation
// =============================================================================

#[tokio::test]
async fn test_created_job_runs_to_done() {
    let fixture = TestFixture::new();
    fixture
        .harness
        .indexers
        .set_indexers(vec![common::fixtures::indexer(7)])
        .await;
    let handle = fixture.start();

    let response = fixture
        .post("/api/v1/jobs", json!({ "type": "indexer_sync" }))
        .await;
    let id = response.body["id"].as_i64().unwrap();

    assert!(wait_for_state(&fixture, id, "done").await);

    fixture.scheduler.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let fixture = TestFixture::with_executors(vec![(
        JobType::MovieIndex,
        executor_fn(|_| async { Err::<(), _>(anyhow::anyhow!("library offline")) }),
    )]);
    let handle = fixture.start();

    let response = fixture
        .post("/api/v1/jobs", json!({ "type": "movie_index" }))
        .await;
    let id = response.body["id"].as_i64().unwrap();

    assert!(wait_for_state(&fixture, id, "error").await);
    let job = fixture.get(&format!("/api/v1/jobs/{}", id)).await;
    assert_eq!(job.body["error"], "library offline");

    fixture.scheduler.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_cancel_pending_job() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/api/v1/jobs", json!({ "type": "series_reconcile" }))
        .await;
    let id = response.body["id"].as_i64().unwrap();

    let cancelled = fixture
        .post_empty(&format!("/api/v1/jobs/{}/cancel", id))
        .await;
    assert_status!(cancelled, StatusCode::OK);
    assert_eq!(cancelled.body["state"], "cancelled");

    // Cancelling again is a no-op.
    let again = fixture
        .post_empty(&format!("/api/v1/jobs/{}/cancel", id))
        .await;
    assert_status!(again, StatusCode::OK);
    assert_eq!(again.body["state"], "cancelled");
}

#[tokio::test]
async fn test_cancel_running_job() {
    let fixture = TestFixture::with_executors(vec![(
        JobType::SeriesIndex,
        executor_fn(|cancel| async move {
            cancel.cancelled().await;
            anyhow::Ok(())
        }),
    )]);
    let handle = fixture.start();

    let response = fixture
        .post("/api/v1/jobs", json!({ "type": "series_index" }))
        .await;
    let id = response.body["id"].as_i64().unwrap();
    assert!(wait_for_state(&fixture, id, "running").await);
    for _ in 0..500 {
        if fixture.scheduler.running_job_ids() == vec![id] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let listed = fixture.get("/api/v1/jobs?state=running").await;
    assert_eq!(listed.body["running"], json!([id]));

    let cancelled = fixture
        .post_empty(&format!("/api/v1/jobs/{}/cancel", id))
        .await;
    assert_status!(cancelled, StatusCode::OK);
    assert_eq!(cancelled.body["state"], "cancelled");

    fixture.scheduler.shutdown();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let fixture = TestFixture::new();
    let response = fixture.post_empty("/api/v1/jobs/999/cancel").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}
