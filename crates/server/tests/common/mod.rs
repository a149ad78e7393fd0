//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! over a real job store and a scheduler whose reconciler talks to mock
//! collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use marquee_core::{
    load_config_from_str, testing::ReconcilerHarness, JobExecutor, JobScheduler, JobType,
    SchedulerConfig, SqliteJobStore,
};
use marquee_server::state::AppState;

/// Re-export fixtures for test convenience
pub use marquee_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// The scheduler loops are not running until [`TestFixture::start`] is
/// called, so created jobs stay pending unless a test starts them.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// The scheduler behind the router
    pub scheduler: Arc<JobScheduler>,
    /// Reconciler with mock collaborators
    pub harness: ReconcilerHarness,
    /// Temporary directory for the job database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with reconciler executors.
    pub fn new() -> Self {
        Self::with_executors(Vec::new())
    }

    /// Create a test fixture where `executors` replace the reconciler's
    /// executor for their job type.
    pub fn with_executors(executors: Vec<(JobType, Arc<dyn JobExecutor>)>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = load_config_from_str(&format!(
            r#"
[server]
host = "127.0.0.1"
port = 8080

[database]
path = "{}"

[library]
movie_dir = "/media/movies"
tv_dir = "/media/tv"

[prowlarr]
url = "http://localhost:9696"
api_key = "prowlarr-secret"

[[download_clients]]
id = 0
implementation = "qbittorrent"
protocol = "torrent"
scheme = "http"
host = "localhost"
port = 8080
username = "admin"
password = "hunter2"
"#,
            db_path.display()
        ))
        .expect("Failed to parse test config");

        let scheduler_config = SchedulerConfig {
            pending_poll_interval_ms: 10,
            check_interval_secs: 1,
            movie_index_secs: 0,
            movie_reconcile_secs: 0,
            series_index_secs: 0,
            series_reconcile_secs: 0,
            indexer_sync_secs: 0,
            ..Default::default()
        };

        let job_store =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let harness = ReconcilerHarness::new();
        let scheduler = executors.into_iter().fold(
            JobScheduler::new(scheduler_config, job_store)
                .with_reconciler(harness.reconciler.clone()),
            |scheduler, (job_type, executor)| scheduler.with_executor(job_type, executor),
        );
        let scheduler = Arc::new(scheduler);

        let state = Arc::new(AppState::new(config, scheduler.clone()));
        let router = marquee_server::api::create_router(state);

        Self {
            router,
            scheduler,
            harness,
            temp_dir,
        }
    }

    /// Start the scheduler loops.
    pub fn start(&self) -> JoinHandle<()> {
        tokio::spawn(self.scheduler.clone().run())
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
