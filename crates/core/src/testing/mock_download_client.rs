//! Mock download client and factory for testing.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::download_client::{
    DownloadClient, DownloadClientError, DownloadClientFactory, DownloadStatus,
};
use crate::media::DownloadClientConfig;
use crate::searcher::ReleaseCandidate;

/// Mock implementation of the DownloadClient trait.
///
/// Provides controllable behavior for testing:
/// - Track added releases for assertions
/// - Control download progress and file lists
/// - Simulate failures
///
/// # Example
///
/// ```rust,ignore
/// let client = MockDownloadClient::new();
/// let id = client.add(&release).await?;
///
/// client.set_progress(&id, 0.5, vec![]).await;
/// client.complete(&id, vec![PathBuf::from("/downloads/movie.mkv")]).await;
///
/// assert!(client.get(&id).await?.done);
/// ```
#[derive(Debug, Default)]
pub struct MockDownloadClient {
    added: Arc<RwLock<Vec<ReleaseCandidate>>>,
    downloads: Arc<RwLock<HashMap<String, DownloadStatus>>>,
    get_calls: Arc<RwLock<Vec<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<DownloadClientError>>>,
    id_counter: Arc<RwLock<u32>>,
}

impl MockDownloadClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases handed to `add`, in order.
    pub async fn added(&self) -> Vec<ReleaseCandidate> {
        self.added.read().await.clone()
    }

    /// Download ids passed to `get`, in order.
    pub async fn get_calls(&self) -> Vec<String> {
        self.get_calls.read().await.clone()
    }

    /// Set progress and files of a download, creating it if needed. A
    /// progress of 1.0 or more marks it done.
    pub async fn set_progress(&self, id: &str, progress: f64, file_paths: Vec<PathBuf>) {
        let progress = progress.clamp(0.0, 1.0);
        let mut downloads = self.downloads.write().await;
        let status = downloads
            .entry(id.to_string())
            .or_insert_with(|| DownloadStatus {
                id: id.to_string(),
                name: id.to_string(),
                progress: 0.0,
                done: false,
                file_paths: Vec::new(),
            });
        status.progress = progress;
        status.done = progress >= 1.0;
        status.file_paths = file_paths;
    }

    /// Mark a download finished with the given files.
    pub async fn complete(&self, id: &str, file_paths: Vec<PathBuf>) {
        self.set_progress(id, 1.0, file_paths).await;
    }

    /// Make the next operation fail with a connection error.
    pub async fn fail_next(&self, message: &str) {
        *self.next_error.write().await =
            Some(DownloadClientError::ConnectionFailed(message.to_string()));
    }

    async fn take_error(&self) -> Result<(), DownloadClientError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn add(&self, release: &ReleaseCandidate) -> Result<String, DownloadClientError> {
        self.take_error().await?;

        let id = {
            let mut counter = self.id_counter.write().await;
            *counter += 1;
            format!("mock-{}", *counter)
        };

        self.downloads.write().await.insert(
            id.clone(),
            DownloadStatus {
                id: id.clone(),
                name: release.title.clone(),
                progress: 0.0,
                done: false,
                file_paths: Vec::new(),
            },
        );
        self.added.write().await.push(release.clone());
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<DownloadStatus, DownloadClientError> {
        self.get_calls.write().await.push(id.to_string());
        self.take_error().await?;

        self.downloads
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DownloadClientError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<DownloadStatus>, DownloadClientError> {
        self.take_error().await?;
        Ok(self.downloads.read().await.values().cloned().collect())
    }
}

/// Factory handing out one shared [`MockDownloadClient`] for every
/// configuration, except for rejected implementations.
#[derive(Debug, Default)]
pub struct MockDownloadClientFactory {
    client: Arc<MockDownloadClient>,
    rejected: StdRwLock<HashSet<String>>,
}

impl MockDownloadClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The client returned by `create`.
    pub fn client(&self) -> Arc<MockDownloadClient> {
        self.client.clone()
    }

    /// Make `create` fail with `Unsupported` for this implementation.
    pub fn reject_implementation(&self, implementation: &str) {
        if let Ok(mut rejected) = self.rejected.write() {
            rejected.insert(implementation.to_string());
        }
    }
}

impl DownloadClientFactory for MockDownloadClientFactory {
    fn create(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<Arc<dyn DownloadClient>, DownloadClientError> {
        let rejected = self
            .rejected
            .read()
            .map(|r| r.contains(&config.implementation))
            .unwrap_or(false);
        if rejected {
            return Err(DownloadClientError::Unsupported(config.implementation.clone()));
        }
        Ok(self.client.clone())
    }
}
