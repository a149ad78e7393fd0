//! Types for download client operations.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::DownloadClientConfig;
use crate::searcher::ReleaseCandidate;

/// Errors from download client operations.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Download not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    /// No implementation for the configured client kind.
    #[error("Unsupported download client: {0}")]
    Unsupported(String),
}

/// Progress of one download as reported by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub id: String,
    pub name: String,
    /// Progress from 0.0 to 1.0.
    pub progress: f64,
    /// All payload data is on disk.
    pub done: bool,
    /// Absolute paths of the downloaded files.
    #[serde(default)]
    pub file_paths: Vec<PathBuf>,
}

/// A download client (torrent or usenet).
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Hand a release to the client. Returns the client's download id.
    async fn add(&self, release: &ReleaseCandidate) -> Result<String, DownloadClientError>;

    async fn get(&self, id: &str) -> Result<DownloadStatus, DownloadClientError>;

    /// All downloads owned by this application. Also used as a connectivity check.
    async fn list(&self) -> Result<Vec<DownloadStatus>, DownloadClientError>;
}

/// Builds a client from its stored configuration.
pub trait DownloadClientFactory: Send + Sync {
    fn create(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<Arc<dyn DownloadClient>, DownloadClientError>;
}
