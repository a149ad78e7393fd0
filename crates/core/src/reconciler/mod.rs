//! Reconciliation engine.
//!
//! Each reconcile pass builds one [`ReconcileSnapshot`] and runs the
//! per-state sweeps for movies or series concurrently against it. A sweep
//! walks every entity in its state and tries to advance it one step; a
//! failure on one entity is logged and the sweep moves on to the next.
//! Anything left behind is retried on the next pass.

mod aggregate;
mod index;
mod movie;
mod series;
mod snapshot;

pub use aggregate::{determine_season_state, determine_series_state, determine_state, StateCounts};
pub use index::IndexSummary;
pub use series::get_season_runtime;
pub use snapshot::{ReconcileSnapshot, SnapshotClient};

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::download_client::{DownloadClientError, DownloadClientFactory};
use crate::library::{Library, LibraryError};
use crate::media::{EntityKind, MediaStore, StorageError};
use crate::metadata::{MetadataError, MetadataProvider};
use crate::metrics::{RECONCILE_FAILURES, RELEASES_REJECTED, SEARCH_RESULTS};
use crate::release::{sort_by_seeders, Rejection};
use crate::searcher::{search_indexers, IndexerClient, ReleaseCandidate, SearchCategory, SearchError};

/// Errors from reconciling a single entity or building a pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("search error: {0}")]
    Search(#[from] SearchError),

    #[error("download client error: {0}")]
    DownloadClient(#[from] DownloadClientError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    /// A link or value the step depends on is absent.
    #[error("missing data: {0}")]
    MissingData(String),

    #[error("reconcile pass cancelled")]
    Cancelled,
}

/// Search categories used for each media kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_movie_categories")]
    pub movie_categories: Vec<SearchCategory>,
    #[serde(default = "default_tv_categories")]
    pub tv_categories: Vec<SearchCategory>,
}

fn default_movie_categories() -> Vec<SearchCategory> {
    vec![SearchCategory::Movies]
}

fn default_tv_categories() -> Vec<SearchCategory> {
    vec![SearchCategory::Tv]
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            movie_categories: default_movie_categories(),
            tv_categories: default_tv_categories(),
        }
    }
}

/// Drives movies, series, seasons and episodes through their lifecycles.
pub struct Reconciler {
    store: Arc<dyn MediaStore>,
    indexers: Arc<dyn IndexerClient>,
    download_clients: Arc<dyn DownloadClientFactory>,
    metadata: Arc<dyn MetadataProvider>,
    library: Arc<dyn Library>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn MediaStore>,
        indexers: Arc<dyn IndexerClient>,
        download_clients: Arc<dyn DownloadClientFactory>,
        metadata: Arc<dyn MetadataProvider>,
        library: Arc<dyn Library>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            indexers,
            download_clients,
            metadata,
            library,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn MediaStore> {
        &self.store
    }

    /// Build the snapshot for one pass.
    ///
    /// A download client whose configuration cannot be turned into a client
    /// is logged and left out of the snapshot; its downloads are skipped for
    /// this pass.
    pub fn build_snapshot(&self) -> Result<Arc<ReconcileSnapshot>, ReconcileError> {
        let mut clients = Vec::new();
        for config in self.store.list_download_clients()? {
            match self.download_clients.create(&config) {
                Ok(client) => clients.push(SnapshotClient { config, client }),
                Err(e) => warn!(
                    download_client_id = config.id,
                    implementation = %config.implementation,
                    error = %e,
                    "Skipping download client"
                ),
            }
        }

        let indexers = self.store.list_indexers()?;
        let snapshot = ReconcileSnapshot::new(Utc::now(), clients, indexers);

        debug!(
            download_clients = snapshot.download_clients().len(),
            indexers = snapshot.indexer_ids().len(),
            "Built reconcile snapshot"
        );

        Ok(Arc::new(snapshot))
    }

    /// Search every snapshot indexer and return the releases sorted
    /// ascending by seeders.
    async fn search_releases(
        &self,
        snapshot: &ReconcileSnapshot,
        categories: &[SearchCategory],
        query: &str,
        kind: &str,
    ) -> Result<Vec<ReleaseCandidate>, ReconcileError> {
        let mut releases =
            search_indexers(self.indexers.as_ref(), snapshot.indexer_ids(), categories, query)
                .await?;
        SEARCH_RESULTS
            .with_label_values(&[kind])
            .observe(releases.len() as f64);
        sort_by_seeders(&mut releases);
        Ok(releases)
    }
}

fn record_rejection(release: &ReleaseCandidate, reason: Rejection) {
    RELEASES_REJECTED.with_label_values(&[reason.as_str()]).inc();
    debug!(release = %release.title, reason = %reason, "Rejected release");
}

fn record_failure(kind: EntityKind, id: i64, error: &ReconcileError) {
    RECONCILE_FAILURES.with_label_values(&[kind.as_str()]).inc();
    warn!(entity = kind.as_str(), entity_id = id, error = %error, "Reconcile step failed");
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), ReconcileError> {
    if cancel.is_cancelled() {
        return Err(ReconcileError::Cancelled);
    }
    Ok(())
}

/// Collapse the results of concurrently joined sweeps into the first error.
fn first_error(
    results: impl IntoIterator<Item = Result<(), ReconcileError>>,
) -> Result<(), ReconcileError> {
    results.into_iter().collect()
}
