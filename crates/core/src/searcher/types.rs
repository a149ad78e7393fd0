//! Types for release search.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::{Indexer, Protocol};

/// Content category for filtering search results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchCategory {
    Movies,
    Tv,
}

impl SearchCategory {
    /// Top-level Newznab category code.
    pub fn newznab_id(&self) -> u32 {
        match self {
            SearchCategory::Movies => 2000,
            SearchCategory::Tv => 5000,
        }
    }
}

/// A release returned by an indexer. Never persisted; consumed within one
/// reconcile pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    pub title: String,
    pub size_bytes: u64,
    /// `None` when the indexer does not report seeders (e.g. usenet).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    pub protocol: Protocol,
    /// Magnet URI or .torrent/.nzb URL handed to the download client.
    pub download_url: String,
    pub indexer_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
}

/// Errors that can occur during search operations.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search backend connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Search backend API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    /// Every indexer failed and none returned results (indexer id -> error).
    #[error("All indexers failed")]
    AllIndexersFailed(HashMap<i64, String>),
}

/// Client for an indexer manager that proxies searches to its indexers.
#[async_trait]
pub trait IndexerClient: Send + Sync {
    /// Search a single indexer.
    async fn search(
        &self,
        indexer_id: i64,
        categories: &[SearchCategory],
        query: &str,
    ) -> Result<Vec<ReleaseCandidate>, SearchError>;

    /// All indexers known to the manager.
    async fn list_indexers(&self) -> Result<Vec<Indexer>, SearchError>;
}
