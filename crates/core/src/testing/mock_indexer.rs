//! Mock indexer client for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::media::Indexer;
use crate::searcher::{IndexerClient, ReleaseCandidate, SearchCategory, SearchError};

/// A recorded search call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub indexer_id: i64,
    pub categories: Vec<SearchCategory>,
    pub query: String,
}

/// Mock implementation of the IndexerClient trait.
///
/// Results are configured per indexer and returned for any query. Indexers
/// can be made to fail individually.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockIndexerClient::new();
/// client.add_results(1, vec![fixtures::release("Heat.1995.720p", 3 << 30, Some(40))]).await;
/// client.fail_indexer(2, "connection refused").await;
///
/// let results = search_indexers(&client, &[1, 2], &[SearchCategory::Movies], "Heat").await?;
/// assert_eq!(results.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockIndexerClient {
    results: Arc<RwLock<HashMap<i64, Vec<ReleaseCandidate>>>>,
    failures: Arc<RwLock<HashMap<i64, String>>>,
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
    indexers: Arc<RwLock<Vec<Indexer>>>,
}

impl MockIndexerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append results returned by `indexer_id`.
    pub async fn add_results(&self, indexer_id: i64, releases: Vec<ReleaseCandidate>) {
        self.results
            .write()
            .await
            .entry(indexer_id)
            .or_default()
            .extend(releases);
    }

    /// Make every search on `indexer_id` fail.
    pub async fn fail_indexer(&self, indexer_id: i64, message: &str) {
        self.failures
            .write()
            .await
            .insert(indexer_id, message.to_string());
    }

    /// Indexers returned by `list_indexers`.
    pub async fn set_indexers(&self, indexers: Vec<Indexer>) {
        *self.indexers.write().await = indexers;
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }
}

#[async_trait]
impl IndexerClient for MockIndexerClient {
    async fn search(
        &self,
        indexer_id: i64,
        categories: &[SearchCategory],
        query: &str,
    ) -> Result<Vec<ReleaseCandidate>, SearchError> {
        self.searches.write().await.push(RecordedSearch {
            indexer_id,
            categories: categories.to_vec(),
            query: query.to_string(),
        });

        if let Some(message) = self.failures.read().await.get(&indexer_id) {
            return Err(SearchError::ConnectionFailed(message.clone()));
        }

        Ok(self
            .results
            .read()
            .await
            .get(&indexer_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_indexers(&self) -> Result<Vec<Indexer>, SearchError> {
        Ok(self.indexers.read().await.clone())
    }
}
