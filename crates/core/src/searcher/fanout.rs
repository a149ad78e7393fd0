//! Concurrent search across several indexers.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{IndexerClient, ReleaseCandidate, SearchCategory, SearchError};

/// Search every indexer in `indexer_ids` concurrently and concatenate the
/// results.
///
/// Individual indexer failures are logged and tolerated. An error is returned
/// only when nothing was found and at least one indexer failed.
pub async fn search_indexers(
    client: &dyn IndexerClient,
    indexer_ids: &[i64],
    categories: &[SearchCategory],
    query: &str,
) -> Result<Vec<ReleaseCandidate>, SearchError> {
    debug!(indexers = ?indexer_ids, query = %query, "Starting parallel search");

    let search_futures = indexer_ids.iter().map(|&indexer_id| async move {
        let result = client.search(indexer_id, categories, query).await;
        (indexer_id, result)
    });

    let results = futures::future::join_all(search_futures).await;

    let mut releases = Vec::new();
    let mut indexer_errors: HashMap<i64, String> = HashMap::new();

    for (indexer_id, result) in results {
        match result {
            Ok(mut found) => releases.append(&mut found),
            Err(e) => {
                warn!(indexer_id, error = %e, "Indexer search failed");
                indexer_errors.insert(indexer_id, e.to_string());
            }
        }
    }

    if releases.is_empty() && !indexer_errors.is_empty() {
        return Err(SearchError::AllIndexersFailed(indexer_errors));
    }

    debug!(
        query = %query,
        results = releases.len(),
        failed = indexer_errors.len(),
        "Search complete"
    );

    Ok(releases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Protocol;
    use crate::testing::MockIndexerClient;

    fn release(title: &str, indexer_id: i64) -> ReleaseCandidate {
        ReleaseCandidate {
            title: title.to_string(),
            size_bytes: 1024,
            seeders: Some(5),
            protocol: Protocol::Torrent,
            download_url: format!("magnet:?xt=urn:btih:{}", indexer_id),
            indexer_id,
            guid: None,
        }
    }

    #[tokio::test]
    async fn test_results_are_concatenated() {
        let client = MockIndexerClient::new();
        client.add_results(1, vec![release("A", 1)]).await;
        client.add_results(2, vec![release("B", 2), release("C", 2)]).await;

        let results = search_indexers(&client, &[1, 2], &[SearchCategory::Movies], "q")
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(client.recorded_searches().await.len(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let client = MockIndexerClient::new();
        client.add_results(1, vec![release("A", 1)]).await;
        client.fail_indexer(2, "connection refused").await;

        let results = search_indexers(&client, &[1, 2], &[SearchCategory::Tv], "q")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_all_failed_without_results() {
        let client = MockIndexerClient::new();
        client.fail_indexer(1, "timeout").await;
        client.fail_indexer(2, "connection refused").await;

        let err = search_indexers(&client, &[1, 2], &[SearchCategory::Tv], "q")
            .await
            .unwrap_err();
        match err {
            SearchError::AllIndexersFailed(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_results_without_failures_is_ok() {
        let client = MockIndexerClient::new();

        let results = search_indexers(&client, &[1], &[SearchCategory::Movies], "q")
            .await
            .unwrap();
        assert!(results.is_empty());

        let none = search_indexers(&client, &[], &[SearchCategory::Movies], "q")
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
