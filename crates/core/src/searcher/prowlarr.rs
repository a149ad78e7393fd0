//! Prowlarr indexer-manager client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{IndexerClient, ReleaseCandidate, SearchCategory, SearchError};
use crate::media::{Indexer, Protocol};

/// Prowlarr connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProwlarrConfig {
    /// Base URL, e.g. `http://localhost:9696`.
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

fn default_timeout_secs() -> u32 {
    30
}

pub struct ProwlarrClient {
    client: Client,
    config: ProwlarrConfig,
}

impl ProwlarrClient {
    pub fn new(config: ProwlarrConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| SearchError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn build_search_url(&self, indexer_id: i64, categories: &[SearchCategory], query: &str) -> String {
        let mut url = format!(
            "{}/api/v1/search?query={}&indexerIds={}&type=search",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(query),
            indexer_id
        );

        for category in categories {
            url.push_str(&format!("&categories={}", category.newznab_id()));
        }

        url
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SearchError> {
        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::ApiError(format!("Failed to parse response: {}", e)))
    }
}

fn map_request_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else if e.is_connect() {
        SearchError::ConnectionFailed(e.to_string())
    } else {
        SearchError::ApiError(e.to_string())
    }
}

fn parse_protocol(raw: &str) -> Option<Protocol> {
    match raw.to_ascii_lowercase().as_str() {
        "torrent" => Some(Protocol::Torrent),
        "usenet" => Some(Protocol::Usenet),
        _ => None,
    }
}

#[async_trait]
impl IndexerClient for ProwlarrClient {
    async fn search(
        &self,
        indexer_id: i64,
        categories: &[SearchCategory],
        query: &str,
    ) -> Result<Vec<ReleaseCandidate>, SearchError> {
        let url = self.build_search_url(indexer_id, categories, query);
        debug!(indexer_id, query = %query, "Searching Prowlarr");

        let releases: Vec<ProwlarrRelease> = self.get(&url).await?;

        debug!(indexer_id, results = releases.len(), "Prowlarr search complete");

        Ok(releases
            .into_iter()
            .filter_map(|r| r.into_candidate(indexer_id))
            .collect())
    }

    async fn list_indexers(&self) -> Result<Vec<Indexer>, SearchError> {
        let url = format!("{}/api/v1/indexer", self.config.url.trim_end_matches('/'));
        let indexers: Vec<ProwlarrIndexer> = self.get(&url).await?;

        Ok(indexers
            .into_iter()
            .filter_map(|i| {
                Some(Indexer {
                    id: i.id,
                    name: i.name,
                    protocol: parse_protocol(&i.protocol)?,
                    priority: i.priority,
                    enabled: i.enable,
                })
            })
            .collect())
    }
}

// Prowlarr API response structures

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProwlarrRelease {
    title: String,
    #[serde(default)]
    size: i64,
    seeders: Option<i64>,
    protocol: String,
    download_url: Option<String>,
    magnet_url: Option<String>,
    guid: Option<String>,
}

impl ProwlarrRelease {
    /// Releases without a usable link or with an unknown protocol are dropped.
    fn into_candidate(self, indexer_id: i64) -> Option<ReleaseCandidate> {
        let protocol = parse_protocol(&self.protocol)?;
        let download_url = self.magnet_url.or(self.download_url)?;
        Some(ReleaseCandidate {
            title: self.title,
            size_bytes: self.size.max(0) as u64,
            seeders: self.seeders.map(|s| s.max(0) as u32),
            protocol,
            download_url,
            indexer_id,
            guid: self.guid,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProwlarrIndexer {
    id: i64,
    name: String,
    protocol: String,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    enable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ProwlarrClient {
        ProwlarrClient::new(ProwlarrConfig {
            url: "http://localhost:9696/".to_string(),
            api_key: "key".to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_search_url() {
        let url = client().build_search_url(
            7,
            &[SearchCategory::Tv],
            "Breaking Bad S01",
        );
        assert_eq!(
            url,
            "http://localhost:9696/api/v1/search?query=Breaking%20Bad%20S01&indexerIds=7&type=search&categories=5000"
        );
    }

    #[test]
    fn test_release_conversion_prefers_magnet() {
        let json = r#"[{
            "title": "The.Matrix.1999.1080p",
            "size": 8589934592,
            "seeders": 120,
            "protocol": "torrent",
            "downloadUrl": "http://localhost:9696/1/download",
            "magnetUrl": "magnet:?xt=urn:btih:abc",
            "guid": "g1"
        }, {
            "title": "The.Matrix.1999.720p",
            "size": 4294967296,
            "protocol": "usenet",
            "downloadUrl": "http://localhost:9696/2/download"
        }, {
            "title": "Broken",
            "protocol": "torrent"
        }]"#;

        let releases: Vec<ProwlarrRelease> = serde_json::from_str(json).unwrap();
        let candidates: Vec<_> = releases
            .into_iter()
            .filter_map(|r| r.into_candidate(3))
            .collect();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].download_url, "magnet:?xt=urn:btih:abc");
        assert_eq!(candidates[0].seeders, Some(120));
        assert_eq!(candidates[1].protocol, Protocol::Usenet);
        assert_eq!(candidates[1].seeders, None);
        assert_eq!(candidates[1].indexer_id, 3);
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!(parse_protocol("Torrent"), Some(Protocol::Torrent));
        assert_eq!(parse_protocol("usenet"), Some(Protocol::Usenet));
        assert_eq!(parse_protocol("unknown"), None);
    }
}
