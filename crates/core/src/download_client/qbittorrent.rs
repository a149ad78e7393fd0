//! qBittorrent download client implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{DownloadClient, DownloadClientError, DownloadStatus};
use crate::media::DownloadClientConfig;
use crate::searcher::ReleaseCandidate;

/// Attempts to find a torrent added from a .torrent URL, which qBittorrent
/// resolves asynchronously.
const LOOKUP_ATTEMPTS: u32 = 5;
const LOOKUP_DELAY: Duration = Duration::from_millis(500);

/// qBittorrent Web API client.
pub struct QBittorrentClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    category: String,
    save_path: Option<String>,
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(
        config: &DownloadClientConfig,
        category: impl Into<String>,
        save_path: Option<String>,
    ) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .cookie_store(true)
            .build()
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            category: category.into(),
            save_path,
            session: Arc::new(RwLock::new(false)),
        })
    }

    async fn login(&self) -> Result<(), DownloadClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url);

        let params = [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            // Session cookie is stored by the cookie jar
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(DownloadClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DownloadClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), DownloadClientError> {
        if *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send a request, logging in again once if the session has expired.
    async fn send(
        &self,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<String, DownloadClientError> {
        self.ensure_authenticated().await?;

        let mut response = build(&self.client)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;

            response = build(&self.client)
                .send()
                .await
                .map_err(map_request_error)?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadClientError::ApiError(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<T, DownloadClientError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let body = self.send(|client| client.get(&url)).await?;
        serde_json::from_str(&body).map_err(|e| {
            DownloadClientError::ApiError(format!("Failed to parse response: {}", e))
        })
    }

    async fn torrents(&self, query: &str) -> Result<Vec<QBTorrentInfo>, DownloadClientError> {
        self.get_json(&format!("/api/v2/torrents/info?{}", query))
            .await
    }

    /// Newest torrent in our category, used when the hash is not known upfront.
    async fn newest_in_category(&self) -> Result<Option<String>, DownloadClientError> {
        let query = format!(
            "category={}&sort=added_on&reverse=true&limit=1",
            urlencoding::encode(&self.category)
        );
        Ok(self
            .torrents(&query)
            .await?
            .into_iter()
            .next()
            .map(|t| t.hash.to_lowercase()))
    }
}

fn map_request_error(e: reqwest::Error) -> DownloadClientError {
    if e.is_timeout() {
        DownloadClientError::Timeout
    } else if e.is_connect() {
        DownloadClientError::ConnectionFailed(e.to_string())
    } else {
        DownloadClientError::ApiError(e.to_string())
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn add(&self, release: &ReleaseCandidate) -> Result<String, DownloadClientError> {
        let url = format!("{}/api/v2/torrents/add", self.base_url);
        let before = match extract_hash_from_magnet(&release.download_url) {
            Some(_) => None,
            None => self.newest_in_category().await?,
        };

        let mut params = vec![
            ("urls", release.download_url.clone()),
            ("category", self.category.clone()),
        ];
        if let Some(path) = &self.save_path {
            params.push(("savepath", path.clone()));
        }

        let body = self.send(|client| client.post(&url).form(&params)).await?;
        if body.contains("Fails.") {
            return Err(DownloadClientError::ApiError(format!(
                "qBittorrent rejected {}",
                release.title
            )));
        }

        if let Some(hash) = extract_hash_from_magnet(&release.download_url) {
            return Ok(hash);
        }

        for _ in 0..LOOKUP_ATTEMPTS {
            if let Some(hash) = self.newest_in_category().await? {
                if Some(&hash) != before.as_ref() {
                    return Ok(hash);
                }
            }
            tokio::time::sleep(LOOKUP_DELAY).await;
        }

        Err(DownloadClientError::NotFound(format!(
            "torrent for {} did not appear after adding",
            release.title
        )))
    }

    async fn get(&self, id: &str) -> Result<DownloadStatus, DownloadClientError> {
        let hash = id.to_lowercase();
        let info = self
            .torrents(&format!("hashes={}", hash))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DownloadClientError::NotFound(id.to_string()))?;

        let files: Vec<QBFile> = self
            .get_json(&format!("/api/v2/torrents/files?hash={}", hash))
            .await?;

        let save_path = PathBuf::from(&info.save_path);
        let mut status = info.into_status();
        status.file_paths = files.into_iter().map(|f| save_path.join(f.name)).collect();
        Ok(status)
    }

    async fn list(&self) -> Result<Vec<DownloadStatus>, DownloadClientError> {
        let query = format!("category={}", urlencoding::encode(&self.category));
        Ok(self
            .torrents(&query)
            .await?
            .into_iter()
            .map(QBTorrentInfo::into_status)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    #[serde(default)]
    save_path: String,
}

impl QBTorrentInfo {
    fn into_status(self) -> DownloadStatus {
        DownloadStatus {
            done: self.progress >= 1.0 || is_seeding_state(&self.state),
            id: self.hash.to_lowercase(),
            name: self.name,
            progress: self.progress,
            file_paths: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QBFile {
    name: String,
}

/// States in which qBittorrent has the complete payload.
fn is_seeding_state(state: &str) -> bool {
    matches!(
        state,
        "uploading" | "forcedUP" | "stalledUP" | "pausedUP" | "stoppedUP" | "queuedUP" | "checkingUP"
    )
}

/// Extract the info hash from a magnet URI.
fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (scheme, query) = magnet.split_once('?')?;
    if scheme != "magnet:" {
        return None;
    }

    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .map(|hash| hash.to_lowercase())
}
