//! Download client abstraction.
//!
//! Each configured download client is built through a [`DownloadClientFactory`]
//! once per reconcile pass.

mod qbittorrent;
mod types;

use std::sync::Arc;

pub use qbittorrent::QBittorrentClient;
pub use types::*;

use crate::media::DownloadClientConfig;

/// Category applied to every download this application adds.
pub const DEFAULT_CATEGORY: &str = "marquee";

/// Factory for the HTTP-backed clients.
#[derive(Debug, Clone)]
pub struct HttpDownloadClientFactory {
    category: String,
    save_path: Option<String>,
}

impl HttpDownloadClientFactory {
    pub fn new(save_path: Option<String>) -> Self {
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            save_path,
        }
    }
}

impl DownloadClientFactory for HttpDownloadClientFactory {
    fn create(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<Arc<dyn DownloadClient>, DownloadClientError> {
        match config.implementation.as_str() {
            "qbittorrent" => Ok(Arc::new(QBittorrentClient::new(
                config,
                self.category.clone(),
                self.save_path.clone(),
            )?)),
            other => Err(DownloadClientError::Unsupported(other.to_string())),
        }
    }
}
