use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::media::{DownloadClientConfig, Protocol};
use crate::metadata::TmdbConfig;
use crate::reconciler::ReconcilerConfig;
use crate::scheduler::SchedulerConfig;
use crate::searcher::ProwlarrConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub library: LibraryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub tmdb: Option<TmdbConfig>,
    #[serde(default)]
    pub prowlarr: Option<ProwlarrConfig>,
    /// Download clients stored at startup when the database has none.
    #[serde(default)]
    pub download_clients: Vec<DownloadClientConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("marquee.db")
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Library locations
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root of the movie library (`<movie_dir>/<Title>/<file>`).
    pub movie_dir: PathBuf,
    /// Root of the TV library (`<tv_dir>/<Title>/Season NN/<file>`).
    pub tv_dir: PathBuf,
    /// Save path handed to download clients. Clients use their own default
    /// when unset.
    #[serde(default)]
    pub download_dir: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub library: LibraryConfig,
    pub scheduler: SchedulerConfig,
    pub reconciler: ReconcilerConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<SanitizedTmdbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prowlarr: Option<SanitizedProwlarrConfig>,
    pub download_clients: Vec<SanitizedDownloadClientConfig>,
}

/// Sanitized TMDB config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTmdbConfig {
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Sanitized Prowlarr config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProwlarrConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

/// Sanitized download client (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloadClientConfig {
    pub implementation: String,
    pub protocol: Protocol,
    pub url: String,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            logging: config.logging.clone(),
            library: config.library.clone(),
            scheduler: config.scheduler.clone(),
            reconciler: config.reconciler.clone(),
            tmdb: config.tmdb.as_ref().map(|t| SanitizedTmdbConfig {
                api_key_configured: !t.api_key.is_empty(),
                base_url: t.base_url.clone(),
            }),
            prowlarr: config.prowlarr.as_ref().map(|p| SanitizedProwlarrConfig {
                url: p.url.clone(),
                api_key_configured: !p.api_key.is_empty(),
                timeout_secs: p.timeout_secs,
            }),
            download_clients: config
                .download_clients
                .iter()
                .map(|c| SanitizedDownloadClientConfig {
                    implementation: c.implementation.clone(),
                    protocol: c.protocol,
                    url: c.base_url(),
                    credentials_configured: c.password.is_some() || c.api_key.is_some(),
                })
                .collect(),
        }
    }
}
