//! Metadata provider seam: titles, runtimes, release and air dates.

mod tmdb;
mod types;

pub use tmdb::{TmdbClient, TmdbConfig};
pub use types::{EpisodeDetails, MovieDetails, SearchResult, SeasonDetails, SeriesDetails};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from metadata providers.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// Unknown id (404).
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    ParseError(String),

    #[error("client not configured: {0}")]
    NotConfigured(String),
}

/// Source of movie and series metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search movies by title, best match first.
    async fn search_movies(&self, query: &str) -> Result<Vec<SearchResult>, MetadataError>;

    async fn movie_details(&self, tmdb_id: i64) -> Result<MovieDetails, MetadataError>;

    /// Search series by title, best match first.
    async fn search_series(&self, query: &str) -> Result<Vec<SearchResult>, MetadataError>;

    /// Series details including every season and its episodes.
    async fn series_details(&self, tmdb_id: i64) -> Result<SeriesDetails, MetadataError>;
}
