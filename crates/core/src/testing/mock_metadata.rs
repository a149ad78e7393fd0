//! Mock metadata provider for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::metadata::{MetadataError, MetadataProvider, MovieDetails, SearchResult, SeriesDetails};

/// Mock implementation of the MetadataProvider trait.
///
/// Searches match every known title containing the query, in insertion
/// order. Unknown ids return `NotFound`.
#[derive(Debug, Default)]
pub struct MockMetadataProvider {
    movies: Arc<RwLock<Vec<MovieDetails>>>,
    series: Arc<RwLock<Vec<SeriesDetails>>>,
    searches: Arc<RwLock<Vec<String>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<MetadataError>>>,
}

impl MockMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_movie(&self, details: MovieDetails) {
        self.movies.write().await.push(details);
    }

    /// Add or replace a series by TMDB id.
    pub async fn add_series(&self, details: SeriesDetails) {
        let mut series = self.series.write().await;
        series.retain(|s| s.tmdb_id != details.tmdb_id);
        series.push(details);
    }

    /// Queries passed to either search method, in order.
    pub async fn searches(&self) -> Vec<String> {
        self.searches.read().await.clone()
    }

    pub async fn fail_next(&self, message: &str) {
        *self.next_error.write().await = Some(MetadataError::ApiError {
            status: 500,
            message: message.to_string(),
        });
    }

    async fn take_error(&self) -> Result<(), MetadataError> {
        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataProvider for MockMetadataProvider {
    async fn search_movies(&self, query: &str) -> Result<Vec<SearchResult>, MetadataError> {
        self.searches.write().await.push(query.to_string());
        self.take_error().await?;

        Ok(self
            .movies
            .read()
            .await
            .iter()
            .filter(|m| m.title.contains(query))
            .map(|m| SearchResult {
                tmdb_id: m.tmdb_id,
                title: m.title.clone(),
                date: m.release_date,
            })
            .collect())
    }

    async fn movie_details(&self, tmdb_id: i64) -> Result<MovieDetails, MetadataError> {
        self.take_error().await?;
        self.movies
            .read()
            .await
            .iter()
            .find(|m| m.tmdb_id == tmdb_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("movie {}", tmdb_id)))
    }

    async fn search_series(&self, query: &str) -> Result<Vec<SearchResult>, MetadataError> {
        self.searches.write().await.push(query.to_string());
        self.take_error().await?;

        Ok(self
            .series
            .read()
            .await
            .iter()
            .filter(|s| s.title.contains(query))
            .map(|s| SearchResult {
                tmdb_id: s.tmdb_id,
                title: s.title.clone(),
                date: s.first_air_date,
            })
            .collect())
    }

    async fn series_details(&self, tmdb_id: i64) -> Result<SeriesDetails, MetadataError> {
        self.take_error().await?;
        self.series
            .read()
            .await
            .iter()
            .find(|s| s.tmdb_id == tmdb_id)
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("series {}", tmdb_id)))
    }
}
