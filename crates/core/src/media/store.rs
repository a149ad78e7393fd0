//! Media storage trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::*;
use crate::metadata::{EpisodeDetails, MovieDetails, SeasonDetails, SeriesDetails};

/// Error type for media storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The row does not exist (yet). Callers with a create-on-miss
    /// fallback match on this explicitly.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    /// A stored value could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Which table an entity transition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Movie,
    Series,
    Season,
    Episode,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Movie => "movie",
            EntityKind::Series => "series",
            EntityKind::Season => "season",
            EntityKind::Episode => "episode",
        }
    }
}

/// One row of an entity's append-only state history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTransition {
    pub entity_kind: EntityKind,
    pub entity_id: i64,
    pub from_state: String,
    pub to_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<DownloadLink>,
    pub created_at: DateTime<Utc>,
}

/// Storage for library entities, their metadata and the acquisition setup
/// (quality profiles, download clients, indexers).
///
/// Every `update_*_state` call appends an [`EntityTransition`]. A `download`
/// argument of `Some` replaces the stored link; `None` leaves it untouched.
pub trait MediaStore: Send + Sync {
    // Movies

    fn create_movie(&self, movie: &NewMovie, state: MovieState) -> Result<Movie, StorageError>;
    fn get_movie(&self, id: i64) -> Result<Movie, StorageError>;
    fn get_movie_by_path(&self, path: &str) -> Result<Movie, StorageError>;
    fn list_movies_by_state(&self, state: MovieState) -> Result<Vec<Movie>, StorageError>;
    fn update_movie_state(
        &self,
        id: i64,
        state: MovieState,
        download: Option<&DownloadLink>,
    ) -> Result<Movie, StorageError>;
    fn link_movie_metadata(&self, movie_id: i64, metadata_id: i64) -> Result<(), StorageError>;
    fn link_movie_file(&self, movie_id: i64, file_id: i64) -> Result<(), StorageError>;

    fn create_movie_file(
        &self,
        size_bytes: u64,
        relative_path: &str,
        original_file_path: Option<&str>,
    ) -> Result<MovieFile, StorageError>;
    fn get_movie_file(&self, id: i64) -> Result<MovieFile, StorageError>;
    fn get_movie_file_by_path(&self, relative_path: &str) -> Result<MovieFile, StorageError>;
    /// Any movie file stored below the directory `path`.
    fn get_movie_file_under(&self, path: &str) -> Result<MovieFile, StorageError>;

    fn create_movie_metadata(&self, details: &MovieDetails) -> Result<MovieMetadata, StorageError>;
    fn get_movie_metadata(&self, id: i64) -> Result<MovieMetadata, StorageError>;
    fn get_movie_metadata_by_tmdb(&self, tmdb_id: i64) -> Result<MovieMetadata, StorageError>;

    // Series hierarchy

    fn create_series(&self, series: &NewSeries, state: SeriesState)
        -> Result<Series, StorageError>;
    fn get_series(&self, id: i64) -> Result<Series, StorageError>;
    fn get_series_by_path(&self, path: &str) -> Result<Series, StorageError>;
    fn list_series_by_state(&self, state: SeriesState) -> Result<Vec<Series>, StorageError>;
    fn update_series_state(&self, id: i64, state: SeriesState) -> Result<Series, StorageError>;
    fn link_series_metadata(&self, series_id: i64, metadata_id: i64) -> Result<(), StorageError>;

    fn create_season(&self, season: &NewSeason, state: SeasonState)
        -> Result<Season, StorageError>;
    fn get_season(&self, id: i64) -> Result<Season, StorageError>;
    fn get_season_by_number(&self, series_id: i64, number: u32) -> Result<Season, StorageError>;
    /// Seasons of a series, ordered by number.
    fn list_seasons(&self, series_id: i64) -> Result<Vec<Season>, StorageError>;
    fn update_season_state(&self, id: i64, state: SeasonState) -> Result<Season, StorageError>;
    fn link_season_metadata(&self, season_id: i64, metadata_id: i64) -> Result<(), StorageError>;

    fn create_episode(
        &self,
        episode: &NewEpisode,
        state: EpisodeState,
    ) -> Result<Episode, StorageError>;
    fn get_episode(&self, id: i64) -> Result<Episode, StorageError>;
    fn get_episode_by_number(&self, season_id: i64, number: u32)
        -> Result<Episode, StorageError>;
    fn get_episode_by_metadata(&self, metadata_id: i64) -> Result<Episode, StorageError>;
    /// Episodes of a season, ordered by number.
    fn list_episodes(&self, season_id: i64) -> Result<Vec<Episode>, StorageError>;
    fn list_episodes_by_state(&self, state: EpisodeState) -> Result<Vec<Episode>, StorageError>;
    fn update_episode_state(
        &self,
        id: i64,
        state: EpisodeState,
        download: Option<&DownloadLink>,
    ) -> Result<Episode, StorageError>;
    fn link_episode_metadata(&self, episode_id: i64, metadata_id: i64)
        -> Result<(), StorageError>;
    fn link_episode_file(&self, episode_id: i64, file_id: i64) -> Result<(), StorageError>;

    fn create_episode_file(
        &self,
        size_bytes: u64,
        relative_path: &str,
        original_file_path: Option<&str>,
    ) -> Result<EpisodeFile, StorageError>;
    fn get_episode_file(&self, id: i64) -> Result<EpisodeFile, StorageError>;
    fn get_episode_file_by_path(&self, relative_path: &str)
        -> Result<EpisodeFile, StorageError>;

    fn create_series_metadata(
        &self,
        details: &SeriesDetails,
    ) -> Result<SeriesMetadata, StorageError>;
    fn get_series_metadata(&self, id: i64) -> Result<SeriesMetadata, StorageError>;
    fn get_series_metadata_by_tmdb(&self, tmdb_id: i64) -> Result<SeriesMetadata, StorageError>;

    fn create_season_metadata(
        &self,
        series_metadata_id: i64,
        details: &SeasonDetails,
    ) -> Result<SeasonMetadata, StorageError>;
    fn get_season_metadata(&self, id: i64) -> Result<SeasonMetadata, StorageError>;
    fn list_season_metadata(
        &self,
        series_metadata_id: i64,
    ) -> Result<Vec<SeasonMetadata>, StorageError>;

    fn create_episode_metadata(
        &self,
        season_metadata_id: i64,
        details: &EpisodeDetails,
    ) -> Result<EpisodeMetadata, StorageError>;
    fn get_episode_metadata(&self, id: i64) -> Result<EpisodeMetadata, StorageError>;
    fn list_episode_metadata(
        &self,
        season_metadata_id: i64,
    ) -> Result<Vec<EpisodeMetadata>, StorageError>;

    // Acquisition setup

    fn create_quality_profile(
        &self,
        name: &str,
        qualities: &[QualityDefinition],
    ) -> Result<QualityProfile, StorageError>;
    fn get_quality_profile(&self, id: i64) -> Result<QualityProfile, StorageError>;

    /// The `id` of `config` is ignored; the stored row gets a fresh one.
    fn create_download_client(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<DownloadClientConfig, StorageError>;
    fn list_download_clients(&self) -> Result<Vec<DownloadClientConfig>, StorageError>;

    /// Replace the whole indexer list with `indexers`.
    fn replace_indexers(&self, indexers: &[Indexer]) -> Result<(), StorageError>;
    fn list_indexers(&self) -> Result<Vec<Indexer>, StorageError>;

    /// State history of one entity, oldest first.
    fn entity_transitions(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Vec<EntityTransition>, StorageError>;
}
