//! Library entities and their storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteMediaStore;
pub use store::{EntityKind, EntityTransition, MediaStore, StorageError};
pub use types::{
    DownloadClientConfig, DownloadLink, Episode, EpisodeFile, EpisodeMetadata, EpisodeState,
    Indexer, MediaType, Movie, MovieFile, MovieMetadata, MovieState, NewEpisode, NewMovie,
    NewSeason, NewSeries, Protocol, QualityDefinition, QualityProfile, Season, SeasonMetadata,
    SeasonState, Series, SeriesMetadata, SeriesState,
};
