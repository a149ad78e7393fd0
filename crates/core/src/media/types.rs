//! Library entities: movies, series, seasons, episodes and their metadata.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::store::StorageError;

macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = StorageError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(StorageError::Serialization(format!(
                        "invalid {}: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Movie lifecycle.
///
/// `Unreleased -> Missing -> Downloading -> Downloaded`, with `Discovered`
/// for movies found on disk before they were linked to metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovieState {
    Discovered,
    Missing,
    Unreleased,
    Downloading,
    Downloaded,
}

string_enum!(MovieState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Downloading => "downloading",
    Downloaded => "downloaded",
});

/// Derived state of a series or a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesState {
    Discovered,
    Missing,
    Unreleased,
    Downloading,
    Continuing,
    Completed,
}

string_enum!(SeriesState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Downloading => "downloading",
    Continuing => "continuing",
    Completed => "completed",
});

/// Seasons share the series state set; both are derived from their children.
pub type SeasonState = SeriesState;

/// Episode lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeState {
    Discovered,
    Missing,
    Unreleased,
    Downloading,
    Downloaded,
    Completed,
}

string_enum!(EpisodeState {
    Discovered => "discovered",
    Missing => "missing",
    Unreleased => "unreleased",
    Downloading => "downloading",
    Downloaded => "downloaded",
    Completed => "completed",
});

impl EpisodeState {
    /// The episode has a file in the library.
    pub fn is_done(&self) -> bool {
        matches!(self, EpisodeState::Downloaded | EpisodeState::Completed)
    }
}

/// Transfer protocol of a release and of the download client that handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Torrent,
    Usenet,
}

string_enum!(Protocol {
    Torrent => "torrent",
    Usenet => "usenet",
});

/// Which kind of media a quality definition applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Episode,
}

string_enum!(MediaType {
    Movie => "movie",
    Episode => "episode",
});

/// Link from an entity to the download that will produce its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub download_id: String,
    pub download_client_id: i64,
    /// Set on every episode of a season fetched as a single season pack.
    #[serde(default)]
    pub is_entire_season_download: bool,
}

impl DownloadLink {
    pub fn new(download_id: impl Into<String>, download_client_id: i64) -> Self {
        Self {
            download_id: download_id.into(),
            download_client_id,
            is_entire_season_download: false,
        }
    }

    pub fn entire_season(mut self) -> Self {
        self.is_entire_season_download = true;
        self
    }
}

/// A movie tracked by the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    /// Library-relative directory of the movie.
    pub path: Option<String>,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub movie_metadata_id: Option<i64>,
    pub movie_file_id: Option<i64>,
    pub state: MovieState,
    pub download: Option<DownloadLink>,
    pub added_at: DateTime<Utc>,
}

/// A new movie row.
#[derive(Debug, Clone, Default)]
pub struct NewMovie {
    pub path: Option<String>,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub movie_metadata_id: Option<i64>,
    pub movie_file_id: Option<i64>,
}

/// A movie file registered in the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieFile {
    pub id: i64,
    pub size_bytes: u64,
    /// Path relative to the movie library root.
    pub relative_path: String,
    /// Where the file came from, if it was imported from a download.
    pub original_file_path: Option<String>,
}

/// Immutable provider metadata for a movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieMetadata {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub runtime_minutes: Option<u32>,
    pub release_date: Option<NaiveDate>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
}

/// A series tracked by the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub path: Option<String>,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub series_metadata_id: Option<i64>,
    pub state: SeriesState,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSeries {
    pub path: Option<String>,
    pub monitored: bool,
    pub quality_profile_id: Option<i64>,
    pub series_metadata_id: Option<i64>,
}

/// Immutable provider metadata for a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub first_air_date: Option<NaiveDate>,
    pub last_air_date: Option<NaiveDate>,
    pub season_count: u32,
    pub episode_count: u32,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: i64,
    pub series_id: i64,
    pub number: u32,
    pub monitored: bool,
    pub season_metadata_id: Option<i64>,
    pub state: SeasonState,
}

#[derive(Debug, Clone)]
pub struct NewSeason {
    pub series_id: i64,
    pub number: u32,
    pub monitored: bool,
    pub season_metadata_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonMetadata {
    pub id: i64,
    pub series_metadata_id: i64,
    pub number: u32,
    pub title: Option<String>,
    pub air_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub season_id: i64,
    pub number: u32,
    pub monitored: bool,
    pub episode_metadata_id: Option<i64>,
    pub episode_file_id: Option<i64>,
    pub state: EpisodeState,
    pub download: Option<DownloadLink>,
}

#[derive(Debug, Clone)]
pub struct NewEpisode {
    pub season_id: i64,
    pub number: u32,
    pub monitored: bool,
    pub episode_metadata_id: Option<i64>,
    pub episode_file_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub id: i64,
    pub season_metadata_id: i64,
    pub number: u32,
    pub title: Option<String>,
    pub runtime_minutes: Option<u32>,
    pub air_date: Option<NaiveDate>,
}

/// An episode file registered in the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeFile {
    pub id: i64,
    pub size_bytes: u64,
    pub relative_path: String,
    pub original_file_path: Option<String>,
}

/// One acceptance band of a quality profile, in MB per minute of runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDefinition {
    pub name: String,
    pub min_size: f64,
    pub preferred_size: f64,
    pub max_size: f64,
    pub media_type: MediaType,
}

impl QualityDefinition {
    /// Inclusive on both ends.
    pub fn accepts_ratio(&self, mb_per_minute: f64) -> bool {
        self.min_size <= mb_per_minute && mb_per_minute <= self.max_size
    }
}

/// Ordered acceptance ladder, lowest quality first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub id: i64,
    pub name: String,
    pub qualities: Vec<QualityDefinition>,
}

/// Settings for one configured download client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadClientConfig {
    pub id: i64,
    /// Backend implementation, e.g. `qbittorrent`.
    pub implementation: String,
    pub protocol: Protocol,
    pub scheme: String,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl DownloadClientConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// A search indexer, as known to the indexer manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indexer {
    pub id: i64,
    pub name: String,
    pub protocol: Protocol,
    pub priority: i32,
    pub enabled: bool,
}
