//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external service
//! trait, so reconcile passes and scheduled jobs can be tested end to end
//! without an indexer manager, a download client or TMDB.
//!
//! # Example
//!
//! ```rust,ignore
//! use marquee_core::testing::{fixtures, ReconcilerHarness};
//!
//! let h = ReconcilerHarness::new();
//! h.indexers
//!     .add_results(1, vec![fixtures::release("Heat.1995.720p", 3 << 30, Some(40))])
//!     .await;
//!
//! h.reconciler.reconcile_movies(&CancellationToken::new()).await?;
//! assert_eq!(h.factory.client().added().await.len(), 1);
//! ```

mod harness;
mod mock_download_client;
mod mock_indexer;
mod mock_library;
mod mock_metadata;

pub use harness::ReconcilerHarness;
pub use mock_download_client::{MockDownloadClient, MockDownloadClientFactory};
pub use mock_indexer::{MockIndexerClient, RecordedSearch};
pub use mock_library::{MockLibrary, PlacedFile};
pub use mock_metadata::MockMetadataProvider;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::NaiveDate;

    use crate::media::{DownloadClientConfig, Indexer, MediaType, Protocol, QualityDefinition};
    use crate::metadata::{EpisodeDetails, MovieDetails, SeasonDetails, SeriesDetails};
    use crate::searcher::ReleaseCandidate;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    /// A qBittorrent client on localhost.
    pub fn download_client_config(id: i64, protocol: Protocol) -> DownloadClientConfig {
        DownloadClientConfig {
            id,
            implementation: "qbittorrent".to_string(),
            protocol,
            scheme: "http".to_string(),
            host: "localhost".to_string(),
            port: 8080,
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
            api_key: None,
        }
    }

    /// An enabled torrent indexer.
    pub fn indexer(id: i64) -> Indexer {
        Indexer {
            id,
            name: format!("indexer-{}", id),
            protocol: Protocol::Torrent,
            priority: 25,
            enabled: true,
        }
    }

    /// Sizes are in MB per minute of runtime.
    pub fn quality_definition(name: &str, min_size: f64, max_size: f64) -> QualityDefinition {
        QualityDefinition {
            name: name.to_string(),
            min_size,
            preferred_size: max_size,
            max_size,
            media_type: MediaType::Movie,
        }
    }

    /// Movie details with a release date in the past.
    pub fn movie_details(tmdb_id: i64, title: &str, runtime_minutes: u32) -> MovieDetails {
        MovieDetails {
            tmdb_id,
            title: title.to_string(),
            runtime_minutes: Some(runtime_minutes),
            release_date: date(1995, 12, 15),
            overview: None,
            poster_path: None,
        }
    }

    pub fn series_details(tmdb_id: i64, title: &str, seasons: Vec<SeasonDetails>) -> SeriesDetails {
        SeriesDetails {
            tmdb_id,
            title: title.to_string(),
            first_air_date: date(2011, 4, 17),
            last_air_date: None,
            status: Some("Returning Series".to_string()),
            seasons,
        }
    }

    pub fn season_details(number: u32, episodes: Vec<EpisodeDetails>) -> SeasonDetails {
        SeasonDetails {
            number,
            title: Some(format!("Season {}", number)),
            air_date: None,
            episodes,
        }
    }

    pub fn episode_details(
        number: u32,
        runtime_minutes: Option<u32>,
        air_date: Option<NaiveDate>,
    ) -> EpisodeDetails {
        EpisodeDetails {
            number,
            title: Some(format!("Episode {}", number)),
            runtime_minutes,
            air_date,
        }
    }

    /// A torrent release from indexer 1.
    pub fn release(title: &str, size_bytes: u64, seeders: Option<u32>) -> ReleaseCandidate {
        ReleaseCandidate {
            title: title.to_string(),
            size_bytes,
            seeders,
            protocol: Protocol::Torrent,
            download_url: format!("magnet:?xt=urn:btih:{}", title.to_lowercase()),
            indexer_id: 1,
            guid: Some(title.to_string()),
        }
    }
}
