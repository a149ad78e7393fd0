//! A reconciler wired to an in-memory store and mock collaborators.

use std::sync::Arc;

use crate::media::{
    EpisodeState, MediaStore, NewEpisode, NewSeason, NewSeries, Protocol, Season, Series,
    SqliteMediaStore,
};
use crate::metadata::SeriesDetails;
use crate::reconciler::{
    determine_season_state, determine_series_state, Reconciler, ReconcilerConfig,
};

use super::{
    fixtures, MockDownloadClientFactory, MockIndexerClient, MockLibrary, MockMetadataProvider,
};

/// Everything a reconciler test needs, seeded with one quality profile
/// (`HD`, 10 to 100 MB per minute), one torrent download client and one
/// enabled indexer with id 1.
///
/// Panics on storage errors; meant for tests only.
pub struct ReconcilerHarness {
    pub store: Arc<SqliteMediaStore>,
    pub indexers: Arc<MockIndexerClient>,
    pub factory: Arc<MockDownloadClientFactory>,
    pub metadata: Arc<MockMetadataProvider>,
    pub library: Arc<MockLibrary>,
    pub reconciler: Arc<Reconciler>,
    pub profile_id: i64,
    pub client_id: i64,
}

impl ReconcilerHarness {
    pub fn new() -> Self {
        let store = Arc::new(SqliteMediaStore::in_memory().expect("in-memory store"));
        let profile = store
            .create_quality_profile("HD", &[fixtures::quality_definition("HD-720p", 10.0, 100.0)])
            .expect("quality profile");
        let client = store
            .create_download_client(&fixtures::download_client_config(0, Protocol::Torrent))
            .expect("download client");
        store
            .replace_indexers(&[fixtures::indexer(1)])
            .expect("indexers");

        let indexers = Arc::new(MockIndexerClient::new());
        let factory = Arc::new(MockDownloadClientFactory::new());
        let metadata = Arc::new(MockMetadataProvider::new());
        let library = Arc::new(MockLibrary::new());

        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            indexers.clone(),
            factory.clone(),
            metadata.clone(),
            library.clone(),
            ReconcilerConfig::default(),
        ));

        Self {
            store,
            indexers,
            factory,
            metadata,
            library,
            reconciler,
            profile_id: profile.id,
            client_id: client.id,
        }
    }

    /// Store a monitored series from `details` with every episode in
    /// `state`. Season and series states are derived from the episodes.
    /// Returns the series and its first season.
    pub fn seed_series(&self, details: &SeriesDetails, state: EpisodeState) -> (Series, Season) {
        let series_metadata = self
            .store
            .create_series_metadata(details)
            .expect("series metadata");

        let season_states: Vec<_> = details
            .seasons
            .iter()
            .map(|season| determine_season_state(&vec![state; season.episodes.len()]))
            .collect();

        let series = self
            .store
            .create_series(
                &NewSeries {
                    path: Some(details.title.clone()),
                    monitored: true,
                    quality_profile_id: Some(self.profile_id),
                    series_metadata_id: Some(series_metadata.id),
                },
                determine_series_state(&season_states),
            )
            .expect("series");

        let mut seasons = Vec::new();
        for (season_details, season_state) in details.seasons.iter().zip(season_states) {
            let season_metadata = self
                .store
                .create_season_metadata(series_metadata.id, season_details)
                .expect("season metadata");
            let season = self
                .store
                .create_season(
                    &NewSeason {
                        series_id: series.id,
                        number: season_details.number,
                        monitored: true,
                        season_metadata_id: Some(season_metadata.id),
                    },
                    season_state,
                )
                .expect("season");

            for episode_details in &season_details.episodes {
                let episode_metadata = self
                    .store
                    .create_episode_metadata(season_metadata.id, episode_details)
                    .expect("episode metadata");
                self.store
                    .create_episode(
                        &NewEpisode {
                            season_id: season.id,
                            number: episode_details.number,
                            monitored: true,
                            episode_metadata_id: Some(episode_metadata.id),
                            episode_file_id: None,
                        },
                        state,
                    )
                    .expect("episode");
            }
            seasons.push(season);
        }

        let first = seasons.into_iter().next().expect("series has a season");
        (series, first)
    }
}

impl Default for ReconcilerHarness {
    fn default() -> Self {
        Self::new()
    }
}
