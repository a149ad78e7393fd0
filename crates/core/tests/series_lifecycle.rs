//! Series lifecycle integration tests.
//!
//! These tests drive a series through the reconciler against a file-backed
//! store:
//! missing (no seasons) -> refreshed -> season pack downloading -> completed

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use marquee_core::{
    media::{EpisodeState, MediaStore, NewSeries, Protocol, Series, SeriesState},
    metadata::SeriesDetails,
    testing::{
        fixtures, MockDownloadClientFactory, MockIndexerClient, MockLibrary,
        MockMetadataProvider, ReconcilerHarness,
    },
    Reconciler, ReconcilerConfig, SqliteMediaStore,
};

const MB: u64 = 1024 * 1024;

struct TestHarness {
    store: Arc<SqliteMediaStore>,
    indexers: Arc<MockIndexerClient>,
    factory: Arc<MockDownloadClientFactory>,
    metadata: Arc<MockMetadataProvider>,
    library: Arc<MockLibrary>,
    reconciler: Reconciler,
    profile_id: i64,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteMediaStore::new(&temp_dir.path().join("media.db"))
                .expect("Failed to create media store"),
        );

        let profile = store
            .create_quality_profile("HD", &[fixtures::quality_definition("HD-720p", 10.0, 60.0)])
            .expect("Failed to create profile");
        store
            .create_download_client(&fixtures::download_client_config(0, Protocol::Torrent))
            .expect("Failed to create download client");
        store
            .replace_indexers(&[fixtures::indexer(1)])
            .expect("Failed to store indexers");

        let indexers = Arc::new(MockIndexerClient::new());
        let factory = Arc::new(MockDownloadClientFactory::new());
        let metadata = Arc::new(MockMetadataProvider::new());
        let library = Arc::new(MockLibrary::new());

        let reconciler = Reconciler::new(
            store.clone(),
            indexers.clone(),
            factory.clone(),
            metadata.clone(),
            library.clone(),
            ReconcilerConfig::default(),
        );

        Self {
            store,
            indexers,
            factory,
            metadata,
            library,
            reconciler,
            profile_id: profile.id,
            _temp_dir: temp_dir,
        }
    }

    async fn reconcile(&self) {
        self.reconciler
            .reconcile_series(&CancellationToken::new())
            .await
            .expect("Reconcile pass failed");
    }
}

/// "Show" with one aired season of two hour-long episodes.
fn show() -> SeriesDetails {
    let aired = Some(Utc::now().date_naive() - Duration::days(30));
    fixtures::series_details(
        1399,
        "Show",
        vec![fixtures::season_details(
            1,
            vec![
                fixtures::episode_details(1, Some(60), aired),
                fixtures::episode_details(2, Some(60), aired),
            ],
        )],
    )
}

/// A wanted "Show" with metadata but no seasons yet.
async fn add_wanted_show(h: &TestHarness) -> Series {
    h.metadata.add_series(show()).await;
    let metadata = h.store.create_series_metadata(&show()).unwrap();
    h.store
        .create_series(
            &NewSeries {
                path: Some("Show".to_string()),
                monitored: true,
                quality_profile_id: Some(h.profile_id),
                series_metadata_id: Some(metadata.id),
            },
            SeriesState::Missing,
        )
        .unwrap()
}

#[tokio::test]
async fn test_wanted_series_is_fetched_as_season_pack() {
    let h = TestHarness::new();
    let series = add_wanted_show(&h).await;

    // 120 minutes at 10-60 MB/min accepts 1200-7200 MB for the pack.
    h.indexers
        .add_results(
            1,
            vec![
                fixtures::release("Show.S01.720p", 4_000 * MB, Some(25)),
                fixtures::release("Show.S01E01.720p", 2_000 * MB, Some(300)),
                fixtures::release("Other.Show.S01.720p", 4_000 * MB, Some(900)),
            ],
        )
        .await;

    // First pass: seasons and episodes are created, then the pack is grabbed.
    h.reconcile().await;

    let season = h.store.get_season_by_number(series.id, 1).unwrap();
    assert_eq!(season.state, SeriesState::Downloading);
    let episodes = h.store.list_episodes(season.id).unwrap();
    assert_eq!(episodes.len(), 2);
    for episode in &episodes {
        assert_eq!(episode.state, EpisodeState::Downloading);
        let link = episode.download.as_ref().unwrap();
        assert_eq!(link.download_id, "mock-1");
        assert!(link.is_entire_season_download);
    }
    assert_eq!(
        h.store.get_series(series.id).unwrap().state,
        SeriesState::Downloading
    );

    let added = h.factory.client().added().await;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].title, "Show.S01.720p");

    // Second pass: the finished pack is split into episodes.
    h.factory
        .client()
        .complete(
            "mock-1",
            vec![
                PathBuf::from("/downloads/Show.S01.720p/Show.S01E01.720p.mkv"),
                PathBuf::from("/downloads/Show.S01.720p/Show.S01E02.720p.mkv"),
                PathBuf::from("/downloads/Show.S01.720p/Show.S01.nfo"),
            ],
        )
        .await;
    h.reconcile().await;

    for episode in h.store.list_episodes(season.id).unwrap() {
        assert_eq!(episode.state, EpisodeState::Downloaded);
        let file = h
            .store
            .get_episode_file(episode.episode_file_id.unwrap())
            .unwrap();
        assert!(file.relative_path.starts_with("Show/Season 01/"));
    }
    assert_eq!(h.library.placed_episodes().await.len(), 2);
    assert_eq!(
        h.store.get_season(season.id).unwrap().state,
        SeriesState::Completed
    );
    assert_eq!(
        h.store.get_series(series.id).unwrap().state,
        SeriesState::Completed
    );

    // One download for the whole season, polled per download not per episode.
    let calls = h.factory.client().get_calls().await;
    assert!(calls.iter().all(|id| id == "mock-1"));
    assert!(calls.len() <= 2);
}

#[tokio::test]
async fn test_library_episodes_are_indexed_and_linked() {
    let h = TestHarness::new();
    h.metadata.add_series(show()).await;
    h.library
        .add_episode_file("Show/Season 01/Show.S01E01.mkv", 1_500 * MB)
        .await;
    h.library
        .add_episode_file("Show/Season 01/Show.S01E02.mkv", 1_500 * MB)
        .await;

    let summary = h
        .reconciler
        .index_series_library(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.added, 2);

    let series = h.store.get_series_by_path("Show").unwrap();
    assert_eq!(series.state, SeriesState::Discovered);
    assert!(series.series_metadata_id.is_none());

    h.reconcile().await;

    let series = h.store.get_series(series.id).unwrap();
    assert!(series.series_metadata_id.is_some());
    assert_eq!(series.state, SeriesState::Completed);

    let season = h.store.get_season_by_number(series.id, 1).unwrap();
    for episode in h.store.list_episodes(season.id).unwrap() {
        assert_eq!(episode.state, EpisodeState::Completed);
        assert!(episode.episode_metadata_id.is_some());
    }

    // Nothing is searched or downloaded for episodes already on disk.
    assert!(h.indexers.recorded_searches().await.is_empty());
    assert!(h.factory.client().added().await.is_empty());
}

#[tokio::test]
async fn test_partial_pack_import_is_retried_with_matching_file() {
    let h = TestHarness::new();
    let series = add_wanted_show(&h).await;
    h.indexers
        .add_results(
            1,
            vec![fixtures::release("Show.S01.720p", 4_000 * MB, Some(25))],
        )
        .await;
    h.reconcile().await;

    let season = h.store.get_season_by_number(series.id, 1).unwrap();
    h.factory
        .client()
        .complete(
            "mock-1",
            vec![
                PathBuf::from("/downloads/Show.S01.720p/Show.S01E02.720p.mkv"),
                PathBuf::from("/downloads/Show.S01.720p/Show.S01E01.720p.mkv"),
            ],
        )
        .await;

    // Episode 1 is imported first and fails.
    h.library.fail_next("disk full").await;
    h.reconcile().await;

    let first = h.store.get_episode_by_number(season.id, 1).unwrap();
    let second = h.store.get_episode_by_number(season.id, 2).unwrap();
    assert_eq!(first.state, EpisodeState::Downloading);
    assert_eq!(second.state, EpisodeState::Downloaded);

    // The retry only holds episode 1 but is still a pack import.
    h.reconcile().await;

    let first = h.store.get_episode_by_number(season.id, 1).unwrap();
    assert_eq!(first.state, EpisodeState::Downloaded);
    let file = h
        .store
        .get_episode_file(first.episode_file_id.unwrap())
        .unwrap();
    assert_eq!(file.relative_path, "Show/Season 01/Show.S01E01.720p.mkv");

    let sources: Vec<_> = h
        .library
        .placed_episodes()
        .await
        .into_iter()
        .map(|placed| placed.source)
        .collect();
    assert_eq!(
        sources,
        vec![
            PathBuf::from("/downloads/Show.S01.720p/Show.S01E02.720p.mkv"),
            PathBuf::from("/downloads/Show.S01.720p/Show.S01E01.720p.mkv"),
        ]
    );
    assert_eq!(
        h.store.get_series(series.id).unwrap().state,
        SeriesState::Completed
    );
}

#[tokio::test]
async fn test_continuing_series_picks_up_newly_aired_episodes() {
    let h = ReconcilerHarness::new();
    let aired = Some(Utc::now().date_naive() - Duration::days(30));
    let yesterday = Some(Utc::now().date_naive() - Duration::days(1));
    let next_week = Some(Utc::now().date_naive() + Duration::days(7));

    let known = fixtures::series_details(
        1399,
        "Show",
        vec![fixtures::season_details(
            1,
            vec![fixtures::episode_details(1, Some(60), aired)],
        )],
    );
    let (series, season) = h.seed_series(&known, EpisodeState::Completed);
    h.store
        .update_series_state(series.id, SeriesState::Continuing)
        .unwrap();

    h.metadata
        .add_series(fixtures::series_details(
            1399,
            "Show",
            vec![
                fixtures::season_details(
                    1,
                    vec![
                        fixtures::episode_details(1, Some(60), aired),
                        fixtures::episode_details(2, Some(60), yesterday),
                    ],
                ),
                fixtures::season_details(
                    2,
                    vec![fixtures::episode_details(1, Some(60), next_week)],
                ),
            ],
        ))
        .await;
    h.indexers
        .add_results(
            1,
            vec![
                fixtures::release("Show.S01.720p", 4_000 * MB, Some(90)),
                fixtures::release("Show.S01E02.720p", 2_000 * MB, Some(10)),
            ],
        )
        .await;

    h.reconciler
        .reconcile_series(&CancellationToken::new())
        .await
        .unwrap();

    // Only the new episode is fetched; the season is not all missing.
    let added = h.factory.client().added().await;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].title, "Show.S01E02.720p");

    let episodes = h.store.list_episodes(season.id).unwrap();
    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].state, EpisodeState::Completed);
    assert_eq!(episodes[1].state, EpisodeState::Downloading);
    assert!(!episodes[1].download.as_ref().unwrap().is_entire_season_download);
    assert_eq!(
        h.store.get_season(season.id).unwrap().state,
        SeriesState::Downloading
    );

    let season_two = h.store.get_season_by_number(series.id, 2).unwrap();
    assert_eq!(season_two.state, SeriesState::Unreleased);
    assert_eq!(
        h.store.list_episodes(season_two.id).unwrap()[0].state,
        EpisodeState::Unreleased
    );

    // One search for the series, not one per season.
    let searches = h.indexers.recorded_searches().await;
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].query, "Show");
}

#[test]
fn test_season_falling_back_to_missing_leaves_series_state() {
    let h = ReconcilerHarness::new();
    let (series, season) = h.seed_series(&show(), EpisodeState::Missing);
    let episode = h.store.get_episode_by_number(season.id, 1).unwrap();

    let link = marquee_core::media::DownloadLink::new("grab", h.client_id);
    let episode = h
        .reconciler
        .update_episode_state(&episode, EpisodeState::Downloading, Some(&link))
        .unwrap();
    assert_eq!(
        h.store.get_season(season.id).unwrap().state,
        SeriesState::Downloading
    );
    assert_eq!(
        h.store.get_series(series.id).unwrap().state,
        SeriesState::Downloading
    );

    // The download vanished: the season drops back to Missing without
    // touching the series.
    h.reconciler
        .update_episode_state(&episode, EpisodeState::Missing, None)
        .unwrap();
    assert_eq!(
        h.store.get_season(season.id).unwrap().state,
        SeriesState::Missing
    );
    assert_eq!(
        h.store.get_series(series.id).unwrap().state,
        SeriesState::Downloading
    );
}
