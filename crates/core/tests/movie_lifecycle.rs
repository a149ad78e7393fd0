//! Movie lifecycle integration tests.
//!
//! These tests drive movies through the reconciler against a file-backed
//! store:
//! missing -> downloading -> downloaded, and discovered -> downloaded

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use marquee_core::{
    media::{EntityKind, MediaStore, MovieState, NewMovie, Protocol},
    testing::{
        fixtures, MockDownloadClientFactory, MockIndexerClient, MockLibrary,
        MockMetadataProvider,
    },
    Reconciler, ReconcilerConfig, SqliteMediaStore,
};

const MB: u64 = 1024 * 1024;

/// Test helper wiring a reconciler to mocks and an on-disk store.
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
            .create_quality_profile("HD", &[fixtures::quality_definition("HD-1080p", 10.0, 60.0)])
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
            .reconcile_movies(&CancellationToken::new())
            .await
            .expect("Reconcile pass failed");
    }

    fn state(&self, movie_id: i64) -> MovieState {
        self.store.get_movie(movie_id).unwrap().state
    }
}

#[tokio::test]
async fn test_wanted_movie_is_downloaded_and_placed() {
    let h = TestHarness::new();
    let metadata = h
        .store
        .create_movie_metadata(&fixtures::movie_details(949, "Heat", 170))
        .unwrap();
    let movie = h
        .store
        .create_movie(
            &NewMovie {
                path: Some("Heat (1995)".to_string()),
                monitored: true,
                quality_profile_id: Some(h.profile_id),
                movie_metadata_id: Some(metadata.id),
                movie_file_id: None,
            },
            MovieState::Missing,
        )
        .unwrap();

    // 170 minutes at 10-60 MB/min accepts 1700-10200 MB.
    h.indexers
        .add_results(
            1,
            vec![
                fixtures::release("Heat.1995.2160p.REMUX", 60_000 * MB, Some(200)),
                fixtures::release("Heat.1995.1080p.BluRay", 9_000 * MB, Some(35)),
                fixtures::release("Heat.1995.720p.WEB", 4_000 * MB, Some(80)),
            ],
        )
        .await;

    // First pass: a release is picked and handed to the download client.
    h.reconcile().await;
    assert_eq!(h.state(movie.id), MovieState::Downloading);

    let added = h.factory.client().added().await;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].title, "Heat.1995.720p.WEB");

    let link = h.store.get_movie(movie.id).unwrap().download.unwrap();
    assert_eq!(link.download_id, "mock-1");

    // Still downloading: nothing changes.
    h.factory
        .client()
        .set_progress("mock-1", 0.4, vec![])
        .await;
    h.reconcile().await;
    assert_eq!(h.state(movie.id), MovieState::Downloading);

    // Finished: the video file is placed, the sample text file ignored.
    h.factory
        .client()
        .complete(
            "mock-1",
            vec![
                PathBuf::from("/downloads/Heat.1995.720p.WEB/heat.mkv"),
                PathBuf::from("/downloads/Heat.1995.720p.WEB/release.nfo"),
            ],
        )
        .await;
    h.reconcile().await;

    let movie = h.store.get_movie(movie.id).unwrap();
    assert_eq!(movie.state, MovieState::Downloaded);

    let file = h.store.get_movie_file(movie.movie_file_id.unwrap()).unwrap();
    assert_eq!(file.relative_path, "Heat (1995)/heat.mkv");
    assert_eq!(h.library.placed_movies().await.len(), 1);

    let history: Vec<String> = h
        .store
        .entity_transitions(EntityKind::Movie, movie.id)
        .unwrap()
        .into_iter()
        .map(|t| t.to_state)
        .collect();
    assert_eq!(history, vec!["downloading", "downloaded"]);

    // Later passes leave the movie alone.
    h.reconcile().await;
    assert_eq!(h.factory.client().added().await.len(), 1);
}

#[tokio::test]
async fn test_library_movie_is_indexed_and_linked() {
    let h = TestHarness::new();
    h.library
        .add_movie_file("Heat (1995)/Heat.1995.1080p.mkv", 8_000 * MB)
        .await;
    h.metadata
        .add_movie(fixtures::movie_details(949, "Heat", 170))
        .await;

    let summary = h
        .reconciler
        .index_movie_library(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.added, 1);

    let movie = h.store.get_movie_by_path("Heat (1995)").unwrap();
    assert_eq!(movie.state, MovieState::Discovered);

    h.reconcile().await;

    let movie = h.store.get_movie(movie.id).unwrap();
    assert_eq!(movie.state, MovieState::Downloaded);
    let metadata = h
        .store
        .get_movie_metadata(movie.movie_metadata_id.unwrap())
        .unwrap();
    assert_eq!(metadata.tmdb_id, 949);

    // Nothing is searched or downloaded for a movie already on disk.
    assert!(h.indexers.recorded_searches().await.is_empty());
    assert!(h.factory.client().added().await.is_empty());
}

#[tokio::test]
async fn test_unreleased_movie_waits_for_release_date() {
    let h = TestHarness::new();
    let mut details = fixtures::movie_details(1, "Upcoming", 120);
    details.release_date = Some(chrono::Utc::now().date_naive() + chrono::Duration::days(30));
    let metadata = h.store.create_movie_metadata(&details).unwrap();
    let movie = h
        .store
        .create_movie(
            &NewMovie {
                path: None,
                monitored: true,
                quality_profile_id: Some(h.profile_id),
                movie_metadata_id: Some(metadata.id),
                movie_file_id: None,
            },
            MovieState::Unreleased,
        )
        .unwrap();

    h.reconcile().await;

    assert_eq!(h.state(movie.id), MovieState::Unreleased);
    assert!(h.indexers.recorded_searches().await.is_empty());
}
