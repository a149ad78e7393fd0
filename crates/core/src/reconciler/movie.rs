//! Movie lifecycle: `Unreleased -> Missing -> Downloading -> Downloaded`,
//! plus metadata linking for `Discovered` movies.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::library::is_video_file;
use crate::media::{DownloadLink, EntityKind, Movie, MovieMetadata, MovieState};
use crate::metrics::{DOWNLOADS_REQUESTED, STATE_TRANSITIONS};
use crate::release::{check_movie_release, search_term_from_path};

use super::{
    check_cancelled, first_error, record_failure, record_rejection, ReconcileError,
    ReconcileSnapshot, Reconciler,
};

impl Reconciler {
    /// One movie pass: all four movie sweeps run concurrently against the
    /// same snapshot.
    pub async fn reconcile_movies(&self, cancel: &CancellationToken) -> Result<(), ReconcileError> {
        check_cancelled(cancel)?;
        let snapshot = self.build_snapshot()?;

        let (unreleased, missing, downloading, discovered) = tokio::join!(
            self.reconcile_unreleased_movies(&snapshot, cancel),
            self.reconcile_missing_movies(&snapshot, cancel),
            self.reconcile_downloading_movies(&snapshot, cancel),
            self.reconcile_discovered_movies(&snapshot, cancel),
        );

        first_error([unreleased, missing, downloading, discovered])
    }

    pub async fn reconcile_unreleased_movies(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        for movie in self.store.list_movies_by_state(MovieState::Unreleased)? {
            check_cancelled(cancel)?;
            if !movie.monitored {
                continue;
            }
            if let Err(e) = self.reconcile_unreleased_movie(snapshot, &movie).await {
                record_failure(EntityKind::Movie, movie.id, &e);
            }
        }
        Ok(())
    }

    pub async fn reconcile_missing_movies(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        for movie in self.store.list_movies_by_state(MovieState::Missing)? {
            check_cancelled(cancel)?;
            if !movie.monitored {
                continue;
            }
            if let Err(e) = self.reconcile_missing_movie(snapshot, &movie).await {
                record_failure(EntityKind::Movie, movie.id, &e);
            }
        }
        Ok(())
    }

    pub async fn reconcile_downloading_movies(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        for movie in self.store.list_movies_by_state(MovieState::Downloading)? {
            check_cancelled(cancel)?;
            if let Err(e) = self.reconcile_downloading_movie(snapshot, &movie).await {
                record_failure(EntityKind::Movie, movie.id, &e);
            }
        }
        Ok(())
    }

    pub async fn reconcile_discovered_movies(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        for movie in self.store.list_movies_by_state(MovieState::Discovered)? {
            check_cancelled(cancel)?;
            if let Err(e) = self.reconcile_discovered_movie(snapshot, &movie).await {
                record_failure(EntityKind::Movie, movie.id, &e);
            }
        }
        Ok(())
    }

    /// Move to `Missing` once the release date has passed.
    pub async fn reconcile_unreleased_movie(
        &self,
        snapshot: &ReconcileSnapshot,
        movie: &Movie,
    ) -> Result<(), ReconcileError> {
        let metadata = self.movie_metadata(movie)?;

        match metadata.release_date {
            Some(date) if date <= snapshot.time().date_naive() => {
                self.set_movie_state(movie, MovieState::Missing, None)?;
            }
            _ => debug!(movie_id = movie.id, "Movie not released yet"),
        }
        Ok(())
    }

    /// Search, pick the best acceptable release and hand it to a download
    /// client.
    pub async fn reconcile_missing_movie(
        &self,
        snapshot: &ReconcileSnapshot,
        movie: &Movie,
    ) -> Result<(), ReconcileError> {
        let (Some(metadata_id), Some(profile_id), None) = (
            movie.movie_metadata_id,
            movie.quality_profile_id,
            movie.movie_file_id,
        ) else {
            debug!(movie_id = movie.id, "Movie not searchable, skipping");
            return Ok(());
        };

        let metadata = self.store.get_movie_metadata(metadata_id)?;
        let profile = self.store.get_quality_profile(profile_id)?;
        let runtime = metadata.runtime_minutes.unwrap_or(0);

        let releases = self
            .search_releases(snapshot, &self.config.movie_categories, &metadata.title, "movie")
            .await?;

        // Filtering keeps the ascending seeder order.
        let accepted: Vec<_> = releases
            .iter()
            .filter(|release| {
                match check_movie_release(
                    release,
                    &metadata.title,
                    runtime,
                    &profile,
                    snapshot.protocols(),
                ) {
                    Ok(_) => true,
                    Err(reason) => {
                        record_rejection(release, reason);
                        false
                    }
                }
            })
            .collect();

        let Some(release) = accepted.last() else {
            info!(
                movie_id = movie.id,
                title = %metadata.title,
                searched = releases.len(),
                "No acceptable release found"
            );
            return Ok(());
        };

        let client = snapshot.client_for_protocol(release.protocol).ok_or_else(|| {
            ReconcileError::MissingData(format!("no download client for {}", release.protocol))
        })?;

        let download_id = client.client.add(release).await?;
        DOWNLOADS_REQUESTED.with_label_values(&["movie"]).inc();
        info!(
            movie_id = movie.id,
            release = %release.title,
            download_id = %download_id,
            client = client.client.name(),
            "Requested movie download"
        );

        let link = DownloadLink::new(download_id, client.config.id);
        self.set_movie_state(movie, MovieState::Downloading, Some(&link))?;
        Ok(())
    }

    /// Place the finished download into the library and record its file.
    ///
    /// A movie that already has a file under its path goes straight to
    /// `Downloaded` without asking the download client.
    pub async fn reconcile_downloading_movie(
        &self,
        snapshot: &ReconcileSnapshot,
        movie: &Movie,
    ) -> Result<(), ReconcileError> {
        if let Some(path) = movie.path.as_deref() {
            match self.store.get_movie_file_under(path) {
                Ok(file) => {
                    if movie.movie_file_id.is_none() {
                        self.store.link_movie_file(movie.id, file.id)?;
                    }
                    self.set_movie_state(movie, MovieState::Downloaded, None)?;
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let link = movie.download.as_ref().ok_or_else(|| {
            ReconcileError::MissingData(format!("movie {} has no download link", movie.id))
        })?;

        let Some(client) = snapshot.client(link.download_client_id) else {
            warn!(
                movie_id = movie.id,
                download_client_id = link.download_client_id,
                "Download client not available, skipping"
            );
            return Ok(());
        };

        let status = client.client.get(&link.download_id).await?;
        if !status.done {
            debug!(
                movie_id = movie.id,
                progress = status.progress,
                "Download still in progress"
            );
            return Ok(());
        }

        let metadata = self.movie_metadata(movie)?;
        let directory = movie.path.clone().unwrap_or(metadata.title);

        let videos: Vec<_> = status
            .file_paths
            .iter()
            .filter(|path| is_video_file(path))
            .collect();
        if videos.is_empty() {
            return Err(ReconcileError::MissingData(format!(
                "download {} has no video files",
                link.download_id
            )));
        }

        let mut first_file = None;
        for source in videos {
            let placed = self.library.add_movie(&directory, source).await?;
            let original = source.to_string_lossy();
            let file = self.store.create_movie_file(
                placed.size_bytes,
                &placed.relative_path,
                Some(original.as_ref()),
            )?;
            first_file.get_or_insert(file.id);
        }

        if let Some(file_id) = first_file {
            self.store.link_movie_file(movie.id, file_id)?;
        }
        self.set_movie_state(movie, MovieState::Downloaded, None)?;
        Ok(())
    }

    /// Link a movie found on disk to provider metadata.
    pub async fn reconcile_discovered_movie(
        &self,
        _snapshot: &ReconcileSnapshot,
        movie: &Movie,
    ) -> Result<(), ReconcileError> {
        if movie.movie_metadata_id.is_none() {
            let path = movie.path.as_deref().ok_or_else(|| {
                ReconcileError::MissingData(format!("movie {} has no path", movie.id))
            })?;
            let term = search_term_from_path(path);

            let results = self.metadata.search_movies(&term).await?;
            let Some(first) = results.first() else {
                info!(movie_id = movie.id, term = %term, "No metadata match for movie");
                return Ok(());
            };
            if results.len() > 1 {
                warn!(
                    movie_id = movie.id,
                    term = %term,
                    matches = results.len(),
                    tmdb_id = first.tmdb_id,
                    "Ambiguous metadata match, using first result"
                );
            }

            let metadata = self.get_or_create_movie_metadata(first.tmdb_id).await?;
            self.store.link_movie_metadata(movie.id, metadata.id)?;
            info!(movie_id = movie.id, tmdb_id = metadata.tmdb_id, "Linked movie metadata");
        }

        let next = if movie.movie_file_id.is_some() {
            MovieState::Downloaded
        } else {
            MovieState::Missing
        };
        self.set_movie_state(movie, next, None)?;
        Ok(())
    }

    async fn get_or_create_movie_metadata(
        &self,
        tmdb_id: i64,
    ) -> Result<MovieMetadata, ReconcileError> {
        match self.store.get_movie_metadata_by_tmdb(tmdb_id) {
            Ok(metadata) => Ok(metadata),
            Err(e) if e.is_not_found() => {
                let details = self.metadata.movie_details(tmdb_id).await?;
                Ok(self.store.create_movie_metadata(&details)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn movie_metadata(&self, movie: &Movie) -> Result<MovieMetadata, ReconcileError> {
        let id = movie.movie_metadata_id.ok_or_else(|| {
            ReconcileError::MissingData(format!("movie {} has no metadata", movie.id))
        })?;
        Ok(self.store.get_movie_metadata(id)?)
    }

    fn set_movie_state(
        &self,
        movie: &Movie,
        state: MovieState,
        download: Option<&DownloadLink>,
    ) -> Result<Movie, ReconcileError> {
        let updated = self.store.update_movie_state(movie.id, state, download)?;
        STATE_TRANSITIONS
            .with_label_values(&["movie", state.as_str()])
            .inc();
        info!(movie_id = movie.id, from = %movie.state, to = %state, "Movie state changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::media::{MediaStore, NewMovie};
    use crate::searcher::SearchCategory;
    use crate::testing::{fixtures, ReconcilerHarness as Harness};

    const MB: u64 = 1024 * 1024;

    fn harness() -> Harness {
        Harness::new()
    }

    fn movie_with_metadata(h: &Harness, title: &str, state: MovieState) -> Movie {
        let metadata = h
            .store
            .create_movie_metadata(&fixtures::movie_details(603, title, 100))
            .unwrap();
        h.store
            .create_movie(
                &NewMovie {
                    path: Some(title.to_string()),
                    monitored: true,
                    quality_profile_id: Some(h.profile_id),
                    movie_metadata_id: Some(metadata.id),
                    movie_file_id: None,
                },
                state,
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_unreleased_becomes_missing_after_release_date() {
        let h = harness();
        let mut details = fixtures::movie_details(1, "Past", 100);
        details.release_date = Some((Utc::now() - Duration::days(1)).date_naive());
        let past = h.store.create_movie_metadata(&details).unwrap();
        details.tmdb_id = 2;
        details.release_date = Some((Utc::now() + Duration::days(30)).date_naive());
        let future = h.store.create_movie_metadata(&details).unwrap();

        let new = |metadata_id| NewMovie {
            monitored: true,
            movie_metadata_id: Some(metadata_id),
            ..Default::default()
        };
        let released = h.store.create_movie(&new(past.id), MovieState::Unreleased).unwrap();
        let pending = h.store.create_movie(&new(future.id), MovieState::Unreleased).unwrap();

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_unreleased_movies(&snapshot, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.store.get_movie(released.id).unwrap().state, MovieState::Missing);
        assert_eq!(h.store.get_movie(pending.id).unwrap().state, MovieState::Unreleased);
    }

    #[tokio::test]
    async fn test_missing_movie_downloads_highest_seeded_release() {
        let h = harness();
        let movie = movie_with_metadata(&h, "Heat", MovieState::Missing);

        h.indexers
            .add_results(
                1,
                vec![
                    fixtures::release("Heat.1995.1080p", 5000 * MB, Some(50)),
                    fixtures::release("Heat.1995.720p", 3000 * MB, Some(90)),
                    fixtures::release("Heat.1995.CAM", 100 * MB, Some(500)),
                    fixtures::release("The.Heat.2013.720p", 3000 * MB, Some(900)),
                ],
            )
            .await;

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_missing_movie(&snapshot, &movie)
            .await
            .unwrap();

        let added = h.factory.client().added().await;
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].title, "Heat.1995.720p");

        let updated = h.store.get_movie(movie.id).unwrap();
        assert_eq!(updated.state, MovieState::Downloading);
        let link = updated.download.unwrap();
        assert_eq!(link.download_client_id, h.client_id);
        assert!(!link.is_entire_season_download);
    }

    #[tokio::test]
    async fn test_missing_movie_without_acceptable_release_stays_missing() {
        let h = harness();
        let movie = movie_with_metadata(&h, "Heat", MovieState::Missing);
        h.indexers
            .add_results(1, vec![fixtures::release("Heat.CAM", 10 * MB, Some(3))])
            .await;

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_missing_movie(&snapshot, &movie)
            .await
            .unwrap();

        assert!(h.factory.client().added().await.is_empty());
        assert_eq!(h.store.get_movie(movie.id).unwrap().state, MovieState::Missing);
    }

    #[tokio::test]
    async fn test_movie_with_file_is_never_searched() {
        let h = harness();
        let file = h.store.create_movie_file(1, "Heat/heat.mkv", None).unwrap();
        let mut movie = movie_with_metadata(&h, "Heat", MovieState::Missing);
        h.store.link_movie_file(movie.id, file.id).unwrap();
        movie = h.store.get_movie(movie.id).unwrap();

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_missing_movie(&snapshot, &movie)
            .await
            .unwrap();

        assert!(h.indexers.recorded_searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_downloading_movie_with_tracked_file_skips_client() {
        let h = harness();
        let movie = movie_with_metadata(&h, "Heat", MovieState::Missing);
        let link = DownloadLink::new("abc", h.client_id);
        let movie = h
            .store
            .update_movie_state(movie.id, MovieState::Downloading, Some(&link))
            .unwrap();
        h.store
            .create_movie_file(10, "Heat/Heat.1995.mkv", None)
            .unwrap();

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_downloading_movie(&snapshot, &movie)
            .await
            .unwrap();

        let updated = h.store.get_movie(movie.id).unwrap();
        assert_eq!(updated.state, MovieState::Downloaded);
        assert!(updated.movie_file_id.is_some());
        assert!(h.factory.client().get_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_completed_download_is_placed_in_library() {
        let h = harness();
        let movie = movie_with_metadata(&h, "Heat", MovieState::Missing);
        let link = DownloadLink::new("abc", h.client_id);
        let movie = h
            .store
            .update_movie_state(movie.id, MovieState::Downloading, Some(&link))
            .unwrap();

        let client = h.factory.client();
        client
            .set_progress("abc", 0.5, vec![PathBuf::from("/downloads/Heat/heat.mkv")])
            .await;

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_downloading_movie(&snapshot, &movie)
            .await
            .unwrap();
        assert_eq!(h.store.get_movie(movie.id).unwrap().state, MovieState::Downloading);

        client
            .complete(
                "abc",
                vec![
                    PathBuf::from("/downloads/Heat/heat.mkv"),
                    PathBuf::from("/downloads/Heat/heat.nfo"),
                ],
            )
            .await;
        h.reconciler
            .reconcile_downloading_movie(&snapshot, &movie)
            .await
            .unwrap();

        let updated = h.store.get_movie(movie.id).unwrap();
        assert_eq!(updated.state, MovieState::Downloaded);
        let file = h.store.get_movie_file(updated.movie_file_id.unwrap()).unwrap();
        assert_eq!(file.relative_path, "Heat/heat.mkv");
        assert_eq!(file.original_file_path.as_deref(), Some("/downloads/Heat/heat.mkv"));
        assert_eq!(h.library.placed_movies().await.len(), 1);
    }

    #[tokio::test]
    async fn test_library_failure_leaves_movie_downloading() {
        let h = harness();
        let movie = movie_with_metadata(&h, "Heat", MovieState::Missing);
        let link = DownloadLink::new("abc", h.client_id);
        let movie = h
            .store
            .update_movie_state(movie.id, MovieState::Downloading, Some(&link))
            .unwrap();
        h.factory
            .client()
            .complete("abc", vec![PathBuf::from("/downloads/heat.mkv")])
            .await;
        h.library.fail_next("disk full").await;

        let snapshot = h.reconciler.build_snapshot().unwrap();
        let err = h
            .reconciler
            .reconcile_downloading_movie(&snapshot, &movie)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Library(_)));
        assert_eq!(h.store.get_movie(movie.id).unwrap().state, MovieState::Downloading);
    }

    #[tokio::test]
    async fn test_discovered_movie_links_first_metadata_match() {
        let h = harness();
        let file = h.store.create_movie_file(1, "Heat (1995)/heat.mkv", None).unwrap();
        let movie = h
            .store
            .create_movie(
                &NewMovie {
                    path: Some("Heat (1995)".to_string()),
                    movie_file_id: Some(file.id),
                    ..Default::default()
                },
                MovieState::Discovered,
            )
            .unwrap();

        h.metadata
            .add_movie(fixtures::movie_details(949, "Heat", 170))
            .await;
        h.metadata
            .add_movie(fixtures::movie_details(950, "Heat Wave", 90))
            .await;

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_discovered_movie(&snapshot, &movie)
            .await
            .unwrap();

        let updated = h.store.get_movie(movie.id).unwrap();
        let metadata = h.store.get_movie_metadata(updated.movie_metadata_id.unwrap()).unwrap();
        assert_eq!(metadata.tmdb_id, 949);
        assert_eq!(updated.state, MovieState::Downloaded);
        assert_eq!(h.metadata.searches().await, vec!["Heat".to_string()]);
    }

    #[tokio::test]
    async fn test_discovered_movie_without_match_stays_discovered() {
        let h = harness();
        let movie = h
            .store
            .create_movie(
                &NewMovie {
                    path: Some("Unknown Film".to_string()),
                    ..Default::default()
                },
                MovieState::Discovered,
            )
            .unwrap();

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_discovered_movie(&snapshot, &movie)
            .await
            .unwrap();

        assert_eq!(h.store.get_movie(movie.id).unwrap().state, MovieState::Discovered);
    }

    #[tokio::test]
    async fn test_cancelled_pass_returns_cancelled() {
        let h = harness();
        movie_with_metadata(&h, "Heat", MovieState::Missing);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h.reconciler.reconcile_movies(&cancel).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
        assert!(h.indexers.recorded_searches().await.is_empty());
    }

    #[tokio::test]
    async fn test_movie_search_uses_movie_categories() {
        let h = harness();
        let movie = movie_with_metadata(&h, "Heat", MovieState::Missing);

        let snapshot = h.reconciler.build_snapshot().unwrap();
        h.reconciler
            .reconcile_missing_movie(&snapshot, &movie)
            .await
            .unwrap();

        let searches = h.indexers.recorded_searches().await;
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].indexer_id, 1);
        assert_eq!(searches[0].categories, vec![SearchCategory::Movies]);
        assert_eq!(searches[0].query, "Heat");
    }
}
