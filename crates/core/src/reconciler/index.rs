//! Library indexing, indexer sync and download client checks.

use std::collections::BTreeSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::library::LibraryFile;
use crate::media::{
    DownloadClientConfig, EpisodeState, Movie, MovieState, NewEpisode, NewMovie, NewSeason,
    NewSeries, Season, Series, SeriesState,
};
use crate::release::parse_episode_marker;

use super::{check_cancelled, ReconcileError, Reconciler};

/// Counts reported by an index run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub scanned: usize,
    pub added: usize,
    pub skipped: usize,
}

impl Reconciler {
    /// Register every video file in the movie library that is not tracked
    /// yet. New movies start unmonitored in `Discovered`, keyed by their
    /// top-level directory.
    pub async fn index_movie_library(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IndexSummary, ReconcileError> {
        let files = self.library.scan_movies().await?;
        let mut summary = IndexSummary {
            scanned: files.len(),
            ..Default::default()
        };

        for file in &files {
            check_cancelled(cancel)?;
            if self.index_movie_file(file)? {
                summary.added += 1;
            } else {
                summary.skipped += 1;
            }
        }

        info!(
            scanned = summary.scanned,
            added = summary.added,
            "Indexed movie library"
        );
        Ok(summary)
    }

    fn index_movie_file(&self, file: &LibraryFile) -> Result<bool, ReconcileError> {
        match self.store.get_movie_file_by_path(&file.relative_path) {
            Ok(_) => return Ok(false),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let directory = file.top_directory().unwrap_or(&file.relative_path);
        let created = self
            .store
            .create_movie_file(file.size_bytes, &file.relative_path, None)?;

        match self.store.get_movie_by_path(directory) {
            Ok(movie) => {
                if movie.movie_file_id.is_none() {
                    self.store.link_movie_file(movie.id, created.id)?;
                }
                debug!(movie_id = movie.id, path = %file.relative_path, "Added file to movie");
            }
            Err(e) if e.is_not_found() => {
                let movie: Movie = self.store.create_movie(
                    &NewMovie {
                        path: Some(directory.to_string()),
                        monitored: false,
                        movie_file_id: Some(created.id),
                        ..Default::default()
                    },
                    MovieState::Discovered,
                )?;
                debug!(movie_id = movie.id, path = %directory, "Discovered movie");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(true)
    }

    /// Register every episode file in the TV library that is not tracked
    /// yet. Files are keyed by series directory and the `SxxEyy` marker in
    /// their name; files without both are skipped.
    pub async fn index_series_library(
        &self,
        cancel: &CancellationToken,
    ) -> Result<IndexSummary, ReconcileError> {
        let files = self.library.scan_episodes().await?;
        let mut summary = IndexSummary {
            scanned: files.len(),
            ..Default::default()
        };
        let mut touched = BTreeSet::new();

        for file in &files {
            check_cancelled(cancel)?;
            match self.index_episode_file(file)? {
                Some(season_id) => {
                    touched.insert(season_id);
                    summary.added += 1;
                }
                None => summary.skipped += 1,
            }
        }

        for season_id in touched {
            self.evaluate_season_state(season_id)?;
        }

        info!(
            scanned = summary.scanned,
            added = summary.added,
            "Indexed series library"
        );
        Ok(summary)
    }

    /// Returns the season the file was added to.
    fn index_episode_file(&self, file: &LibraryFile) -> Result<Option<i64>, ReconcileError> {
        let Some(directory) = file.top_directory() else {
            warn!(path = %file.relative_path, "Episode file outside a series directory");
            return Ok(None);
        };
        let Some(marker) = parse_episode_marker(file.file_name()) else {
            debug!(path = %file.relative_path, "No episode marker, skipping");
            return Ok(None);
        };
        let Some(episode_number) = marker.episode else {
            debug!(path = %file.relative_path, "Season marker without episode, skipping");
            return Ok(None);
        };

        match self.store.get_episode_file_by_path(&file.relative_path) {
            Ok(_) => return Ok(None),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let series = self.get_or_create_discovered_series(directory)?;
        let season = self.get_or_create_discovered_season(&series, marker.season)?;
        let created = self
            .store
            .create_episode_file(file.size_bytes, &file.relative_path, None)?;

        match self.store.get_episode_by_number(season.id, episode_number) {
            Ok(episode) => {
                if episode.episode_file_id.is_none() {
                    self.store.link_episode_file(episode.id, created.id)?;
                }
            }
            Err(e) if e.is_not_found() => {
                self.store.create_episode(
                    &NewEpisode {
                        season_id: season.id,
                        number: episode_number,
                        monitored: false,
                        episode_metadata_id: None,
                        episode_file_id: Some(created.id),
                    },
                    EpisodeState::Discovered,
                )?;
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Some(season.id))
    }

    fn get_or_create_discovered_series(&self, directory: &str) -> Result<Series, ReconcileError> {
        match self.store.get_series_by_path(directory) {
            Ok(series) => Ok(series),
            Err(e) if e.is_not_found() => {
                info!(path = %directory, "Discovered series");
                Ok(self.store.create_series(
                    &NewSeries {
                        path: Some(directory.to_string()),
                        ..Default::default()
                    },
                    SeriesState::Discovered,
                )?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_or_create_discovered_season(
        &self,
        series: &Series,
        number: u32,
    ) -> Result<Season, ReconcileError> {
        match self.store.get_season_by_number(series.id, number) {
            Ok(season) => Ok(season),
            Err(e) if e.is_not_found() => Ok(self.store.create_season(
                &NewSeason {
                    series_id: series.id,
                    number,
                    monitored: series.monitored,
                    season_metadata_id: None,
                },
                SeriesState::Discovered,
            )?),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored indexer list with the indexer manager's.
    pub async fn sync_indexers(&self) -> Result<usize, ReconcileError> {
        let indexers = self.indexers.list_indexers().await?;
        self.store.replace_indexers(&indexers)?;
        info!(
            indexers = indexers.len(),
            enabled = indexers.iter().filter(|i| i.enabled).count(),
            "Synced indexers"
        );
        Ok(indexers.len())
    }

    /// Build a client from `config` and list its downloads. Returns the
    /// number of downloads the client reports.
    pub async fn test_download_client(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<usize, ReconcileError> {
        let client = self.download_clients.create(config)?;
        let downloads = client.list().await?;
        debug!(
            client = client.name(),
            url = %config.base_url(),
            downloads = downloads.len(),
            "Download client reachable"
        );
        Ok(downloads.len())
    }
}
