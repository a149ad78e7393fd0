//! Series, season and episode lifecycles.
//!
//! Releases are searched once per series by title and reused for every
//! season that needs them. A season whose episodes are all missing is
//! first tried as a season pack; otherwise each missing episode is searched
//! for on its own. Every episode state write re-derives the season state,
//! and a season that becomes `Completed` or `Downloading` re-derives the
//! series state.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::library::is_video_file;
use crate::media::{
    DownloadLink, EntityKind, Episode, EpisodeMetadata, EpisodeState, NewEpisode, NewSeason,
    QualityProfile, Season, SeasonMetadata, SeasonState, Series, SeriesMetadata, SeriesState,
    StorageError,
};
use crate::metadata::{SeasonDetails, SeriesDetails};
use crate::metrics::{DOWNLOADS_REQUESTED, STATE_TRANSITIONS};
use crate::release::{
    check_episode_release, check_season_release, parse_episode_marker, search_term_from_path,
    EpisodeMarker,
};
use crate::searcher::ReleaseCandidate;

use super::aggregate::{determine_season_state, determine_series_state};
use super::{
    check_cancelled, first_error, record_failure, record_rejection, ReconcileError,
    ReconcileSnapshot, Reconciler,
};

/// What every season and episode step of one series needs.
struct SeriesContext {
    series: Series,
    title: String,
    profile: QualityProfile,
}

/// Stored metadata for one provider season, next to the provider details
/// it was created from.
struct SeasonMetadataTree<'a> {
    metadata: SeasonMetadata,
    details: &'a SeasonDetails,
    /// Parallel to `details.episodes`.
    episodes: Vec<EpisodeMetadata>,
}

/// Estimated runtime of a whole season in minutes.
///
/// Episodes without a known runtime are counted at the average of the known
/// ones. With no known runtime at all the estimate is 0.
pub fn get_season_runtime(runtimes: &[Option<u32>], total: usize) -> u32 {
    let known: Vec<u32> = runtimes.iter().flatten().copied().collect();
    if known.is_empty() {
        return 0;
    }

    let sum: u32 = known.iter().sum();
    let unknown = total.saturating_sub(known.len()) as u32;
    sum + sum / known.len() as u32 * unknown
}

impl Reconciler {
    /// One series pass: the missing, continuing, downloading and discovered
    /// sweeps run concurrently against the same snapshot.
    pub async fn reconcile_series(&self, cancel: &CancellationToken) -> Result<(), ReconcileError> {
        check_cancelled(cancel)?;
        let snapshot = self.build_snapshot()?;

        let (missing, continuing, downloading, discovered) = tokio::join!(
            self.reconcile_missing_series(&snapshot, cancel),
            self.reconcile_continuing_series(&snapshot, cancel),
            self.reconcile_downloading_series(&snapshot, cancel),
            self.reconcile_discovered_episodes(&snapshot, cancel),
        );

        first_error([missing, continuing, downloading, discovered])
    }

    pub async fn reconcile_missing_series(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        for series in self.store.list_series_by_state(SeriesState::Missing)? {
            check_cancelled(cancel)?;
            if !series.monitored {
                continue;
            }
            if let Err(e) = self.reconcile_missing_series_entry(snapshot, &series).await {
                record_failure(EntityKind::Series, series.id, &e);
            }
        }
        Ok(())
    }

    /// Continuing series, and unreleased ones waiting for their first
    /// episodes to air.
    pub async fn reconcile_continuing_series(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let mut series_list = self.store.list_series_by_state(SeriesState::Continuing)?;
        series_list.extend(self.store.list_series_by_state(SeriesState::Unreleased)?);

        for series in series_list {
            check_cancelled(cancel)?;
            if !series.monitored {
                continue;
            }
            if let Err(e) = self.reconcile_continuing_series_entry(snapshot, &series).await {
                record_failure(EntityKind::Series, series.id, &e);
            }
        }
        Ok(())
    }

    /// Poll downloading episodes, one client call per download.
    pub async fn reconcile_downloading_series(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let mut downloads: BTreeMap<(i64, String), Vec<Episode>> = BTreeMap::new();
        for episode in self.store.list_episodes_by_state(EpisodeState::Downloading)? {
            match &episode.download {
                Some(link) => downloads
                    .entry((link.download_client_id, link.download_id.clone()))
                    .or_default()
                    .push(episode),
                None => warn!(episode_id = episode.id, "Downloading episode has no download link"),
            }
        }

        for ((client_id, download_id), episodes) in downloads {
            check_cancelled(cancel)?;
            if let Err(e) = self
                .reconcile_downloading_episodes(snapshot, client_id, &download_id, &episodes)
                .await
            {
                for episode in &episodes {
                    record_failure(EntityKind::Episode, episode.id, &e);
                }
            }
        }
        Ok(())
    }

    pub async fn reconcile_discovered_episodes(
        &self,
        snapshot: &ReconcileSnapshot,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        for episode in self.store.list_episodes_by_state(EpisodeState::Discovered)? {
            check_cancelled(cancel)?;
            if let Err(e) = self.link_discovered_episode(snapshot, &episode).await {
                record_failure(EntityKind::Episode, episode.id, &e);
            }
        }
        Ok(())
    }

    /// Search once for the series and reconcile every monitored missing
    /// season. A series without any seasons yet is populated from the
    /// provider first.
    pub async fn reconcile_missing_series_entry(
        &self,
        snapshot: &ReconcileSnapshot,
        series: &Series,
    ) -> Result<(), ReconcileError> {
        let Some(ctx) = self.series_context(series)? else {
            debug!(series_id = series.id, "Series not searchable, skipping");
            return Ok(());
        };

        let mut seasons = self.store.list_seasons(series.id)?;
        if seasons.is_empty() {
            self.refresh_series_episodes(snapshot, series).await?;
            seasons = self.store.list_seasons(series.id)?;
        }

        let targets: Vec<Season> = seasons
            .into_iter()
            .filter(|season| season.monitored && season.state == SeriesState::Missing)
            .collect();

        self.reconcile_seasons(snapshot, &ctx, &targets).await
    }

    /// Refresh season and episode metadata, then reconcile every monitored
    /// season that has missing episodes.
    pub async fn reconcile_continuing_series_entry(
        &self,
        snapshot: &ReconcileSnapshot,
        series: &Series,
    ) -> Result<(), ReconcileError> {
        self.refresh_series_episodes(snapshot, series).await?;

        let Some(ctx) = self.series_context(series)? else {
            debug!(series_id = series.id, "Series not searchable, skipping");
            return Ok(());
        };

        let mut targets = Vec::new();
        for season in self.store.list_seasons(series.id)? {
            if !season.monitored {
                continue;
            }
            let episodes = self.store.list_episodes(season.id)?;
            if episodes.iter().any(|e| e.state == EpisodeState::Missing) {
                targets.push(season);
            }
        }

        self.reconcile_seasons(snapshot, &ctx, &targets).await
    }

    async fn reconcile_seasons(
        &self,
        snapshot: &ReconcileSnapshot,
        ctx: &SeriesContext,
        seasons: &[Season],
    ) -> Result<(), ReconcileError> {
        if seasons.is_empty() {
            return Ok(());
        }

        let releases = self
            .search_releases(snapshot, &self.config.tv_categories, &ctx.title, "series")
            .await?;

        for season in seasons {
            if let Err(e) = self.reconcile_season(snapshot, ctx, season, &releases).await {
                record_failure(EntityKind::Season, season.id, &e);
            }
        }
        Ok(())
    }

    /// Try a season pack when every episode is missing, otherwise (or when
    /// no pack qualifies) reconcile missing episodes one by one.
    async fn reconcile_season(
        &self,
        snapshot: &ReconcileSnapshot,
        ctx: &SeriesContext,
        season: &Season,
        releases: &[ReleaseCandidate],
    ) -> Result<(), ReconcileError> {
        let episodes = self.store.list_episodes(season.id)?;
        if episodes.is_empty() {
            debug!(season_id = season.id, "Season has no episodes, skipping");
            return Ok(());
        }

        let all_missing = episodes.iter().all(|e| e.state == EpisodeState::Missing);
        if all_missing
            && self
                .reconcile_season_pack(snapshot, ctx, season, &episodes, releases)
                .await?
        {
            return Ok(());
        }

        for episode in episodes
            .iter()
            .filter(|e| e.monitored && e.state == EpisodeState::Missing)
        {
            if let Err(e) = self
                .reconcile_missing_episode(snapshot, ctx, season, episode, releases)
                .await
            {
                record_failure(EntityKind::Episode, episode.id, &e);
            }
        }
        Ok(())
    }

    /// Request the first acceptable season pack in seeder order for
    /// `season`. Returns `false` when no release qualifies.
    ///
    /// Episodes whose state update fails after the download was requested
    /// are logged and left as they are; a later pass picks them up.
    async fn reconcile_season_pack(
        &self,
        snapshot: &ReconcileSnapshot,
        ctx: &SeriesContext,
        season: &Season,
        episodes: &[Episode],
        releases: &[ReleaseCandidate],
    ) -> Result<bool, ReconcileError> {
        let runtimes = episodes
            .iter()
            .map(|episode| self.episode_runtime(episode))
            .collect::<Result<Vec<_>, _>>()?;
        let runtime = get_season_runtime(&runtimes, episodes.len());

        // Releases are sorted ascending by seeders.
        let release = releases.iter().find(|release| {
            match check_season_release(
                release,
                &ctx.title,
                season.number,
                runtime,
                &ctx.profile,
                snapshot.protocols(),
            ) {
                Ok(_) => true,
                Err(reason) => {
                    record_rejection(release, reason);
                    false
                }
            }
        });

        let Some(release) = release else {
            debug!(
                series_id = ctx.series.id,
                season = season.number,
                "No acceptable season pack"
            );
            return Ok(false);
        };

        let client = snapshot.client_for_protocol(release.protocol).ok_or_else(|| {
            ReconcileError::MissingData(format!("no download client for {}", release.protocol))
        })?;
        let download_id = client.client.add(release).await?;
        DOWNLOADS_REQUESTED.with_label_values(&["season_pack"]).inc();
        info!(
            series_id = ctx.series.id,
            season = season.number,
            release = %release.title,
            download_id = %download_id,
            "Requested season pack download"
        );

        let link = DownloadLink::new(download_id, client.config.id).entire_season();
        for episode in episodes {
            if let Err(e) = self.update_episode_state(episode, EpisodeState::Downloading, Some(&link))
            {
                record_failure(EntityKind::Episode, episode.id, &e);
            }
        }
        Ok(true)
    }

    /// Search results for one missing episode; the highest-seeded
    /// acceptable release is requested.
    async fn reconcile_missing_episode(
        &self,
        snapshot: &ReconcileSnapshot,
        ctx: &SeriesContext,
        season: &Season,
        episode: &Episode,
        releases: &[ReleaseCandidate],
    ) -> Result<(), ReconcileError> {
        let Some(metadata_id) = episode.episode_metadata_id else {
            debug!(episode_id = episode.id, "Episode has no metadata, skipping");
            return Ok(());
        };
        let metadata = self.store.get_episode_metadata(metadata_id)?;

        let Some(runtime) = metadata.runtime_minutes else {
            debug!(episode_id = episode.id, "Episode runtime unknown, skipping");
            return Ok(());
        };
        if let Some(air_date) = metadata.air_date {
            if air_date > snapshot.time().date_naive() {
                debug!(episode_id = episode.id, %air_date, "Episode not aired yet, skipping");
                return Ok(());
            }
        }

        let accepted: Vec<_> = releases
            .iter()
            .filter(|release| {
                match check_episode_release(
                    release,
                    &ctx.title,
                    season.number,
                    episode.number,
                    runtime,
                    &ctx.profile,
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
                episode_id = episode.id,
                season = season.number,
                episode = episode.number,
                "No acceptable episode release"
            );
            return Ok(());
        };

        let client = snapshot.client_for_protocol(release.protocol).ok_or_else(|| {
            ReconcileError::MissingData(format!("no download client for {}", release.protocol))
        })?;
        let download_id = client.client.add(release).await?;
        DOWNLOADS_REQUESTED.with_label_values(&["episode"]).inc();
        info!(
            episode_id = episode.id,
            release = %release.title,
            download_id = %download_id,
            "Requested episode download"
        );

        let link = DownloadLink::new(download_id, client.config.id);
        self.update_episode_state(episode, EpisodeState::Downloading, Some(&link))?;
        Ok(())
    }

    /// Pull the series from the metadata provider and create the seasons and
    /// episodes that do not exist yet.
    ///
    /// New episodes start `Missing` once aired and `Unreleased` otherwise
    /// (including when the air date is unknown). Existing `Unreleased`
    /// episodes that have aired since become `Missing`.
    pub async fn refresh_series_episodes(
        &self,
        snapshot: &ReconcileSnapshot,
        series: &Series,
    ) -> Result<(), ReconcileError> {
        let metadata_id = series.series_metadata_id.ok_or_else(|| {
            ReconcileError::MissingData(format!("series {} has no metadata", series.id))
        })?;
        let series_metadata = self.store.get_series_metadata(metadata_id)?;
        let details = self.metadata.series_details(series_metadata.tmdb_id).await?;
        let today = snapshot.time().date_naive();

        for tree in self.store_metadata_tree(series_metadata.id, &details)? {
            let number = tree.details.number;
            let season = match self.store.get_season_by_number(series.id, number) {
                Ok(season) => {
                    if season.season_metadata_id.is_none() {
                        self.store.link_season_metadata(season.id, tree.metadata.id)?;
                    }
                    season
                }
                Err(e) if e.is_not_found() => {
                    info!(series_id = series.id, season = number, "Adding season");
                    self.store.create_season(
                        &NewSeason {
                            series_id: series.id,
                            number,
                            monitored: series.monitored,
                            season_metadata_id: Some(tree.metadata.id),
                        },
                        SeriesState::Unreleased,
                    )?
                }
                Err(e) => return Err(e.into()),
            };

            for (metadata, details) in tree.episodes.iter().zip(&tree.details.episodes) {
                let aired = details.air_date.is_some_and(|date| date <= today);

                match self.store.get_episode_by_number(season.id, details.number) {
                    Ok(episode) => {
                        if episode.episode_metadata_id.is_none() {
                            self.store.link_episode_metadata(episode.id, metadata.id)?;
                        }
                        if episode.state == EpisodeState::Unreleased && aired {
                            self.update_episode_state(&episode, EpisodeState::Missing, None)?;
                        }
                    }
                    Err(e) if e.is_not_found() => {
                        let state = if aired {
                            EpisodeState::Missing
                        } else {
                            EpisodeState::Unreleased
                        };
                        self.store.create_episode(
                            &NewEpisode {
                                season_id: season.id,
                                number: details.number,
                                monitored: season.monitored,
                                episode_metadata_id: Some(metadata.id),
                                episode_file_id: None,
                            },
                            state,
                        )?;
                        debug!(
                            series_id = series.id,
                            season = number,
                            episode = details.number,
                            state = %state,
                            "Added episode"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            self.evaluate_season_state(season.id)?;
        }

        self.evaluate_series_state(series.id)?;
        Ok(())
    }

    /// Import the files of one finished download.
    ///
    /// A single-episode download takes its first video file. Season pack
    /// files are matched to episodes by their `SxxEyy` marker, so a retry
    /// after a partial import still finds the right file.
    /// An episode whose import fails stays `Downloading`.
    pub async fn reconcile_downloading_episodes(
        &self,
        snapshot: &ReconcileSnapshot,
        download_client_id: i64,
        download_id: &str,
        episodes: &[Episode],
    ) -> Result<(), ReconcileError> {
        let Some(client) = snapshot.client(download_client_id) else {
            warn!(
                download_client_id,
                download_id, "Download client not available, skipping"
            );
            return Ok(());
        };

        let status = client.client.get(download_id).await?;
        if !status.done {
            debug!(download_id, progress = status.progress, "Download still in progress");
            return Ok(());
        }

        let videos: Vec<&PathBuf> = status
            .file_paths
            .iter()
            .filter(|path| is_video_file(path))
            .collect();

        for episode in episodes {
            if let Err(e) = self.import_episode(episode, &videos).await {
                record_failure(EntityKind::Episode, episode.id, &e);
            }
        }
        Ok(())
    }

    async fn import_episode(
        &self,
        episode: &Episode,
        videos: &[&PathBuf],
    ) -> Result<(), ReconcileError> {
        let season = self.store.get_season(episode.season_id)?;
        let series = self.store.get_series(season.series_id)?;

        let pack = episode
            .download
            .as_ref()
            .is_some_and(|link| link.is_entire_season_download);
        let source = if !pack {
            videos.first().copied()
        } else {
            videos.iter().copied().find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .and_then(parse_episode_marker)
                    .is_some_and(|m| m.season == season.number && m.episode == Some(episode.number))
            })
        };
        let source = source.ok_or_else(|| {
            ReconcileError::MissingData(format!(
                "no file for S{:02}E{:02} in download",
                season.number, episode.number
            ))
        })?;

        let directory = self.series_directory(&series)?;
        let placed = self
            .library
            .add_episode(&directory, season.number, source)
            .await?;
        let original = source.to_string_lossy();
        let file = self.store.create_episode_file(
            placed.size_bytes,
            &placed.relative_path,
            Some(original.as_ref()),
        )?;
        self.store.link_episode_file(episode.id, file.id)?;
        self.update_episode_state(episode, EpisodeState::Downloaded, None)?;
        Ok(())
    }

    /// Link an episode found on disk to provider metadata by the marker in
    /// its file name, then mark it `Completed`.
    ///
    /// Episode metadata already linked to another episode stays with that
    /// episode.
    pub async fn link_discovered_episode(
        &self,
        _snapshot: &ReconcileSnapshot,
        episode: &Episode,
    ) -> Result<(), ReconcileError> {
        if episode.episode_metadata_id.is_some() {
            self.update_episode_state(episode, EpisodeState::Completed, None)?;
            return Ok(());
        }

        let file_id = episode.episode_file_id.ok_or_else(|| {
            ReconcileError::MissingData(format!("episode {} has no file", episode.id))
        })?;
        let file = self.store.get_episode_file(file_id)?;
        let file_name = file.relative_path.rsplit('/').next().unwrap_or_default();
        let Some(EpisodeMarker {
            season: season_number,
            episode: Some(episode_number),
        }) = parse_episode_marker(file_name)
        else {
            return Err(ReconcileError::MissingData(format!(
                "no episode marker in {}",
                file.relative_path
            )));
        };

        let season = self.store.get_season(episode.season_id)?;
        let series = self.store.get_series(season.series_id)?;

        let Some(series_metadata) = self.ensure_series_metadata(&series).await? else {
            return Ok(());
        };

        let season_metadata = match self.find_season_metadata(series_metadata.id, season_number)? {
            Some(metadata) => metadata,
            None => {
                let details = self.metadata.series_details(series_metadata.tmdb_id).await?;
                self.store_metadata_tree(series_metadata.id, &details)?;
                match self.find_season_metadata(series_metadata.id, season_number)? {
                    Some(metadata) => metadata,
                    None => {
                        info!(
                            episode_id = episode.id,
                            season = season_number,
                            "No season metadata for discovered episode"
                        );
                        return Ok(());
                    }
                }
            }
        };

        if season.season_metadata_id.is_none() && season.number == season_number {
            self.store.link_season_metadata(season.id, season_metadata.id)?;
        }

        let Some(episode_metadata) = self
            .store
            .list_episode_metadata(season_metadata.id)?
            .into_iter()
            .find(|m| m.number == episode_number)
        else {
            info!(
                episode_id = episode.id,
                season = season_number,
                episode = episode_number,
                "No episode metadata for discovered episode"
            );
            return Ok(());
        };

        match self.store.get_episode_by_metadata(episode_metadata.id) {
            Ok(other) if other.id != episode.id => {
                warn!(
                    episode_id = episode.id,
                    linked_episode_id = other.id,
                    metadata_id = episode_metadata.id,
                    "Episode metadata already linked to another episode"
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                self.store.link_episode_metadata(episode.id, episode_metadata.id)?;
            }
            Err(e) => return Err(e.into()),
        }

        self.update_episode_state(episode, EpisodeState::Completed, None)?;
        Ok(())
    }

    /// Write an episode state and cascade to its season.
    pub fn update_episode_state(
        &self,
        episode: &Episode,
        state: EpisodeState,
        download: Option<&DownloadLink>,
    ) -> Result<Episode, ReconcileError> {
        let updated = self.store.update_episode_state(episode.id, state, download)?;
        STATE_TRANSITIONS
            .with_label_values(&["episode", state.as_str()])
            .inc();
        info!(
            episode_id = episode.id,
            from = %episode.state,
            to = %state,
            "Episode state changed"
        );

        self.evaluate_season_state(episode.season_id)?;
        Ok(updated)
    }

    /// Re-derive a season's state from its episodes. Unchanged states are
    /// not written. A season that becomes `Completed` or `Downloading`
    /// cascades to its series.
    pub fn evaluate_season_state(&self, season_id: i64) -> Result<SeasonState, ReconcileError> {
        let season = self.store.get_season(season_id)?;
        let states: Vec<EpisodeState> = self
            .store
            .list_episodes(season_id)?
            .iter()
            .map(|e| e.state)
            .collect();

        let state = determine_season_state(&states);
        if state == season.state {
            return Ok(state);
        }

        self.store.update_season_state(season_id, state)?;
        STATE_TRANSITIONS
            .with_label_values(&["season", state.as_str()])
            .inc();
        debug!(season_id, from = %season.state, to = %state, "Season state changed");

        if matches!(state, SeriesState::Completed | SeriesState::Downloading) {
            self.evaluate_series_state(season.series_id)?;
        }
        Ok(state)
    }

    /// Re-derive a series' state from its seasons. Unchanged states are not
    /// written.
    pub fn evaluate_series_state(&self, series_id: i64) -> Result<SeriesState, ReconcileError> {
        let series = self.store.get_series(series_id)?;
        let states: Vec<SeasonState> = self
            .store
            .list_seasons(series_id)?
            .iter()
            .map(|s| s.state)
            .collect();

        let state = determine_series_state(&states);
        if state == series.state {
            return Ok(state);
        }

        self.store.update_series_state(series_id, state)?;
        STATE_TRANSITIONS
            .with_label_values(&["series", state.as_str()])
            .inc();
        info!(series_id, from = %series.state, to = %state, "Series state changed");
        Ok(state)
    }

    fn series_context(&self, series: &Series) -> Result<Option<SeriesContext>, ReconcileError> {
        let (Some(metadata_id), Some(profile_id)) =
            (series.series_metadata_id, series.quality_profile_id)
        else {
            return Ok(None);
        };

        let metadata = self.store.get_series_metadata(metadata_id)?;
        let profile = self.store.get_quality_profile(profile_id)?;
        Ok(Some(SeriesContext {
            series: series.clone(),
            title: metadata.title,
            profile,
        }))
    }

    fn episode_runtime(&self, episode: &Episode) -> Result<Option<u32>, ReconcileError> {
        match episode.episode_metadata_id {
            Some(id) => Ok(self.store.get_episode_metadata(id)?.runtime_minutes),
            None => Ok(None),
        }
    }

    fn series_directory(&self, series: &Series) -> Result<String, ReconcileError> {
        if let Some(path) = &series.path {
            return Ok(path.clone());
        }
        match series.series_metadata_id {
            Some(id) => Ok(self.store.get_series_metadata(id)?.title),
            None => Err(ReconcileError::MissingData(format!(
                "series {} has neither path nor metadata",
                series.id
            ))),
        }
    }

    /// The series' metadata, searching the provider by directory name and
    /// linking the first match when none is linked yet. `None` when the
    /// provider knows no match.
    async fn ensure_series_metadata(
        &self,
        series: &Series,
    ) -> Result<Option<SeriesMetadata>, ReconcileError> {
        if let Some(id) = series.series_metadata_id {
            return Ok(Some(self.store.get_series_metadata(id)?));
        }

        let path = series.path.as_deref().ok_or_else(|| {
            ReconcileError::MissingData(format!("series {} has no path", series.id))
        })?;
        let term = search_term_from_path(path);
        let results = self.metadata.search_series(&term).await?;
        let Some(first) = results.first() else {
            info!(series_id = series.id, term = %term, "No metadata match for series");
            return Ok(None);
        };
        if results.len() > 1 {
            warn!(
                series_id = series.id,
                term = %term,
                matches = results.len(),
                tmdb_id = first.tmdb_id,
                "Ambiguous metadata match, using first result"
            );
        }

        let metadata = match self.store.get_series_metadata_by_tmdb(first.tmdb_id) {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                let details = self.metadata.series_details(first.tmdb_id).await?;
                let metadata = self.store.create_series_metadata(&details)?;
                self.store_metadata_tree(metadata.id, &details)?;
                metadata
            }
            Err(e) => return Err(e.into()),
        };

        self.store.link_series_metadata(series.id, metadata.id)?;
        info!(series_id = series.id, tmdb_id = metadata.tmdb_id, "Linked series metadata");
        Ok(Some(metadata))
    }

    fn find_season_metadata(
        &self,
        series_metadata_id: i64,
        number: u32,
    ) -> Result<Option<SeasonMetadata>, StorageError> {
        Ok(self
            .store
            .list_season_metadata(series_metadata_id)?
            .into_iter()
            .find(|m| m.number == number))
    }

    /// Store season and episode metadata rows that do not exist yet.
    fn store_metadata_tree<'a>(
        &self,
        series_metadata_id: i64,
        details: &'a SeriesDetails,
    ) -> Result<Vec<SeasonMetadataTree<'a>>, StorageError> {
        let existing_seasons = self.store.list_season_metadata(series_metadata_id)?;
        let mut tree = Vec::with_capacity(details.seasons.len());

        for season in &details.seasons {
            let metadata = match existing_seasons.iter().find(|m| m.number == season.number) {
                Some(metadata) => metadata.clone(),
                None => self.store.create_season_metadata(series_metadata_id, season)?,
            };

            let existing_episodes = self.store.list_episode_metadata(metadata.id)?;
            let mut episodes = Vec::with_capacity(season.episodes.len());
            for episode in &season.episodes {
                let episode_metadata =
                    match existing_episodes.iter().find(|m| m.number == episode.number) {
                        Some(m) => m.clone(),
                        None => self.store.create_episode_metadata(metadata.id, episode)?,
                    };
                episodes.push(episode_metadata);
            }

            tree.push(SeasonMetadataTree {
                metadata,
                details: season,
                episodes,
            });
        }
        Ok(tree)
    }
}
