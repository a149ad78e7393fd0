//! Release rejection and ranking.
//!
//! Pure functions: every check takes the release, the expected identity of
//! the media, its runtime and the quality ladder, and either returns the
//! first quality band the release fits or the reason it was rejected.

use std::collections::HashSet;
use std::fmt;

use crate::media::{Protocol, QualityDefinition, QualityProfile};
use crate::searcher::ReleaseCandidate;

use super::parse_episode_marker;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Why a release was not acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Title does not start with the expected title.
    TitleMismatch,
    /// No download client handles the release's protocol.
    ProtocolUnavailable,
    /// Season number missing or different (or an episode release where a
    /// season pack was expected).
    SeasonMismatch,
    EpisodeMismatch,
    /// Size per minute of runtime outside every quality band.
    QualityOutOfRange,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::TitleMismatch => "title_mismatch",
            Rejection::ProtocolUnavailable => "protocol_unavailable",
            Rejection::SeasonMismatch => "season_mismatch",
            Rejection::EpisodeMismatch => "episode_mismatch",
            Rejection::QualityOutOfRange => "quality_out_of_range",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Megabytes per minute of runtime. A zero runtime yields a ratio of 0.0.
pub fn size_ratio(size_bytes: u64, runtime_minutes: u32) -> f64 {
    if runtime_minutes == 0 {
        return 0.0;
    }
    size_bytes as f64 / BYTES_PER_MB / runtime_minutes as f64
}

impl QualityProfile {
    /// First band, from lowest quality up, whose inclusive `[min, max]`
    /// range contains the release's size ratio.
    pub fn matching_quality(
        &self,
        size_bytes: u64,
        runtime_minutes: u32,
    ) -> Option<&QualityDefinition> {
        let ratio = size_ratio(size_bytes, runtime_minutes);
        self.qualities.iter().find(|q| q.accepts_ratio(ratio))
    }
}

fn check_common<'a>(
    release: &ReleaseCandidate,
    title: &str,
    runtime_minutes: u32,
    profile: &'a QualityProfile,
    protocols: &HashSet<Protocol>,
) -> Result<&'a QualityDefinition, Rejection> {
    if !release.title.trim().starts_with(title.trim()) {
        return Err(Rejection::TitleMismatch);
    }
    if !protocols.contains(&release.protocol) {
        return Err(Rejection::ProtocolUnavailable);
    }
    profile
        .matching_quality(release.size_bytes, runtime_minutes)
        .ok_or(Rejection::QualityOutOfRange)
}

/// Check a release for a movie.
pub fn check_movie_release<'a>(
    release: &ReleaseCandidate,
    title: &str,
    runtime_minutes: u32,
    profile: &'a QualityProfile,
    protocols: &HashSet<Protocol>,
) -> Result<&'a QualityDefinition, Rejection> {
    check_common(release, title, runtime_minutes, profile, protocols)
}

/// Check a release as a full-season pack. `runtime_minutes` is the
/// estimated runtime of the whole season.
pub fn check_season_release<'a>(
    release: &ReleaseCandidate,
    title: &str,
    season: u32,
    runtime_minutes: u32,
    profile: &'a QualityProfile,
    protocols: &HashSet<Protocol>,
) -> Result<&'a QualityDefinition, Rejection> {
    match parse_episode_marker(&release.title) {
        Some(marker) if marker.season == season && marker.episode.is_none() => {}
        _ => return Err(Rejection::SeasonMismatch),
    }
    check_common(release, title, runtime_minutes, profile, protocols)
}

/// Check a release for a single episode.
pub fn check_episode_release<'a>(
    release: &ReleaseCandidate,
    title: &str,
    season: u32,
    episode: u32,
    runtime_minutes: u32,
    profile: &'a QualityProfile,
    protocols: &HashSet<Protocol>,
) -> Result<&'a QualityDefinition, Rejection> {
    let marker = parse_episode_marker(&release.title).ok_or(Rejection::SeasonMismatch)?;
    if marker.season != season {
        return Err(Rejection::SeasonMismatch);
    }
    if marker.episode != Some(episode) {
        return Err(Rejection::EpisodeMismatch);
    }
    check_common(release, title, runtime_minutes, profile, protocols)
}

/// Sort ascending by seeders; unknown seeders count as zero. Stable, so
/// releases with equal seeders keep their search order.
pub fn sort_by_seeders(releases: &mut [ReleaseCandidate]) {
    releases.sort_by_key(|r| r.seeders.unwrap_or(0));
}
