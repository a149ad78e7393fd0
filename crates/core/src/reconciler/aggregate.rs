//! Derive a season's state from its episodes and a series' state from its
//! seasons.
//!
//! Both use one ordered rule table over child-state counts. The first rule
//! whose predicate holds wins, so the table order is the priority order:
//! active work outranks optimistic states, which outrank pessimistic ones.

use crate::media::{EpisodeState, SeasonState, SeriesState};

/// How many children are in each class of state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub done: usize,
    pub downloading: usize,
    /// Only seasons can be continuing; always 0 for episodes.
    pub continuing: usize,
    pub missing: usize,
    pub unreleased: usize,
    pub discovered: usize,
}

impl StateCounts {
    pub fn from_episodes<'a>(states: impl IntoIterator<Item = &'a EpisodeState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state {
                EpisodeState::Downloaded | EpisodeState::Completed => counts.done += 1,
                EpisodeState::Downloading => counts.downloading += 1,
                EpisodeState::Missing => counts.missing += 1,
                EpisodeState::Unreleased => counts.unreleased += 1,
                EpisodeState::Discovered => counts.discovered += 1,
            }
        }
        counts
    }

    pub fn from_seasons<'a>(states: impl IntoIterator<Item = &'a SeasonState>) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state {
                SeriesState::Completed => counts.done += 1,
                SeriesState::Downloading => counts.downloading += 1,
                SeriesState::Continuing => counts.continuing += 1,
                SeriesState::Missing => counts.missing += 1,
                SeriesState::Unreleased => counts.unreleased += 1,
                SeriesState::Discovered => counts.discovered += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.done
            + self.downloading
            + self.continuing
            + self.missing
            + self.unreleased
            + self.discovered
    }
}

type Rule = (fn(&StateCounts) -> bool, SeriesState);

fn all_done(c: &StateCounts) -> bool {
    c.total() > 0 && c.done == c.total()
}

fn any_downloading(c: &StateCounts) -> bool {
    c.downloading > 0
}

fn continuing(c: &StateCounts) -> bool {
    c.continuing > 0
        || (c.discovered > 0 && c.done + c.missing + c.downloading > 0)
        || (c.unreleased > 0 && c.done + c.missing > 0)
}

fn missing(c: &StateCounts) -> bool {
    c.missing > 0 && c.unreleased == 0
}

fn only_unreleased(c: &StateCounts) -> bool {
    c.unreleased > 0 && c.unreleased == c.total()
}

fn only_discovered(c: &StateCounts) -> bool {
    c.discovered > 0 && c.discovered == c.total()
}

/// Evaluated top to bottom.
const RULES: &[Rule] = &[
    (all_done, SeriesState::Completed),
    (any_downloading, SeriesState::Downloading),
    (continuing, SeriesState::Continuing),
    (missing, SeriesState::Missing),
    (only_unreleased, SeriesState::Unreleased),
    (only_discovered, SeriesState::Discovered),
];

/// Apply the rule table; no matching rule means `Missing`.
pub fn determine_state(counts: &StateCounts) -> SeriesState {
    RULES
        .iter()
        .find(|(applies, _)| applies(counts))
        .map(|(_, state)| *state)
        .unwrap_or(SeriesState::Missing)
}

pub fn determine_season_state(episodes: &[EpisodeState]) -> SeasonState {
    determine_state(&StateCounts::from_episodes(episodes))
}

pub fn determine_series_state(seasons: &[SeasonState]) -> SeriesState {
    determine_state(&StateCounts::from_seasons(seasons))
}
