//! Release evaluation: title parsing, quality checks and ranking.

mod parse;
mod selection;

pub use parse::{parse_episode_marker, search_term_from_path, EpisodeMarker};
pub use selection::{
    check_episode_release, check_movie_release, check_season_release, size_ratio,
    sort_by_seeders, Rejection,
};
