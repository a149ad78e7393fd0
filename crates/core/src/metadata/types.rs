//! Provider-side metadata shapes, before they are persisted.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Full details of a movie as returned by the metadata provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetails {
    pub tmdb_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
}

/// A search hit. Search results are ranked by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub tmdb_id: i64,
    pub title: String,
    /// Release date for movies, first air date for series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

/// A series with its full season/episode breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesDetails {
    pub tmdb_id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_air_date: Option<NaiveDate>,
    /// Provider status, e.g. "Returning Series" or "Ended".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonDetails>,
}

impl SeriesDetails {
    pub fn episode_count(&self) -> u32 {
        self.seasons.iter().map(|s| s.episodes.len() as u32).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeasonDetails {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<NaiveDate>,
    #[serde(default)]
    pub episodes: Vec<EpisodeDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EpisodeDetails {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub air_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_count_spans_seasons() {
        let episode = |number| EpisodeDetails {
            number,
            title: None,
            runtime_minutes: Some(42),
            air_date: None,
        };
        let details = SeriesDetails {
            tmdb_id: 1399,
            title: "Game of Thrones".to_string(),
            first_air_date: None,
            last_air_date: None,
            status: Some("Ended".to_string()),
            seasons: vec![
                SeasonDetails {
                    number: 1,
                    title: None,
                    air_date: None,
                    episodes: vec![episode(1), episode(2)],
                },
                SeasonDetails {
                    number: 2,
                    title: None,
                    air_date: None,
                    episodes: vec![episode(1)],
                },
            ],
        };
        assert_eq!(details.episode_count(), 3);
    }
}
