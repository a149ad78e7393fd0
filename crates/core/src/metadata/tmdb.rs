//! TMDB (The Movie Database) API client.
//!
//! TMDB requires an API key for access.
//! Rate limits are generous (around 40 requests per second).

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{EpisodeDetails, MovieDetails, SearchResult, SeasonDetails, SeriesDetails};
use super::{MetadataError, MetadataProvider};

/// Configuration for the TMDB client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    pub api_key: String,
    /// Defaults to `https://api.themoviedb.org/3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// TMDB API client.
pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: TmdbConfig) -> Result<Self, MetadataError> {
        if config.api_key.is_empty() {
            return Err(MetadataError::NotConfigured(
                "TMDB API key is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.themoviedb.org/3".to_string());

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        what: &str,
    ) -> Result<T, MetadataError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(query)
            .send()
            .await?;

        let response = check_status(response, what).await?;

        response
            .json()
            .await
            .map_err(|e| MetadataError::ParseError(format!("Failed to parse {}: {}", what, e)))
    }

    async fn season_details(
        &self,
        tmdb_id: i64,
        season: u32,
    ) -> Result<SeasonDetails, MetadataError> {
        debug!("TMDB get season: series={}, season={}", tmdb_id, season);

        let details: TmdbSeasonDetails = self
            .get(
                &format!("/tv/{}/season/{}", tmdb_id, season),
                &[],
                &format!("TV series {} season {}", tmdb_id, season),
            )
            .await?;

        Ok(details.into())
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response, MetadataError> {
    let status = response.status();
    if status == 401 {
        return Err(MetadataError::NotConfigured(
            "Invalid TMDB API key".to_string(),
        ));
    }
    if status == 429 {
        return Err(MetadataError::RateLimitExceeded);
    }
    if status == 404 {
        return Err(MetadataError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(MetadataError::ApiError {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(response)
}

#[async_trait]
impl MetadataProvider for TmdbClient {
    async fn search_movies(&self, query: &str) -> Result<Vec<SearchResult>, MetadataError> {
        debug!("TMDB movie search: query='{}'", query);

        let results: TmdbSearchResponse<TmdbMovieResult> = self
            .get("/search/movie", &[("query", query)], "movie search response")
            .await?;

        Ok(results.results.into_iter().map(Into::into).collect())
    }

    async fn movie_details(&self, tmdb_id: i64) -> Result<MovieDetails, MetadataError> {
        debug!("TMDB get movie: id={}", tmdb_id);

        let movie: TmdbMovieDetails = self
            .get(
                &format!("/movie/{}", tmdb_id),
                &[],
                &format!("Movie ID {}", tmdb_id),
            )
            .await?;

        Ok(movie.into())
    }

    async fn search_series(&self, query: &str) -> Result<Vec<SearchResult>, MetadataError> {
        debug!("TMDB TV search: query='{}'", query);

        let results: TmdbSearchResponse<TmdbTvResult> = self
            .get("/search/tv", &[("query", query)], "TV search response")
            .await?;

        Ok(results.results.into_iter().map(Into::into).collect())
    }

    async fn series_details(&self, tmdb_id: i64) -> Result<SeriesDetails, MetadataError> {
        debug!("TMDB get TV: id={}", tmdb_id);

        let tv: TmdbTvDetails = self
            .get(
                &format!("/tv/{}", tmdb_id),
                &[],
                &format!("TV series ID {}", tmdb_id),
            )
            .await?;

        // Season summaries carry no episodes; fetch each season in turn.
        let mut seasons = Vec::with_capacity(tv.seasons.len());
        for summary in &tv.seasons {
            seasons.push(self.season_details(tmdb_id, summary.season_number).await?);
        }

        Ok(SeriesDetails {
            tmdb_id: tv.id,
            title: tv.name,
            first_air_date: parse_date(tv.first_air_date.as_deref()),
            last_air_date: parse_date(tv.last_air_date.as_deref()),
            status: tv.status,
            seasons,
        })
    }
}

/// TMDB reports unknown dates as empty strings.
fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

// ============================================================================
// TMDB API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieResult {
    id: i64,
    title: String,
    release_date: Option<String>,
}

impl From<TmdbMovieResult> for SearchResult {
    fn from(r: TmdbMovieResult) -> Self {
        SearchResult {
            tmdb_id: r.id,
            title: r.title,
            date: parse_date(r.release_date.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetails {
    id: i64,
    title: String,
    release_date: Option<String>,
    runtime: Option<u32>,
    overview: Option<String>,
    poster_path: Option<String>,
}

impl From<TmdbMovieDetails> for MovieDetails {
    fn from(d: TmdbMovieDetails) -> Self {
        MovieDetails {
            tmdb_id: d.id,
            title: d.title,
            // TMDB uses 0 for unknown runtimes.
            runtime_minutes: d.runtime.filter(|r| *r > 0),
            release_date: parse_date(d.release_date.as_deref()),
            overview: d.overview,
            poster_path: d.poster_path,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbTvResult {
    id: i64,
    name: String,
    first_air_date: Option<String>,
}

impl From<TmdbTvResult> for SearchResult {
    fn from(r: TmdbTvResult) -> Self {
        SearchResult {
            tmdb_id: r.id,
            title: r.name,
            date: parse_date(r.first_air_date.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbTvDetails {
    id: i64,
    name: String,
    first_air_date: Option<String>,
    last_air_date: Option<String>,
    status: Option<String>,
    #[serde(default)]
    seasons: Vec<TmdbSeasonSummary>,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonSummary {
    season_number: u32,
}

#[derive(Debug, Deserialize)]
struct TmdbSeasonDetails {
    season_number: u32,
    name: Option<String>,
    air_date: Option<String>,
    #[serde(default)]
    episodes: Vec<TmdbEpisode>,
}

impl From<TmdbSeasonDetails> for SeasonDetails {
    fn from(s: TmdbSeasonDetails) -> Self {
        SeasonDetails {
            number: s.season_number,
            title: s.name,
            air_date: parse_date(s.air_date.as_deref()),
            episodes: s.episodes.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TmdbEpisode {
    episode_number: u32,
    name: Option<String>,
    runtime: Option<u32>,
    air_date: Option<String>,
}

impl From<TmdbEpisode> for EpisodeDetails {
    fn from(e: TmdbEpisode) -> Self {
        EpisodeDetails {
            number: e.episode_number,
            title: e.name,
            runtime_minutes: e.runtime.filter(|r| *r > 0),
            air_date: parse_date(e.air_date.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_api_key() {
        let result = TmdbClient::new(TmdbConfig {
            api_key: String::new(),
            base_url: None,
        });
        assert!(matches!(result, Err(MetadataError::NotConfigured(_))));
    }

    #[test]
    fn test_movie_details_conversion() {
        let details = TmdbMovieDetails {
            id: 603,
            title: "The Matrix".to_string(),
            release_date: Some("1999-03-30".to_string()),
            runtime: Some(136),
            overview: Some("A computer hacker...".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
        };

        let movie: MovieDetails = details.into();
        assert_eq!(movie.tmdb_id, 603);
        assert_eq!(movie.runtime_minutes, Some(136));
        assert_eq!(movie.release_date, NaiveDate::from_ymd_opt(1999, 3, 30));
    }

    #[test]
    fn test_zero_runtime_and_empty_date_are_unknown() {
        let details = TmdbMovieDetails {
            id: 1,
            title: "Untitled".to_string(),
            release_date: Some(String::new()),
            runtime: Some(0),
            overview: None,
            poster_path: None,
        };

        let movie: MovieDetails = details.into();
        assert!(movie.runtime_minutes.is_none());
        assert!(movie.release_date.is_none());
    }

    #[test]
    fn test_season_details_conversion() {
        let json = r#"{
            "season_number": 1,
            "name": "Season 1",
            "air_date": "2008-01-20",
            "episodes": [
                {"episode_number": 1, "name": "Pilot", "runtime": 58, "air_date": "2008-01-20"},
                {"episode_number": 2, "name": "Cat's in the Bag...", "runtime": null, "air_date": null}
            ]
        }"#;

        let season: TmdbSeasonDetails = serde_json::from_str(json).unwrap();
        let season: SeasonDetails = season.into();
        assert_eq!(season.number, 1);
        assert_eq!(season.episodes.len(), 2);
        assert_eq!(season.episodes[0].runtime_minutes, Some(58));
        assert!(season.episodes[1].air_date.is_none());
    }
}
