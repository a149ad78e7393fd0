//! SQLite-backed media store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use super::store::{EntityKind, EntityTransition, MediaStore, StorageError};
use super::types::*;
use crate::job::format_timestamp;
use crate::metadata::{EpisodeDetails, MovieDetails, SeasonDetails, SeriesDetails};

const MOVIE_COLUMNS: &str = "id, path, monitored, quality_profile_id, movie_metadata_id, \
     movie_file_id, state, download_id, download_client_id, is_entire_season_download, added_at";
const SERIES_COLUMNS: &str =
    "id, path, monitored, quality_profile_id, series_metadata_id, state, added_at";
const SEASON_COLUMNS: &str = "id, series_id, number, monitored, season_metadata_id, state";
const EPISODE_COLUMNS: &str = "id, season_id, number, monitored, episode_metadata_id, \
     episode_file_id, state, download_id, download_client_id, is_entire_season_download";
const FILE_COLUMNS: &str = "id, size_bytes, relative_path, original_file_path";
const MOVIE_METADATA_COLUMNS: &str =
    "id, tmdb_id, title, runtime_minutes, release_date, overview, poster_path";
const SERIES_METADATA_COLUMNS: &str =
    "id, tmdb_id, title, first_air_date, last_air_date, season_count, episode_count, status";
const SEASON_METADATA_COLUMNS: &str = "id, series_metadata_id, number, title, air_date";
const EPISODE_METADATA_COLUMNS: &str =
    "id, season_metadata_id, number, title, runtime_minutes, air_date";
const DOWNLOAD_CLIENT_COLUMNS: &str =
    "id, implementation, protocol, scheme, host, port, username, password, api_key";

/// SQLite-backed media store.
pub struct SqliteMediaStore {
    conn: Mutex<Connection>,
}

impl SqliteMediaStore {
    /// Open (or create) the media tables in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory media store (useful for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT,
                monitored INTEGER NOT NULL,
                quality_profile_id INTEGER,
                movie_metadata_id INTEGER,
                movie_file_id INTEGER,
                state TEXT NOT NULL,
                download_id TEXT,
                download_client_id INTEGER,
                is_entire_season_download INTEGER NOT NULL DEFAULT 0,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS movie_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                size_bytes INTEGER NOT NULL,
                relative_path TEXT NOT NULL UNIQUE,
                original_file_path TEXT
            );

            CREATE TABLE IF NOT EXISTS movie_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tmdb_id INTEGER NOT NULL UNIQUE,
                title TEXT NOT NULL,
                runtime_minutes INTEGER,
                release_date TEXT,
                overview TEXT,
                poster_path TEXT
            );

            CREATE TABLE IF NOT EXISTS series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT,
                monitored INTEGER NOT NULL,
                quality_profile_id INTEGER,
                series_metadata_id INTEGER,
                state TEXT NOT NULL,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS series_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tmdb_id INTEGER NOT NULL UNIQUE,
                title TEXT NOT NULL,
                first_air_date TEXT,
                last_air_date TEXT,
                season_count INTEGER NOT NULL,
                episode_count INTEGER NOT NULL,
                status TEXT
            );

            CREATE TABLE IF NOT EXISTS seasons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id INTEGER NOT NULL,
                number INTEGER NOT NULL,
                monitored INTEGER NOT NULL,
                season_metadata_id INTEGER,
                state TEXT NOT NULL,
                UNIQUE (series_id, number)
            );

            CREATE TABLE IF NOT EXISTS season_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_metadata_id INTEGER NOT NULL,
                number INTEGER NOT NULL,
                title TEXT,
                air_date TEXT,
                UNIQUE (series_metadata_id, number)
            );

            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                season_id INTEGER NOT NULL,
                number INTEGER NOT NULL,
                monitored INTEGER NOT NULL,
                episode_metadata_id INTEGER,
                episode_file_id INTEGER,
                state TEXT NOT NULL,
                download_id TEXT,
                download_client_id INTEGER,
                is_entire_season_download INTEGER NOT NULL DEFAULT 0,
                UNIQUE (season_id, number)
            );

            CREATE TABLE IF NOT EXISTS episode_metadata (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                season_metadata_id INTEGER NOT NULL,
                number INTEGER NOT NULL,
                title TEXT,
                runtime_minutes INTEGER,
                air_date TEXT,
                UNIQUE (season_metadata_id, number)
            );

            CREATE TABLE IF NOT EXISTS episode_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                size_bytes INTEGER NOT NULL,
                relative_path TEXT NOT NULL UNIQUE,
                original_file_path TEXT
            );

            CREATE TABLE IF NOT EXISTS quality_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                qualities TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS download_clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                implementation TEXT NOT NULL,
                protocol TEXT NOT NULL,
                scheme TEXT NOT NULL,
                host TEXT NOT NULL,
                port INTEGER NOT NULL,
                username TEXT,
                password TEXT,
                api_key TEXT
            );

            CREATE TABLE IF NOT EXISTS indexers (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                protocol TEXT NOT NULL,
                priority INTEGER NOT NULL,
                enabled INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS entity_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                entity_kind TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                from_state TEXT NOT NULL,
                to_state TEXT NOT NULL,
                download TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_movies_state ON movies(state);
            CREATE INDEX IF NOT EXISTS idx_series_state ON series(state);
            CREATE INDEX IF NOT EXISTS idx_episodes_state ON episodes(state);
            CREATE INDEX IF NOT EXISTS idx_entity_transitions_entity
                ON entity_transitions(entity_kind, entity_id);
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Database(format!("connection lock poisoned: {}", e)))
    }

    /// Set `state` on a row of `table` and append the transition, atomically.
    fn transition(
        &self,
        kind: EntityKind,
        table: &str,
        id: i64,
        to_state: &str,
        download: Option<&DownloadLink>,
    ) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        let from_state: String = query_one(
            &tx,
            &format!("SELECT state FROM {} WHERE id = ?", table),
            params![id],
            |row| row.get(0),
            || format!("{} {}", kind.as_str(), id),
        )?;

        let updated = match download {
            Some(link) => tx.execute(
                &format!(
                    "UPDATE {} SET state = ?, download_id = ?, download_client_id = ?, \
                     is_entire_season_download = ? WHERE id = ?",
                    table
                ),
                params![
                    to_state,
                    link.download_id,
                    link.download_client_id,
                    link.is_entire_season_download,
                    id
                ],
            ),
            None => tx.execute(
                &format!("UPDATE {} SET state = ? WHERE id = ?", table),
                params![to_state, id],
            ),
        };
        updated.map_err(db_err)?;

        let download_json = download
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tx.execute(
            "INSERT INTO entity_transitions (entity_kind, entity_id, from_state, to_state, download, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                kind.as_str(),
                id,
                from_state,
                to_state,
                download_json,
                format_timestamp(Utc::now())
            ],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)
    }

    fn set_column(&self, table: &str, column: &str, id: i64, value: i64) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                &format!("UPDATE {} SET {} = ? WHERE id = ?", table, column),
                params![value, id],
            )
            .map_err(db_err)?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("{} {}", table, id)));
        }
        Ok(())
    }

    fn get_by<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
        what: impl FnOnce() -> String,
    ) -> Result<T, StorageError> {
        let conn = self.conn()?;
        query_one(&conn, sql, params, map, what)
    }

    fn list_by<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, StorageError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_err)?;
        let rows = stmt.query_map(params, map).map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn insert(&self, sql: &str, params: impl Params) -> Result<i64, StorageError> {
        let conn = self.conn()?;
        conn.execute(sql, params).map_err(db_err)?;
        Ok(conn.last_insert_rowid())
    }
}

fn query_one<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: impl FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    what: impl FnOnce() -> String,
) -> Result<T, StorageError> {
    conn.query_row(sql, params, map)
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| StorageError::NotFound(what()))
}

fn db_err(e: rusqlite::Error) -> StorageError {
    match e {
        rusqlite::Error::FromSqlConversionFailure(_, _, inner) => {
            StorageError::Serialization(inner.to_string())
        }
        other => StorageError::Database(other.to_string()),
    }
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = StorageError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
        .transpose()
        .map_err(|e| conversion_err(idx, e))
}

fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn download_cols(row: &Row<'_>, first: usize) -> rusqlite::Result<Option<DownloadLink>> {
    let download_id: Option<String> = row.get(first)?;
    let client_id: Option<i64> = row.get(first + 1)?;
    let entire_season: bool = row.get(first + 2)?;
    Ok(match (download_id, client_id) {
        (Some(download_id), Some(download_client_id)) => Some(DownloadLink {
            download_id,
            download_client_id,
            is_entire_season_download: entire_season,
        }),
        _ => None,
    })
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Movie> {
    Ok(Movie {
        id: row.get(0)?,
        path: row.get(1)?,
        monitored: row.get(2)?,
        quality_profile_id: row.get(3)?,
        movie_metadata_id: row.get(4)?,
        movie_file_id: row.get(5)?,
        state: parse_col(row, 6)?,
        download: download_cols(row, 7)?,
        added_at: timestamp_col(row, 10)?,
    })
}

fn series_from_row(row: &Row<'_>) -> rusqlite::Result<Series> {
    Ok(Series {
        id: row.get(0)?,
        path: row.get(1)?,
        monitored: row.get(2)?,
        quality_profile_id: row.get(3)?,
        series_metadata_id: row.get(4)?,
        state: parse_col(row, 5)?,
        added_at: timestamp_col(row, 6)?,
    })
}

fn season_from_row(row: &Row<'_>) -> rusqlite::Result<Season> {
    Ok(Season {
        id: row.get(0)?,
        series_id: row.get(1)?,
        number: row.get(2)?,
        monitored: row.get(3)?,
        season_metadata_id: row.get(4)?,
        state: parse_col(row, 5)?,
    })
}

fn episode_from_row(row: &Row<'_>) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        season_id: row.get(1)?,
        number: row.get(2)?,
        monitored: row.get(3)?,
        episode_metadata_id: row.get(4)?,
        episode_file_id: row.get(5)?,
        state: parse_col(row, 6)?,
        download: download_cols(row, 7)?,
    })
}

fn movie_file_from_row(row: &Row<'_>) -> rusqlite::Result<MovieFile> {
    Ok(MovieFile {
        id: row.get(0)?,
        size_bytes: row.get::<_, i64>(1)? as u64,
        relative_path: row.get(2)?,
        original_file_path: row.get(3)?,
    })
}

fn episode_file_from_row(row: &Row<'_>) -> rusqlite::Result<EpisodeFile> {
    Ok(EpisodeFile {
        id: row.get(0)?,
        size_bytes: row.get::<_, i64>(1)? as u64,
        relative_path: row.get(2)?,
        original_file_path: row.get(3)?,
    })
}

fn movie_metadata_from_row(row: &Row<'_>) -> rusqlite::Result<MovieMetadata> {
    Ok(MovieMetadata {
        id: row.get(0)?,
        tmdb_id: row.get(1)?,
        title: row.get(2)?,
        runtime_minutes: row.get(3)?,
        release_date: date_col(row, 4)?,
        overview: row.get(5)?,
        poster_path: row.get(6)?,
    })
}

fn series_metadata_from_row(row: &Row<'_>) -> rusqlite::Result<SeriesMetadata> {
    Ok(SeriesMetadata {
        id: row.get(0)?,
        tmdb_id: row.get(1)?,
        title: row.get(2)?,
        first_air_date: date_col(row, 3)?,
        last_air_date: date_col(row, 4)?,
        season_count: row.get(5)?,
        episode_count: row.get(6)?,
        status: row.get(7)?,
    })
}

fn season_metadata_from_row(row: &Row<'_>) -> rusqlite::Result<SeasonMetadata> {
    Ok(SeasonMetadata {
        id: row.get(0)?,
        series_metadata_id: row.get(1)?,
        number: row.get(2)?,
        title: row.get(3)?,
        air_date: date_col(row, 4)?,
    })
}

fn episode_metadata_from_row(row: &Row<'_>) -> rusqlite::Result<EpisodeMetadata> {
    Ok(EpisodeMetadata {
        id: row.get(0)?,
        season_metadata_id: row.get(1)?,
        number: row.get(2)?,
        title: row.get(3)?,
        runtime_minutes: row.get(4)?,
        air_date: date_col(row, 5)?,
    })
}

fn quality_profile_from_row(row: &Row<'_>) -> rusqlite::Result<QualityProfile> {
    let raw: String = row.get(2)?;
    Ok(QualityProfile {
        id: row.get(0)?,
        name: row.get(1)?,
        qualities: serde_json::from_str(&raw).map_err(|e| conversion_err(2, e))?,
    })
}

fn download_client_from_row(row: &Row<'_>) -> rusqlite::Result<DownloadClientConfig> {
    Ok(DownloadClientConfig {
        id: row.get(0)?,
        implementation: row.get(1)?,
        protocol: parse_col(row, 2)?,
        scheme: row.get(3)?,
        host: row.get(4)?,
        port: row.get(5)?,
        username: row.get(6)?,
        password: row.get(7)?,
        api_key: row.get(8)?,
    })
}

fn indexer_from_row(row: &Row<'_>) -> rusqlite::Result<Indexer> {
    Ok(Indexer {
        id: row.get(0)?,
        name: row.get(1)?,
        protocol: parse_col(row, 2)?,
        priority: row.get(3)?,
        enabled: row.get(4)?,
    })
}

fn transition_from_row(row: &Row<'_>) -> rusqlite::Result<EntityTransition> {
    let kind: String = row.get(0)?;
    let entity_kind = match kind.as_str() {
        "movie" => EntityKind::Movie,
        "series" => EntityKind::Series,
        "season" => EntityKind::Season,
        "episode" => EntityKind::Episode,
        other => {
            return Err(conversion_err(
                0,
                StorageError::Serialization(format!("invalid entity kind: {}", other)),
            ))
        }
    };
    let download: Option<String> = row.get(4)?;
    Ok(EntityTransition {
        entity_kind,
        entity_id: row.get(1)?,
        from_state: row.get(2)?,
        to_state: row.get(3)?,
        download: download
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| conversion_err(4, e))?,
        created_at: timestamp_col(row, 5)?,
    })
}

impl MediaStore for SqliteMediaStore {
    fn create_movie(&self, movie: &NewMovie, state: MovieState) -> Result<Movie, StorageError> {
        let id = self.insert(
            "INSERT INTO movies (path, monitored, quality_profile_id, movie_metadata_id, movie_file_id, state, added_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                movie.path,
                movie.monitored,
                movie.quality_profile_id,
                movie.movie_metadata_id,
                movie.movie_file_id,
                state.as_str(),
                format_timestamp(Utc::now())
            ],
        )?;
        self.get_movie(id)
    }

    fn get_movie(&self, id: i64) -> Result<Movie, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM movies WHERE id = ?", MOVIE_COLUMNS),
            params![id],
            movie_from_row,
            || format!("movie {}", id),
        )
    }

    fn get_movie_by_path(&self, path: &str) -> Result<Movie, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM movies WHERE path = ? LIMIT 1", MOVIE_COLUMNS),
            params![path],
            movie_from_row,
            || format!("movie at {}", path),
        )
    }

    fn list_movies_by_state(&self, state: MovieState) -> Result<Vec<Movie>, StorageError> {
        self.list_by(
            &format!("SELECT {} FROM movies WHERE state = ? ORDER BY id", MOVIE_COLUMNS),
            params![state.as_str()],
            movie_from_row,
        )
    }

    fn update_movie_state(
        &self,
        id: i64,
        state: MovieState,
        download: Option<&DownloadLink>,
    ) -> Result<Movie, StorageError> {
        self.transition(EntityKind::Movie, "movies", id, state.as_str(), download)?;
        self.get_movie(id)
    }

    fn link_movie_metadata(&self, movie_id: i64, metadata_id: i64) -> Result<(), StorageError> {
        self.set_column("movies", "movie_metadata_id", movie_id, metadata_id)
    }

    fn link_movie_file(&self, movie_id: i64, file_id: i64) -> Result<(), StorageError> {
        self.set_column("movies", "movie_file_id", movie_id, file_id)
    }

    fn create_movie_file(
        &self,
        size_bytes: u64,
        relative_path: &str,
        original_file_path: Option<&str>,
    ) -> Result<MovieFile, StorageError> {
        let id = self.insert(
            "INSERT INTO movie_files (size_bytes, relative_path, original_file_path) VALUES (?, ?, ?)",
            params![size_bytes as i64, relative_path, original_file_path],
        )?;
        self.get_movie_file(id)
    }

    fn get_movie_file(&self, id: i64) -> Result<MovieFile, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM movie_files WHERE id = ?", FILE_COLUMNS),
            params![id],
            movie_file_from_row,
            || format!("movie file {}", id),
        )
    }

    fn get_movie_file_by_path(&self, relative_path: &str) -> Result<MovieFile, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM movie_files WHERE relative_path = ?", FILE_COLUMNS),
            params![relative_path],
            movie_file_from_row,
            || format!("movie file at {}", relative_path),
        )
    }

    fn get_movie_file_under(&self, path: &str) -> Result<MovieFile, StorageError> {
        let pattern = format!("{}/%", escape_like(path.trim_end_matches('/')));
        self.get_by(
            &format!(
                "SELECT {} FROM movie_files WHERE relative_path LIKE ? ESCAPE '\\' ORDER BY id LIMIT 1",
                FILE_COLUMNS
            ),
            params![pattern],
            movie_file_from_row,
            || format!("movie file under {}", path),
        )
    }

    fn create_movie_metadata(&self, details: &MovieDetails) -> Result<MovieMetadata, StorageError> {
        let id = self.insert(
            "INSERT INTO movie_metadata (tmdb_id, title, runtime_minutes, release_date, overview, poster_path) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                details.tmdb_id,
                details.title,
                details.runtime_minutes,
                format_date(details.release_date),
                details.overview,
                details.poster_path
            ],
        )?;
        self.get_movie_metadata(id)
    }

    fn get_movie_metadata(&self, id: i64) -> Result<MovieMetadata, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM movie_metadata WHERE id = ?", MOVIE_METADATA_COLUMNS),
            params![id],
            movie_metadata_from_row,
            || format!("movie metadata {}", id),
        )
    }

    fn get_movie_metadata_by_tmdb(&self, tmdb_id: i64) -> Result<MovieMetadata, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM movie_metadata WHERE tmdb_id = ?", MOVIE_METADATA_COLUMNS),
            params![tmdb_id],
            movie_metadata_from_row,
            || format!("movie metadata for tmdb {}", tmdb_id),
        )
    }

    fn create_series(
        &self,
        series: &NewSeries,
        state: SeriesState,
    ) -> Result<Series, StorageError> {
        let id = self.insert(
            "INSERT INTO series (path, monitored, quality_profile_id, series_metadata_id, state, added_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                series.path,
                series.monitored,
                series.quality_profile_id,
                series.series_metadata_id,
                state.as_str(),
                format_timestamp(Utc::now())
            ],
        )?;
        self.get_series(id)
    }

    fn get_series(&self, id: i64) -> Result<Series, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM series WHERE id = ?", SERIES_COLUMNS),
            params![id],
            series_from_row,
            || format!("series {}", id),
        )
    }

    fn get_series_by_path(&self, path: &str) -> Result<Series, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM series WHERE path = ? LIMIT 1", SERIES_COLUMNS),
            params![path],
            series_from_row,
            || format!("series at {}", path),
        )
    }

    fn list_series_by_state(&self, state: SeriesState) -> Result<Vec<Series>, StorageError> {
        self.list_by(
            &format!("SELECT {} FROM series WHERE state = ? ORDER BY id", SERIES_COLUMNS),
            params![state.as_str()],
            series_from_row,
        )
    }

    fn update_series_state(&self, id: i64, state: SeriesState) -> Result<Series, StorageError> {
        self.transition(EntityKind::Series, "series", id, state.as_str(), None)?;
        self.get_series(id)
    }

    fn link_series_metadata(&self, series_id: i64, metadata_id: i64) -> Result<(), StorageError> {
        self.set_column("series", "series_metadata_id", series_id, metadata_id)
    }

    fn create_season(
        &self,
        season: &NewSeason,
        state: SeasonState,
    ) -> Result<Season, StorageError> {
        let id = self.insert(
            "INSERT INTO seasons (series_id, number, monitored, season_metadata_id, state) VALUES (?, ?, ?, ?, ?)",
            params![
                season.series_id,
                season.number,
                season.monitored,
                season.season_metadata_id,
                state.as_str()
            ],
        )?;
        self.get_season(id)
    }

    fn get_season(&self, id: i64) -> Result<Season, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM seasons WHERE id = ?", SEASON_COLUMNS),
            params![id],
            season_from_row,
            || format!("season {}", id),
        )
    }

    fn get_season_by_number(&self, series_id: i64, number: u32) -> Result<Season, StorageError> {
        self.get_by(
            &format!(
                "SELECT {} FROM seasons WHERE series_id = ? AND number = ?",
                SEASON_COLUMNS
            ),
            params![series_id, number],
            season_from_row,
            || format!("season {} of series {}", number, series_id),
        )
    }

    fn list_seasons(&self, series_id: i64) -> Result<Vec<Season>, StorageError> {
        self.list_by(
            &format!(
                "SELECT {} FROM seasons WHERE series_id = ? ORDER BY number",
                SEASON_COLUMNS
            ),
            params![series_id],
            season_from_row,
        )
    }

    fn update_season_state(&self, id: i64, state: SeasonState) -> Result<Season, StorageError> {
        self.transition(EntityKind::Season, "seasons", id, state.as_str(), None)?;
        self.get_season(id)
    }

    fn link_season_metadata(&self, season_id: i64, metadata_id: i64) -> Result<(), StorageError> {
        self.set_column("seasons", "season_metadata_id", season_id, metadata_id)
    }

    fn create_episode(
        &self,
        episode: &NewEpisode,
        state: EpisodeState,
    ) -> Result<Episode, StorageError> {
        let id = self.insert(
            "INSERT INTO episodes (season_id, number, monitored, episode_metadata_id, episode_file_id, state) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                episode.season_id,
                episode.number,
                episode.monitored,
                episode.episode_metadata_id,
                episode.episode_file_id,
                state.as_str()
            ],
        )?;
        self.get_episode(id)
    }

    fn get_episode(&self, id: i64) -> Result<Episode, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM episodes WHERE id = ?", EPISODE_COLUMNS),
            params![id],
            episode_from_row,
            || format!("episode {}", id),
        )
    }

    fn get_episode_by_number(
        &self,
        season_id: i64,
        number: u32,
    ) -> Result<Episode, StorageError> {
        self.get_by(
            &format!(
                "SELECT {} FROM episodes WHERE season_id = ? AND number = ?",
                EPISODE_COLUMNS
            ),
            params![season_id, number],
            episode_from_row,
            || format!("episode {} of season {}", number, season_id),
        )
    }

    fn get_episode_by_metadata(&self, metadata_id: i64) -> Result<Episode, StorageError> {
        self.get_by(
            &format!(
                "SELECT {} FROM episodes WHERE episode_metadata_id = ? LIMIT 1",
                EPISODE_COLUMNS
            ),
            params![metadata_id],
            episode_from_row,
            || format!("episode with metadata {}", metadata_id),
        )
    }

    fn list_episodes(&self, season_id: i64) -> Result<Vec<Episode>, StorageError> {
        self.list_by(
            &format!(
                "SELECT {} FROM episodes WHERE season_id = ? ORDER BY number",
                EPISODE_COLUMNS
            ),
            params![season_id],
            episode_from_row,
        )
    }

    fn list_episodes_by_state(&self, state: EpisodeState) -> Result<Vec<Episode>, StorageError> {
        self.list_by(
            &format!("SELECT {} FROM episodes WHERE state = ? ORDER BY id", EPISODE_COLUMNS),
            params![state.as_str()],
            episode_from_row,
        )
    }

    fn update_episode_state(
        &self,
        id: i64,
        state: EpisodeState,
        download: Option<&DownloadLink>,
    ) -> Result<Episode, StorageError> {
        self.transition(EntityKind::Episode, "episodes", id, state.as_str(), download)?;
        self.get_episode(id)
    }

    fn link_episode_metadata(
        &self,
        episode_id: i64,
        metadata_id: i64,
    ) -> Result<(), StorageError> {
        self.set_column("episodes", "episode_metadata_id", episode_id, metadata_id)
    }

    fn link_episode_file(&self, episode_id: i64, file_id: i64) -> Result<(), StorageError> {
        self.set_column("episodes", "episode_file_id", episode_id, file_id)
    }

    fn create_episode_file(
        &self,
        size_bytes: u64,
        relative_path: &str,
        original_file_path: Option<&str>,
    ) -> Result<EpisodeFile, StorageError> {
        let id = self.insert(
            "INSERT INTO episode_files (size_bytes, relative_path, original_file_path) VALUES (?, ?, ?)",
            params![size_bytes as i64, relative_path, original_file_path],
        )?;
        self.get_episode_file(id)
    }

    fn get_episode_file(&self, id: i64) -> Result<EpisodeFile, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM episode_files WHERE id = ?", FILE_COLUMNS),
            params![id],
            episode_file_from_row,
            || format!("episode file {}", id),
        )
    }

    fn get_episode_file_by_path(
        &self,
        relative_path: &str,
    ) -> Result<EpisodeFile, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM episode_files WHERE relative_path = ?", FILE_COLUMNS),
            params![relative_path],
            episode_file_from_row,
            || format!("episode file at {}", relative_path),
        )
    }

    fn create_series_metadata(
        &self,
        details: &SeriesDetails,
    ) -> Result<SeriesMetadata, StorageError> {
        let id = self.insert(
            "INSERT INTO series_metadata (tmdb_id, title, first_air_date, last_air_date, season_count, episode_count, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                details.tmdb_id,
                details.title,
                format_date(details.first_air_date),
                format_date(details.last_air_date),
                details.seasons.len() as u32,
                details.episode_count(),
                details.status
            ],
        )?;
        self.get_series_metadata(id)
    }

    fn get_series_metadata(&self, id: i64) -> Result<SeriesMetadata, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM series_metadata WHERE id = ?", SERIES_METADATA_COLUMNS),
            params![id],
            series_metadata_from_row,
            || format!("series metadata {}", id),
        )
    }

    fn get_series_metadata_by_tmdb(&self, tmdb_id: i64) -> Result<SeriesMetadata, StorageError> {
        self.get_by(
            &format!(
                "SELECT {} FROM series_metadata WHERE tmdb_id = ?",
                SERIES_METADATA_COLUMNS
            ),
            params![tmdb_id],
            series_metadata_from_row,
            || format!("series metadata for tmdb {}", tmdb_id),
        )
    }

    fn create_season_metadata(
        &self,
        series_metadata_id: i64,
        details: &SeasonDetails,
    ) -> Result<SeasonMetadata, StorageError> {
        let id = self.insert(
            "INSERT INTO season_metadata (series_metadata_id, number, title, air_date) VALUES (?, ?, ?, ?)",
            params![
                series_metadata_id,
                details.number,
                details.title,
                format_date(details.air_date)
            ],
        )?;
        self.get_season_metadata(id)
    }

    fn get_season_metadata(&self, id: i64) -> Result<SeasonMetadata, StorageError> {
        self.get_by(
            &format!("SELECT {} FROM season_metadata WHERE id = ?", SEASON_METADATA_COLUMNS),
            params![id],
            season_metadata_from_row,
            || format!("season metadata {}", id),
        )
    }

    fn list_season_metadata(
        &self,
        series_metadata_id: i64,
    ) -> Result<Vec<SeasonMetadata>, StorageError> {
        self.list_by(
            &format!(
                "SELECT {} FROM season_metadata WHERE series_metadata_id = ? ORDER BY number",
                SEASON_METADATA_COLUMNS
            ),
            params![series_metadata_id],
            season_metadata_from_row,
        )
    }

    fn create_episode_metadata(
        &self,
        season_metadata_id: i64,
        details: &EpisodeDetails,
    ) -> Result<EpisodeMetadata, StorageError> {
        let id = self.insert(
            "INSERT INTO episode_metadata (season_metadata_id, number, title, runtime_minutes, air_date) \
             VALUES (?, ?, ?, ?, ?)",
            params![
                season_metadata_id,
                details.number,
                details.title,
                details.runtime_minutes,
                format_date(details.air_date)
            ],
        )?;
        self.get_episode_metadata(id)
    }

    fn get_episode_metadata(&self, id: i64) -> Result<EpisodeMetadata, StorageError> {
        self.get_by(
            &format!(
                "SELECT {} FROM episode_metadata WHERE id = ?",
                EPISODE_METADATA_COLUMNS
            ),
            params![id],
            episode_metadata_from_row,
            || format!("episode metadata {}", id),
        )
    }

    fn list_episode_metadata(
        &self,
        season_metadata_id: i64,
    ) -> Result<Vec<EpisodeMetadata>, StorageError> {
        self.list_by(
            &format!(
                "SELECT {} FROM episode_metadata WHERE season_metadata_id = ? ORDER BY number",
                EPISODE_METADATA_COLUMNS
            ),
            params![season_metadata_id],
            episode_metadata_from_row,
        )
    }

    fn create_quality_profile(
        &self,
        name: &str,
        qualities: &[QualityDefinition],
    ) -> Result<QualityProfile, StorageError> {
        let json = serde_json::to_string(qualities)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let id = self.insert(
            "INSERT INTO quality_profiles (name, qualities) VALUES (?, ?)",
            params![name, json],
        )?;
        self.get_quality_profile(id)
    }

    fn get_quality_profile(&self, id: i64) -> Result<QualityProfile, StorageError> {
        self.get_by(
            "SELECT id, name, qualities FROM quality_profiles WHERE id = ?",
            params![id],
            quality_profile_from_row,
            || format!("quality profile {}", id),
        )
    }

    fn create_download_client(
        &self,
        config: &DownloadClientConfig,
    ) -> Result<DownloadClientConfig, StorageError> {
        let id = self.insert(
            "INSERT INTO download_clients (implementation, protocol, scheme, host, port, username, password, api_key) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                config.implementation,
                config.protocol.as_str(),
                config.scheme,
                config.host,
                config.port,
                config.username,
                config.password,
                config.api_key
            ],
        )?;
        self.get_by(
            &format!("SELECT {} FROM download_clients WHERE id = ?", DOWNLOAD_CLIENT_COLUMNS),
            params![id],
            download_client_from_row,
            || format!("download client {}", id),
        )
    }

    fn list_download_clients(&self) -> Result<Vec<DownloadClientConfig>, StorageError> {
        self.list_by(
            &format!("SELECT {} FROM download_clients ORDER BY id", DOWNLOAD_CLIENT_COLUMNS),
            [],
            download_client_from_row,
        )
    }

    fn replace_indexers(&self, indexers: &[Indexer]) -> Result<(), StorageError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        tx.execute("DELETE FROM indexers", []).map_err(db_err)?;
        for indexer in indexers {
            tx.execute(
                "INSERT INTO indexers (id, name, protocol, priority, enabled) VALUES (?, ?, ?, ?, ?)",
                params![
                    indexer.id,
                    indexer.name,
                    indexer.protocol.as_str(),
                    indexer.priority,
                    indexer.enabled
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)
    }

    fn list_indexers(&self) -> Result<Vec<Indexer>, StorageError> {
        self.list_by(
            "SELECT id, name, protocol, priority, enabled FROM indexers ORDER BY priority, id",
            [],
            indexer_from_row,
        )
    }

    fn entity_transitions(
        &self,
        kind: EntityKind,
        id: i64,
    ) -> Result<Vec<EntityTransition>, StorageError> {
        self.list_by(
            "SELECT entity_kind, entity_id, from_state, to_state, download, created_at \
             FROM entity_transitions WHERE entity_kind = ? AND entity_id = ? ORDER BY id",
            params![kind.as_str(), id],
            transition_from_row,
        )
    }
}
