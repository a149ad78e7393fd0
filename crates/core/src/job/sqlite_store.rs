//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Job, JobFilter, JobState, JobStore, JobStoreError, JobTransition, JobType};

/// SQLite-backed job store.
///
/// The current state of a job is denormalized onto the `jobs` row; every
/// change is also appended to `job_transitions`.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the job tables in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                state TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS job_transitions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                to_state TEXT NOT NULL,
                error TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_type ON jobs(type, id DESC);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_one_pending_per_type
                ON jobs(type) WHERE state = 'pending';
            CREATE INDEX IF NOT EXISTS idx_job_transitions_job ON job_transitions(job_id);
            "#,
        )
        .map_err(db_err)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|e| JobStoreError::Database(format!("connection lock poisoned: {}", e)))
    }

    fn fetch_job(conn: &Connection, id: i64) -> Result<Job, JobStoreError> {
        conn.query_row(
            "SELECT id, type, state, error, created_at, updated_at FROM jobs WHERE id = ?",
            params![id],
            JobRow::from_row,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| JobStoreError::NotFound(id.to_string()))?
        .into_job()
    }

    fn append_transition(
        conn: &Connection,
        job_id: i64,
        state: JobState,
        error: Option<&str>,
        at: &str,
    ) -> Result<(), JobStoreError> {
        conn.execute(
            "INSERT INTO job_transitions (job_id, to_state, error, created_at) VALUES (?, ?, ?, ?)",
            params![job_id, state.as_str(), error, at],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

/// Raw column values of a `jobs` row.
struct JobRow {
    id: i64,
    job_type: String,
    state: String,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            job_type: row.get(1)?,
            state: row.get(2)?,
            error: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_job(self) -> Result<Job, JobStoreError> {
        Ok(Job {
            id: self.id,
            job_type: self.job_type.parse()?,
            state: self.state.parse()?,
            error: self.error,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn db_err(e: rusqlite::Error) -> JobStoreError {
    JobStoreError::Database(e.to_string())
}

/// Fixed-width timestamps keep lexicographic order equal to time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, JobStoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| JobStoreError::Database(format!("invalid timestamp {:?}: {}", s, e)))
}

impl JobStore for SqliteJobStore {
    fn create_pending_job(&self, job_type: JobType) -> Result<Job, JobStoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM jobs WHERE type = ? AND state = 'pending' ORDER BY id DESC LIMIT 1",
                params![job_type.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        if let Some(job_id) = existing {
            return Err(JobStoreError::AlreadyPending { job_type, job_id });
        }

        let now = format_timestamp(Utc::now());
        tx.execute(
            "INSERT INTO jobs (type, state, error, created_at, updated_at) VALUES (?, ?, NULL, ?, ?)",
            params![job_type.as_str(), JobState::Pending.as_str(), now, now],
        )
        .map_err(db_err)?;
        let id = tx.last_insert_rowid();
        Self::append_transition(&tx, id, JobState::Pending, None, &now)?;

        let job = Self::fetch_job(&tx, id)?;
        tx.commit().map_err(db_err)?;
        Ok(job)
    }

    fn get_job(&self, id: i64) -> Result<Job, JobStoreError> {
        let conn = self.conn()?;
        Self::fetch_job(&conn, id)
    }

    fn latest_job(&self, job_type: JobType) -> Result<Job, JobStoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, type, state, error, created_at, updated_at FROM jobs WHERE type = ? ORDER BY id DESC LIMIT 1",
            params![job_type.as_str()],
            JobRow::from_row,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| JobStoreError::NotFound(format!("no {} job", job_type)))?
        .into_job()
    }

    fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(job_type) = filter.job_type {
            conditions.push("type = ?");
            values.push(Box::new(job_type.as_str()));
        }
        if let Some(state) = filter.state {
            conditions.push("state = ?");
            values.push(Box::new(state.as_str()));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        values.push(Box::new(filter.limit));

        let sql = format!(
            "SELECT id, type, state, error, created_at, updated_at FROM jobs {} ORDER BY id DESC LIMIT ?",
            where_clause
        );
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                JobRow::from_row,
            )
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    fn update_job_state(
        &self,
        id: i64,
        state: JobState,
        error: Option<&str>,
    ) -> Result<Job, JobStoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = format_timestamp(Utc::now());

        let updated = tx
            .execute(
                "UPDATE jobs SET state = ?, error = ?, updated_at = ? WHERE id = ?",
                params![state.as_str(), error, now, id],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref f, _)
                    if f.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    JobStoreError::Database(format!(
                        "job {} cannot return to pending while another job of its type is pending",
                        id
                    ))
                }
                other => db_err(other),
            })?;
        if updated == 0 {
            return Err(JobStoreError::NotFound(id.to_string()));
        }
        Self::append_transition(&tx, id, state, error, &now)?;

        let job = Self::fetch_job(&tx, id)?;
        tx.commit().map_err(db_err)?;
        Ok(job)
    }

    fn start_pending_job(&self, id: i64) -> Result<Option<Job>, JobStoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = format_timestamp(Utc::now());

        let updated = tx
            .execute(
                "UPDATE jobs SET state = ?, updated_at = ? WHERE id = ? AND state = ?",
                params![
                    JobState::Running.as_str(),
                    now,
                    id,
                    JobState::Pending.as_str()
                ],
            )
            .map_err(db_err)?;
        if updated == 0 {
            // Distinguish a finished or cancelled job from an unknown id.
            Self::fetch_job(&tx, id)?;
            return Ok(None);
        }
        Self::append_transition(&tx, id, JobState::Running, None, &now)?;

        let job = Self::fetch_job(&tx, id)?;
        tx.commit().map_err(db_err)?;
        Ok(Some(job))
    }

    fn job_transitions(&self, id: i64) -> Result<Vec<JobTransition>, JobStoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT job_id, to_state, error, created_at FROM job_transitions WHERE job_id = ? ORDER BY id ASC",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        rows.into_iter()
            .map(|(job_id, to_state, error, created_at)| {
                Ok(JobTransition {
                    job_id,
                    to_state: to_state.parse()?,
                    error,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .collect()
    }

    fn prune_jobs(
        &self,
        job_type: JobType,
        older_than: DateTime<Utc>,
        keep_latest: usize,
    ) -> Result<usize, JobStoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let cutoff = format_timestamp(older_than);
        let keep = keep_latest as i64;

        let doomed = "SELECT id FROM jobs WHERE type = ?1 AND created_at < ?2 \
             AND id NOT IN (SELECT id FROM jobs WHERE type = ?1 ORDER BY id DESC LIMIT ?3)";

        tx.execute(
            &format!("DELETE FROM job_transitions WHERE job_id IN ({})", doomed),
            params![job_type.as_str(), cutoff, keep],
        )
        .map_err(db_err)?;
        let deleted = tx
            .execute(
                &format!("DELETE FROM jobs WHERE id IN ({})", doomed),
                params![job_type.as_str(), cutoff, keep],
            )
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(deleted)
    }
}
