//! Job records: the unit of work the scheduler creates, runs and prunes.

mod sqlite_store;
mod store;
mod types;

pub(crate) use sqlite_store::format_timestamp;
pub use sqlite_store::SqliteJobStore;
pub use store::{JobFilter, JobStore, JobStoreError};
pub use types::{Job, JobState, JobTransition, JobType};
