pub mod config;
pub mod download_client;
pub mod job;
pub mod library;
pub mod media;
pub mod metadata;
pub mod metrics;
pub mod reconciler;
pub mod release;
pub mod scheduler;
pub mod searcher;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use download_client::{
    DownloadClient, DownloadClientError, DownloadClientFactory, DownloadStatus,
    HttpDownloadClientFactory,
};
pub use job::{Job, JobFilter, JobState, JobStore, JobStoreError, JobType, SqliteJobStore};
pub use library::{FsLibrary, Library, LibraryError, LibraryFile};
pub use media::{MediaStore, SqliteMediaStore, StorageError};
pub use metadata::{MetadataError, MetadataProvider, TmdbClient};
pub use reconciler::{ReconcileError, Reconciler, ReconcilerConfig};
pub use scheduler::{executor_fn, JobExecutor, JobScheduler, SchedulerConfig, SchedulerError};
pub use searcher::{IndexerClient, ProwlarrClient, SearchError};
