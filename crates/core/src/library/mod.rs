//! The managed media library on disk.
//!
//! Downloads are moved into the library by [`Library::add_movie`] and
//! [`Library::add_episode`]; the index jobs use the scan methods to pick up
//! files that were placed there by hand.

mod fs_library;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fs_library::{is_video_file, FsLibrary, VIDEO_EXTENSIONS};

/// Errors that can occur while placing or scanning library files.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move file from {source} to {destination}")]
    MoveFailed {
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to scan {path}: {message}")]
    ScanFailed { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file registered in the library, relative to its library root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryFile {
    pub relative_path: String,
    pub size_bytes: u64,
}

impl LibraryFile {
    /// First path component: the movie or series directory.
    pub fn top_directory(&self) -> Option<&str> {
        self.relative_path
            .split('/')
            .next()
            .filter(|dir| !dir.is_empty() && *dir != self.relative_path)
    }

    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// File placement and discovery for the movie and TV libraries.
#[async_trait]
pub trait Library: Send + Sync {
    /// Move a downloaded movie file into `<movie library>/<directory>/`.
    async fn add_movie(&self, directory: &str, source: &Path)
        -> Result<LibraryFile, LibraryError>;

    /// Move a downloaded episode file into `<tv library>/<directory>/Season NN/`.
    async fn add_episode(
        &self,
        directory: &str,
        season: u32,
        source: &Path,
    ) -> Result<LibraryFile, LibraryError>;

    /// Every video file below the movie library root.
    async fn scan_movies(&self) -> Result<Vec<LibraryFile>, LibraryError>;

    /// Every video file below the TV library root.
    async fn scan_episodes(&self) -> Result<Vec<LibraryFile>, LibraryError>;
}
