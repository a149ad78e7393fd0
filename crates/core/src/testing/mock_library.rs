//! Mock library for testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::library::{Library, LibraryError, LibraryFile};

/// Size reported for every placed file.
const PLACED_FILE_SIZE: u64 = 1_000_000;

/// A recorded placement for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedFile {
    pub source: PathBuf,
    pub file: LibraryFile,
}

/// Mock implementation of the Library trait.
///
/// Nothing touches the filesystem: placed files are recorded and show up in
/// later scans, next to files registered with [`MockLibrary::add_movie_file`]
/// and [`MockLibrary::add_episode_file`].
#[derive(Debug, Default)]
pub struct MockLibrary {
    movie_files: Arc<RwLock<Vec<LibraryFile>>>,
    episode_files: Arc<RwLock<Vec<LibraryFile>>>,
    placed_movies: Arc<RwLock<Vec<PlacedFile>>>,
    placed_episodes: Arc<RwLock<Vec<PlacedFile>>>,
    /// If set, the next placement will fail with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file already present in the movie library.
    pub async fn add_movie_file(&self, relative_path: &str, size_bytes: u64) {
        self.movie_files.write().await.push(LibraryFile {
            relative_path: relative_path.to_string(),
            size_bytes,
        });
    }

    /// Register a file already present in the TV library.
    pub async fn add_episode_file(&self, relative_path: &str, size_bytes: u64) {
        self.episode_files.write().await.push(LibraryFile {
            relative_path: relative_path.to_string(),
            size_bytes,
        });
    }

    pub async fn placed_movies(&self) -> Vec<PlacedFile> {
        self.placed_movies.read().await.clone()
    }

    pub async fn placed_episodes(&self) -> Vec<PlacedFile> {
        self.placed_episodes.read().await.clone()
    }

    pub async fn fail_next(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }

    async fn place(
        &self,
        relative_dir: String,
        source: &Path,
        files: &RwLock<Vec<LibraryFile>>,
        placed: &RwLock<Vec<PlacedFile>>,
    ) -> Result<LibraryFile, LibraryError> {
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LibraryError::SourceNotFound {
                path: source.to_path_buf(),
            })?;

        if let Some(message) = self.next_error.write().await.take() {
            return Err(LibraryError::MoveFailed {
                source: source.to_path_buf(),
                destination: PathBuf::from(&relative_dir).join(&file_name),
                error: std::io::Error::other(message),
            });
        }

        let file = LibraryFile {
            relative_path: format!("{}/{}", relative_dir, file_name),
            size_bytes: PLACED_FILE_SIZE,
        };
        files.write().await.push(file.clone());
        placed.write().await.push(PlacedFile {
            source: source.to_path_buf(),
            file: file.clone(),
        });
        Ok(file)
    }
}

#[async_trait]
impl Library for MockLibrary {
    async fn add_movie(&self, directory: &str, source: &Path) -> Result<LibraryFile, LibraryError> {
        self.place(
            directory.to_string(),
            source,
            &self.movie_files,
            &self.placed_movies,
        )
        .await
    }

    async fn add_episode(
        &self,
        directory: &str,
        season: u32,
        source: &Path,
    ) -> Result<LibraryFile, LibraryError> {
        self.place(
            format!("{}/Season {:02}", directory, season),
            source,
            &self.episode_files,
            &self.placed_episodes,
        )
        .await
    }

    async fn scan_movies(&self) -> Result<Vec<LibraryFile>, LibraryError> {
        Ok(self.movie_files.read().await.clone())
    }

    async fn scan_episodes(&self) -> Result<Vec<LibraryFile>, LibraryError> {
        Ok(self.episode_files.read().await.clone())
    }
}
