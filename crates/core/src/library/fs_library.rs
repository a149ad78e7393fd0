//! Filesystem-backed library.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Library, LibraryError, LibraryFile};

/// File extensions treated as video files when scanning.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "m4v", "ts", "wmv", "mov"];

/// Library rooted at two directories on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsLibrary {
    movie_dir: PathBuf,
    tv_dir: PathBuf,
}

impl FsLibrary {
    pub fn new(movie_dir: impl Into<PathBuf>, tv_dir: impl Into<PathBuf>) -> Self {
        Self {
            movie_dir: movie_dir.into(),
            tv_dir: tv_dir.into(),
        }
    }

    /// Attempts an atomic rename. Returns `Ok(false)` when source and
    /// destination are on different filesystems.
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, std::io::Error> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // EXDEV is 18 on Linux
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(e)
                }
            }
        }
    }

    async fn place(
        &self,
        root: &Path,
        relative_dir: PathBuf,
        source: &Path,
    ) -> Result<LibraryFile, LibraryError> {
        let metadata = fs::metadata(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LibraryError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                LibraryError::Io(e)
            }
        })?;

        let file_name = source
            .file_name()
            .ok_or_else(|| LibraryError::SourceNotFound {
                path: source.to_path_buf(),
            })?;
        let relative = relative_dir.join(file_name);
        let destination = root.join(&relative);

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LibraryError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let move_failed = |error| LibraryError::MoveFailed {
            source: source.to_path_buf(),
            destination: destination.clone(),
            error,
        };

        if !Self::try_atomic_move(source, &destination)
            .await
            .map_err(move_failed)?
        {
            debug!(source = %source.display(), "Cross-device move, falling back to copy");
            fs::copy(source, &destination).await.map_err(move_failed)?;
            fs::remove_file(source).await.map_err(move_failed)?;
        }

        info!(
            source = %source.display(),
            destination = %destination.display(),
            "Placed file in library"
        );

        Ok(LibraryFile {
            relative_path: to_relative_string(&relative),
            size_bytes: metadata.len(),
        })
    }

    async fn scan(root: &Path) -> Result<Vec<LibraryFile>, LibraryError> {
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || scan_blocking(&root))
            .await
            .map_err(|e| LibraryError::ScanFailed {
                path: PathBuf::new(),
                message: e.to_string(),
            })?
    }
}

fn scan_blocking(root: &Path) -> Result<Vec<LibraryFile>, LibraryError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| LibraryError::ScanFailed {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() || !is_video_file(entry.path()) {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
        files.push(LibraryFile {
            relative_path: to_relative_string(relative),
            size_bytes,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// Whether `path` has one of the [`VIDEO_EXTENSIONS`].
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Library paths are always stored with forward slashes.
fn to_relative_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip characters that are not allowed in directory names.
fn sanitize_dir_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl Library for FsLibrary {
    async fn add_movie(
        &self,
        directory: &str,
        source: &Path,
    ) -> Result<LibraryFile, LibraryError> {
        let relative_dir = PathBuf::from(sanitize_dir_name(directory));
        self.place(&self.movie_dir, relative_dir, source).await
    }

    async fn add_episode(
        &self,
        directory: &str,
        season: u32,
        source: &Path,
    ) -> Result<LibraryFile, LibraryError> {
        let relative_dir =
            PathBuf::from(sanitize_dir_name(directory)).join(format!("Season {:02}", season));
        self.place(&self.tv_dir, relative_dir, source).await
    }

    async fn scan_movies(&self) -> Result<Vec<LibraryFile>, LibraryError> {
        Self::scan(&self.movie_dir).await
    }

    async fn scan_episodes(&self) -> Result<Vec<LibraryFile>, LibraryError> {
        Self::scan(&self.tv_dir).await
    }
}
