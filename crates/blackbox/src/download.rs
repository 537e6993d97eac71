//! Saving exported archives where the user can find them.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Receives a finished archive and stores it under a suggested file name.
pub trait Downloader: Send + Sync + std::fmt::Debug {
    /// Save `bytes` as `file_name` and return where they ended up.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be written.
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes archives into a directory, creating it if needed.
#[derive(Debug, Clone)]
pub struct DirectoryDownloader {
    dir: PathBuf,
}

impl DirectoryDownloader {
    /// Save into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The target directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Downloader for DirectoryDownloader {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|source| Error::DirectoryCreate {
                path: self.dir.clone(),
                source,
            })?;
        }

        let path = self.dir.join(file_name);
        std::fs::write(&path, bytes)?;
        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}
