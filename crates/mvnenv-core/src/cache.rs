use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mvnenv_backend::MavenVersion;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("version cache {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub versions: Vec<MavenVersion>,
    pub updated_at: DateTime<Utc>,
}

/// The last known remote version list. Advisory only: a missing or stale
/// cache costs freshness, never correctness.
#[derive(Debug, Clone)]
pub struct CacheManager {
    path: PathBuf,
}

impl CacheManager {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the cached list wholesale.
    ///
    /// # Errors
    /// Returns [`CacheError::Io`] when the cache directory or file cannot be
    /// written.
    pub fn save_versions(&self, versions: &[MavenVersion]) -> Result<(), CacheError> {
        let record = CacheRecord {
            versions: versions.to_vec(),
            updated_at: Utc::now(),
        };
        let data = serde_json::to_vec_pretty(&record).map_err(|source| CacheError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|error| CacheError::io("failed to create cache directory", parent, error))?;
        }
        write_atomic(&self.path, &data)
            .map_err(|error| CacheError::io("failed to write version cache", &self.path, error))?;

        debug!("Cached {} versions in {}", versions.len(), self.path.display());
        Ok(())
    }

    /// # Errors
    /// Returns [`CacheError::Malformed`] when the file exists but cannot be
    /// parsed. A missing file is not an error.
    pub fn load_record(&self) -> Result<Option<CacheRecord>, CacheError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(CacheError::io("failed to read version cache", &self.path, error));
            }
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| CacheError::Malformed {
                path: self.path.clone(),
                source,
            })
    }

    /// Cached versions in stored order; empty when nothing is cached.
    ///
    /// # Errors
    /// See [`CacheManager::load_record`].
    pub fn load_versions(&self) -> Result<Vec<MavenVersion>, CacheError> {
        Ok(self
            .load_record()?
            .map(|record| record.versions)
            .unwrap_or_default())
    }

    /// Time since the last save, zero when nothing is cached.
    ///
    /// # Errors
    /// See [`CacheManager::load_record`].
    pub fn get_cache_age(&self) -> Result<Duration, CacheError> {
        Ok(self.load_record()?.map_or(Duration::ZERO, |record| {
            (Utc::now() - record.updated_at)
                .to_std()
                .unwrap_or(Duration::ZERO)
        }))
    }

    /// Stale when older than `max_age`, absent, or unreadable.
    #[must_use]
    pub fn is_cache_stale(&self, max_age: Duration) -> bool {
        if !self.path.exists() {
            return true;
        }
        match self.get_cache_age() {
            Ok(age) => age > max_age,
            Err(error) => {
                debug!("Treating version cache as stale: {error}");
                true
            }
        }
    }
}

/// Write through a sibling temp file and rename it over `path`, so readers
/// never observe a partial file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent")
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|error| error.error)?;
    Ok(())
}
