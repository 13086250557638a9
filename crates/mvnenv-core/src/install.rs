use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs2::FileExt;
use log::{debug, info, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{InstallState, MavenVersion, ProgressSink, SourceError, VersionResolver};
use mvnenv_platform::{ShimLayout, ToolPaths};

use crate::extract::{ExtractError, extract_stripped};
use crate::repository::RepositoryManager;

/// Present in a version directory until its extraction has been verified.
pub const INCOMPLETE_MARKER: &str = ".mvnenv-incomplete";

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Maven {version} is already installed")]
    AlreadyInstalled { version: MavenVersion },
    #[error("Maven {version} is not installed")]
    NotInstalled { version: MavenVersion },
    #[error("another installation of Maven {version} is already running")]
    InProgress { version: MavenVersion },
    #[error("failed to download Maven {version}: {source}")]
    Download {
        version: MavenVersion,
        #[source]
        source: SourceError,
    },
    #[error("failed to extract Maven {version}: {source}")]
    Archive {
        version: MavenVersion,
        #[source]
        source: ExtractError,
    },
    #[error(
        "installation verification failed for Maven {version}: {} is missing; run 'mvnenv install {version}' to reinstall",
        marker.display()
    )]
    Verification {
        version: MavenVersion,
        marker: PathBuf,
    },
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("extraction task failed: {0}")]
    Task(String),
    #[error("installation cancelled")]
    Cancelled,
}

impl InstallError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Classify a version directory.
#[must_use]
pub fn inspect_install(layout: &ShimLayout, install_dir: &Path) -> InstallState {
    if !install_dir.is_dir() {
        InstallState::Missing
    } else if install_dir.join(INCOMPLETE_MARKER).exists()
        || !layout.marker_executable(install_dir).is_file()
    {
        InstallState::Tainted
    } else {
        InstallState::Valid
    }
}

/// Every directory under the versions root with its state, sorted by name.
///
/// # Errors
/// Returns an I/O error when the versions root exists but cannot be read.
pub fn installed_versions(
    paths: &ToolPaths,
    layout: &ShimLayout,
) -> std::io::Result<Vec<(MavenVersion, InstallState)>> {
    let entries = match std::fs::read_dir(&paths.versions_dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(version) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<MavenVersion>().ok())
        else {
            continue;
        };
        versions.push((version, inspect_install(layout, &entry.path())));
    }
    versions.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
    Ok(versions)
}

/// Exclusive per-version lock held for the duration of an install.
struct InstallLock {
    _file: File,
}

impl InstallLock {
    fn acquire(path: &Path, version: &MavenVersion) -> Result<Self, InstallError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|error| InstallError::io("failed to open install lock", path, error))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { _file: file }),
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                Err(InstallError::InProgress {
                    version: version.clone(),
                })
            }
            Err(error) => Err(InstallError::io(
                "failed to acquire install lock",
                path,
                error,
            )),
        }
    }
}

pub struct Installer {
    paths: ToolPaths,
    layout: ShimLayout,
    repository: Arc<RepositoryManager>,
    resolver: Arc<dyn VersionResolver>,
}

impl Installer {
    #[must_use]
    pub fn new(
        paths: ToolPaths,
        layout: ShimLayout,
        repository: Arc<RepositoryManager>,
        resolver: Arc<dyn VersionResolver>,
    ) -> Self {
        Self {
            paths,
            layout,
            repository,
            resolver,
        }
    }

    /// Download, extract and verify `version`. Returns the install directory.
    ///
    /// A leftover tainted directory is replaced. If verification fails the
    /// directory is left in place, still marked incomplete.
    ///
    /// # Errors
    /// Returns [`InstallError::AlreadyInstalled`] for a valid install,
    /// [`InstallError::InProgress`] when another process is installing the
    /// same version, and download, extraction or verification failures.
    pub async fn install_version(
        &self,
        version: &MavenVersion,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, InstallError> {
        if self.resolver.is_installed(version) {
            return Err(InstallError::AlreadyInstalled {
                version: version.clone(),
            });
        }

        self.paths.ensure_dirs().map_err(|error| {
            InstallError::io("failed to create directories under", &self.paths.root, error)
        })?;
        let _lock = InstallLock::acquire(&self.paths.install_lock_file(version.as_str()), version)?;
        // Another installer may have finished between the check above and the lock.
        if self.resolver.is_installed(version) {
            return Err(InstallError::AlreadyInstalled {
                version: version.clone(),
            });
        }

        let archive = self.paths.archive_file(version.as_str());
        info!("Downloading Maven {version} to {}", archive.display());
        if let Err(error) = self
            .repository
            .download_version(version, &archive, progress, cancel)
            .await
        {
            discard_file(&archive);
            return Err(match error {
                SourceError::Cancelled => InstallError::Cancelled,
                source => InstallError::Download {
                    version: version.clone(),
                    source,
                },
            });
        }

        let target = self.paths.version_dir(version.as_str());
        if target.exists() {
            warn!("Replacing incomplete installation at {}", target.display());
            std::fs::remove_dir_all(&target).map_err(|error| {
                InstallError::io("failed to remove incomplete installation", &target, error)
            })?;
        }
        std::fs::create_dir_all(&target)
            .map_err(|error| InstallError::io("failed to create", &target, error))?;
        let incomplete = target.join(INCOMPLETE_MARKER);
        std::fs::write(&incomplete, version.as_str())
            .map_err(|error| InstallError::io("failed to write", &incomplete, error))?;

        let extract_from = archive.clone();
        let extract_into = target.clone();
        let extracted =
            tokio::task::spawn_blocking(move || extract_stripped(&extract_from, &extract_into))
                .await
                .map_err(|error| InstallError::Task(error.to_string()))?;
        discard_file(&archive);
        let files = extracted.map_err(|source| InstallError::Archive {
            version: version.clone(),
            source,
        })?;
        debug!("Extracted {files} files for Maven {version}");

        let marker = self.layout.marker_executable(&target);
        if !marker.is_file() {
            return Err(InstallError::Verification {
                version: version.clone(),
                marker,
            });
        }
        std::fs::remove_file(&incomplete)
            .map_err(|error| InstallError::io("failed to remove", &incomplete, error))?;

        info!("Installed Maven {version} at {}", target.display());
        Ok(target)
    }

    /// Remove an installed version's whole directory.
    ///
    /// # Errors
    /// Returns [`InstallError::NotInstalled`] unless `version` is a valid
    /// installation.
    pub fn uninstall_version(&self, version: &MavenVersion) -> Result<(), InstallError> {
        if !self.resolver.is_installed(version) {
            return Err(InstallError::NotInstalled {
                version: version.clone(),
            });
        }

        let target = self.paths.version_dir(version.as_str());
        std::fs::remove_dir_all(&target)
            .map_err(|error| InstallError::io("failed to remove", &target, error))?;
        info!("Uninstalled Maven {version}");
        Ok(())
    }
}

fn discard_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!("Failed to remove {}: {error}", path.display()),
    }
}
