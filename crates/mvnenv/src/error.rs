use std::path::PathBuf;

use thiserror::Error;

use mvnenv_backend::{SourceError, VersionParseError};
use mvnenv_core::{CacheError, ExecError, InstallError, ShimError};
use mvnenv_platform::ToolPathsError;

use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Paths(#[from] ToolPathsError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("invalid version: {0}")]
    Version(#[from] VersionParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Shim(#[from] ShimError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("no authenticated repository is configured; enable 'repository' in {}", path.display())]
    RepositoryNotConfigured { path: PathBuf },
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
