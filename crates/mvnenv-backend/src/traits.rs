use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::error::{ResolveError, SourceError};
use crate::types::{MavenVersion, ResolvedVersion};

/// Receives transfer progress after every read: bytes so far and the total
/// size when the server announced one.
pub trait ProgressSink: Send + Sync {
    fn report(&self, transferred: u64, total: Option<u64>);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, Option<u64>) + Send + Sync,
{
    fn report(&self, transferred: u64, total: Option<u64>) {
        self(transferred, total);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _transferred: u64, _total: Option<u64>) {}
}

/// A repository that publishes Maven distributions.
#[async_trait]
pub trait VersionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MavenVersion>, SourceError>;

    async fn download_version(
        &self,
        version: &MavenVersion,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError>;
}

/// Decides which version applies to the current invocation.
///
/// The precedence rules live outside this crate; consumers only rely on this
/// contract.
pub trait VersionResolver: Send + Sync {
    /// # Errors
    /// Returns [`ResolveError::NotInstalled`] when a version is selected but
    /// not installed and [`ResolveError::NoneSet`] when nothing selects one.
    fn resolve(&self) -> Result<ResolvedVersion, ResolveError>;

    fn is_installed(&self, version: &MavenVersion) -> bool;

    fn install_path(&self, version: &MavenVersion) -> PathBuf;
}
