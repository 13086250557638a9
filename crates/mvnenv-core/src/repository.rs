use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{MavenVersion, ProgressSink, SourceError, VersionSource};

use crate::config::RepositorySettings;
use crate::http::HttpOptions;
use crate::sources::AuthenticatedSource;

/// Combines the optional authenticated repository with the public archive.
///
/// The authenticated source is built on first use and memoized; concurrent
/// first callers share one initialisation.
pub struct RepositoryManager {
    archive: Arc<dyn VersionSource>,
    settings: RepositorySettings,
    http: HttpOptions,
    authenticated: OnceCell<Option<Arc<dyn VersionSource>>>,
}

impl RepositoryManager {
    #[must_use]
    pub fn new(
        archive: Arc<dyn VersionSource>,
        settings: RepositorySettings,
        http: HttpOptions,
    ) -> Self {
        Self {
            archive,
            settings,
            http,
            authenticated: OnceCell::new(),
        }
    }

    /// Use pre-built sources instead of building one from settings.
    #[must_use]
    pub fn with_sources(
        archive: Arc<dyn VersionSource>,
        authenticated: Option<Arc<dyn VersionSource>>,
    ) -> Self {
        Self {
            archive,
            settings: RepositorySettings::default(),
            http: HttpOptions::default(),
            authenticated: OnceCell::new_with(Some(authenticated)),
        }
    }

    async fn authenticated(&self) -> Result<Option<&Arc<dyn VersionSource>>, SourceError> {
        let source = self
            .authenticated
            .get_or_try_init(|| async {
                if !self.settings.is_usable() {
                    debug!("Authenticated repository is not configured");
                    return Ok(None);
                }
                info!("Using authenticated repository {}", self.settings.url);
                let source = AuthenticatedSource::new(self.settings.clone(), &self.http)?;
                Ok::<_, SourceError>(Some(Arc::new(source) as Arc<dyn VersionSource>))
            })
            .await?;
        Ok(source.as_ref())
    }

    /// List every version offered by the configured sources.
    ///
    /// Entries from the authenticated repository come first. A failing
    /// authenticated listing is logged and skipped; a failing archive listing
    /// is only an error when nothing was collected.
    ///
    /// # Errors
    /// Returns a configuration error when the authenticated source cannot be
    /// built, or the archive error when no source produced versions.
    pub async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MavenVersion>, SourceError> {
        let mut collected = Vec::new();

        if let Some(source) = self.authenticated().await? {
            match source.list_versions(cancel).await {
                Ok(versions) => {
                    debug!("{} listed {} versions", source.name(), versions.len());
                    collected = versions;
                }
                Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
                Err(error) => warn!("Failed to list versions from {}: {error}", source.name()),
            }
        }

        match self.archive.list_versions(cancel).await {
            Ok(versions) => Ok(merge_versions(collected, versions)),
            Err(SourceError::Cancelled) => Err(SourceError::Cancelled),
            Err(error) if collected.is_empty() => Err(error),
            Err(error) => {
                warn!("Failed to list versions from {}: {error}", self.archive.name());
                Ok(merge_versions(collected, Vec::new()))
            }
        }
    }

    /// Fetch `version` to `dest`, preferring the authenticated repository and
    /// falling back to the archive on any failure there.
    ///
    /// # Errors
    /// Returns the archive source's error when the fallback fails too.
    pub async fn download_version(
        &self,
        version: &MavenVersion,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        if let Some(source) = self.authenticated().await? {
            match source.download_version(version, dest, progress, cancel).await {
                Ok(()) => return Ok(()),
                Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
                Err(error) => warn!(
                    "Download of Maven {version} from {} failed, falling back to {}: {error}",
                    source.name(),
                    self.archive.name()
                ),
            }
        }

        self.archive
            .download_version(version, dest, progress, cancel)
            .await
    }
}

/// Exact-string union; `primary` entries and order win.
#[must_use]
pub fn merge_versions(primary: Vec<MavenVersion>, secondary: Vec<MavenVersion>) -> Vec<MavenVersion> {
    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(secondary)
        .filter(|version| seen.insert(version.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mvnenv_backend::NoProgress;

    use super::*;

    struct FakeSource {
        name: &'static str,
        versions: Result<Vec<&'static str>, ()>,
        download_fails: bool,
        downloads: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn listing(name: &'static str, versions: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                versions: Ok(versions.to_vec()),
                download_fails: false,
                downloads: Mutex::new(Vec::new()),
            })
        }

        fn broken(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                versions: Err(()),
                download_fails: true,
                downloads: Mutex::new(Vec::new()),
            })
        }

        fn download_count(&self) -> usize {
            self.downloads.lock().expect("lock should not be poisoned").len()
        }
    }

    #[async_trait]
    impl VersionSource for FakeSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn list_versions(
            &self,
            _cancel: &CancellationToken,
        ) -> Result<Vec<MavenVersion>, SourceError> {
            match &self.versions {
                Ok(versions) => Ok(versions
                    .iter()
                    .map(|v| v.parse().expect("fixture version should parse"))
                    .collect()),
                Err(()) => Err(SourceError::HttpStatus {
                    url: format!("https://{}.example", self.name),
                    status: 503,
                }),
            }
        }

        async fn download_version(
            &self,
            version: &MavenVersion,
            dest: &Path,
            _progress: &dyn ProgressSink,
            _cancel: &CancellationToken,
        ) -> Result<(), SourceError> {
            self.downloads
                .lock()
                .expect("lock should not be poisoned")
                .push(version.to_string());
            if self.download_fails {
                return Err(SourceError::network_request("download", "connection reset"));
            }
            std::fs::write(dest, self.name)?;
            Ok(())
        }
    }

    fn names(versions: &[MavenVersion]) -> Vec<&str> {
        versions.iter().map(MavenVersion::as_str).collect()
    }

    fn version(value: &str) -> MavenVersion {
        value.parse().expect("version should parse")
    }

    #[tokio::test]
    async fn duplicates_appear_once_in_authenticated_order() {
        let manager = RepositoryManager::with_sources(
            FakeSource::listing("archive", &["3.8.8", "3.9.4", "3.9.5"]),
            Some(FakeSource::listing("repository", &["3.9.5", "3.9.4-corp"])),
        );

        let versions = manager
            .list_versions(&CancellationToken::new())
            .await
            .expect("listing should succeed");

        assert_eq!(names(&versions), vec!["3.9.5", "3.9.4-corp", "3.8.8", "3.9.4"]);
    }

    #[tokio::test]
    async fn authenticated_listing_failure_is_not_fatal() {
        let manager = RepositoryManager::with_sources(
            FakeSource::listing("archive", &["3.9.4"]),
            Some(FakeSource::broken("repository")),
        );

        let versions = manager
            .list_versions(&CancellationToken::new())
            .await
            .expect("archive listing should still be returned");

        assert_eq!(names(&versions), vec!["3.9.4"]);
    }

    #[tokio::test]
    async fn archive_failure_is_fatal_only_without_other_versions() {
        let rescued = RepositoryManager::with_sources(
            FakeSource::broken("archive"),
            Some(FakeSource::listing("repository", &["3.9.6"])),
        );
        let versions = rescued
            .list_versions(&CancellationToken::new())
            .await
            .expect("authenticated versions should be kept");
        assert_eq!(names(&versions), vec!["3.9.6"]);

        let stranded = RepositoryManager::with_sources(FakeSource::broken("archive"), None);
        let error = stranded
            .list_versions(&CancellationToken::new())
            .await
            .expect_err("no versions at all must fail");
        assert!(matches!(error, SourceError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn download_falls_back_to_archive() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("maven.zip");
        let archive = FakeSource::listing("archive", &[]);
        let repository = FakeSource::broken("repository");
        let manager = RepositoryManager::with_sources(archive.clone(), Some(repository.clone()));

        manager
            .download_version(&version("3.9.4"), &dest, &NoProgress, &CancellationToken::new())
            .await
            .expect("fallback download should succeed");

        assert_eq!(repository.download_count(), 1);
        assert_eq!(archive.download_count(), 1);
        assert_eq!(std::fs::read_to_string(&dest).expect("dest should exist"), "archive");
    }

    #[tokio::test]
    async fn successful_authenticated_download_skips_archive() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let dest = temp.path().join("maven.zip");
        let archive = FakeSource::listing("archive", &[]);
        let repository = FakeSource::listing("repository", &[]);
        let manager = RepositoryManager::with_sources(archive.clone(), Some(repository.clone()));

        manager
            .download_version(&version("3.9.4"), &dest, &NoProgress, &CancellationToken::new())
            .await
            .expect("download should succeed");

        assert_eq!(archive.download_count(), 0);
        assert_eq!(std::fs::read_to_string(&dest).expect("dest should exist"), "repository");
    }

    #[tokio::test]
    async fn unusable_settings_build_no_authenticated_source() {
        let manager = RepositoryManager::new(
            FakeSource::listing("archive", &["3.9.4"]),
            RepositorySettings::default(),
            HttpOptions::default(),
        );

        assert!(manager.authenticated().await.expect("init should succeed").is_none());
    }

    #[tokio::test]
    async fn bad_trust_anchor_fails_before_any_listing() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let archive = FakeSource::listing("archive", &["3.9.4"]);
        let settings = RepositorySettings {
            enabled: true,
            url: "https://nexus.example/maven".to_string(),
            ca_cert_file: Some(temp.path().join("absent.pem")),
            ..RepositorySettings::default()
        };
        let manager = RepositoryManager::new(archive, settings, HttpOptions::default());

        let error = manager
            .list_versions(&CancellationToken::new())
            .await
            .expect_err("configuration error must be fatal");
        assert!(matches!(error, SourceError::Configuration { .. }));
    }
}
