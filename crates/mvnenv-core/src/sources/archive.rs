use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{MavenVersion, ProgressSink, SourceError, VersionSource};

use crate::download::{DownloadError, Downloader};

pub const DEFAULT_ARCHIVE_URL: &str = "https://archive.apache.org/dist/maven/maven-3";

static VERSION_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(\d+\.\d+\.\d+(?:-[A-Za-z0-9.-]+)?)/""#)
        .expect("version link pattern is valid")
});

/// The public Apache archive, discovered by scraping its directory listing.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    client: reqwest::Client,
    downloader: Downloader,
    base_url: String,
}

impl ArchiveSource {
    #[must_use]
    pub fn new(client: reqwest::Client, downloader: Downloader, base_url: &str) -> Self {
        Self {
            client,
            downloader,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn archive_url(&self, version: &MavenVersion) -> String {
        format!(
            "{}/{version}/binaries/apache-maven-{version}-bin.zip",
            self.base_url
        )
    }

    #[must_use]
    pub fn checksum_url(&self, version: &MavenVersion) -> String {
        format!("{}.sha512", self.archive_url(version))
    }
}

#[async_trait]
impl VersionSource for ArchiveSource {
    fn name(&self) -> &'static str {
        "archive"
    }

    async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MavenVersion>, SourceError> {
        let url = format!("{}/", self.base_url);
        debug!("Fetching archive listing from {url}");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SourceError::Cancelled),
            response = self.client.get(&url).send() => {
                response.map_err(|error| SourceError::network_request_from("fetch archive listing", error))?
            }
        };
        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|error| SourceError::network_body_from("read archive listing", error))?;
        let versions = parse_listing(&body);
        debug!("Archive listing contains {} versions", versions.len());
        Ok(versions)
    }

    async fn download_version(
        &self,
        version: &MavenVersion,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        let url = self.archive_url(version);
        let checksum_url = self.checksum_url(version);

        match self
            .downloader
            .download_with_checksum(&url, &checksum_url, dest, progress, cancel)
            .await
        {
            Ok(()) => Ok(()),
            Err(DownloadError::ChecksumUnavailable { details, .. }) => {
                warn!(
                    "Checksum for Maven {version} is unavailable ({details}); downloading without verification"
                );
                self.downloader
                    .download(&url, dest, progress, cancel)
                    .await
                    .map(|_| ())
                    .map_err(SourceError::from)
            }
            Err(error) => Err(error.into()),
        }
    }
}

/// Directory links that look like release versions, first occurrence wins.
pub(crate) fn parse_listing(body: &str) -> Vec<MavenVersion> {
    let mut seen = HashSet::new();
    VERSION_LINK
        .captures_iter(body)
        .filter_map(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(|version| seen.insert(*version))
        .filter_map(|version| version.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
<html><body>
<a href="../">Parent Directory</a>
<a href="3.8.8/">3.8.8/</a>
<a href="3.9.4/">3.9.4/</a>
<a href="4.0.0-alpha-2/">4.0.0-alpha-2/</a>
<a href="3.9.4/">3.9.4/</a>
<a href="KEYS">KEYS</a>
<a href="3.9/">3.9/</a>
</body></html>
"#;

    #[test]
    fn listing_keeps_first_seen_order_without_duplicates() {
        let versions: Vec<String> = parse_listing(LISTING)
            .into_iter()
            .map(MavenVersion::into_inner)
            .collect();

        assert_eq!(versions, vec!["3.8.8", "3.9.4", "4.0.0-alpha-2"]);
    }

    #[test]
    fn urls_follow_binaries_layout() {
        let source = ArchiveSource::new(
            reqwest::Client::new(),
            Downloader::new(reqwest::Client::new()),
            "https://archive.example/maven-3/",
        );
        let version: MavenVersion = "3.9.4".parse().expect("version should parse");

        assert_eq!(
            source.archive_url(&version),
            "https://archive.example/maven-3/3.9.4/binaries/apache-maven-3.9.4-bin.zip"
        );
        assert_eq!(
            source.checksum_url(&version),
            "https://archive.example/maven-3/3.9.4/binaries/apache-maven-3.9.4-bin.zip.sha512"
        );
    }
}
