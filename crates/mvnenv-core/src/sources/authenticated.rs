use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use regex::Regex;
use reqwest::{Method, RequestBuilder};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{MavenVersion, ProgressSink, SourceError, VersionSource};

use crate::config::RepositorySettings;
use crate::http::{HttpOptions, client_builder};

static LATEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<latest>\s*([^<]+?)\s*</latest>").expect("latest pattern is valid")
});
static RELEASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<release>\s*([^<]+?)\s*</release>").expect("release pattern is valid")
});
static VERSIONS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<versions>(.*?)</versions>").expect("versions pattern is valid")
});
static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<version>\s*([^<]+?)\s*</version>").expect("version pattern is valid")
});

/// Contents of a `maven-metadata.xml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryMetadata {
    pub latest: Option<MavenVersion>,
    pub release: Option<MavenVersion>,
    pub versions: Vec<MavenVersion>,
}

/// A Maven repository manager reached with optional credentials and custom
/// TLS trust.
#[derive(Debug, Clone)]
pub struct AuthenticatedSource {
    client: reqwest::Client,
    settings: RepositorySettings,
}

impl AuthenticatedSource {
    /// Build the client. Trust configuration is validated here, before any
    /// request is made.
    ///
    /// # Errors
    /// Returns [`SourceError::Configuration`] when the trust-anchor file
    /// cannot be read or parsed, or the client cannot be built.
    pub fn new(settings: RepositorySettings, options: &HttpOptions) -> Result<Self, SourceError> {
        let mut builder = client_builder(options);

        if settings.insecure_skip_verify {
            warn!(
                "TLS certificate verification is disabled for {}",
                settings.base_url()
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_file) = &settings.ca_cert_file {
            let pem = std::fs::read(ca_file).map_err(|error| {
                SourceError::configuration(format!(
                    "failed to read CA certificate {}: {error}",
                    ca_file.display()
                ))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|error| {
                SourceError::configuration(format!(
                    "failed to parse CA certificate {}: {error}",
                    ca_file.display()
                ))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder.build().map_err(|error| {
            SourceError::configuration(format!("failed to build repository client: {error}"))
        })?;

        Ok(Self { client, settings })
    }

    #[must_use]
    pub fn metadata_url(&self) -> String {
        format!(
            "{}/{}/{}/maven-metadata.xml",
            self.settings.base_url(),
            self.settings.group_path(),
            self.settings.artifact_id
        )
    }

    #[must_use]
    pub fn artifact_url(&self, version: &MavenVersion) -> String {
        let artifact = &self.settings.artifact_id;
        format!(
            "{}/{}/{artifact}/{version}/{artifact}-{version}-bin.zip",
            self.settings.base_url(),
            self.settings.group_path(),
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.settings.username {
            Some(username) => request.basic_auth(username, self.settings.password.as_deref()),
            None => request,
        }
    }

    /// # Errors
    /// Returns a network error when the document cannot be fetched and a
    /// parse error when it is not repository metadata.
    pub async fn fetch_metadata(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RepositoryMetadata, SourceError> {
        let url = self.metadata_url();
        debug!("Fetching repository metadata from {url}");

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SourceError::Cancelled),
            response = self.request(Method::GET, &url).send() => {
                response.map_err(|error| SourceError::network_request_from("fetch metadata", error))?
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
            .map_err(|error| SourceError::network_body_from("read metadata", error))?;
        parse_metadata(&body)
    }

    /// Publish a distribution archive under `version`.
    ///
    /// # Errors
    /// Returns an I/O error when the file cannot be read, a network error
    /// when the transfer fails, or [`SourceError::Cancelled`].
    pub async fn upload_version(
        &self,
        version: &MavenVersion,
        source: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        let url = self.artifact_url(version);
        let file = tokio::fs::File::open(source).await?;
        let total = file.metadata().await?.len();
        info!("Uploading {} ({total} bytes) to {url}", source.display());

        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let stream_cancel = cancel.clone();
        let mut sent: u64 = 0;
        let stream = ReaderStream::new(file).map(move |chunk| {
            if stream_cancel.is_cancelled() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "upload cancelled",
                ));
            }
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                let _ = sent_tx.send(sent);
            }
            chunk
        });

        let send = self
            .request(Method::PUT, &url)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send();
        tokio::pin!(send);

        let response = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SourceError::Cancelled),
                Some(sent) = sent_rx.recv() => progress.report(sent, Some(total)),
                response = &mut send => break response,
            }
        };
        while let Ok(sent) = sent_rx.try_recv() {
            progress.report(sent, Some(total));
        }

        let response =
            response.map_err(|error| SourceError::network_request_from("upload", error))?;
        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        info!("Uploaded Maven {version} to {url}");
        Ok(())
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SourceError::Cancelled),
            response = self.request(Method::GET, url).send() => {
                response.map_err(|error| SourceError::network_request_from("download", error))?
            }
        };
        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SourceError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|error| SourceError::network_body_from("download", error))?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress.report(received, total);
        }
        file.flush().await?;

        info!("Downloaded {url}: {received} bytes");
        Ok(())
    }
}

#[async_trait]
impl VersionSource for AuthenticatedSource {
    fn name(&self) -> &'static str {
        "repository"
    }

    async fn list_versions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<MavenVersion>, SourceError> {
        Ok(self.fetch_metadata(cancel).await?.versions)
    }

    async fn download_version(
        &self,
        version: &MavenVersion,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), SourceError> {
        let url = self.artifact_url(version);
        let result = self.stream_to_file(&url, dest, progress, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(dest).await;
        }
        result
    }
}

pub(crate) fn parse_metadata(body: &str) -> Result<RepositoryMetadata, SourceError> {
    if !body.contains("<metadata") {
        return Err(SourceError::network_parse(
            "parse metadata",
            "document has no <metadata> root",
        ));
    }

    let single = |pattern: &Regex| {
        pattern
            .captures(body)
            .and_then(|captures| captures.get(1))
            .and_then(|m| m.as_str().parse::<MavenVersion>().ok())
    };

    let versions = VERSIONS_BLOCK
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|block| {
            VERSION
                .captures_iter(block.as_str())
                .filter_map(|captures| captures.get(1))
                .filter_map(|m| match m.as_str().parse::<MavenVersion>() {
                    Ok(version) => Some(version),
                    Err(error) => {
                        debug!("Skipping metadata version {:?}: {error}", m.as_str());
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RepositoryMetadata {
        latest: single(&LATEST),
        release: single(&RELEASE),
        versions,
    })
}
