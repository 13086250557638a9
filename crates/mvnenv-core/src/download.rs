use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use sha2::{Digest, Sha512};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{ProgressSink, SourceError};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} responded with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download of {url} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<DownloadError>,
    },
    #[error("checksum {url} is unavailable: {details}")]
    ChecksumUnavailable { url: String, details: String },
    #[error("checksum {url} does not contain a digest")]
    ChecksumMalformed { url: String },
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    fn request(url: &str, source: reqwest::Error) -> Self {
        Self::Request {
            url: url.to_string(),
            source,
        }
    }
}

impl From<DownloadError> for SourceError {
    fn from(error: DownloadError) -> Self {
        match error {
            DownloadError::Request { url, source } => {
                SourceError::network_request("download", format!("{url}: {source}"))
            }
            DownloadError::Status { url, status } => SourceError::HttpStatus {
                url,
                status: status.as_u16(),
            },
            DownloadError::Io { source, .. } => SourceError::from(source),
            DownloadError::RetriesExhausted {
                url,
                attempts,
                last,
            } => SourceError::RetriesExhausted {
                url,
                attempts,
                details: last.to_string(),
            },
            DownloadError::ChecksumUnavailable { url, details } => {
                SourceError::network_request("fetch checksum", format!("{url}: {details}"))
            }
            DownloadError::ChecksumMalformed { url } => SourceError::ChecksumMalformed {
                url,
                details: "no digest token".to_string(),
            },
            DownloadError::ChecksumMismatch {
                expected, actual, ..
            } => SourceError::ChecksumMismatch { expected, actual },
            DownloadError::Cancelled => SourceError::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the 1-based `attempt`: nothing before the first, then
    /// the base delay doubling for every further attempt.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt <= 1 {
            return None;
        }
        let exponent = (attempt - 2).min(16);
        Some(self.base_delay.saturating_mul(1_u32 << exponent))
    }
}

/// Fetches files with bounded retries and optional SHA-512 verification.
///
/// Transfers within one call are sequential; the calling task waits through
/// every attempt and backoff.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl Downloader {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Download `url` to `dest`, retrying failed attempts.
    ///
    /// A failed attempt never leaves `dest` behind.
    ///
    /// # Errors
    /// Returns [`DownloadError::RetriesExhausted`] wrapping the last failure
    /// once every attempt failed, or [`DownloadError::Cancelled`].
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            if let Some(delay) = self.policy.delay_before(attempt) {
                debug!("Retrying {url} in {delay:?} (attempt {attempt}/{attempts})");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            match self.download_once(url, dest, progress, cancel).await {
                Ok(bytes) => {
                    info!("Downloaded {url}: {bytes} bytes");
                    return Ok(bytes);
                }
                Err(error) => {
                    remove_partial(dest).await;
                    if matches!(error, DownloadError::Cancelled) {
                        return Err(error);
                    }
                    warn!("Download attempt {attempt}/{attempts} for {url} failed: {error}");
                    if attempt >= attempts {
                        return Err(DownloadError::RetriesExhausted {
                            url: url.to_string(),
                            attempts,
                            last: Box::new(error),
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Download `url` to `dest` and verify it against the SHA-512 digest
    /// published at `checksum_url`.
    ///
    /// The checksum is fetched once, without retry. On mismatch the
    /// downloaded file is left in place for the caller to dispose of.
    ///
    /// # Errors
    /// Returns [`DownloadError::ChecksumUnavailable`] when the checksum cannot
    /// be fetched, [`DownloadError::ChecksumMismatch`] when the digests
    /// differ, or any error from [`Downloader::download`].
    pub async fn download_with_checksum(
        &self,
        url: &str,
        checksum_url: &str,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let expected = self.fetch_checksum(checksum_url, cancel).await?;
        self.download(url, dest, progress, cancel).await?;

        let hash_path = dest.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || sha512_file(&hash_path))
            .await
            .map_err(|error| {
                DownloadError::io("checksum task failed for", dest, std::io::Error::other(error))
            })??;
        if actual.eq_ignore_ascii_case(&expected) {
            info!("Checksum verified for {}", dest.display());
            Ok(())
        } else {
            Err(DownloadError::ChecksumMismatch {
                path: dest.to_path_buf(),
                expected,
                actual,
            })
        }
    }

    async fn fetch_checksum(
        &self,
        checksum_url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, DownloadError> {
        let unavailable = |details: String| DownloadError::ChecksumUnavailable {
            url: checksum_url.to_string(),
            details,
        };

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(checksum_url).send() => {
                response.map_err(|error| unavailable(error.to_string()))?
            }
        };
        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|error| unavailable(error.to_string()))?;
        parse_checksum(&body).ok_or_else(|| DownloadError::ChecksumMalformed {
            url: checksum_url.to_string(),
        })
    }

    async fn download_once(
        &self,
        url: &str,
        dest: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<u64, DownloadError> {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            response = self.client.get(url).send() => {
                response.map_err(|source| DownloadError::request(url, source))?
            }
        };

        if !response.status().is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|error| DownloadError::io("failed to create download file", dest, error))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|source| DownloadError::request(url, source))?;
            file.write_all(&chunk)
                .await
                .map_err(|error| DownloadError::io("failed to write download data", dest, error))?;
            downloaded += chunk.len() as u64;
            progress.report(downloaded, total);
        }

        file.flush()
            .await
            .map_err(|error| DownloadError::io("failed to flush download file", dest, error))?;

        Ok(downloaded)
    }
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!("Removed partial download {}", dest.display()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(
            "Failed to remove partial download {}: {error}",
            dest.display()
        ),
    }
}

/// First whitespace-separated token of a checksum file, lowercased. Any
/// trailing file name field is ignored.
pub(crate) fn parse_checksum(body: &str) -> Option<String> {
    body.split_whitespace()
        .next()
        .map(str::to_ascii_lowercase)
}

pub(crate) fn sha512_file(path: &Path) -> Result<String, DownloadError> {
    let mut file = std::fs::File::open(path)
        .map_err(|error| DownloadError::io("failed to open file for checksum", path, error))?;
    let mut hasher = Sha512::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|error| DownloadError::io("failed to read file for checksum", path, error))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
