//! Acquisition and execution pipeline for mvnenv.
//!
//! This crate holds everything between the CLI and the filesystem or
//! network:
//! - Version discovery across the public archive and an optional
//!   authenticated repository, with fallback.
//! - Retrying, SHA-512 verified downloads and root-stripped extraction.
//! - Installation, shim generation and shim dispatch.
//! - The cached remote version list.

mod cache;
mod config;
mod download;
mod exec;
mod extract;
mod http;
mod install;
mod repository;
mod shims;
mod signals;
mod sources;

/// Persisted remote version list.
pub use cache::{CacheError, CacheManager, CacheRecord};
/// Authenticated repository connection settings.
pub use config::{DEFAULT_ARTIFACT_ID, DEFAULT_GROUP_ID, RepositorySettings};
/// Retrying file fetcher with checksum verification.
pub use download::{DownloadError, Downloader, RetryPolicy};
/// Shim dispatch to the active version's command.
pub use exec::{ExecError, ExecutorOptions, MAVEN_HOME_ENV, ShimExecutor, exit_code, shim_identity};
/// Distribution archive extraction.
pub use extract::{ExtractError, extract_stripped};
/// Shared HTTP client configuration.
pub use http::{HttpOptions, build_client};
/// Installing and removing versions.
pub use install::{INCOMPLETE_MARKER, InstallError, Installer, inspect_install, installed_versions};
/// Source aggregation with fallback.
pub use repository::{RepositoryManager, merge_versions};
/// Shim pair generation and the command manifest.
pub use shims::{ShimError, ShimGenerator, ShimManifest, render_script};
/// Interrupt handling for long-running operations.
pub use signals::cancel_on_signal;
/// Concrete version sources.
pub use sources::{ArchiveSource, AuthenticatedSource, DEFAULT_ARCHIVE_URL, RepositoryMetadata};
