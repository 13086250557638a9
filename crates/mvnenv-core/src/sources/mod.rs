mod archive;
mod authenticated;

pub use archive::{ArchiveSource, DEFAULT_ARCHIVE_URL};
pub use authenticated::{AuthenticatedSource, RepositoryMetadata};
