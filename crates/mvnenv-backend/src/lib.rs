mod error;
mod traits;
mod types;

pub use error::{NetworkStage, ResolveError, SourceError};
pub use traits::{NoProgress, ProgressSink, VersionResolver, VersionSource};
pub use types::{InstallState, MavenVersion, ResolvedVersion, VersionParseError};
