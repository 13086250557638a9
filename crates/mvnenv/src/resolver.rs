use std::path::{Path, PathBuf};

use log::debug;

use mvnenv_backend::{MavenVersion, ResolveError, ResolvedVersion, VersionResolver};
use mvnenv_core::inspect_install;
use mvnenv_platform::{ShimLayout, ToolPaths, VERSION_ENV};

pub const LOCAL_VERSION_FILE: &str = ".maven-version";

/// Picks the active version from, in order: an override value, the nearest
/// `.maven-version` above the working directory, and the global file.
#[derive(Debug, Clone)]
pub struct FileResolver {
    paths: ToolPaths,
    layout: ShimLayout,
    working_dir: PathBuf,
    override_version: Option<String>,
}

impl FileResolver {
    #[must_use]
    pub fn new(
        paths: ToolPaths,
        layout: ShimLayout,
        working_dir: PathBuf,
        override_version: Option<String>,
    ) -> Self {
        Self {
            paths,
            layout,
            working_dir,
            override_version: override_version.filter(|value| !value.trim().is_empty()),
        }
    }

    /// The selected version string and where it came from, without checking
    /// that it is installed.
    ///
    /// # Errors
    /// Returns [`ResolveError::NoneSet`] when nothing selects a version.
    pub fn selected(&self) -> Result<(String, String), ResolveError> {
        if let Some(value) = &self.override_version {
            return Ok((
                value.trim().to_string(),
                format!("{VERSION_ENV} environment variable"),
            ));
        }

        if let Some((value, file)) = self.local_file() {
            return Ok((value, file.display().to_string()));
        }

        let global = self.paths.global_version_file();
        if let Some(value) = read_version_file(&global) {
            return Ok((value, global.display().to_string()));
        }

        Err(ResolveError::NoneSet)
    }

    fn local_file(&self) -> Option<(String, PathBuf)> {
        self.working_dir.ancestors().find_map(|dir| {
            let candidate = dir.join(LOCAL_VERSION_FILE);
            read_version_file(&candidate).map(|value| (value, candidate))
        })
    }
}

fn read_version_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let value = content.lines().next()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl VersionResolver for FileResolver {
    fn resolve(&self) -> Result<ResolvedVersion, ResolveError> {
        let (value, origin) = self.selected()?;
        debug!("Maven {value} selected by {origin}");

        let version: MavenVersion = value.parse().map_err(|error| {
            ResolveError::Other(format!("invalid version set by {origin}: {error}"))
        })?;
        if !self.is_installed(&version) {
            return Err(ResolveError::NotInstalled {
                version: value,
                origin,
            });
        }

        Ok(ResolvedVersion {
            install_path: self.install_path(&version),
            version,
            origin,
        })
    }

    fn is_installed(&self, version: &MavenVersion) -> bool {
        inspect_install(&self.layout, &self.install_path(version)).is_valid()
    }

    fn install_path(&self, version: &MavenVersion) -> PathBuf {
        self.paths.version_dir(version.as_str())
    }
}

/// Write `version` as the single line of a version file.
///
/// # Errors
/// Returns an I/O error when the file cannot be written.
pub fn write_version_file(path: &Path, version: &MavenVersion) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{version}\n"))
}
