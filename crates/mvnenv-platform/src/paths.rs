use std::path::PathBuf;
use thiserror::Error;

use crate::environment::ROOT_ENV;
use crate::layout::ShimLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ToolPathsError {
    #[error("Could not determine home directory; set {ROOT_ENV} to choose a root")]
    HomeDirUnavailable,
}

/// Directory layout under the tool root:
///
/// ```text
/// <root>/cache/              download staging and the version list cache
/// <root>/versions/<version>/ installed distributions
/// <root>/shims/              dispatcher pairs placed on PATH
/// <root>/bin/                the shared dispatcher binary
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub versions_dir: PathBuf,
    pub shims_dir: PathBuf,
    pub bin_dir: PathBuf,
}

impl ToolPaths {
    /// Resolve the root from `MVNENV_ROOT`, falling back to `~/.mvnenv`.
    ///
    /// # Errors
    /// Returns an error when no override is set and the home directory cannot
    /// be determined.
    pub fn from_env() -> Result<Self, ToolPathsError> {
        let root_override = std::env::var_os(ROOT_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        if let Some(root) = root_override {
            return Ok(Self::at(root));
        }

        let home = dirs::home_dir().ok_or(ToolPathsError::HomeDirUnavailable)?;
        Ok(Self::at(home.join(".mvnenv")))
    }

    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cache_dir: root.join("cache"),
            versions_dir: root.join("versions"),
            shims_dir: root.join("shims"),
            bin_dir: root.join("bin"),
            root,
        }
    }

    #[must_use]
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir.join(version)
    }

    #[must_use]
    pub fn version_cache_file(&self) -> PathBuf {
        self.cache_dir.join("versions.json")
    }

    /// Deterministic staging path of a downloaded distribution archive.
    #[must_use]
    pub fn archive_file(&self, version: &str) -> PathBuf {
        self.cache_dir.join(format!("apache-maven-{version}-bin.zip"))
    }

    #[must_use]
    pub fn install_lock_file(&self, version: &str) -> PathBuf {
        self.cache_dir.join(format!("{version}.lock"))
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    #[must_use]
    pub fn global_version_file(&self) -> PathBuf {
        self.root.join("version")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.root.join("mvnenv.log")
    }

    #[must_use]
    pub fn shim_manifest_file(&self) -> PathBuf {
        self.shims_dir.join("shims.json")
    }

    #[must_use]
    pub fn dispatcher_template(&self, layout: &ShimLayout) -> PathBuf {
        self.bin_dir.join(layout.template_name())
    }

    /// Ensure the cache and versions directories exist on disk.
    ///
    /// # Errors
    /// Returns an error if any directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.versions_dir)?;
        Ok(())
    }
}
