#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mvnenv_backend::{MavenVersion, ResolveError, ResolvedVersion, VersionResolver};
use mvnenv_core::inspect_install;
use mvnenv_platform::{ShimLayout, ToolPaths};

/// A Maven-shaped distribution: `apache-maven-<v>/bin/<scripts>` plus a
/// config file.
pub fn distribution_zip(version: &str, scripts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let dir = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    let exec = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    let plain = zip::write::SimpleFileOptions::default().unix_permissions(0o644);
    let root = format!("apache-maven-{version}");

    writer
        .add_directory(format!("{root}/"), dir)
        .expect("root entry should be written");
    writer
        .add_directory(format!("{root}/bin/"), dir)
        .expect("bin entry should be written");
    for (name, body) in scripts {
        writer
            .start_file(format!("{root}/bin/{name}"), exec)
            .expect("script entry should be started");
        writer
            .write_all(body.as_bytes())
            .expect("script entry should be written");
    }
    writer
        .start_file(format!("{root}/conf/settings.xml"), plain)
        .expect("config entry should be started");
    writer
        .write_all(b"<settings/>")
        .expect("config entry should be written");

    writer
        .finish()
        .expect("zip archive should be finalized")
        .into_inner()
}

/// The platform marker script that makes an install valid.
pub fn marker_name() -> &'static str {
    if cfg!(windows) { "mvn.cmd" } else { "mvn" }
}

pub fn sha512_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha512};
    format!("{:x}", Sha512::digest(data))
}

pub fn version(value: &str) -> MavenVersion {
    value.parse().expect("version should parse")
}

/// Resolver over a tool root with a settable active version.
pub struct TestResolver {
    paths: ToolPaths,
    layout: ShimLayout,
    active: Mutex<Option<String>>,
}

impl TestResolver {
    pub fn new(root: &Path) -> Self {
        Self {
            paths: ToolPaths::at(root),
            layout: ShimLayout::current(),
            active: Mutex::new(None),
        }
    }

    pub fn set_active(&self, version: &str) {
        *self.active.lock().expect("lock should not be poisoned") = Some(version.to_string());
    }
}

impl VersionResolver for TestResolver {
    fn resolve(&self) -> Result<ResolvedVersion, ResolveError> {
        let active = self
            .active
            .lock()
            .expect("lock should not be poisoned")
            .clone()
            .ok_or(ResolveError::NoneSet)?;
        let version: MavenVersion = active
            .parse()
            .map_err(|error: mvnenv_backend::VersionParseError| ResolveError::Other(error.to_string()))?;
        if !self.is_installed(&version) {
            return Err(ResolveError::NotInstalled {
                version: active,
                origin: "test".to_string(),
            });
        }
        Ok(ResolvedVersion {
            install_path: self.install_path(&version),
            version,
            origin: "test".to_string(),
        })
    }

    fn is_installed(&self, version: &MavenVersion) -> bool {
        inspect_install(&self.layout, &self.install_path(version)).is_valid()
    }

    fn install_path(&self, version: &MavenVersion) -> PathBuf {
        self.paths.version_dir(version.as_str())
    }
}
