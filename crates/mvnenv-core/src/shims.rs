use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mvnenv_platform::{BASE_COMMANDS, SHIM_COMMAND_ENV, ScriptKind, ShimLayout, ToolPaths};

use crate::install::installed_versions;

#[derive(Debug, Error)]
pub enum ShimError {
    #[error("dispatcher binary {} not found; reinstall mvnenv", path.display())]
    MissingTemplate { path: PathBuf },
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shim manifest {} is malformed: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl ShimError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Command names the shims directory serves, written next to the shims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShimManifest {
    pub commands: Vec<String>,
}

impl ShimManifest {
    /// # Errors
    /// Returns [`ShimError::Manifest`] for an unparseable file. A missing
    /// file yields `None`.
    pub fn load(path: &Path) -> Result<Option<Self>, ShimError> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(ShimError::io("failed to read", path, error)),
        };
        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| ShimError::Manifest {
                path: path.to_path_buf(),
                source,
            })
    }

    #[must_use]
    pub fn contains(&self, command: &str) -> bool {
        self.commands.iter().any(|known| known == command)
    }
}

/// The wrapper script for `command`. It names the command explicitly and
/// hands over to the sibling dispatcher copy, exiting with its status.
#[must_use]
pub fn render_script(layout: &ShimLayout, command: &str) -> String {
    let native = layout.native_name(command);
    match layout.script_kind {
        ScriptKind::Cmd => format!(
            "@echo off\r\nsetlocal\r\nset \"{SHIM_COMMAND_ENV}={command}\"\r\n\"%~dp0{native}\" %*\r\nexit /b %ERRORLEVEL%\r\n"
        ),
        ScriptKind::Posix => format!(
            "#!/bin/sh\n{SHIM_COMMAND_ENV}={command} exec \"$(dirname \"$0\")/{native}\" \"$@\"\n"
        ),
    }
}

pub struct ShimGenerator {
    paths: ToolPaths,
    layout: ShimLayout,
}

impl ShimGenerator {
    #[must_use]
    pub fn new(paths: ToolPaths, layout: ShimLayout) -> Self {
        Self { paths, layout }
    }

    /// Base commands followed by commands discovered in valid installs, in
    /// version order, without duplicates.
    ///
    /// # Errors
    /// Returns an I/O error when the versions root cannot be read.
    pub fn discover_commands(&self) -> Result<Vec<String>, ShimError> {
        let mut seen: HashSet<String> = BASE_COMMANDS.iter().map(ToString::to_string).collect();
        let mut commands: Vec<String> = BASE_COMMANDS.iter().map(ToString::to_string).collect();

        let versions = installed_versions(&self.paths, &self.layout).map_err(|error| {
            ShimError::io("failed to read", &self.paths.versions_dir, error)
        })?;

        for (version, state) in versions {
            if !state.is_valid() {
                continue;
            }
            let bin = self.paths.version_dir(version.as_str()).join("bin");
            let entries = match std::fs::read_dir(&bin) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!("Skipping {}: {error}", bin.display());
                    continue;
                }
            };

            let mut names: Vec<String> = entries
                .filter_map(Result::ok)
                .filter(|entry| is_command_file(&entry.path()))
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect();
            names.sort();

            for name in names {
                if let Some(command) = self.layout.command_from_bin_entry(&name)
                    && seen.insert(command.to_string())
                {
                    debug!("Discovered command {command} in Maven {version}");
                    commands.push(command.to_string());
                }
            }
        }

        Ok(commands)
    }

    /// Regenerate every shim pair and the manifest. Pairs for commands no
    /// longer served are removed.
    ///
    /// # Errors
    /// Returns [`ShimError::MissingTemplate`] when the dispatcher binary is
    /// absent, or an I/O error when a shim cannot be written.
    pub fn generate_shims(&self) -> Result<Vec<String>, ShimError> {
        let template = self.paths.dispatcher_template(&self.layout);
        if !template.is_file() {
            return Err(ShimError::MissingTemplate { path: template });
        }

        let shims_dir = &self.paths.shims_dir;
        std::fs::create_dir_all(shims_dir)
            .map_err(|error| ShimError::io("failed to create", shims_dir, error))?;

        let commands = self.discover_commands()?;
        for command in &commands {
            let native = shims_dir.join(self.layout.native_name(command));
            copy_atomic(&template, &native)?;

            let script = shims_dir.join(self.layout.script_name(command));
            write_executable(&script, render_script(&self.layout, command).as_bytes())?;
        }

        let manifest_path = self.paths.shim_manifest_file();
        let previous = match ShimManifest::load(&manifest_path) {
            Ok(previous) => previous.unwrap_or_default(),
            Err(error) => {
                warn!("Ignoring previous shim manifest: {error}");
                ShimManifest::default()
            }
        };
        for stale in previous
            .commands
            .iter()
            .filter(|command| !commands.contains(*command))
        {
            self.remove_pair(stale);
        }

        let manifest = ShimManifest {
            commands: commands.clone(),
        };
        let data = serde_json::to_vec_pretty(&manifest).map_err(|source| ShimError::Manifest {
            path: manifest_path.clone(),
            source,
        })?;
        crate::cache::write_atomic(&manifest_path, &data)
            .map_err(|error| ShimError::io("failed to write", &manifest_path, error))?;

        info!("Generated {} shims in {}", commands.len(), shims_dir.display());
        Ok(commands)
    }

    fn remove_pair(&self, command: &str) {
        for name in [
            self.layout.native_name(command),
            self.layout.script_name(command),
        ] {
            let path = self.paths.shims_dir.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale shim {}", path.display()),
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => warn!("Failed to remove stale shim {}: {error}", path.display()),
            }
        }
    }
}

#[cfg(unix)]
fn is_command_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_command_file(path: &Path) -> bool {
    path.is_file()
}

fn copy_atomic(src: &Path, dst: &Path) -> Result<(), ShimError> {
    let mut input =
        std::fs::File::open(src).map_err(|error| ShimError::io("failed to open", src, error))?;
    let mut tmp = temp_beside(dst)?;
    std::io::copy(&mut input, tmp.as_file_mut())
        .map_err(|error| ShimError::io("failed to copy into", dst, error))?;
    persist_executable(tmp, dst)
}

fn write_executable(dst: &Path, data: &[u8]) -> Result<(), ShimError> {
    let mut tmp = temp_beside(dst)?;
    tmp.write_all(data)
        .map_err(|error| ShimError::io("failed to write", dst, error))?;
    persist_executable(tmp, dst)
}

fn temp_beside(dst: &Path) -> Result<tempfile::NamedTempFile, ShimError> {
    let dir = dst.parent().unwrap_or_else(|| Path::new("."));
    tempfile::NamedTempFile::new_in(dir)
        .map_err(|error| ShimError::io("failed to create temp file in", dir, error))
}

fn persist_executable(tmp: tempfile::NamedTempFile, dst: &Path) -> Result<(), ShimError> {
    tmp.as_file()
        .sync_all()
        .map_err(|error| ShimError::io("failed to sync", dst, error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))
            .map_err(|error| ShimError::io("failed to set permissions on", dst, error))?;
    }

    tmp.persist(dst)
        .map_err(|error| ShimError::io("failed to replace", dst, error.error))?;
    Ok(())
}
