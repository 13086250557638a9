use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{MavenVersion, ResolveError, VersionResolver};
use mvnenv_platform::{SHIM_COMMAND_ENV, ShimLayout};

use crate::shims::ShimManifest;
use crate::signals::cancel_on_signal;

pub const MAVEN_HOME_ENV: &str = "MAVEN_HOME";

const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);
const FALLBACK_EXIT_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(
        "Maven {version} is set by {origin} but is not installed; run 'mvnenv install {version}'"
    )]
    NotInstalled { version: String, origin: String },
    #[error(
        "No Maven version set; run 'mvnenv global <version>' or add a .maven-version file"
    )]
    NoVersionSet,
    #[error("failed to resolve the active Maven version: {0}")]
    Resolve(String),
    #[error("cannot determine which command this shim serves")]
    UnknownIdentity,
    #[error("'{command}' is not served by mvnenv shims; run 'mvnenv rehash'")]
    UnknownCommand { command: String },
    #[error(
        "'{command}' not found for Maven {version} at {}; the installation is damaged, reinstall it with 'mvnenv uninstall {version}' and 'mvnenv install {version}'",
        path.display()
    )]
    CommandMissing {
        command: String,
        version: MavenVersion,
        path: PathBuf,
    },
    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {command}: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
}

impl From<ResolveError> for ExecError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::NotInstalled { version, origin } => Self::NotInstalled { version, origin },
            ResolveError::NoneSet => Self::NoVersionSet,
            ResolveError::Other(details) => Self::Resolve(details),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Log a diagnostic block before spawning and the elapsed time after.
    pub diagnostics: bool,
    /// How long to wait for a killed child to be reaped.
    pub kill_grace: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            diagnostics: false,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

/// Work out which command a dispatcher invocation serves.
///
/// An explicit identity from the wrapper script wins over the executable's
/// own file name. When a manifest is present the command must be listed.
///
/// # Errors
/// Returns [`ExecError::UnknownIdentity`] when neither source names a
/// command, or [`ExecError::UnknownCommand`] for an unlisted command.
pub fn shim_identity(
    layout: &ShimLayout,
    explicit: Option<&str>,
    invoked_as: &Path,
    manifest: Option<&ShimManifest>,
) -> Result<String, ExecError> {
    let command = match explicit.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => {
            let file_name = invoked_as
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or(ExecError::UnknownIdentity)?;
            layout.command_from_native(file_name).to_string()
        }
    };

    match manifest {
        Some(manifest) if !manifest.contains(&command) => {
            Err(ExecError::UnknownCommand { command })
        }
        _ => Ok(command),
    }
}

/// Exit code of a finished child. Signal deaths map to `128 + signal` on
/// Unix; anything else without a code maps to 1.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    FALLBACK_EXIT_CODE
}

/// Runs the real Maven command for the active version.
pub struct ShimExecutor {
    layout: ShimLayout,
    resolver: Arc<dyn VersionResolver>,
    options: ExecutorOptions,
}

impl ShimExecutor {
    #[must_use]
    pub fn new(
        layout: ShimLayout,
        resolver: Arc<dyn VersionResolver>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            layout,
            resolver,
            options,
        }
    }

    /// Arm interrupt handling, then [`ShimExecutor::execute`].
    ///
    /// # Errors
    /// See [`ShimExecutor::execute`].
    pub async fn run(&self, command: &str, args: &[OsString]) -> Result<i32, ExecError> {
        let cancel = CancellationToken::new();
        let listener = cancel_on_signal(cancel.clone()).map_err(ExecError::Signals)?;
        let result = self.execute(command, args, &cancel).await;
        listener.abort();
        result
    }

    /// Resolve the active version, locate `command` in it and run it with
    /// inherited standard streams. Returns the child's exit code.
    ///
    /// Cancelling `cancel` kills the child; the returned code then reflects
    /// the kill, or 1 if the child could not be reaped in time.
    ///
    /// # Errors
    /// Returns resolution failures, [`ExecError::CommandMissing`] when the
    /// resolved install lacks the command, and spawn or wait failures.
    pub async fn execute(
        &self,
        command: &str,
        args: &[OsString],
        cancel: &CancellationToken,
    ) -> Result<i32, ExecError> {
        let started = Instant::now();
        let resolved = self.resolver.resolve()?;
        let resolve_time = started.elapsed();

        let script = self.layout.command_script(&resolved.install_path, command);
        if !script.is_file() {
            return Err(ExecError::CommandMissing {
                command: command.to_string(),
                version: resolved.version,
                path: script,
            });
        }

        if self.options.diagnostics {
            debug!(
                "mvnenv shim\n  command:    {command}\n  arguments:  {args:?}\n  version:    {}\n  set by:     {}\n  executable: {}\n  MAVEN_HOME: {}\n  resolved in {resolve_time:?}",
                resolved.version,
                resolved.origin,
                script.display(),
                resolved.install_path.display(),
            );
        }

        let mut child = tokio::process::Command::new(&script)
            .args(args)
            .env(MAVEN_HOME_ENV, &resolved.install_path)
            .env_remove(SHIM_COMMAND_ENV)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                path: script.clone(),
                source,
            })?;

        let wait_error = |source| ExecError::Wait {
            command: command.to_string(),
            source,
        };

        let code = tokio::select! {
            status = child.wait() => exit_code(status.map_err(wait_error)?),
            () = cancel.cancelled() => {
                warn!("Stopping {command}");
                if let Err(error) = child.start_kill() {
                    warn!("Failed to kill {command}: {error}");
                }
                match tokio::time::timeout(self.options.kill_grace, child.wait()).await {
                    Ok(Ok(status)) => exit_code(status),
                    Ok(Err(error)) => {
                        warn!("Failed to reap {command}: {error}");
                        FALLBACK_EXIT_CODE
                    }
                    Err(_) => {
                        warn!("{command} did not exit within {:?}", self.options.kill_grace);
                        FALLBACK_EXIT_CODE
                    }
                }
            }
        };

        if self.options.diagnostics {
            debug!("{command} exited with {code} after {:?}", started.elapsed());
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_identity_wins_over_file_name() {
        let layout = ShimLayout::unix();

        let command = shim_identity(&layout, Some("mvnDebug"), Path::new("/x/mvn-shim"), None)
            .expect("identity should resolve");
        assert_eq!(command, "mvnDebug");
    }

    #[test]
    fn file_name_identity_strips_native_suffix() {
        let command = shim_identity(&ShimLayout::windows(), None, Path::new("mvn.exe"), None)
            .expect("identity should resolve");
        assert_eq!(command, "mvn");

        let command = shim_identity(
            &ShimLayout::unix(),
            Some("  "),
            Path::new("/home/u/.mvnenv/shims/mvnDebug-shim"),
            None,
        )
        .expect("identity should resolve");
        assert_eq!(command, "mvnDebug");
    }

    #[test]
    fn unlisted_command_is_rejected() {
        let manifest = ShimManifest {
            commands: vec!["mvn".to_string()],
        };

        let error = shim_identity(
            &ShimLayout::unix(),
            Some("mvnyjp"),
            Path::new("mvn-shim"),
            Some(&manifest),
        )
        .expect_err("unlisted command must fail");
        assert!(matches!(error, ExecError::UnknownCommand { .. }));
    }

    #[test]
    fn resolver_failures_name_their_remedy() {
        let not_installed = ExecError::from(ResolveError::NotInstalled {
            version: "3.9.4".to_string(),
            origin: "/work/.maven-version".to_string(),
        });
        assert!(not_installed.to_string().contains("mvnenv install 3.9.4"));

        let none = ExecError::from(ResolveError::NoneSet);
        assert!(none.to_string().contains("mvnenv global <version>"));
    }

    #[cfg(unix)]
    #[test]
    fn signal_deaths_map_above_128() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
    }
}
