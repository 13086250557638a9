use std::path::{Path, PathBuf};

/// Commands that always get a shim, whatever the installed versions ship.
pub const BASE_COMMANDS: [&str; 2] = ["mvn", "mvnDebug"];

const TEMPLATE_STEM: &str = "mvnenv-shim";
const MARKER_COMMAND: &str = "mvn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Cmd,
    Posix,
}

/// Platform naming rules for shims and for the command scripts shipped in a
/// Maven distribution's `bin` directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimLayout {
    pub script_kind: ScriptKind,
    exe_suffix: &'static str,
    native_suffix: &'static str,
    script_suffix: &'static str,
    command_suffix: &'static str,
}

impl ShimLayout {
    #[must_use]
    pub const fn windows() -> Self {
        Self {
            script_kind: ScriptKind::Cmd,
            exe_suffix: ".exe",
            native_suffix: ".exe",
            script_suffix: ".cmd",
            command_suffix: ".cmd",
        }
    }

    #[must_use]
    pub const fn unix() -> Self {
        Self {
            script_kind: ScriptKind::Posix,
            exe_suffix: "",
            native_suffix: "-shim",
            script_suffix: "",
            command_suffix: "",
        }
    }

    #[must_use]
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::unix()
        }
    }

    #[must_use]
    pub fn template_name(&self) -> String {
        format!("{TEMPLATE_STEM}{}", self.exe_suffix)
    }

    /// File name of the dispatcher copy serving `command`.
    #[must_use]
    pub fn native_name(&self, command: &str) -> String {
        format!("{command}{}", self.native_suffix)
    }

    /// File name of the wrapper script users invoke for `command`.
    #[must_use]
    pub fn script_name(&self, command: &str) -> String {
        format!("{command}{}", self.script_suffix)
    }

    /// Path of `command`'s script inside an installed distribution.
    #[must_use]
    pub fn command_script(&self, install_dir: &Path, command: &str) -> PathBuf {
        install_dir
            .join("bin")
            .join(format!("{command}{}", self.command_suffix))
    }

    /// The executable whose presence marks a complete installation.
    #[must_use]
    pub fn marker_executable(&self, install_dir: &Path) -> PathBuf {
        self.command_script(install_dir, MARKER_COMMAND)
    }

    /// Command name for a file found in a distribution's `bin` directory, if
    /// the file name looks like a command script on this platform. Names are
    /// pasted into generated scripts, so only `[A-Za-z0-9_-]` is accepted.
    #[must_use]
    pub fn command_from_bin_entry<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let command = match self.script_kind {
            ScriptKind::Cmd => {
                let split = file_name.len().checked_sub(self.command_suffix.len())?;
                let (stem, suffix) = file_name.split_at_checked(split)?;
                suffix.eq_ignore_ascii_case(self.command_suffix).then_some(stem)?
            }
            ScriptKind::Posix => (!file_name.contains('.')).then_some(file_name)?,
        };
        is_plain_command(command).then_some(command)
    }

    /// Command served by a dispatcher copy named `file_name`.
    #[must_use]
    pub fn command_from_native<'a>(&self, file_name: &'a str) -> &'a str {
        file_name
            .strip_suffix(self.native_suffix)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(file_name)
    }
}

fn is_plain_command(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{ScriptKind, ShimLayout};

    #[test]
    fn windows_names_pair_exe_with_cmd() {
        let layout = ShimLayout::windows();

        assert_eq!(layout.native_name("mvn"), "mvn.exe");
        assert_eq!(layout.script_name("mvn"), "mvn.cmd");
        assert_eq!(layout.template_name(), "mvnenv-shim.exe");
        assert_eq!(layout.script_kind, ScriptKind::Cmd);
        assert_eq!(
            layout.marker_executable(Path::new("versions/3.9.4")),
            Path::new("versions/3.9.4/bin/mvn.cmd")
        );
    }

    #[test]
    fn unix_names_keep_script_bare() {
        let layout = ShimLayout::unix();

        assert_eq!(layout.native_name("mvnDebug"), "mvnDebug-shim");
        assert_eq!(layout.script_name("mvnDebug"), "mvnDebug");
        assert_eq!(layout.template_name(), "mvnenv-shim");
        assert_eq!(
            layout.marker_executable(Path::new("versions/3.9.4")),
            Path::new("versions/3.9.4/bin/mvn")
        );
    }

    #[test]
    fn windows_bin_entries_require_cmd_suffix() {
        let layout = ShimLayout::windows();

        assert_eq!(layout.command_from_bin_entry("mvnyjp.cmd"), Some("mvnyjp"));
        assert_eq!(layout.command_from_bin_entry("MVN.CMD"), Some("MVN"));
        assert_eq!(layout.command_from_bin_entry("m2.conf"), None);
        assert_eq!(layout.command_from_bin_entry("mvn"), None);
        assert_eq!(layout.command_from_bin_entry(".cmd"), None);
    }

    #[test]
    fn unix_bin_entries_must_be_extensionless() {
        let layout = ShimLayout::unix();

        assert_eq!(layout.command_from_bin_entry("mvnyjp"), Some("mvnyjp"));
        assert_eq!(layout.command_from_bin_entry("mvn.cmd"), None);
        assert_eq!(layout.command_from_bin_entry("m2.conf"), None);
    }

    #[test]
    fn bin_entries_with_shell_metacharacters_are_ignored() {
        let unix = ShimLayout::unix();
        for name in ["mvn x", "a;rm", "mvn$(id)", "mvn`id`", "m\"q", "mvn&"] {
            assert_eq!(unix.command_from_bin_entry(name), None, "{name:?}");
        }
        assert_eq!(unix.command_from_bin_entry("mvn_debug-2"), Some("mvn_debug-2"));

        let windows = ShimLayout::windows();
        assert_eq!(windows.command_from_bin_entry("m v.cmd"), None);
        assert_eq!(windows.command_from_bin_entry("a&b.cmd"), None);
        assert_eq!(windows.command_from_bin_entry("%PATH%.cmd"), None);
    }

    #[test]
    fn native_suffix_is_stripped_from_invoked_name() {
        assert_eq!(ShimLayout::windows().command_from_native("mvn.exe"), "mvn");
        assert_eq!(ShimLayout::unix().command_from_native("mvnDebug-shim"), "mvnDebug");
        assert_eq!(ShimLayout::unix().command_from_native("mvn"), "mvn");
        assert_eq!(ShimLayout::unix().command_from_native("-shim"), "-shim");
    }
}
