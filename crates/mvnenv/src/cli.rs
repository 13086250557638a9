use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mvnenv")]
#[command(about = "Install Maven versions and pick one per directory")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Download and install a Maven version")]
    Install { version: String },
    #[command(about = "Remove an installed Maven version")]
    Uninstall { version: String },
    #[command(about = "List installed versions")]
    List,
    #[command(about = "List versions available for installation")]
    ListRemote {
        #[arg(long, help = "Ignore the cached list and query the repositories")]
        refresh: bool,
    },
    #[command(about = "Regenerate shims for every installed command")]
    Rehash,
    #[command(about = "Set the default version")]
    Global { version: String },
    #[command(about = "Set the version for the current directory")]
    Local { version: String },
    #[command(about = "Show the active version and what selected it")]
    Version,
    #[command(about = "Upload a distribution archive to the authenticated repository")]
    Publish { version: String, file: PathBuf },
    #[command(about = "Run a command from the active version")]
    Exec {
        command: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_keeps_hyphenated_arguments_for_the_child() {
        let cli = Cli::try_parse_from(["mvnenv", "exec", "mvn", "-q", "clean", "--batch-mode"])
            .expect("exec should parse");

        let Commands::Exec { command, args } = cli.command else {
            panic!("expected exec command");
        };
        assert_eq!(command, "mvn");
        assert_eq!(
            args,
            ["-q", "clean", "--batch-mode"]
                .map(OsString::from)
                .to_vec()
        );
    }

    #[test]
    fn list_remote_refresh_flag_parses() {
        let cli = Cli::try_parse_from(["mvnenv", "list-remote", "--refresh"])
            .expect("list-remote should parse");

        assert!(matches!(cli.command, Commands::ListRemote { refresh: true }));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
