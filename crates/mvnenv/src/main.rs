use clap::Parser;

use mvnenv::cli::Cli;
use mvnenv::commands::{self, Context};
use mvnenv::error::AppError;
use mvnenv::logging::init_logging;
use mvnenv::settings::AppSettings;
use mvnenv_platform::{ShimLayout, ToolPaths, VERSION_ENV};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(error) => {
            log::debug!("Command failed: {error:?}");
            eprintln!("mvnenv: {error}");
            1
        }
    };
    log::logger().flush();
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32, AppError> {
    let diagnostics = mvnenv::diagnostics_requested();
    let paths = ToolPaths::from_env()?;
    let settings = AppSettings::load(&paths.settings_file());
    let max_log_size = settings
        .as_ref()
        .map_or_else(|_| AppSettings::default().max_log_size_bytes, |s| s.max_log_size_bytes);
    init_logging(&paths, diagnostics, max_log_size);
    let settings = settings?;

    let working_dir = std::env::current_dir()
        .map_err(|error| AppError::io("failed to read working directory", ".", error))?;

    let context = Context {
        paths,
        layout: ShimLayout::current(),
        settings,
        working_dir,
        version_override: std::env::var(VERSION_ENV).ok(),
        diagnostics,
    };

    commands::run(cli.command, &context).await
}
