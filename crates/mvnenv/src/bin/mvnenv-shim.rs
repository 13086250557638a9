//! Dispatcher copied into the shims directory once per command.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use log::warn;

use mvnenv::error::AppError;
use mvnenv::logging::init_shim_logging;
use mvnenv::resolver::FileResolver;
use mvnenv_core::{ExecutorOptions, ShimExecutor, ShimManifest, shim_identity};
use mvnenv_platform::{SHIM_COMMAND_ENV, ShimLayout, ToolPaths, VERSION_ENV};

#[tokio::main]
async fn main() {
    let diagnostics = mvnenv::diagnostics_requested();
    init_shim_logging(diagnostics);

    let code = match dispatch(diagnostics).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("mvnenv: {error}");
            1
        }
    };
    log::logger().flush();
    std::process::exit(code);
}

async fn dispatch(diagnostics: bool) -> Result<i32, AppError> {
    let mut argv = std::env::args_os();
    let invoked_as = argv.next().map(PathBuf::from).unwrap_or_default();
    let args: Vec<OsString> = argv.collect();

    let paths = ToolPaths::from_env()?;
    let layout = ShimLayout::current();

    let manifest = ShimManifest::load(&paths.shim_manifest_file()).unwrap_or_else(|error| {
        warn!("Ignoring shim manifest: {error}");
        None
    });
    let explicit = std::env::var(SHIM_COMMAND_ENV).ok();
    let command = shim_identity(&layout, explicit.as_deref(), &invoked_as, manifest.as_ref())?;

    let working_dir = std::env::current_dir()
        .map_err(|error| AppError::io("failed to read working directory", ".", error))?;
    let resolver = FileResolver::new(
        paths,
        layout,
        working_dir,
        std::env::var(VERSION_ENV).ok(),
    );

    let executor = ShimExecutor::new(
        layout,
        Arc::new(resolver),
        ExecutorOptions {
            diagnostics,
            ..ExecutorOptions::default()
        },
    );
    Ok(executor.run(&command, &args).await?)
}
