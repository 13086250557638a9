use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use mvnenv_backend::{InstallState, MavenVersion, ProgressSink, VersionResolver};
use mvnenv_core::{
    ArchiveSource, AuthenticatedSource, CacheManager, Downloader, ExecError, ExecutorOptions,
    Installer, RepositoryManager, ShimExecutor, ShimGenerator, build_client, cancel_on_signal,
    installed_versions,
};
use mvnenv_platform::{ShimLayout, ToolPaths};

use crate::cli::Commands;
use crate::error::AppError;
use crate::resolver::{FileResolver, LOCAL_VERSION_FILE, write_version_file};
use crate::settings::AppSettings;

/// Everything a command needs, gathered once in `main`.
pub struct Context {
    pub paths: ToolPaths,
    pub layout: ShimLayout,
    pub settings: AppSettings,
    pub working_dir: PathBuf,
    pub version_override: Option<String>,
    pub diagnostics: bool,
}

impl Context {
    pub fn resolver(&self) -> FileResolver {
        FileResolver::new(
            self.paths.clone(),
            self.layout,
            self.working_dir.clone(),
            self.version_override.clone(),
        )
    }

    fn repository(&self) -> Result<RepositoryManager, AppError> {
        let http = self.settings.http_options();
        let client = build_client(&http).map_err(|error| AppError::Client(error.to_string()))?;
        let downloader =
            Downloader::new(client.clone()).with_retry_policy(self.settings.retry_policy());
        let archive = ArchiveSource::new(client, downloader, &self.settings.archive_url);

        Ok(RepositoryManager::new(
            Arc::new(archive),
            self.settings.repository.clone(),
            http,
        ))
    }

    fn shim_generator(&self) -> ShimGenerator {
        ShimGenerator::new(self.paths.clone(), self.layout)
    }
}

/// Run a manager command. Returns the process exit code.
///
/// # Errors
/// Returns the command's failure for the caller to report.
pub async fn run(command: Commands, context: &Context) -> Result<i32, AppError> {
    match command {
        Commands::Install { version } => install(context, &version.parse()?).await,
        Commands::Uninstall { version } => uninstall(context, &version.parse()?),
        Commands::List => list(context),
        Commands::ListRemote { refresh } => list_remote(context, refresh).await,
        Commands::Rehash => rehash(context),
        Commands::Global { version } => global(context, &version.parse()?),
        Commands::Local { version } => local(context, &version.parse()?),
        Commands::Version => current_version(context),
        Commands::Publish { version, file } => publish(context, &version.parse()?, &file).await,
        Commands::Exec { command, args } => exec(context, &command, &args).await,
    }
}

fn progress_bar(message: String) -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    bar.set_message(message);
    bar
}

fn bar_sink(bar: &ProgressBar) -> impl ProgressSink + '_ {
    move |done: u64, total: Option<u64>| {
        if let Some(total) = total {
            bar.set_length(total);
        }
        bar.set_position(done);
    }
}

fn with_interrupts() -> Result<(CancellationToken, tokio::task::JoinHandle<()>), AppError> {
    let cancel = CancellationToken::new();
    let listener = cancel_on_signal(cancel.clone())
        .map_err(|error| AppError::Exec(ExecError::Signals(error)))?;
    Ok((cancel, listener))
}

fn regenerate_shims(context: &Context) {
    match context.shim_generator().generate_shims() {
        Ok(commands) => info!("Shims regenerated for {} commands", commands.len()),
        Err(error) => warn!("Shims were not regenerated: {error}; run 'mvnenv rehash'"),
    }
}

async fn install(context: &Context, version: &MavenVersion) -> Result<i32, AppError> {
    let resolver: Arc<dyn VersionResolver> = Arc::new(context.resolver());
    let installer = Installer::new(
        context.paths.clone(),
        context.layout,
        Arc::new(context.repository()?),
        resolver,
    );

    let (cancel, listener) = with_interrupts()?;
    let bar = progress_bar(format!("Maven {version}"));
    let result = installer
        .install_version(version, &bar_sink(&bar), &cancel)
        .await;
    listener.abort();
    bar.finish_and_clear();

    let path = result?;
    println!("Installed Maven {version} to {}", path.display());
    regenerate_shims(context);
    Ok(0)
}

fn uninstall(context: &Context, version: &MavenVersion) -> Result<i32, AppError> {
    let installer = Installer::new(
        context.paths.clone(),
        context.layout,
        Arc::new(context.repository()?),
        Arc::new(context.resolver()),
    );
    installer.uninstall_version(version)?;
    println!("Uninstalled Maven {version}");
    regenerate_shims(context);
    Ok(0)
}

fn list(context: &Context) -> Result<i32, AppError> {
    let versions = installed_versions(&context.paths, &context.layout).map_err(|error| {
        AppError::io("failed to read", &context.paths.versions_dir, error)
    })?;
    if versions.is_empty() {
        println!("No Maven versions installed; run 'mvnenv install <version>'");
        return Ok(0);
    }

    let active = context.resolver().selected().ok().map(|(value, _)| value);
    for (version, state) in versions {
        let marker = if active.as_deref() == Some(version.as_str()) {
            "*"
        } else {
            " "
        };
        match state {
            InstallState::Valid => println!("{marker} {version}"),
            InstallState::Tainted | InstallState::Missing => {
                println!("{marker} {version} (incomplete; run 'mvnenv install {version}')");
            }
        }
    }
    Ok(0)
}

async fn list_remote(context: &Context, refresh: bool) -> Result<i32, AppError> {
    let cache = CacheManager::new(context.paths.version_cache_file());

    let versions = if !refresh && !cache.is_cache_stale(context.settings.cache_ttl()) {
        info!("Using cached version list from {}", cache.path().display());
        cache.load_versions()?
    } else {
        let (cancel, listener) = with_interrupts()?;
        let result = context.repository()?.list_versions(&cancel).await;
        listener.abort();
        let versions = result?;
        if let Err(error) = cache.save_versions(&versions) {
            warn!("Failed to cache version list: {error}");
        }
        versions
    };

    for version in versions {
        println!("{version}");
    }
    Ok(0)
}

fn rehash(context: &Context) -> Result<i32, AppError> {
    let commands = context.shim_generator().generate_shims()?;
    println!(
        "Generated shims for {} commands in {}",
        commands.len(),
        context.paths.shims_dir.display()
    );
    Ok(0)
}

fn require_installed(context: &Context, version: &MavenVersion) -> Result<(), AppError> {
    if context.resolver().is_installed(version) {
        Ok(())
    } else {
        Err(mvnenv_core::InstallError::NotInstalled {
            version: version.clone(),
        }
        .into())
    }
}

fn global(context: &Context, version: &MavenVersion) -> Result<i32, AppError> {
    require_installed(context, version)?;
    let path = context.paths.global_version_file();
    write_version_file(&path, version)
        .map_err(|error| AppError::io("failed to write", &path, error))?;
    println!("Global Maven version set to {version}");
    Ok(0)
}

fn local(context: &Context, version: &MavenVersion) -> Result<i32, AppError> {
    require_installed(context, version)?;
    let path = context.working_dir.join(LOCAL_VERSION_FILE);
    write_version_file(&path, version)
        .map_err(|error| AppError::io("failed to write", &path, error))?;
    println!("Maven {version} set for {}", context.working_dir.display());
    Ok(0)
}

fn current_version(context: &Context) -> Result<i32, AppError> {
    let resolved = context.resolver().resolve().map_err(ExecError::from)?;
    println!("{} (set by {})", resolved.version, resolved.origin);
    Ok(0)
}

async fn publish(context: &Context, version: &MavenVersion, file: &Path) -> Result<i32, AppError> {
    if !context.settings.repository.is_usable() {
        return Err(AppError::RepositoryNotConfigured {
            path: context.paths.settings_file(),
        });
    }
    let source = AuthenticatedSource::new(
        context.settings.repository.clone(),
        &context.settings.http_options(),
    )?;

    let (cancel, listener) = with_interrupts()?;
    let bar = progress_bar(format!("Publishing {version}"));
    let result = source
        .upload_version(version, file, &bar_sink(&bar), &cancel)
        .await;
    listener.abort();
    bar.finish_and_clear();

    result?;
    println!("Published Maven {version} to {}", source.artifact_url(version));
    Ok(0)
}

async fn exec(context: &Context, command: &str, args: &[OsString]) -> Result<i32, AppError> {
    let executor = ShimExecutor::new(
        context.layout,
        Arc::new(context.resolver()),
        ExecutorOptions {
            diagnostics: context.diagnostics,
            ..ExecutorOptions::default()
        },
    );
    Ok(executor.run(command, args).await?)
}
