use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("archive {} is empty", path.display())]
    Empty { path: PathBuf },
}

impl ExtractError {
    fn io(context: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    fn zip(context: &'static str, source: zip::result::ZipError) -> Self {
        Self::Zip { context, source }
    }
}

/// Extract a distribution archive whose entries share one top-level
/// directory, dropping that directory so its contents land directly in
/// `dest`.
///
/// The shared prefix is taken from the first entry. Entries outside it and
/// entries with unsafe paths are skipped. Returns the number of files
/// written.
///
/// # Errors
/// Returns [`ExtractError`] when the archive is unreadable or empty, or a
/// file cannot be written.
pub fn extract_stripped(archive_path: &Path, dest: &Path) -> Result<usize, ExtractError> {
    let file = std::fs::File::open(archive_path)
        .map_err(|error| ExtractError::io("failed to open archive", archive_path, error))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| ExtractError::zip("failed to read zip archive", error))?;

    if archive.is_empty() {
        return Err(ExtractError::Empty {
            path: archive_path.to_path_buf(),
        });
    }

    std::fs::create_dir_all(dest)
        .map_err(|error| ExtractError::io("failed to create extraction directory", dest, error))?;

    let mut prefix: Option<PathBuf> = None;
    let mut files = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| ExtractError::zip("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path {:?}", entry.name());
            continue;
        };

        let prefix = prefix.get_or_insert_with(|| top_level(&name));
        let Ok(relative) = name.strip_prefix(&*prefix) else {
            debug!("Skipping {} outside {}", name.display(), prefix.display());
            continue;
        };
        let out_path = dest.join(relative);
        let mode = entry.unix_mode();

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|error| {
                ExtractError::io("failed to create directory", &out_path, error)
            })?;
            set_mode(&out_path, mode);
            continue;
        }

        if relative.as_os_str().is_empty() {
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                ExtractError::io("failed to create parent directory", parent, error)
            })?;
        }
        let mut outfile = std::fs::File::create(&out_path)
            .map_err(|error| ExtractError::io("failed to create file", &out_path, error))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(|error| ExtractError::io("failed to extract entry", &out_path, error))?;
        set_mode(&out_path, mode);
        files += 1;
    }

    debug!(
        "Extracted {files} files from {} to {}",
        archive_path.display(),
        dest.display()
    );
    Ok(files)
}

fn top_level(name: &Path) -> PathBuf {
    name.components()
        .find_map(|component| match component {
            Component::Normal(part) => Some(PathBuf::from(part)),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: Option<u32>) {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode
        && let Err(error) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
    {
        warn!("Failed to set mode {mode:o} on {}: {error}", path.display());
    }
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: Option<u32>) {}
