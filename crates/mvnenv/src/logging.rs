use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};

use mvnenv_platform::ToolPaths;

/// Append-only handle on `<root>/mvnenv.log` that reopens the file when it
/// has been deleted or the tool root was wiped underneath a running command.
struct ToolLog {
    path: PathBuf,
    file: Option<File>,
}

impl ToolLog {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = append_to(&path)?;
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() || !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.file = Some(append_to(&self.path)?);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file is not open"))
    }
}

impl Write for ToolLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn append_to(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Drop the older half of the log, cutting at a line boundary, once it grows
/// past `max_bytes`. Returns whether anything was removed.
fn rotate_in_place(path: &Path, max_bytes: u64) -> io::Result<bool> {
    let size = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(error) => return Err(error),
    };
    if size <= max_bytes {
        return Ok(false);
    }

    let contents = std::fs::read(path)?;
    let middle = contents.len() / 2;
    let start = contents[middle..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(middle, |offset| middle + offset + 1);
    std::fs::write(path, &contents[start..])?;
    Ok(true)
}

fn filtered_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("mvnenv")
        .build()
}

fn stderr_logger(diagnostics: bool, config: Config) -> Box<TermLogger> {
    TermLogger::new(
        terminal_level(diagnostics),
        config,
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
}

fn terminal_level(diagnostics: bool) -> LevelFilter {
    if diagnostics {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Manager logging: warnings on stderr (everything with diagnostics on) and
/// a debug-level log file under the tool root.
pub fn init_logging(paths: &ToolPaths, diagnostics: bool, max_log_size: u64) {
    let log_path = paths.log_file();
    let _ = std::fs::create_dir_all(&paths.root);
    let rotated = rotate_in_place(&log_path, max_log_size);

    let config = filtered_config();
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![stderr_logger(diagnostics, config.clone())];
    match ToolLog::open(log_path.clone()) {
        Ok(log) => loggers.push(WriteLogger::new(LevelFilter::Debug, config, log)),
        Err(error) => eprintln!(
            "mvnenv: not logging to {}: {error}",
            log_path.display()
        ),
    }
    let _ = CombinedLogger::init(loggers);

    match rotated {
        Ok(true) => log::debug!("Trimmed {} to its most recent half", log_path.display()),
        Ok(false) => {}
        Err(error) => log::warn!("Failed to trim {}: {error}", log_path.display()),
    }
}

/// Dispatcher logging: stderr only, so the wrapped tool's own output is left
/// alone.
pub fn init_shim_logging(diagnostics: bool) {
    let _ = CombinedLogger::init(vec![stderr_logger(diagnostics, filtered_config())]);
}
