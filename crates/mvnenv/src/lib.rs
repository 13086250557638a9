//! The `mvnenv` manager CLI and the `mvnenv-shim` dispatcher share this
//! library: settings, logging, the file-based version resolver and the
//! command implementations.

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod resolver;
pub mod settings;

use mvnenv_platform::{DEBUG_ENV, is_truthy};

/// Whether `MVNENV_DEBUG` asks for diagnostics. Read once at startup and
/// passed down explicitly.
#[must_use]
pub fn diagnostics_requested() -> bool {
    std::env::var(DEBUG_ENV).is_ok_and(|value| is_truthy(&value))
}
