/// Overrides the tool root directory.
pub const ROOT_ENV: &str = "MVNENV_ROOT";
/// Enables diagnostic output when set to a truthy value.
pub const DEBUG_ENV: &str = "MVNENV_DEBUG";
/// Selects a version for the current shell, ahead of any version file.
pub const VERSION_ENV: &str = "MVNENV_VERSION";
/// Set by wrapper scripts so the dispatcher knows which command it serves.
pub const SHIM_COMMAND_ENV: &str = "MVNENV_SHIM_COMMAND";

#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::is_truthy;

    #[test]
    fn truthy_values_are_case_insensitive() {
        for value in ["1", "true", "TRUE", " yes ", "On"] {
            assert!(is_truthy(value), "{value} should be truthy");
        }
    }

    #[test]
    fn other_values_are_falsy() {
        for value in ["", "0", "false", "off", "no", "debug"] {
            assert!(!is_truthy(value), "{value} should be falsy");
        }
    }
}
