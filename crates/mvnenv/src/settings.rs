use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use mvnenv_core::{DEFAULT_ARCHIVE_URL, HttpOptions, RepositorySettings, RetryPolicy};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {} is malformed: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_archive_url")]
    pub archive_url: String,

    #[serde(default)]
    pub repository: RepositorySettings,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_hours: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.to_string()
}

fn default_cache_ttl() -> u64 {
    24
}

fn default_http_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            archive_url: default_archive_url(),
            repository: RepositorySettings::default(),
            cache_ttl_hours: default_cache_ttl(),
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            retry_attempts: default_retry_attempts(),
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl AppSettings {
    /// Load settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    /// Returns [`SettingsError`] when the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.http_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours.saturating_mul(3600))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::AppSettings;

    #[test]
    fn app_settings_defaults_match_expected_values() {
        let settings = AppSettings::default();

        assert_eq!(
            settings.archive_url,
            "https://archive.apache.org/dist/maven/maven-3"
        );
        assert!(!settings.repository.enabled);
        assert_eq!(settings.cache_ttl_hours, 24);
        assert_eq!(settings.http_timeout_secs, 300);
        assert_eq!(settings.connect_timeout_secs, 15);
        assert_eq!(settings.retry_attempts, 3);
        assert_eq!(settings.max_log_size_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let value = json!({
            "cache_ttl_hours": 2,
            "repository": {
                "enabled": true,
                "url": "https://nexus.example/repository/maven",
                "username": "deployer"
            }
        });

        let settings: AppSettings =
            serde_json::from_value(value).expect("settings JSON should deserialize");

        assert_eq!(settings.cache_ttl_hours, 2);
        assert_eq!(settings.cache_ttl().as_secs(), 7200);
        assert_eq!(settings.retry_attempts, 3);
        assert!(settings.repository.is_usable());
        assert_eq!(settings.repository.username.as_deref(), Some("deployer"));
        assert_eq!(settings.repository.group_id, "org.apache.maven");
    }

    #[test]
    fn missing_file_loads_defaults() {
        let temp = tempfile::tempdir().expect("tempdir should be created");

        let settings =
            AppSettings::load(&temp.path().join("config.json")).expect("defaults should load");
        assert_eq!(settings.cache_ttl_hours, 24);
    }

    #[test]
    fn malformed_file_names_its_path() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{ \"cache_ttl_hours\": \"soon\" }").expect("file should be written");

        let error = AppSettings::load(&path).expect_err("malformed settings must fail");
        assert!(error.to_string().contains("config.json"));
    }

    #[test]
    fn zero_retry_attempts_still_tries_once() {
        let settings = AppSettings {
            retry_attempts: 0,
            ..AppSettings::default()
        };

        assert_eq!(settings.retry_policy().attempts, 1);
    }
}
