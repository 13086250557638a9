use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP_ID: &str = "org.apache.maven";
pub const DEFAULT_ARTIFACT_ID: &str = "apache-maven";

/// Connection settings for an authenticated Maven repository such as a
/// Nexus or Artifactory instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_group_id")]
    pub group_id: String,

    #[serde(default = "default_artifact_id")]
    pub artifact_id: String,

    #[serde(default)]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub ca_cert_file: Option<PathBuf>,
}

fn default_group_id() -> String {
    DEFAULT_GROUP_ID.to_string()
}

fn default_artifact_id() -> String {
    DEFAULT_ARTIFACT_ID.to_string()
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            username: None,
            password: None,
            group_id: default_group_id(),
            artifact_id: default_artifact_id(),
            insecure_skip_verify: false,
            ca_cert_file: None,
        }
    }
}

impl RepositorySettings {
    /// Whether an authenticated source should be built from these settings.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }

    /// `org.apache.maven` becomes `org/apache/maven`.
    #[must_use]
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    pub(crate) fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }
}
