//! Configuration types for exposure-sync

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote story API settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Scheme and host the story API is served from (default: "https://exposure.co")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum number of redirects followed per request (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout (None = transport default)
    #[serde(default, with = "optional_duration_serde")]
    pub timeout: Option<Duration>,

    /// Accept invalid TLS certificates and host names.
    ///
    /// **Dangerous.** Disables certificate verification for the story API. Only meant
    /// for hosts behind an intercepting proxy with a private CA. Default: false.
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            timeout: None,
            danger_accept_invalid_certs: false,
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "./exposure-sync.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// What a sync run does when a single story cannot be materialized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the whole run; remaining stories are not attempted
    #[default]
    AbortRun,
    /// Record the failure and continue with the next story
    SkipRecord,
}

/// Failure handling for the per-story pipeline
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Policy when writing a content item fails (default: abort the run)
    #[serde(default)]
    pub on_item_failure: FailurePolicy,

    /// Policy when `published_at` cannot be converted (default: skip the story)
    #[serde(default = "default_skip_record")]
    pub on_invalid_timestamp: FailurePolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_item_failure: FailurePolicy::AbortRun,
            on_invalid_timestamp: default_skip_record(),
        }
    }
}

/// Main configuration for exposure-sync
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote story API
    #[serde(default)]
    pub source: SourceConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Per-story failure handling
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Check settings that would otherwise only fail at request time
    pub fn validate(&self) -> Result<()> {
        let base = url::Url::parse(&self.source.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL {:?}: {}", self.source.base_url, e),
            key: Some("source.base_url".to_string()),
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported base URL scheme: {}", base.scheme()),
                key: Some("source.base_url".to_string()),
            });
        }

        if base.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("base URL cannot carry a path: {}", self.source.base_url),
                key: Some("source.base_url".to_string()),
            });
        }

        if self.source.max_redirects == 0 {
            return Err(Error::Config {
                message: "max_redirects must be at least 1".to_string(),
                key: Some("source.max_redirects".to_string()),
            });
        }

        if self.source.danger_accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled for the story API");
        }

        Ok(())
    }
}

// Default value functions
fn default_base_url() -> String {
    "https://exposure.co".to_string()
}

fn default_max_redirects() -> usize {
    10
}

fn default_user_agent() -> String {
    concat!("exposure-sync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("exposure-sync.db")
}

fn default_skip_record() -> FailurePolicy {
    FailurePolicy::SkipRecord
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
