//! Application configuration: source definitions and HTTP policy.
//!
//! Configuration lives in a JSON file (`sources.json`) beside the preferences
//! file. Unlike preferences, an invalid configuration file is an error the
//! caller must see; a missing one simply means "no sources configured".
//!
//! ```json
//! {
//!   "sources": [
//!     {
//!       "id": "KuwoMusicClient",
//!       "display_name": "Kuwo Music",
//!       "search_url": "https://search.example.com/kuwo",
//!       "results_key": "data",
//!       "headers": { "Referer": "https://www.kuwo.cn/" }
//!     }
//!   ],
//!   "http": { "accept_invalid_certs": true },
//!   "search_timeout_secs": 20
//! }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::download::HttpSettings;

/// Directory name used under the platform config/data roots.
pub const APP_DIR_NAME: &str = "musicdl";

/// Configuration file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "sources.json";

/// Default per-source search timeout.
pub const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 20;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for [`AppConfig`].
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// One configured search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Backend identifier, unique within the file.
    pub id: String,
    /// Label shown to users, unique within the file.
    pub display_name: String,
    /// Search endpoint; the keyword is appended as a query parameter.
    pub search_url: String,
    /// Query parameter carrying the keyword.
    #[serde(default = "default_keyword_param")]
    pub keyword_param: String,
    /// Key of the result array when the endpoint wraps it in an object.
    #[serde(default)]
    pub results_key: Option<String>,
    /// Headers sent on search and download requests (User-Agent, Referer, ...).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Fixed query parameters added to every search request.
    #[serde(default)]
    pub extra_query: BTreeMap<String, String>,
}

fn default_keyword_param() -> String {
    "keyword".to_string()
}

impl SourceConfig {
    /// Creates a source definition with default parameter names and no headers.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        search_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            search_url: search_url.into(),
            keyword_param: default_keyword_param(),
            results_key: None,
            headers: BTreeMap::new(),
            extra_query: BTreeMap::new(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the key under which results are wrapped.
    #[must_use]
    pub fn with_results_key(mut self, key: impl Into<String>) -> Self {
        self.results_key = Some(key.into());
        self
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search backends in default query order.
    pub sources: Vec<SourceConfig>,
    /// Download client policy.
    pub http: HttpSettings,
    /// Per-source search timeout in seconds.
    pub search_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            http: HttpSettings::default(),
            search_timeout_secs: DEFAULT_SEARCH_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`; a missing file yields the default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Validates values against runtime constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_secs("search_timeout_secs", self.search_timeout_secs)?;
        validate_timeout_secs("http.connect_timeout_secs", self.http.connect_timeout_secs)?;
        validate_timeout_secs("http.read_timeout_secs", self.http.read_timeout_secs)?;

        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            if source.id.trim().is_empty() {
                return Err(ConfigError::invalid(format!("sources[{i}].id"), "must not be empty"));
            }
            if source.display_name.trim().is_empty() {
                return Err(ConfigError::invalid(
                    format!("sources[{i}].display_name"),
                    "must not be empty",
                ));
            }
            if !ids.insert(source.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("sources[{i}].id"),
                    format!("duplicate id `{}`", source.id),
                ));
            }
            if !names.insert(source.display_name.as_str()) {
                return Err(ConfigError::invalid(
                    format!("sources[{i}].display_name"),
                    format!("duplicate display name `{}`", source.display_name),
                ));
            }
            if Url::parse(&source.search_url).is_err() {
                return Err(ConfigError::invalid(
                    format!("sources[{i}].search_url"),
                    format!("`{}` is not a valid URL", source.search_url),
                ));
            }
        }
        Ok(())
    }

    /// Per-source search timeout.
    #[must_use]
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("{value}. Expected range: 1..=3600"),
        ));
    }
    Ok(())
}

/// Resolves the config directory.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/musicdl`
/// 2. `$HOME/.config/musicdl`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    resolve_config_dir(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

fn resolve_config_dir(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home {
        return Some(PathBuf::from(xdg).join(APP_DIR_NAME));
    }
    let home = home?;
    Some(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
}

/// Default path of `sources.json`, falling back to the working directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    default_config_dir().map_or_else(
        || PathBuf::from(format!("{APP_DIR_NAME}-{CONFIG_FILE_NAME}")),
        |dir| dir.join(CONFIG_FILE_NAME),
    )
}

pub(crate) fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
