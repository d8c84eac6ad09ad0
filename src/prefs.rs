//! Durable user preferences (download directory, enabled sources).
//!
//! Preferences are small JSON state that must never get in the way of the
//! user: [`PreferenceStore::load`] falls back to defaults on any read or parse
//! problem, and [`PreferenceStore::save`] logs and swallows write failures.
//! The fallible variants ([`PreferenceStore::try_load`],
//! [`PreferenceStore::try_save`]) exist for diagnostics and tests.
//!
//! Writes go to a `.tmp` sibling first and are renamed over the target, so a
//! crash mid-write leaves the previous file intact.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{APP_DIR_NAME, default_config_dir, env_var_non_empty_os};

/// File name of the preferences file inside the app config directory.
pub const PREFERENCES_FILE_NAME: &str = "config.json";

/// Errors from reading or writing the preferences file.
///
/// [`PreferenceStore::load`] and [`PreferenceStore::save`] never return these.
#[derive(Debug, Error)]
pub enum PreferenceIoError {
    /// The file could not be read.
    #[error("cannot read preferences {path}: {source}")]
    Read {
        /// Preferences file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The file is not valid preferences JSON.
    #[error("cannot parse preferences {path}: {source}")]
    Parse {
        /// Preferences file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failed.
    #[error("cannot serialize preferences: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The file (or its temp sibling) could not be written or renamed.
    #[error("cannot write preferences {path}: {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl PreferenceIoError {
    fn is_missing_file(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Persisted user preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Absolute directory downloads are written into.
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// Last enabled source selection (ids), in query order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_sources: Option<Vec<String>>,

    /// Keys this version does not know; preserved across load/save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            download_path: default_download_path(),
            enabled_sources: None,
            extra: Map::new(),
        }
    }
}

/// Default download directory.
///
/// Priority:
/// 1. `$XDG_DATA_HOME/musicdl/downloads`
/// 2. `$HOME/.local/share/musicdl/downloads`
/// 3. `<cwd>/downloads`
#[must_use]
pub fn default_download_path() -> PathBuf {
    resolve_download_path(
        env_var_non_empty_os("XDG_DATA_HOME"),
        env_var_non_empty_os("HOME"),
        std::env::current_dir().ok(),
    )
}

fn resolve_download_path(
    xdg_data_home: Option<OsString>,
    home: Option<OsString>,
    cwd: Option<PathBuf>,
) -> PathBuf {
    let base = xdg_data_home
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .map(|p| p.join(APP_DIR_NAME))
        .or_else(|| {
            home.map(PathBuf::from)
                .filter(|p| p.is_absolute())
                .map(|p| p.join(".local").join("share").join(APP_DIR_NAME))
        });
    match base {
        Some(dir) => dir.join("downloads"),
        None => cwd
            .unwrap_or_else(|| PathBuf::from("/"))
            .join("downloads"),
    }
}

/// Default path of the preferences file.
#[must_use]
pub fn default_preferences_path() -> PathBuf {
    default_config_dir().map_or_else(
        || PathBuf::from(format!("{APP_DIR_NAME}-{PREFERENCES_FILE_NAME}")),
        |dir| dir.join(PREFERENCES_FILE_NAME),
    )
}

/// JSON-file backed preference storage.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at [`default_preferences_path`].
    #[must_use]
    pub fn at_default_location() -> Self {
        Self::new(default_preferences_path())
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads preferences, returning defaults if the file is missing or unreadable.
    #[must_use]
    pub fn load(&self) -> Preferences {
        match self.try_load() {
            Ok(prefs) => prefs,
            Err(error) if error.is_missing_file() => {
                debug!(path = %self.path.display(), "no preferences file; using defaults");
                Preferences::default()
            }
            Err(error) => {
                warn!(error = %error, "ignoring unreadable preferences; using defaults");
                Preferences::default()
            }
        }
    }

    /// Loads preferences, surfacing IO and parse errors.
    ///
    /// A relative `download_path` is replaced with the default.
    ///
    /// # Errors
    ///
    /// Returns [`PreferenceIoError::Read`] or [`PreferenceIoError::Parse`].
    pub fn try_load(&self) -> Result<Preferences, PreferenceIoError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| {
            PreferenceIoError::Read {
                path: self.path.clone(),
                source,
            }
        })?;
        let mut prefs: Preferences =
            serde_json::from_str(&content).map_err(|source| PreferenceIoError::Parse {
                path: self.path.clone(),
                source,
            })?;

        if !prefs.download_path.is_absolute() {
            warn!(
                download_path = %prefs.download_path.display(),
                "persisted download path is not absolute; using default"
            );
            prefs.download_path = default_download_path();
        }
        Ok(prefs)
    }

    /// Persists `prefs`. Failures are logged and otherwise ignored.
    pub fn save(&self, prefs: &Preferences) {
        if let Err(error) = self.try_save(prefs) {
            warn!(error = %error, "failed to persist preferences");
        }
    }

    /// Persists `prefs` atomically (write temp sibling, then rename).
    ///
    /// # Errors
    ///
    /// Returns [`PreferenceIoError::Serialize`] or [`PreferenceIoError::Write`].
    pub fn try_save(&self, prefs: &Preferences) -> Result<(), PreferenceIoError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| PreferenceIoError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let json = serde_json::to_string_pretty(prefs).map_err(PreferenceIoError::Serialize)?;
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, json).map_err(|source| PreferenceIoError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        if let Err(source) = std::fs::rename(&tmp_path, &self.path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(PreferenceIoError::Write {
                path: self.path.clone(),
                source,
            });
        }
        debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from(PREFERENCES_FILE_NAME));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_download_path_prefers_xdg_data_home() {
        let path = resolve_download_path(
            Some(OsString::from("/data")),
            Some(OsString::from("/home/u")),
            None,
        );
        assert_eq!(path, PathBuf::from("/data/musicdl/downloads"));
    }

    #[test]
    fn test_resolve_download_path_falls_back_to_home_then_cwd() {
        let path = resolve_download_path(None, Some(OsString::from("/home/u")), None);
        assert_eq!(path, PathBuf::from("/home/u/.local/share/musicdl/downloads"));

        let path = resolve_download_path(None, None, Some(PathBuf::from("/work")));
        assert_eq!(path, PathBuf::from("/work/downloads"));
    }

    #[test]
    fn test_resolve_download_path_ignores_relative_env() {
        let path = resolve_download_path(
            Some(OsString::from("relative")),
            None,
            Some(PathBuf::from("/work")),
        );
        assert_eq!(path, PathBuf::from("/work/downloads"));
    }

    #[test]
    fn test_tmp_path_is_sibling() {
        let store = PreferenceStore::new("/cfg/musicdl/config.json");
        assert_eq!(store.tmp_path(), PathBuf::from("/cfg/musicdl/config.json.tmp"));
    }

    #[test]
    fn test_missing_download_path_key_uses_default() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let prefs = PreferenceStore::new(&path).try_load().unwrap();
        assert_eq!(prefs.download_path, default_download_path());
        assert_eq!(prefs.extra.get("theme"), Some(&Value::from("dark")));
    }

    #[test]
    fn test_relative_download_path_is_replaced() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"download_path": "music"}"#).unwrap();

        let prefs = PreferenceStore::new(&path).load();
        assert!(prefs.download_path.is_absolute());
    }

    #[test]
    fn test_try_save_error_is_swallowed_by_save() {
        let temp = TempDir::new().unwrap();
        // Parent is a regular file, so directory creation fails.
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = PreferenceStore::new(blocker.join("config.json"));

        assert!(matches!(
            store.try_save(&Preferences::default()),
            Err(PreferenceIoError::Write { .. })
        ));
        store.save(&Preferences::default());
    }
}
