//! Music source clients and the records they produce.
//!
//! A source is one independent backend that can search for tracks and hand out
//! download URLs. The core treats every backend uniformly through the
//! [`SourceClient`] trait; which backends exist is decided by whoever fills the
//! [`SourceRegistry`].
//!
//! # Architecture
//!
//! - [`SourceClient`] - Async trait that each backend implements
//! - [`SourceRegistry`] - Ordered, id-keyed collection of clients
//! - [`Track`] - One matched track as returned by a backend
//! - [`JsonApiSource`] - Configuration-driven client for JSON search endpoints
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use musicdl_core::source::{JsonApiSource, SourceRegistry};
//! use musicdl_core::config::SourceConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SourceConfig::new("kuwo", "Kuwo Music", "https://search.example.com/api");
//! let mut registry = SourceRegistry::new();
//! registry.register(Arc::new(JsonApiSource::new(&config)?))?;
//!
//! let kuwo = registry.get(&"kuwo".into()).expect("registered");
//! let tracks = kuwo.search("love story").await?;
//! println!("{} tracks", tracks.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod json_api;
mod registry;

pub use error::SourceError;
pub use json_api::JsonApiSource;
pub use registry::SourceRegistry;

use std::fmt;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Opaque identifier of a source backend (e.g. `"QQMusicClient"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Creates a source id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id and human-readable label of a registered source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Backend identifier.
    pub id: SourceId,
    /// Label shown to users.
    pub display_name: String,
}

/// One matched track, produced entirely by a source client.
///
/// Field contents are not validated here; the download path checks that
/// `download_url` and `ext` are present before fetching anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Track {
    /// Performing artist(s), already joined for display.
    #[serde(alias = "singer", deserialize_with = "string_or_number")]
    pub singers: String,
    /// Track title; also the stem of the downloaded filename.
    #[serde(deserialize_with = "string_or_number")]
    pub song_name: String,
    /// Size as reported by the backend (free-form, e.g. `"3.21MB"`).
    #[serde(deserialize_with = "string_or_number")]
    pub file_size: String,
    /// Duration as reported by the backend (e.g. `"04:12"`).
    #[serde(deserialize_with = "string_or_number")]
    pub duration: String,
    /// Album title.
    #[serde(deserialize_with = "string_or_number")]
    pub album: String,
    /// Id of the source that produced this record.
    pub source: SourceId,
    /// Direct URL of the audio file.
    #[serde(deserialize_with = "string_or_number")]
    pub download_url: String,
    /// File extension without the leading dot (e.g. `"mp3"`).
    #[serde(deserialize_with = "string_or_number")]
    pub ext: String,
}

/// Backends report sizes and durations as either strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Capability every music backend implements.
///
/// # Object Safety
///
/// This trait uses `async_trait` so registries can hold `Arc<dyn SourceClient>`.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Returns the backend identifier.
    fn id(&self) -> &SourceId;

    /// Returns the human-readable label.
    fn display_name(&self) -> &str;

    /// Searches the backend. An empty keyword is a valid query.
    async fn search(&self, keyword: &str) -> Result<Vec<Track>, SourceError>;

    /// Headers the backend's CDN expects on download requests
    /// (User-Agent, Referer, ...).
    fn download_headers(&self) -> HeaderMap;

    /// Returns the id/label pair for this source.
    fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor {
            id: self.id().clone(),
            display_name: self.display_name().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_track_deserializes_numbers_as_strings() {
        let track: Track = serde_json::from_str(
            r#"{"singers":"A","song_name":"B","file_size":3145728,"duration":212,
                "album":"C","source":"kuwo","download_url":"http://x/y.mp3","ext":"mp3"}"#,
        )
        .unwrap();
        assert_eq!(track.file_size, "3145728");
        assert_eq!(track.duration, "212");
        assert_eq!(track.source, SourceId::new("kuwo"));
    }

    #[test]
    fn test_track_missing_fields_default_to_empty() {
        let track: Track = serde_json::from_str(r#"{"song_name":"Only title"}"#).unwrap();
        assert_eq!(track.song_name, "Only title");
        assert!(track.download_url.is_empty());
        assert!(track.ext.is_empty());
    }

    #[test]
    fn test_track_accepts_singer_alias_and_null() {
        let track: Track =
            serde_json::from_str(r#"{"singer":"Jay Chou","album":null}"#).unwrap();
        assert_eq!(track.singers, "Jay Chou");
        assert_eq!(track.album, "");
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId::from("netease").to_string(), "netease");
    }
}
