//! musicdl Core Library
//!
//! Searches several independent music backends with one keyword, merges the
//! answers into one numbered result list, and downloads a selected track with
//! live progress.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`source`] - Source client trait, registry and the JSON API client
//! - [`search`] - Concurrent fan-out and the generation-checked result index
//! - [`download`] - Streaming downloads, progress, filename sanitization
//! - [`prefs`] - Persisted preferences (download directory, enabled sources)
//! - [`session`] - Orchestrator owning the per-search state
//! - [`config`] - Source and HTTP configuration file

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod prefs;
pub mod search;
pub mod session;
pub mod source;
mod user_agent;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError, SourceConfig};
pub use download::{
    DownloadError, DownloadManager, DownloadOutcome, GaugeReading, HttpClient, HttpSettings,
    Progress, ProgressGauge,
};
pub use prefs::{PreferenceIoError, PreferenceStore, Preferences};
pub use search::{
    Generation, IndexError, ResultIndex, SearchAggregator, SearchOutcome, Selection, SourceReport,
};
pub use session::{Session, SessionError, SessionState};
pub use source::{
    JsonApiSource, SourceClient, SourceDescriptor, SourceError, SourceId, SourceRegistry, Track,
};
pub use user_agent::BROWSER_USER_AGENT;
