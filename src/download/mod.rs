//! Streaming track downloads with progress and safe destination paths.
//!
//! # Features
//!
//! - Streaming downloads into a hidden `.part` file, renamed on completion
//! - Per-source request headers (Referer, User-Agent, ...)
//! - Percent progress from Content-Length, indeterminate mode without it
//! - Filename sanitization that keeps every write inside the target directory
//! - Configurable timeouts (30s connect, 5min read) and TLS verification
//!
//! # Example
//!
//! ```no_run
//! use musicdl_core::download::DownloadManager;
//! use musicdl_core::source::Track;
//! use reqwest::header::HeaderMap;
//! use std::path::Path;
//!
//! # async fn example(track: Track) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DownloadManager::default();
//! let outcome = manager
//!     .download(&track, Path::new("./downloads"), &HeaderMap::new(), |p| {
//!         println!("{p:?}");
//!     })
//!     .await?;
//! println!("Downloaded: {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod filename;
mod manager;
mod progress;

pub use client::{HttpClient, HttpSettings};
pub use error::DownloadError;
pub use filename::{sanitize_filename, track_filename};
pub use manager::{DownloadManager, DownloadOutcome};
pub use progress::{GaugeReading, Progress, ProgressGauge, ProgressTicket};
