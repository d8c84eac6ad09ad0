//! Error types for the download module.
//!
//! [`DownloadError::InvalidRecord`] means the selected track could not be
//! downloaded at all. Every other variant is a failed transfer: the call is
//! terminal, nothing is retried, and no file is left under the final name.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during a track download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The track lacks a field needed to download it.
    #[error("track cannot be downloaded: missing {field}")]
    InvalidRecord {
        /// Name of the missing field (`download_url` or `ext`).
        field: &'static str,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-2xx response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while preparing or writing the file.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The download URL is malformed or not HTTP(S).
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The received size does not match the declared Content-Length.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Destination that failed verification.
        path: PathBuf,
        /// Declared size in bytes.
        expected_bytes: u64,
        /// Received size in bytes.
        actual_bytes: u64,
    },

    /// The sanitized filename would escape the destination directory.
    #[error("refusing to write outside {dir}: {name}")]
    UnsafePath {
        /// Destination directory.
        dir: PathBuf,
        /// Offending filename.
        name: String,
    },

    /// The caller cancelled the transfer.
    #[error("download of {url} was cancelled")]
    Cancelled {
        /// The URL being downloaded.
        url: String,
    },
}

impl DownloadError {
    /// Creates an invalid-record error.
    pub fn invalid_record(field: &'static str) -> Self {
        Self::InvalidRecord { field }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Returns true for transfer failures, false for record validation errors.
    #[must_use]
    pub fn is_download_failed(&self) -> bool {
        !matches!(self, Self::InvalidRecord { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path, which the source errors do not carry.
