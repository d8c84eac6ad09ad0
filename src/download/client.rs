//! HTTP client wrapper for track downloads.
//!
//! This module provides the `HttpClient` struct which owns the connection pool,
//! timeout configuration and TLS policy used for every download request.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, HeaderMap};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// Transport policy for download requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
    /// Skip TLS certificate verification. On by default: several music CDNs
    /// serve broken certificate chains.
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            accept_invalid_certs: true,
        }
    }
}

/// HTTP client for streaming downloads.
///
/// Create once and reuse; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    settings: HttpSettings,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with [`HttpSettings::default`].
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static default
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_settings(HttpSettings::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a client with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns the builder error when the TLS backend cannot be initialized.
    #[instrument(level = "debug")]
    pub fn with_settings(settings: HttpSettings) -> Result<Self, reqwest::Error> {
        if settings.accept_invalid_certs {
            debug!("TLS certificate verification disabled for downloads");
        }
        let client = base_client_builder(&settings).build()?;
        Ok(Self { client, settings })
    }

    /// Settings this client was built with.
    #[must_use]
    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    /// Sends a GET for `url` with per-source `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for non-HTTP(S) URLs,
    /// [`DownloadError::Timeout`]/[`DownloadError::Network`] for transport
    /// failures and [`DownloadError::HttpStatus`] for non-2xx responses.
    pub(crate) async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(url)
                } else {
                    DownloadError::network(url, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "download request rejected");
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

fn base_client_builder(settings: &HttpSettings) -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.read_timeout_secs))
        .gzip(true)
        .danger_accept_invalid_certs(settings.accept_invalid_certs)
        .user_agent(user_agent::default_download_user_agent())
}

/// Declared body length, if the server sent a parsable Content-Length.
pub(crate) fn declared_content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, REFERER};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_default_settings_are_permissive() {
        let settings = HttpSettings::default();
        assert!(settings.accept_invalid_certs);
        assert_eq!(settings.connect_timeout_secs, 30);
        assert_eq!(settings.read_timeout_secs, 300);
    }

    #[test]
    fn test_settings_deserialize_partial_json() {
        let settings: HttpSettings =
            serde_json::from_str(r#"{"accept_invalid_certs": false}"#).unwrap();
        assert!(!settings.accept_invalid_certs);
        assert_eq!(settings.read_timeout_secs, 300);
    }

    #[test]
    fn test_strict_tls_client_builds() {
        let client = HttpClient::with_settings(HttpSettings {
            accept_invalid_certs: false,
            ..HttpSettings::default()
        })
        .unwrap();
        assert!(!client.settings().accept_invalid_certs);
    }

    #[tokio::test]
    async fn test_get_rejects_non_http_scheme() {
        let client = HttpClient::new();
        let result = client.get("file:///etc/passwd", &HeaderMap::new()).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
        let result = client.get("not a url", &HeaderMap::new()).await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_get_sends_source_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.mp3"))
            .and(header("Referer", "https://y.qq.com/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://y.qq.com/"));
        let client = HttpClient::new();
        let response = client
            .get(&format!("{}/a.mp3", server.uri()), &headers)
            .await
            .unwrap();
        assert_eq!(declared_content_length(&response), Some(3));
    }

    #[tokio::test]
    async fn test_get_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.mp3"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = HttpClient::new();
        match client
            .get(&format!("{}/gone.mp3", server.uri()), &HeaderMap::new())
            .await
        {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
    }
}
