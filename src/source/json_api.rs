//! Configuration-driven source client for JSON search endpoints.
//!
//! The [`JsonApiSource`] issues `GET {search_url}?{keyword_param}={keyword}`
//! and reads tracks out of the JSON body, either a top-level array or an array
//! nested under a configured (dot-separated) key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::SourceConfig;
use crate::user_agent;

use super::{SourceClient, SourceError, SourceId, Track};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

/// A search backend described entirely by a [`SourceConfig`].
#[derive(Debug, Clone)]
pub struct JsonApiSource {
    id: SourceId,
    display_name: String,
    search_url: Url,
    keyword_param: String,
    results_key: Option<String>,
    extra_query: Vec<(String, String)>,
    headers: HeaderMap,
    client: Client,
}

impl JsonApiSource {
    /// Builds a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Configuration`] for an unparsable URL, an invalid
    /// header, or an HTTP client that fails to build.
    pub fn new(config: &SourceConfig) -> Result<Self, SourceError> {
        let id = SourceId::new(config.id.clone());
        let search_url = Url::parse(&config.search_url).map_err(|e| {
            SourceError::configuration(id.clone(), format!("invalid search_url: {e}"))
        })?;
        let headers = header_map_from_pairs(&id, config.headers.iter())?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::default_search_user_agent())
            .build()
            .map_err(|e| {
                SourceError::configuration(id.clone(), format!("HTTP client construction failed: {e}"))
            })?;

        Ok(Self {
            id,
            display_name: config.display_name.clone(),
            search_url,
            keyword_param: config.keyword_param.clone(),
            results_key: config.results_key.clone(),
            extra_query: config
                .extra_query
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            headers,
            client,
        })
    }

    fn request_url(&self, keyword: &str) -> Url {
        let mut url = self.search_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.extra_query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(&self.keyword_param, keyword);
        }
        url
    }

    fn extract_tracks(&self, body: Value) -> Result<Vec<Track>, SourceError> {
        let items = match &self.results_key {
            Some(key) => key
                .split('.')
                .try_fold(body, |value, segment| match value {
                    Value::Object(mut map) => map.remove(segment),
                    _ => None,
                })
                .ok_or_else(|| {
                    SourceError::malformed(self.id.clone(), format!("missing key `{key}`"))
                })?,
            None => body,
        };
        let Value::Array(items) = items else {
            return Err(SourceError::malformed(self.id.clone(), "expected a JSON array of tracks"));
        };

        let mut tracks = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            match serde_json::from_value::<Track>(item) {
                Ok(mut track) => {
                    track.source = self.id.clone();
                    tracks.push(track);
                }
                Err(error) => warn!(
                    source_id = %self.id,
                    position,
                    error = %error,
                    "Skipping unreadable track entry"
                ),
            }
        }
        Ok(tracks)
    }
}

#[async_trait]
impl SourceClient for JsonApiSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    #[instrument(skip(self), fields(source_id = %self.id))]
    async fn search(&self, keyword: &str) -> Result<Vec<Track>, SourceError> {
        let url = self.request_url(keyword);
        debug!(url = %url, "Querying source");

        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout {
                        source_id: self.id.clone(),
                    }
                } else {
                    SourceError::network(self.id.clone(), e)
                }
            })?;

        if !response.status().is_success() {
            return Err(SourceError::HttpStatus {
                source_id: self.id.clone(),
                status: response.status().as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::malformed(self.id.clone(), e.to_string()))?;
        let tracks = self.extract_tracks(body)?;
        debug!(count = tracks.len(), "Source returned tracks");
        Ok(tracks)
    }

    fn download_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(user_agent::BROWSER_USER_AGENT));
        }
        headers
    }
}

fn header_map_from_pairs<'a>(
    id: &SourceId,
    pairs: impl Iterator<Item = (&'a String, &'a String)>,
) -> Result<HeaderMap, SourceError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            SourceError::configuration(id.clone(), format!("invalid header name `{name}`"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            SourceError::configuration(id.clone(), format!("invalid value for header `{name}`"))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}
