//! Error types for source clients and the source registry.

use thiserror::Error;

use super::SourceId;

/// Errors raised by source clients and registry bookkeeping.
///
/// Query errors never escape a search: the aggregator turns them into an empty
/// contribution for the failing source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backend request failed at the network level.
    #[error("source {source_id} query failed: {source}")]
    Network {
        /// Source that failed.
        source_id: SourceId,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("source {source_id} returned HTTP {status}")]
    HttpStatus {
        /// Source that failed.
        source_id: SourceId,
        /// HTTP status code.
        status: u16,
    },

    /// The backend answered with a body we could not interpret.
    #[error("source {source_id} returned a malformed response: {reason}")]
    MalformedResponse {
        /// Source that failed.
        source_id: SourceId,
        /// What was wrong with the body.
        reason: String,
    },

    /// The query did not finish within the configured search timeout.
    #[error("source {source_id} timed out")]
    Timeout {
        /// Source that timed out.
        source_id: SourceId,
    },

    /// The source could not be constructed from its configuration.
    #[error("source {source_id} is misconfigured: {reason}")]
    Configuration {
        /// Source being built.
        source_id: SourceId,
        /// What was wrong.
        reason: String,
    },

    /// A source with the same id or display name is already registered.
    #[error("duplicate source registration: {name}")]
    DuplicateSource {
        /// The clashing id or display name.
        name: String,
    },
}

impl SourceError {
    /// Creates a network error.
    pub fn network(source_id: SourceId, source: reqwest::Error) -> Self {
        Self::Network { source_id, source }
    }

    /// Creates a malformed-response error.
    pub fn malformed(source_id: SourceId, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            source_id,
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(source_id: SourceId, reason: impl Into<String>) -> Self {
        Self::Configuration {
            source_id,
            reason: reason.into(),
        }
    }
}
