//! Search fan-out across sources and flattening into a [`ResultIndex`].
//!
//! # Ordering contract
//!
//! Sources are queried concurrently, but results are flattened only after
//! every query has finished or failed: all rows of the first enabled source,
//! then the second, and so on, each in the order its client returned them.
//! Ordinals are assigned 0, 1, 2, ... in that order, so identical inputs always
//! produce identical indexes regardless of which source answers first.
//!
//! # Failure isolation
//!
//! A source that errors or times out contributes no rows. Its failure is
//! logged and recorded in the [`SourceReport`] list but never reaches the
//! index or aborts the search.

pub mod index;

pub use index::{Generation, IndexError, ResultIndex, Selection};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::source::{SourceError, SourceId, SourceRegistry, Track};

/// Outcome of one source's query within a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    /// Source that was queried.
    pub source: SourceId,
    /// Number of rows it contributed.
    pub result_count: usize,
    /// Failure description when the query failed.
    pub failure: Option<String>,
}

impl SourceReport {
    /// Returns true if the source query failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// A freshly built index plus per-source health.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// The rebuilt index.
    pub index: ResultIndex,
    /// One report per queried source, in query order.
    pub reports: Vec<SourceReport>,
}

/// Fans a keyword out to enabled sources and builds the result index.
#[derive(Debug)]
pub struct SearchAggregator {
    registry: Arc<SourceRegistry>,
    search_timeout: Option<Duration>,
    last_generation: AtomicU64,
}

impl SearchAggregator {
    /// Creates an aggregator over `registry` with no per-source timeout.
    #[must_use]
    pub fn new(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            search_timeout: None,
            last_generation: AtomicU64::new(0),
        }
    }

    /// Bounds each source query by `timeout`.
    #[must_use]
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = Some(timeout);
        self
    }

    /// Runs one search.
    ///
    /// `enabled` is the declared query order. An empty list is legal and yields
    /// an empty index; an empty keyword is passed through to the sources.
    #[instrument(skip(self, enabled), fields(sources = enabled.len()))]
    pub async fn search(&self, keyword: &str, enabled: &[SourceId]) -> SearchOutcome {
        let generation =
            Generation::new(self.last_generation.fetch_add(1, Ordering::SeqCst)).next();

        let queries = enabled.iter().map(|id| self.query_source(id, keyword));
        let results = join_all(queries).await;

        // Barrier: ordinals are assigned only once every query has settled.
        let mut index = ResultIndex::new(generation);
        let mut reports = Vec::with_capacity(enabled.len());
        for (source, result) in enabled.iter().zip(results) {
            match result {
                Ok(tracks) => {
                    let result_count = tracks.len();
                    for track in tracks {
                        if let Err(error) = index.insert(index.len(), track) {
                            warn!(error = %error, "Dropping row during index rebuild");
                        }
                    }
                    debug!(source = %source, result_count, "Source contributed rows");
                    reports.push(SourceReport {
                        source: source.clone(),
                        result_count,
                        failure: None,
                    });
                }
                Err(error) => {
                    warn!(source = %source, error = %error, "Source query failed; contributing no rows");
                    reports.push(SourceReport {
                        source: source.clone(),
                        result_count: 0,
                        failure: Some(error.to_string()),
                    });
                }
            }
        }

        info!(
            generation = %generation,
            rows = index.len(),
            failed_sources = reports.iter().filter(|r| r.failed()).count(),
            "Search complete"
        );
        SearchOutcome { index, reports }
    }

    async fn query_source(&self, id: &SourceId, keyword: &str) -> Result<Vec<Track>, SourceError> {
        let Some(client) = self.registry.get(id) else {
            return Err(SourceError::configuration(id.clone(), "source is not registered"));
        };
        match self.search_timeout {
            Some(limit) => tokio::time::timeout(limit, client.search(keyword))
                .await
                .unwrap_or_else(|_| Err(SourceError::Timeout { source_id: id.clone() })),
            None => client.search(keyword).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::SourceClient;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;

    struct FixedSource {
        id: SourceId,
        label: String,
        delay: Duration,
        outcome: Result<Vec<&'static str>, u16>,
    }

    #[async_trait]
    impl SourceClient for FixedSource {
        fn id(&self) -> &SourceId {
            &self.id
        }

        fn display_name(&self) -> &str {
            &self.label
        }

        async fn search(&self, _keyword: &str) -> Result<Vec<Track>, SourceError> {
            tokio::time::sleep(self.delay).await;
            match &self.outcome {
                Ok(names) => Ok(names
                    .iter()
                    .map(|name| Track {
                        song_name: (*name).to_string(),
                        source: self.id.clone(),
                        ..Track::default()
                    })
                    .collect()),
                Err(status) => Err(SourceError::HttpStatus {
                    source_id: self.id.clone(),
                    status: *status,
                }),
            }
        }

        fn download_headers(&self) -> HeaderMap {
            HeaderMap::new()
        }
    }

    fn registry(sources: Vec<(&str, u64, Result<Vec<&'static str>, u16>)>) -> Arc<SourceRegistry> {
        let mut registry = SourceRegistry::new();
        for (id, delay_ms, outcome) in sources {
            registry
                .register(Arc::new(FixedSource {
                    id: SourceId::new(id),
                    label: format!("{id} label"),
                    delay: Duration::from_millis(delay_ms),
                    outcome,
                }))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn names(index: &ResultIndex) -> Vec<String> {
        index.iter().map(|(_, t)| t.song_name.clone()).collect()
    }

    #[tokio::test]
    async fn test_flattens_source_major_in_declared_order_despite_latency() {
        // "slow" answers last but is declared first, so its rows come first.
        let registry = registry(vec![
            ("slow", 50, Ok(vec!["s1", "s2"])),
            ("fast", 0, Ok(vec!["f1"])),
        ]);
        let aggregator = SearchAggregator::new(registry);
        let outcome = aggregator
            .search("x", &["slow".into(), "fast".into()])
            .await;
        assert_eq!(names(&outcome.index), vec!["s1", "s2", "f1"]);
    }

    #[tokio::test]
    async fn test_failed_source_contributes_nothing() {
        let registry = registry(vec![
            ("a", 0, Ok(vec!["a1", "a2"])),
            ("broken", 0, Err(500)),
            ("b", 0, Ok(vec!["b1"])),
        ]);
        let aggregator = SearchAggregator::new(registry);
        let outcome = aggregator
            .search("x", &["a".into(), "broken".into(), "b".into()])
            .await;

        assert_eq!(outcome.index.len(), 3);
        assert_eq!(names(&outcome.index), vec!["a1", "a2", "b1"]);
        assert!(outcome.reports[1].failed());
        assert_eq!(outcome.reports[0].result_count, 2);
    }

    #[tokio::test]
    async fn test_timeout_is_isolated() {
        let registry = registry(vec![("stuck", 5_000, Ok(vec!["late"])), ("ok", 0, Ok(vec!["o1"]))]);
        let aggregator =
            SearchAggregator::new(registry).with_search_timeout(Duration::from_millis(50));
        let outcome = aggregator.search("x", &["stuck".into(), "ok".into()]).await;
        assert_eq!(names(&outcome.index), vec!["o1"]);
        assert!(outcome.reports[0].failure.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_enabled_set_yields_empty_index() {
        let aggregator = SearchAggregator::new(registry(vec![("a", 0, Ok(vec!["a1"]))]));
        let outcome = aggregator.search("x", &[]).await;
        assert!(outcome.index.is_empty());
        assert!(outcome.reports.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_source_is_reported_not_fatal() {
        let aggregator = SearchAggregator::new(registry(vec![("a", 0, Ok(vec!["a1"]))]));
        let outcome = aggregator.search("x", &["ghost".into(), "a".into()]).await;
        assert_eq!(names(&outcome.index), vec!["a1"]);
        assert!(outcome.reports[0].failed());
    }

    #[tokio::test]
    async fn test_each_search_gets_a_newer_generation_and_same_rows() {
        let aggregator = SearchAggregator::new(registry(vec![
            ("a", 0, Ok(vec!["a1", "a2"])),
            ("b", 0, Ok(vec!["b1"])),
        ]));
        let enabled: Vec<SourceId> = vec!["a".into(), "b".into()];
        let first = aggregator.search("x", &enabled).await;
        let second = aggregator.search("x", &enabled).await;

        assert!(second.index.generation() > first.index.generation());
        assert_eq!(names(&first.index), names(&second.index));
    }
}
