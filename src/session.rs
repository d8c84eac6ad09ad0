//! Top-level orchestration of one interactive session.
//!
//! A [`Session`] owns everything the user flow touches: the source registry,
//! the search aggregator, the download manager, the preferences and the
//! progress gauge. The mutable per-search state lives in a [`SessionState`]
//! that every search replaces wholesale, so a row number from an older search
//! can never silently resolve against newer results.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::config::AppConfig;
use crate::download::{DownloadError, DownloadManager, DownloadOutcome, HttpClient, ProgressGauge};
use crate::prefs::{PreferenceStore, Preferences};
use crate::search::{
    Generation, IndexError, ResultIndex, SearchAggregator, SearchOutcome, Selection,
};
use crate::source::{JsonApiSource, SourceError, SourceId, SourceRegistry};

/// Errors surfaced by [`Session`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Row lookup failed (unknown row or stale selection).
    #[error(transparent)]
    Index(#[from] IndexError),

    /// The download itself failed.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// The selected track names a source that is not registered.
    #[error("track belongs to unregistered source {source_id}")]
    UnknownSource {
        /// Source id carried by the track.
        source_id: SourceId,
    },

    /// Another download is still running.
    #[error("a download is already in progress")]
    DownloadInProgress,

    /// The requested download directory cannot be made absolute.
    #[error("invalid download directory {path}: {source}")]
    InvalidDownloadPath {
        /// Path as given.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A configured source could not be constructed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The download HTTP client could not be constructed.
    #[error("failed to build download client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Per-search state, replaced as a whole by every search.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Index of the most recent search.
    pub index: ResultIndex,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            index: ResultIndex::new(Generation::new(0)),
        }
    }
}

/// The search-and-download session.
#[derive(Debug)]
pub struct Session {
    registry: Arc<SourceRegistry>,
    aggregator: SearchAggregator,
    downloads: DownloadManager,
    store: PreferenceStore,
    prefs: Mutex<Preferences>,
    gauge: ProgressGauge,
    state: RwLock<SessionState>,
    download_lock: tokio::sync::Mutex<()>,
}

impl Session {
    /// Creates a session; preferences are loaded from `store` immediately.
    #[must_use]
    pub fn new(
        registry: Arc<SourceRegistry>,
        downloads: DownloadManager,
        store: PreferenceStore,
    ) -> Self {
        let prefs = store.load();
        Self {
            aggregator: SearchAggregator::new(Arc::clone(&registry)),
            registry,
            downloads,
            store,
            prefs: Mutex::new(prefs),
            gauge: ProgressGauge::new(),
            state: RwLock::new(SessionState::default()),
            download_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Builds a session from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Source`] if a configured source is invalid or
    /// duplicated, or [`SessionError::HttpClient`] if the download client
    /// cannot be built.
    pub fn from_config(config: &AppConfig, store: PreferenceStore) -> Result<Self, SessionError> {
        let mut registry = SourceRegistry::new();
        for source in &config.sources {
            registry.register(Arc::new(JsonApiSource::new(source)?))?;
        }
        let client = HttpClient::with_settings(config.http).map_err(SessionError::HttpClient)?;
        Ok(
            Self::new(Arc::new(registry), DownloadManager::new(client), store)
                .with_search_timeout(config.search_timeout()),
        )
    }

    /// Bounds every per-source query by `timeout`.
    #[must_use]
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.aggregator =
            SearchAggregator::new(Arc::clone(&self.registry)).with_search_timeout(timeout);
        self
    }

    /// Registered sources.
    #[must_use]
    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Progress sink for the running download.
    #[must_use]
    pub fn gauge(&self) -> &ProgressGauge {
        &self.gauge
    }

    /// Snapshot of the current preferences.
    #[must_use]
    pub fn preferences(&self) -> Preferences {
        self.prefs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Directory downloads currently go to.
    #[must_use]
    pub fn download_dir(&self) -> PathBuf {
        self.prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .download_path
            .clone()
    }

    /// Snapshot of the current result index.
    #[must_use]
    pub fn current_index(&self) -> ResultIndex {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .index
            .clone()
    }

    /// Sources a search should use when the user named none: the persisted
    /// selection if any of it is still registered, otherwise every source.
    #[must_use]
    pub fn default_enabled(&self) -> Vec<SourceId> {
        let persisted = self.preferences().enabled_sources;
        if let Some(names) = persisted {
            let resolved = self.registry.resolve_enabled(&names);
            if !resolved.is_empty() {
                return resolved;
            }
        }
        self.registry.ids()
    }

    /// Runs a search and replaces the session state with its results.
    ///
    /// The enabled list is persisted as the new default selection. When
    /// searches overlap, only an outcome newer than the current state is
    /// applied; a search that started earlier but finished later is returned
    /// to the caller and otherwise ignored.
    #[instrument(skip(self, enabled), fields(sources = enabled.len()))]
    pub async fn search(&self, keyword: &str, enabled: &[SourceId]) -> SearchOutcome {
        let outcome = self.aggregator.search(keyword, enabled).await;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if outcome.index.generation() <= state.index.generation() {
            debug!(
                generation = %outcome.index.generation(),
                current = %state.index.generation(),
                "Search superseded by a newer one; keeping current results"
            );
            return outcome;
        }
        *state = SessionState {
            index: outcome.index.clone(),
        };
        // Persisted under the state lock so preference writes follow generation order.
        self.update_prefs(|prefs| {
            prefs.enabled_sources = Some(enabled.iter().map(|id| id.as_str().to_string()).collect());
        });
        drop(state);
        outcome
    }

    /// Binds `ordinal` to the current search.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] if the row does not exist.
    pub fn selection(&self, ordinal: usize) -> Result<Selection, SessionError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.index.selection(ordinal)?)
    }

    /// Downloads the selected track into the current download directory.
    ///
    /// Progress is published on [`Session::gauge`], which returns to idle when
    /// the call ends, whatever the outcome. On success the directory is
    /// persisted as the default.
    ///
    /// # Errors
    ///
    /// - [`SessionError::DownloadInProgress`] if another download is running
    /// - [`SessionError::Index`] for a stale or unknown selection
    /// - [`SessionError::UnknownSource`] if the track's source is not registered
    /// - [`SessionError::Download`] if the transfer fails
    #[instrument(skip(self, cancel), fields(ordinal = selection.ordinal))]
    pub async fn download(
        &self,
        selection: Selection,
        cancel: &CancellationToken,
    ) -> Result<DownloadOutcome, SessionError> {
        let _guard = self
            .download_lock
            .try_lock()
            .map_err(|_| SessionError::DownloadInProgress)?;

        let track = {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            state.index.select(selection)?.clone()
        };
        let source = self
            .registry
            .get(&track.source)
            .ok_or_else(|| SessionError::UnknownSource {
                source_id: track.source.clone(),
            })?;
        let headers = source.download_headers();
        let destination = self.download_dir();

        let ticket = self.gauge.begin();
        let result = self
            .downloads
            .download_with_cancel(&track, &destination, &headers, cancel, |progress| {
                ticket.report(progress);
            })
            .await;
        self.gauge.reset();

        let outcome = result?;
        info!(
            song = %track.song_name,
            source = %track.source,
            path = %outcome.path.display(),
            "track downloaded"
        );
        self.update_prefs(|prefs| prefs.download_path = destination);
        Ok(outcome)
    }

    /// Changes (and persists) the download directory.
    ///
    /// Relative paths are resolved against the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidDownloadPath`] if the path cannot be made absolute.
    pub fn set_download_path(&self, path: &Path) -> Result<PathBuf, SessionError> {
        let absolute =
            std::path::absolute(path).map_err(|source| SessionError::InvalidDownloadPath {
                path: path.to_path_buf(),
                source,
            })?;
        let stored = absolute.clone();
        self.update_prefs(|prefs| prefs.download_path = stored);
        Ok(absolute)
    }

    fn update_prefs(&self, mutate: impl FnOnce(&mut Preferences)) {
        let snapshot = {
            let mut prefs = self.prefs.lock().unwrap_or_else(PoisonError::into_inner);
            mutate(&mut prefs);
            prefs.clone()
        };
        self.store.save(&snapshot);
    }
}
