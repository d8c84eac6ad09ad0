//! Source registry keyed on source id.
//!
//! The [`SourceRegistry`] keeps clients in registration order, which is also
//! the default query order, and translates between display names and ids.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{SourceClient, SourceDescriptor, SourceError, SourceId};

/// An ordered collection of source clients.
///
/// Ids and display names are each unique within a registry, so the
/// id ↔ display-name mapping is a bijection.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceClient>>,
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descriptors()).finish()
    }
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::DuplicateSource`] when the id or the display name
    /// is already taken, either as an id or as a display name of another source.
    #[tracing::instrument(skip(self, source), fields(source_id = %source.id()))]
    pub fn register(&mut self, source: Arc<dyn SourceClient>) -> Result<(), SourceError> {
        if self.get(source.id()).is_some() {
            return Err(SourceError::DuplicateSource {
                name: source.id().to_string(),
            });
        }
        if self.id_for_display_name(source.display_name()).is_some() {
            return Err(SourceError::DuplicateSource {
                name: source.display_name().to_string(),
            });
        }
        // Labels and ids share one namespace in `resolve_enabled`.
        if self.id_for_display_name(source.id().as_str()).is_some() {
            return Err(SourceError::DuplicateSource {
                name: source.id().to_string(),
            });
        }
        if self.get(&SourceId::new(source.display_name())).is_some() {
            return Err(SourceError::DuplicateSource {
                name: source.display_name().to_string(),
            });
        }
        debug!(display_name = source.display_name(), "Registering source");
        self.sources.push(source);
        Ok(())
    }

    /// Returns the number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if no sources are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Looks up a client by id.
    #[must_use]
    pub fn get(&self, id: &SourceId) -> Option<Arc<dyn SourceClient>> {
        self.sources.iter().find(|s| s.id() == id).cloned()
    }

    /// Translates a display name into its id.
    #[must_use]
    pub fn id_for_display_name(&self, display_name: &str) -> Option<SourceId> {
        self.sources
            .iter()
            .find(|s| s.display_name() == display_name)
            .map(|s| s.id().clone())
    }

    /// Translates an id into its display name.
    #[must_use]
    pub fn display_name_for(&self, id: &SourceId) -> Option<String> {
        self.sources
            .iter()
            .find(|s| s.id() == id)
            .map(|s| s.display_name().to_string())
    }

    /// Returns all ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id().clone()).collect()
    }

    /// Returns id/label pairs in registration order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources.iter().map(|s| s.descriptor()).collect()
    }

    /// Maps user-supplied ids or display names to registered ids.
    ///
    /// The caller's order is kept, duplicates collapse to their first
    /// occurrence, and unknown names are skipped with a warning.
    #[must_use]
    pub fn resolve_enabled<S: AsRef<str>>(&self, requested: &[S]) -> Vec<SourceId> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(requested.len());
        for name in requested {
            let name = name.as_ref();
            let id = SourceId::new(name);
            let found = if self.get(&id).is_some() {
                Some(id)
            } else {
                self.id_for_display_name(name)
            };
            match found {
                Some(id) => {
                    if seen.insert(id.clone()) {
                        resolved.push(id);
                    }
                }
                None => warn!(source = name, "Unknown source requested; skipping"),
            }
        }
        resolved
    }
}
