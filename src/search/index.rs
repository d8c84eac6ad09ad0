//! Session-scoped ordinal index over aggregated search results.
//!
//! Ordinals are dense from 0 and only meaningful for the generation of the
//! search that produced them. Selections carry their generation so a row
//! picked from an old result list cannot silently resolve against a new one.

use std::fmt;

use thiserror::Error;

use crate::source::Track;

/// Version counter of a result index; bumped on every search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    /// Creates a generation from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the following generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row picked by the user, bound to the index generation it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Generation of the index the row was shown from.
    pub generation: Generation,
    /// Row ordinal within that index.
    pub ordinal: usize,
}

/// Errors raised by index lookups and rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexError {
    /// No record at this ordinal.
    #[error("no search result at row {ordinal}")]
    NotFound {
        /// Requested ordinal.
        ordinal: usize,
    },

    /// The selection was made against a superseded search.
    #[error(
        "row {ordinal} belongs to search #{selected}, but the current search is #{current}; search again"
    )]
    StaleSelection {
        /// Requested ordinal.
        ordinal: usize,
        /// Generation the selection was made in.
        selected: Generation,
        /// Generation of the current index.
        current: Generation,
    },

    /// A rebuild tried to insert out of order.
    #[error("ordinal {ordinal} would leave a gap; next ordinal is {expected}")]
    NonDenseOrdinal {
        /// Ordinal passed to `insert`.
        ordinal: usize,
        /// The only ordinal that may be inserted next.
        expected: usize,
    },
}

/// Mapping ordinal → [`Track`] for one search generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultIndex {
    generation: Generation,
    entries: Vec<Track>,
}

impl ResultIndex {
    /// Creates an empty index for `generation`.
    #[must_use]
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            entries: Vec::new(),
        }
    }

    /// Generation of the search that built this index.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up a row by ordinal.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] when the ordinal is out of range.
    pub fn get(&self, ordinal: usize) -> Result<&Track, IndexError> {
        self.entries
            .get(ordinal)
            .ok_or(IndexError::NotFound { ordinal })
    }

    /// Resolves a selection made by the UI layer.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::StaleSelection`] when the selection's generation is
    /// not this index's, and [`IndexError::NotFound`] for an unknown ordinal.
    pub fn select(&self, selection: Selection) -> Result<&Track, IndexError> {
        if selection.generation != self.generation {
            return Err(IndexError::StaleSelection {
                ordinal: selection.ordinal,
                selected: selection.generation,
                current: self.generation,
            });
        }
        self.get(selection.ordinal)
    }

    /// Creates a selection for `ordinal` in this generation.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::NotFound`] when the ordinal is out of range.
    pub fn selection(&self, ordinal: usize) -> Result<Selection, IndexError> {
        self.get(ordinal)?;
        Ok(Selection {
            generation: self.generation,
            ordinal,
        })
    }

    /// Removes every row, keeping the generation.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Appends a row during a rebuild.
    pub(crate) fn insert(&mut self, ordinal: usize, track: Track) -> Result<(), IndexError> {
        let expected = self.entries.len();
        if ordinal != expected {
            return Err(IndexError::NonDenseOrdinal { ordinal, expected });
        }
        self.entries.push(track);
        Ok(())
    }

    /// Iterates `(ordinal, track)` in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Track)> {
        self.entries.iter().enumerate()
    }
}
