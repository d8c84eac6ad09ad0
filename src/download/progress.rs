//! Download progress values and the observable percentage gauge.
//!
//! [`Progress`] is what a single transfer reports per chunk. [`ProgressGauge`]
//! is the shared sink a UI watches; each transfer writes to it through a
//! [`ProgressTicket`], and tickets from superseded transfers are ignored so a
//! late update can never overwrite the state of a newer download.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

/// Progress of one transfer after a chunk has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Whole percent of the declared length, 0..=100.
    Percent(u8),
    /// No usable Content-Length; only the byte count is known.
    Indeterminate {
        /// Bytes written so far.
        bytes_received: u64,
    },
}

impl Progress {
    /// Computes `floor(bytes_received / total_bytes * 100)`, clamped to 100.
    ///
    /// A declared length of zero reports 100; an absent one is indeterminate.
    #[must_use]
    pub fn from_counts(bytes_received: u64, total_bytes: Option<u64>) -> Self {
        match total_bytes {
            Some(0) => Self::Percent(100),
            Some(total) => {
                let percent = u128::from(bytes_received) * 100 / u128::from(total);
                Self::Percent(u8::try_from(percent.min(100)).unwrap_or(100))
            }
            None => Self::Indeterminate { bytes_received },
        }
    }

    /// Returns the percentage if known.
    #[must_use]
    pub fn percent(self) -> Option<u8> {
        match self {
            Self::Percent(p) => Some(p),
            Self::Indeterminate { .. } => None,
        }
    }
}

/// Value shown by the gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GaugeReading {
    /// No download running.
    #[default]
    Idle,
    /// Percent complete.
    Percent(u8),
    /// Bytes received with unknown total.
    Indeterminate(u64),
}

impl From<Progress> for GaugeReading {
    fn from(progress: Progress) -> Self {
        match progress {
            Progress::Percent(p) => Self::Percent(p),
            Progress::Indeterminate { bytes_received } => Self::Indeterminate(bytes_received),
        }
    }
}

#[derive(Debug)]
struct GaugeShared {
    generation: Mutex<u64>,
    tx: watch::Sender<GaugeReading>,
}

/// Shared progress sink with generation-based stale-update suppression.
#[derive(Debug, Clone)]
pub struct ProgressGauge {
    shared: Arc<GaugeShared>,
}

impl Default for ProgressGauge {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressGauge {
    /// Creates an idle gauge.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GaugeReading::Idle);
        Self {
            shared: Arc::new(GaugeShared {
                generation: Mutex::new(0),
                tx,
            }),
        }
    }

    /// Starts a new transfer generation; earlier tickets stop having effect.
    #[must_use]
    pub fn begin(&self) -> ProgressTicket {
        let mut generation = self
            .shared
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation = generation.saturating_add(1);
        self.shared.tx.send_replace(GaugeReading::Percent(0));
        ProgressTicket {
            generation: *generation,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns the gauge to idle (shown as 0).
    pub fn reset(&self) {
        let _generation = self
            .shared
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.shared.tx.send_replace(GaugeReading::Idle);
    }

    /// Current reading.
    #[must_use]
    pub fn current(&self) -> GaugeReading {
        *self.shared.tx.borrow()
    }

    /// Subscribes to reading changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GaugeReading> {
        self.shared.tx.subscribe()
    }
}

/// Write handle for one transfer's progress.
#[derive(Debug)]
pub struct ProgressTicket {
    generation: u64,
    shared: Arc<GaugeShared>,
}

impl ProgressTicket {
    /// Publishes `progress` if this ticket is still current.
    ///
    /// Returns false (and changes nothing) for a superseded ticket.
    pub fn report(&self, progress: Progress) -> bool {
        let current = self
            .shared
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != self.generation {
            return false;
        }
        self.shared.tx.send_replace(progress.into());
        true
    }

    /// Generation this ticket writes for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
