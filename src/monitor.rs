//! Rolling log of production retrievals and the retuning signal.
//!
//! The [`RetrievalMonitor`] keeps a bounded in-memory log of recent
//! searches. Aggregates over that log answer two operational questions:
//! how good retrieval has been lately, and whether the search weights look
//! stale enough to re-run the tuner.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;

/// Top-1 score below which a retrieval counts as low quality.
pub const LOW_QUALITY_SCORE: f32 = 0.5;

/// Number of most recent entries consulted by
/// [`needs_retuning`](RetrievalMonitor::needs_retuning).
pub const RETUNE_WINDOW: usize = 100;

/// Default low-quality fraction above which retuning is signaled.
pub const DEFAULT_RETUNE_THRESHOLD: f64 = 0.3;

/// One recorded retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalLogEntry {
    /// When the search ran.
    pub timestamp: DateTime<Utc>,
    /// The query text.
    pub query: String,
    /// Score of the best result, 0.0 when nothing was returned.
    pub top_score: f32,
    /// Mean score across returned results, 0.0 when nothing was returned.
    pub mean_score: f32,
    /// Number of results returned.
    pub result_count: usize,
    /// The search configuration in effect.
    pub config: SearchConfig,
}

/// Aggregates over a window of recent retrievals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    /// Number of entries the aggregates cover (at most the requested window).
    pub window: usize,
    /// Mean top-1 score over the window.
    pub mean_top_score: f64,
    /// Mean of the per-search mean scores over the window.
    pub mean_result_score: f64,
    /// Mean result count over the window.
    pub mean_result_count: f64,
    /// Fraction of entries whose top score fell below [`LOW_QUALITY_SCORE`].
    pub low_quality_fraction: f64,
}

impl MonitorSnapshot {
    fn empty() -> Self {
        Self {
            window: 0,
            mean_top_score: 0.0,
            mean_result_score: 0.0,
            mean_result_count: 0.0,
            low_quality_fraction: 0.0,
        }
    }
}

/// A bounded, process-lifetime log of retrievals.
///
/// The log is a fixed-capacity ring: once full, each new entry overwrites
/// the oldest one, so memory never grows past the configured capacity.
/// Recording and reading are cheap synchronous operations behind a short
/// internal lock; share the monitor behind an `Arc`.
#[derive(Debug)]
pub struct RetrievalMonitor {
    capacity: usize,
    inner: Mutex<Ring>,
}

#[derive(Debug, Default)]
struct Ring {
    entries: Vec<RetrievalLogEntry>,
    /// Index of the oldest entry once the ring has wrapped.
    head: usize,
}

impl Default for RetrievalMonitor {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl RetrievalMonitor {
    /// Default log capacity.
    pub const DEFAULT_CAPACITY: usize = 1000;

    /// Create a monitor holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), inner: Mutex::new(Ring::default()) }
    }

    /// Record one retrieval, evicting the oldest entry when full.
    pub fn record(&self, entry: RetrievalLogEntry) {
        let mut ring = self.lock();
        if ring.entries.len() < self.capacity {
            ring.entries.push(entry);
        } else {
            let head = ring.head;
            ring.entries[head] = entry;
            ring.head = (head + 1) % self.capacity;
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no retrievals have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Aggregate the most recent `window` entries.
    ///
    /// With fewer recorded entries the snapshot covers what exists; with
    /// none it is all zeros.
    pub fn recent_metrics(&self, window: usize) -> MonitorSnapshot {
        let ring = self.lock();
        if ring.entries.is_empty() || window == 0 {
            return MonitorSnapshot::empty();
        }

        // Chronological order: oldest entries start at `head` once wrapped.
        let (older, newer) = ring.entries.split_at(ring.head);
        let chronological = newer.iter().chain(older.iter());
        let skip = ring.entries.len().saturating_sub(window);

        let mut covered = 0usize;
        let mut top_sum = 0.0f64;
        let mut mean_sum = 0.0f64;
        let mut count_sum = 0.0f64;
        let mut low_quality = 0usize;
        for entry in chronological.skip(skip) {
            covered += 1;
            top_sum += f64::from(entry.top_score);
            mean_sum += f64::from(entry.mean_score);
            count_sum += entry.result_count as f64;
            if entry.top_score < LOW_QUALITY_SCORE {
                low_quality += 1;
            }
        }

        let n = covered as f64;
        MonitorSnapshot {
            window: covered,
            mean_top_score: top_sum / n,
            mean_result_score: mean_sum / n,
            mean_result_count: count_sum / n,
            low_quality_fraction: low_quality as f64 / n,
        }
    }

    /// Whether the low-quality fraction over the last [`RETUNE_WINDOW`]
    /// entries exceeds `threshold`.
    ///
    /// Returns `false` when nothing has been recorded. A sensible default
    /// for `threshold` is [`DEFAULT_RETUNE_THRESHOLD`].
    pub fn needs_retuning(&self, threshold: f64) -> bool {
        self.recent_metrics(RETUNE_WINDOW).low_quality_fraction > threshold
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ring> {
        // A poisoned lock only means a panic elsewhere mid-record; the log
        // data itself stays usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
