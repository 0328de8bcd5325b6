//! Warm-up and invalidation history records.
//!
//! Both are diagnostics only. They are kept in memory by the manager and, when the
//! matching capability is on, persisted through the [`PersistenceSink`] so a CLI run
//! shows up in the next process's diagnostics.

use crate::constants::STATE_VERSION;
use crate::persistence::{PersistenceSink, Slot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Failure of one template during warm-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupError {
    pub template: String,
    /// Single-line error message
    pub error: String,
}

/// Result of a warm-up run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupSummary {
    pub compiled: usize,
    pub skipped: usize,
    pub errors: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_details: Vec<WarmupError>,
}

/// Last warm-up as persisted (`warmup-summary.json` / `warmup.summary`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarmupRecord {
    pub summary: WarmupSummary,
    /// Whether the run covered every discovered template
    #[serde(default)]
    pub all: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub version: u32,
}

impl WarmupRecord {
    pub fn new(summary: WarmupSummary, all: bool) -> Self {
        Self {
            summary,
            all,
            timestamp: Utc::now(),
            version: STATE_VERSION,
        }
    }
}

/// Which operation removed artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationKind {
    Single,
    Batch,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidationRecord {
    #[serde(rename = "type")]
    pub kind: InvalidationKind,
    pub removed: usize,
    pub reinit: bool,
    pub timestamp: DateTime<Utc>,
}

/// Last invalidation plus the cumulative removal counter.
///
/// Persisted as `{"last": .., "cumulative": n, "version": 1}`. Concurrent writers can
/// lose increments; the counter is informational.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvalidationHistory {
    #[serde(default)]
    pub last: Option<InvalidationRecord>,
    #[serde(default)]
    pub cumulative: usize,
    #[serde(default)]
    pub version: u32,
}

impl InvalidationHistory {
    /// Count a removal. Calls that removed nothing are not recorded.
    pub fn record(&mut self, kind: InvalidationKind, removed: usize, reinit: bool) -> bool {
        if removed == 0 {
            return false;
        }
        self.cumulative += removed;
        self.last = Some(InvalidationRecord {
            kind,
            removed,
            reinit,
            timestamp: Utc::now(),
        });
        self.version = STATE_VERSION;
        true
    }

    pub fn load(sink: &PersistenceSink) -> Option<Self> {
        sink.try_load(Slot::Invalidations)
    }

    pub fn save(&self, sink: &PersistenceSink) -> bool {
        sink.try_save(Slot::Invalidations, self)
    }
}
