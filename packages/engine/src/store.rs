//! Sharded in-memory terminal state store.
//!
//! The single source of truth for "where is terminal X now". Records are
//! partitioned across a fixed set of mutex-guarded shards keyed by a hash
//! of the device id: two reports for the same terminal always contend on
//! the same shard lock and are therefore serialized, while reports for
//! different terminals usually proceed in parallel.
//!
//! All mutation goes through the engine's ingest and geofence-removal
//! paths; query methods hand out clones.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use terminal_map_telemetry_models::{TerminalRecord, TrackPoint};

/// Number of store shards. Power of two so the hash distributes evenly.
const SHARD_COUNT: usize = 16;

/// Maximum history entries retained per terminal; the oldest are dropped.
pub const HISTORY_CAPACITY: usize = 4096;

/// A record plus its bounded position history.
pub struct TerminalEntry {
    /// Current tracked state.
    pub record: TerminalRecord,
    /// Recent positions, oldest first.
    pub history: VecDeque<TrackPoint>,
}

impl TerminalEntry {
    /// Appends a history entry, dropping the oldest past capacity.
    pub fn push_history(&mut self, point: TrackPoint) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(point);
    }
}

type Shard = HashMap<String, TerminalEntry>;

/// Filter for bulk state queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateFilter {
    /// Keep only terminals currently in this state.
    pub state: Option<String>,
    /// Keep only terminals currently in this district.
    pub district: Option<String>,
}

impl StateFilter {
    fn matches(&self, record: &TerminalRecord) -> bool {
        let (state, district) = record
            .current_region
            .as_ref()
            .map_or(("Unknown", "Unknown"), |region| {
                (region.state.as_str(), region.district.as_str())
            });
        self.state.as_deref().is_none_or(|want| want == state)
            && self.district.as_deref().is_none_or(|want| want == district)
    }
}

/// Fixed-shard terminal store.
pub struct TerminalStore {
    shards: Vec<Mutex<Shard>>,
}

impl Default for TerminalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Locks and returns the shard owning a device id.
    ///
    /// # Panics
    ///
    /// Panics if the shard mutex is poisoned.
    pub fn lock_shard(&self, device_id: &str) -> MutexGuard<'_, Shard> {
        let mut hasher = DefaultHasher::new();
        device_id.hash(&mut hasher);
        let index = (hasher.finish() as usize) % SHARD_COUNT;
        self.shards[index].lock().expect("terminal store shard poisoned")
    }

    /// Runs a closure against every shard in turn, locking one at a time.
    ///
    /// # Panics
    ///
    /// Panics if a shard mutex is poisoned.
    pub fn for_each_shard<F: FnMut(&mut Shard)>(&self, mut f: F) {
        for shard in &self.shards {
            let mut guard = shard.lock().expect("terminal store shard poisoned");
            f(&mut guard);
        }
    }

    /// The current record for a terminal, if it has ever reported.
    #[must_use]
    pub fn get(&self, device_id: &str) -> Option<TerminalRecord> {
        self.lock_shard(device_id).get(device_id).map(|entry| entry.record.clone())
    }

    /// All terminal records matching the filter, sorted by device id.
    #[must_use]
    pub fn all(&self, filter: &StateFilter) -> Vec<TerminalRecord> {
        let mut records = Vec::new();
        self.for_each_shard(|shard| {
            records.extend(
                shard
                    .values()
                    .filter(|entry| filter.matches(&entry.record))
                    .map(|entry| entry.record.clone()),
            );
        });
        records.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        records
    }

    /// History for one terminal from `since` onward, oldest first.
    #[must_use]
    pub fn history(&self, device_id: &str, since: Option<DateTime<Utc>>) -> Vec<TrackPoint> {
        self.lock_shard(device_id)
            .get(device_id)
            .map(|entry| {
                entry
                    .history
                    .iter()
                    .filter(|point| since.is_none_or(|cutoff| point.timestamp >= cutoff))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every known device id, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.for_each_shard(|shard| ids.extend(shard.keys().cloned()));
        ids.sort_unstable();
        ids
    }
}
