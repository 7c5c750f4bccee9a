//! Signal Store - validated signals keyed by id
//!
//! Signals submitted earlier are the targets of `signalurl://` references.
//! The store is safe for concurrent readers and writers; a resolver should
//! read from a [`StoreSnapshot`] so one resolution sees one view.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::{SignalLookup, ValidSignal};

/// What `put` did with a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// An earlier signal with the same id was overwritten
    Replaced,
    /// An identical document was already stored
    Unchanged,
}

/// In-memory signal store
#[derive(Debug, Default)]
pub struct MemoryStore {
    signals: DashMap<String, Arc<ValidSignal>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a validated signal, overwriting any signal with the same id
    pub fn put(&self, signal: ValidSignal) -> PutOutcome {
        let id = signal.id.clone();

        match self.signals.entry(id) {
            Entry::Vacant(entry) => {
                trace!("Stored signal {}", entry.key());
                entry.insert(Arc::new(signal));
                PutOutcome::Inserted
            }
            Entry::Occupied(mut entry) => {
                if entry.get().fingerprint() == signal.fingerprint() {
                    return PutOutcome::Unchanged;
                }
                debug!("Replacing signal {}", entry.key());
                entry.insert(Arc::new(signal));
                PutOutcome::Replaced
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<ValidSignal>> {
        self.signals.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: &str) -> Option<Arc<ValidSignal>> {
        self.signals.remove(id).map(|(_, signal)| signal)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.signals.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// All temporal instances of one observation, oldest first
    pub fn versions_of(&self, name: &str) -> Vec<Arc<ValidSignal>> {
        let mut versions: Vec<_> = self
            .signals
            .iter()
            .filter(|entry| entry.value().name == name)
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        versions.sort_by(|a, b| {
            a.effective_time()
                .cmp(&b.effective_time())
                .then_with(|| a.id.cmp(&b.id))
        });
        versions
    }

    /// Get store statistics
    pub fn stats(&self) -> StoreStats {
        let mut revoked = 0;
        let mut names = HashSet::new();

        for entry in self.signals.iter() {
            if entry.value().revoked {
                revoked += 1;
            }
            names.insert(entry.value().name.clone());
        }

        StoreStats {
            total: self.signals.len(),
            revoked,
            distinct_names: names.len(),
        }
    }

    /// Freeze the current contents for one resolution
    pub fn snapshot(&self) -> StoreSnapshot {
        let signals: HashMap<_, _> = self
            .signals
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        StoreSnapshot {
            signals: Arc::new(signals),
        }
    }

    /// Clear all signals
    pub fn clear(&self) {
        self.signals.clear();
    }
}

impl SignalLookup for MemoryStore {
    fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>> {
        self.get(id)
    }
}

/// Immutable view of a store at one point in time.
///
/// Cheap to clone, so concurrent resolutions can share one snapshot.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    signals: Arc<HashMap<String, Arc<ValidSignal>>>,
}

impl StoreSnapshot {
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl SignalLookup for StoreSnapshot {
    fn lookup(&self, id: &str) -> Option<Arc<ValidSignal>> {
        self.signals.get(id).cloned()
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub revoked: usize,
    /// Distinct observations, counting every temporal instance once
    pub distinct_names: usize,
}
