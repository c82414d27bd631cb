//! Reloadable holder of the current ontology snapshot

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::info;

use super::feed::OntologyFeed;
use super::snapshot::OntologySnapshot;
use super::OntologyResult;

/// Publishes ontology snapshots to concurrent compilations
///
/// Readers clone the current `Arc` and keep using that snapshot until they
/// finish, even if a reload publishes a newer one meanwhile. Reloads are
/// serialised; the new snapshot is built before the write lock is taken.
pub struct OntologyCache {
    current: RwLock<Arc<OntologySnapshot>>,
    reload_lock: Mutex<()>,
}

impl OntologyCache {
    /// Create a cache holding an initial snapshot
    pub fn new(snapshot: OntologySnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            reload_lock: Mutex::new(()),
        }
    }

    /// Create a cache from a feed as generation 1
    pub fn from_feed(feed: &OntologyFeed) -> OntologyResult<Self> {
        let snapshot = OntologySnapshot::build(feed, 1)?;
        info!(
            "Loaded ontology with {} classes and {} properties",
            snapshot.class_count(),
            snapshot.property_count()
        );
        Ok(Self::new(snapshot))
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<OntologySnapshot> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// Generation of the current snapshot
    pub fn generation(&self) -> u64 {
        self.snapshot().generation()
    }

    /// Replace the snapshot with one built from `feed`
    ///
    /// On error the current snapshot stays in place.
    pub fn reload(&self, feed: &OntologyFeed) -> OntologyResult<Arc<OntologySnapshot>> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let generation = self.generation() + 1;
        let snapshot = Arc::new(OntologySnapshot::build(feed, generation)?);

        {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::clone(&snapshot);
        }

        info!(
            "Reloaded ontology: generation {}, {} classes, {} properties",
            generation,
            snapshot.class_count(),
            snapshot.property_count()
        );

        Ok(snapshot)
    }
}

impl Default for OntologyCache {
    fn default() -> Self {
        Self::new(OntologySnapshot::empty())
    }
}
