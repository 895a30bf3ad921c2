//! Hot-swap registry for the live snapshot.
//!
//! The registry owns a single slot holding an `Arc<Snapshot>`. Readers clone
//! the `Arc` under a shared lock held for the duration of a refcount bump;
//! writers take the exclusive lock only to swap the pointer. A reader
//! therefore always sees one whole snapshot, and an in-flight request keeps
//! its snapshot alive through its own `Arc` after a replacement.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::snapshot::Snapshot;

#[derive(Debug)]
struct Live {
    generation: u64,
    snapshot: Arc<Snapshot>,
}

/// Concurrency-safe holder of the currently served [`Snapshot`].
#[derive(Debug)]
pub struct SnapshotRegistry {
    live: RwLock<Live>,
}

impl SnapshotRegistry {
    /// Create a registry serving `initial` as generation 1.
    pub fn new(initial: Snapshot) -> Self {
        Self {
            live: RwLock::new(Live {
                generation: 1,
                snapshot: Arc::new(initial),
            }),
        }
    }

    /// The snapshot to serve right now.
    pub fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.live.read().snapshot)
    }

    /// The current snapshot together with its generation number.
    pub fn current_with_generation(&self) -> (u64, Arc<Snapshot>) {
        let live = self.live.read();
        (live.generation, Arc::clone(&live.snapshot))
    }

    pub fn generation(&self) -> u64 {
        self.live.read().generation
    }

    /// Install `next` as the live snapshot and return its generation.
    ///
    /// The previous snapshot is dropped once the last in-flight reader
    /// releases it, outside the lock.
    pub fn replace(&self, next: Snapshot) -> u64 {
        let next = Arc::new(next);
        let (generation, previous) = {
            let mut live = self.live.write();
            live.generation += 1;
            let previous = std::mem::replace(&mut live.snapshot, next);
            (live.generation, previous)
        };
        drop(previous);
        generation
    }
}
