//! Rebuild-and-install driver.
//!
//! A [`Reloader`] runs a full snapshot build off to the side and installs the
//! result into the [`SnapshotRegistry`] only if the build succeeded. Builds
//! are serialized by an internal mutex; the registry is touched only for the
//! final pointer swap.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info};

use crate::crypto::CryptoEngine;
use crate::error::SnapshotError;
use crate::registry::SnapshotRegistry;
use crate::snapshot::{self, Snapshot};

/// Outcome of a successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadReport {
    /// Generation number of the newly installed snapshot.
    pub generation: u64,
    /// Number of secrets in the new snapshot.
    pub secrets: usize,
    /// Wall time of the build.
    pub elapsed: Duration,
}

/// Rebuilds snapshots for one store and installs them.
pub struct Reloader {
    store_root: PathBuf,
    engine: Arc<dyn CryptoEngine>,
    registry: Arc<SnapshotRegistry>,
    build_lock: Mutex<()>,
}

impl Reloader {
    pub fn new(
        store_root: impl Into<PathBuf>,
        engine: Arc<dyn CryptoEngine>,
        registry: Arc<SnapshotRegistry>,
    ) -> Self {
        Self {
            store_root: store_root.into(),
            engine,
            registry,
            build_lock: Mutex::new(()),
        }
    }

    /// Build the first snapshot and a reloader serving it.
    ///
    /// Fails if the initial build fails: there is nothing safe to serve yet.
    pub fn bootstrap(
        store_root: impl Into<PathBuf>,
        engine: Arc<dyn CryptoEngine>,
    ) -> Result<Self, SnapshotError> {
        let store_root = store_root.into();
        let initial = snapshot::assemble(&store_root, engine.as_ref())?;
        info!(secrets = initial.secret_count(), "Initial snapshot ready");
        let registry = Arc::new(SnapshotRegistry::new(initial));
        Ok(Self::new(store_root, engine, registry))
    }

    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    pub fn registry(&self) -> &Arc<SnapshotRegistry> {
        &self.registry
    }

    /// Build a fresh snapshot without installing it.
    pub fn build(&self) -> Result<Snapshot, SnapshotError> {
        snapshot::assemble(&self.store_root, self.engine.as_ref())
    }

    /// Rebuild and, on success, install the new snapshot.
    ///
    /// On failure the error is logged and returned and the registry keeps
    /// serving whatever it served before.
    pub fn reload(&self) -> Result<ReloadReport, SnapshotError> {
        let _build = self.build_lock.lock();
        let start = Instant::now();

        match self.build() {
            Ok(next) => {
                let secrets = next.secret_count();
                let generation = self.registry.replace(next);
                let elapsed = start.elapsed();
                info!(
                    generation,
                    secrets,
                    elapsed_ms = elapsed.as_millis(),
                    "Reload successful"
                );
                Ok(ReloadReport {
                    generation,
                    secrets,
                    elapsed,
                })
            }
            Err(e) => {
                error!(
                    error = %e,
                    generation = self.registry.generation(),
                    "Reload failed, keeping current snapshot"
                );
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Reloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reloader")
            .field("store_root", &self.store_root)
            .field("generation", &self.registry.generation())
            .finish_non_exhaustive()
    }
}
