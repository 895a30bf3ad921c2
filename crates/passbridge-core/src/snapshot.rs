//! Snapshot assembly.
//!
//! A [`Snapshot`] holds every response body the router can ever return,
//! already encrypted or armored and wrapped in the `{"response": ...}`
//! envelope. Serving a request is then a map lookup and a refcount bump.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument};

use crate::catalog;
use crate::crypto::CryptoEngine;
use crate::error::{EncryptionTarget, SnapshotError};
use crate::store::{self, SecretIdentity, StoreCatalog};

/// Immutable, fully precomputed servable state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    catalog_body: Bytes,
    secret_bodies: HashMap<SecretIdentity, Bytes>,
}

impl Snapshot {
    /// Build a snapshot from bodies that are already enveloped.
    pub fn new(catalog_body: Bytes, secret_bodies: HashMap<SecretIdentity, Bytes>) -> Self {
        Self {
            catalog_body,
            secret_bodies,
        }
    }

    /// Encrypt and armor a built catalog.
    ///
    /// The catalog is encrypted for the whole recipient set, then every secret
    /// is re-armored. Secrets are processed in parallel; the first failure
    /// aborts the assembly and nothing is returned.
    pub fn from_catalog<E>(catalog: StoreCatalog, engine: &E) -> Result<Self, SnapshotError>
    where
        E: CryptoEngine + ?Sized,
    {
        let StoreCatalog {
            recipients,
            entries,
            secrets,
        } = catalog;

        let catalog_json = catalog::to_json(&entries)?;
        let encrypted = engine
            .encrypt(&catalog_json, &recipients)
            .map_err(|source| SnapshotError::Encryption {
                target: EncryptionTarget::Catalog,
                source,
            })?;
        let catalog_body = wrap_response(&encrypted)?;

        let secret_bodies = secrets
            .into_par_iter()
            .map(|(identity, raw)| {
                let armored = match engine.reencode(raw.as_bytes()) {
                    Ok(armored) => armored,
                    Err(source) => {
                        return Err(SnapshotError::Encryption {
                            target: EncryptionTarget::Secret(identity),
                            source,
                        });
                    }
                };
                Ok((identity, wrap_response(&armored)?))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self::new(catalog_body, secret_bodies))
    }

    /// Response body for a catalog fetch.
    pub fn catalog_body(&self) -> &Bytes {
        &self.catalog_body
    }

    /// Response body for one secret, if the identity exists.
    pub fn secret_body(&self, identity: &SecretIdentity) -> Option<&Bytes> {
        self.secret_bodies.get(identity)
    }

    pub fn secret_count(&self) -> usize {
        self.secret_bodies.len()
    }

    pub fn identities(&self) -> impl Iterator<Item = &SecretIdentity> {
        self.secret_bodies.keys()
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    response: &'a str,
}

/// Wrap text in the response envelope: `{"response": "<text>"}`.
pub fn wrap_response(text: &str) -> Result<Bytes, SnapshotError> {
    serde_json::to_vec(&Envelope { response: text })
        .map(Bytes::from)
        .map_err(|source| SnapshotError::Serialize {
            what: "response envelope",
            source,
        })
}

/// Build a complete snapshot of the store at `store_root`.
#[instrument(level = "info", name = "snapshot::assemble", skip_all, fields(store = %store_root.display()))]
pub fn assemble<E>(store_root: &Path, engine: &E) -> Result<Snapshot, SnapshotError>
where
    E: CryptoEngine + ?Sized,
{
    let start = Instant::now();
    let catalog = store::build_catalog(store_root)?;
    let snapshot = Snapshot::from_catalog(catalog, engine)?;
    info!(
        secrets = snapshot.secret_count(),
        elapsed_ms = start.elapsed().as_millis(),
        "Snapshot assembled"
    );
    Ok(snapshot)
}
