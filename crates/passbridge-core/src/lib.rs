//! Snapshot pipeline for serving a password store over HTTP.
//!
//! A password store is a directory tree of secrets, each already encrypted at
//! rest for the recipients listed in the store's `.gpg-id` file. This crate
//! turns such a tree into an immutable, fully precomputed [`Snapshot`] that a
//! request router can serve without touching the filesystem or a crypto engine.
//!
//! # Pipeline
//!
//! 1. [`store::build_catalog`] walks the store into a [`store::StoreCatalog`]:
//!    the recipient set, ordered [`CatalogEntry`] rows and the raw secret bytes.
//! 2. [`snapshot::assemble`] encrypts the serialized catalog for every recipient,
//!    re-armors every secret through a [`CryptoEngine`] and wraps each body in
//!    the `{"response": ...}` envelope.
//! 3. [`SnapshotRegistry`] holds the live snapshot; [`Reloader`] rebuilds off to
//!    the side and swaps the result in only when the whole build succeeded.
//!
//! Nothing in this crate ever decrypts a secret or writes to the store.

pub mod catalog;
pub mod crypto;
pub mod error;
pub mod registry;
pub mod reload;
pub mod snapshot;
pub mod store;

/// Testing utilities shared by the integration tests of every passbridge crate.
///
/// Provides temporary on-disk stores and deterministic in-process engines.
pub mod testing;

pub use catalog::{CatalogEntry, normalize_account_name};
pub use crypto::{ArmorMode, CryptoEngine, GpgEngine};
pub use error::{BuildError, ConfigurationError, EncryptionError, EncryptionTarget, SnapshotError};
pub use registry::SnapshotRegistry;
pub use reload::{ReloadReport, Reloader};
pub use snapshot::{Snapshot, assemble};
pub use store::{RawSecret, RecipientSet, SecretIdentity, StoreCatalog};
