//! Error types for snapshot builds.
//!
//! Every build-time failure is fatal to the build that hit it: callers either
//! get a complete [`Snapshot`](crate::Snapshot) or one of these errors, never a
//! partially populated result.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::store::SecretIdentity;

/// The store's recipient configuration is missing or unusable.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The recipient marker file does not exist.
    #[error("Recipient file not found: {}", path.display())]
    RecipientFileMissing { path: PathBuf },

    /// The recipient marker file exists but could not be read.
    #[error("Failed to read recipient file {}: {source}", path.display())]
    RecipientFileUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The recipient marker file lists no recipients at all.
    #[error("Recipient file {} lists no recipients", path.display())]
    NoRecipients { path: PathBuf },

    /// The crypto engine command could not be resolved.
    #[error("Crypto engine command not found: {command}")]
    CommandNotFound { command: String },
}

/// Walking or reading the store failed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Directory traversal failed (permissions, vanished directory, loops).
    #[error("Failed to walk store: {0}")]
    Walk(#[from] walkdir::Error),

    /// A secret file could not be read.
    #[error("Failed to read secret {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The external crypto engine failed.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// The engine process could not be started.
    #[error("Failed to launch {}: {source}", command.display())]
    Spawn {
        command: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Talking to the engine process over its pipes failed.
    #[error("I/O with {} failed: {source}", command.display())]
    Io {
        command: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The engine process exited unsuccessfully.
    #[error("{} exited with {status}: {stderr}", command.display())]
    Failed {
        command: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    /// The engine produced output that is not valid UTF-8 text.
    #[error("{} produced non-UTF-8 output", command.display())]
    InvalidOutput { command: PathBuf },

    /// An in-process engine rejected its input.
    #[error("Crypto engine failure: {0}")]
    Engine(String),
}

/// What an [`EncryptionError`] was trying to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionTarget {
    /// The serialized catalog.
    Catalog,
    /// One stored secret.
    Secret(SecretIdentity),
}

impl fmt::Display for EncryptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncryptionTarget::Catalog => f.write_str("catalog"),
            EncryptionTarget::Secret(identity) => write!(f, "secret {identity}"),
        }
    }
}

/// Any failure of a catalog build or snapshot assembly.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Failed to encrypt {target}: {source}")]
    Encryption {
        target: EncryptionTarget,
        #[source]
        source: EncryptionError,
    },

    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<walkdir::Error> for SnapshotError {
    fn from(e: walkdir::Error) -> Self {
        SnapshotError::Build(BuildError::Walk(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_target_display() {
        assert_eq!(EncryptionTarget::Catalog.to_string(), "catalog");
        let target = EncryptionTarget::Secret(SecretIdentity::new("social/example.com", "alice"));
        assert_eq!(target.to_string(), "secret social/example.com/alice");
    }

    #[test]
    fn test_configuration_error_is_transparent() {
        let err = SnapshotError::from(ConfigurationError::RecipientFileMissing {
            path: PathBuf::from("/store/.gpg-id"),
        });
        assert_eq!(err.to_string(), "Recipient file not found: /store/.gpg-id");
    }

    #[test]
    fn test_encryption_error_message_includes_target() {
        let err = SnapshotError::Encryption {
            target: EncryptionTarget::Catalog,
            source: EncryptionError::Engine("no public key".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to encrypt catalog: Crypto engine failure: no public key"
        );
    }
}
