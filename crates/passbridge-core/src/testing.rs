//! Test fixtures: temporary stores and in-process crypto engines.
//!
//! # Usage
//!
//! ```
//! use passbridge_core::testing::{FakeEngine, TempStore};
//!
//! let store = TempStore::with_recipients(&["A"]);
//! store.add_secret("social/example.com", "alice", b"ciphertext");
//! let snapshot = passbridge_core::assemble(store.path(), &FakeEngine).unwrap();
//! assert_eq!(snapshot.secret_count(), 1);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::crypto::{CryptoEngine, armor};
use crate::error::EncryptionError;
use crate::store::{RECIPIENT_FILE, RecipientSet, SECRET_SUFFIX};

/// A password store in a temporary directory, removed on drop.
pub struct TempStore {
    dir: TempDir,
}

impl TempStore {
    /// A store directory with no recipient file.
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp store"),
        }
    }

    /// A store whose recipient file lists `recipients`, one per line.
    pub fn with_recipients(recipients: &[&str]) -> Self {
        let store = Self::empty();
        store.write_recipients(recipients);
        store
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_recipients(&self, recipients: &[&str]) {
        let contents: String = recipients.iter().map(|r| format!("{r}\n")).collect();
        fs::write(self.path().join(RECIPIENT_FILE), contents)
            .expect("Failed to write recipient file");
    }

    pub fn remove_recipients(&self) {
        fs::remove_file(self.path().join(RECIPIENT_FILE)).expect("Failed to remove recipient file");
    }

    /// Write `contents` at `relative`, creating parent directories.
    pub fn add_file(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create store directory");
        }
        fs::write(&path, contents).expect("Failed to write store file");
        path
    }

    /// Store a secret for `account` under `group`.
    pub fn add_secret(&self, group: &str, account: &str, contents: &[u8]) -> PathBuf {
        self.add_file(&format!("{group}/{account}{SECRET_SUFFIX}"), contents)
    }

    pub fn remove_secret(&self, group: &str, account: &str) {
        fs::remove_file(self.path().join(format!("{group}/{account}{SECRET_SUFFIX}")))
            .expect("Failed to remove secret");
    }
}

/// Deterministic stand-in for gpg.
///
/// "Encryption" armors `recipients,joined\n` followed by the plaintext, so a
/// test can recover both with [`FakeEngine::decrypt`]. Re-encoding is plain
/// armor of the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeEngine;

impl FakeEngine {
    /// Reverse [`CryptoEngine::encrypt`]: returns the recipients and plaintext.
    pub fn decrypt(armored: &str) -> Option<(Vec<String>, Vec<u8>)> {
        let (_, payload) = armor::decode(armored).ok()?;
        let split = payload.iter().position(|&b| b == b'\n')?;
        let recipients = std::str::from_utf8(&payload[..split])
            .ok()?
            .split(',')
            .map(str::to_owned)
            .collect();
        Some((recipients, payload[split + 1..].to_vec()))
    }
}

impl CryptoEngine for FakeEngine {
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &RecipientSet,
    ) -> Result<String, EncryptionError> {
        let mut payload = recipients.iter().collect::<Vec<_>>().join(",").into_bytes();
        payload.push(b'\n');
        payload.extend_from_slice(plaintext);
        Ok(armor::encode(&payload, armor::MESSAGE_LABEL))
    }

    fn reencode(&self, blob: &[u8]) -> Result<String, EncryptionError> {
        Ok(armor::encode(blob, armor::MESSAGE_LABEL))
    }
}

/// [`FakeEngine`] that fails on chosen input.
#[derive(Debug, Clone, Default)]
pub struct FailingEngine {
    fail_catalog: bool,
    poison: Option<Vec<u8>>,
}

impl FailingEngine {
    /// Fail every catalog encryption.
    pub fn on_catalog() -> Self {
        Self {
            fail_catalog: true,
            poison: None,
        }
    }

    /// Fail re-encoding of any secret whose bytes equal `poison`.
    pub fn on_secret(poison: &[u8]) -> Self {
        Self {
            fail_catalog: false,
            poison: Some(poison.to_vec()),
        }
    }
}

impl CryptoEngine for FailingEngine {
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &RecipientSet,
    ) -> Result<String, EncryptionError> {
        if self.fail_catalog {
            return Err(EncryptionError::Engine("catalog encryption refused".to_string()));
        }
        FakeEngine.encrypt(plaintext, recipients)
    }

    fn reencode(&self, blob: &[u8]) -> Result<String, EncryptionError> {
        if self.poison.as_deref() == Some(blob) {
            return Err(EncryptionError::Engine("secret re-encoding refused".to_string()));
        }
        FakeEngine.reencode(blob)
    }
}

/// Extract the text of a `{"response": "..."}` envelope.
pub fn unwrap_response(body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct Envelope {
        response: String,
    }
    serde_json::from_slice::<Envelope>(body)
        .expect("Body is not a response envelope")
        .response
}
