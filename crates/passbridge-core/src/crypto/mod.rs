//! Crypto engine adapter.
//!
//! The pipeline never does any key handling itself. It needs exactly two
//! capabilities from an external engine:
//!
//! - [`CryptoEngine::encrypt`]: encrypt plaintext for a recipient set and
//!   return ASCII-armored ciphertext (used for the catalog).
//! - [`CryptoEngine::reencode`]: take an already-encrypted binary OpenPGP
//!   message and return the same message in ASCII armor (used for secrets).
//!   The result decrypts to exactly what the input decrypts to.
//!
//! [`GpgEngine`] satisfies both by running a `gpg` binary once per call.

pub mod armor;
mod gpg;

pub use gpg::{ArmorMode, GpgEngine};

use crate::error::EncryptionError;
use crate::store::RecipientSet;

/// External encryption capability used during snapshot builds.
///
/// Implementations must be callable from several threads at once; calls are
/// independent and their relative order carries no meaning.
pub trait CryptoEngine: Send + Sync {
    /// Encrypt `plaintext` for every recipient in `recipients`, returning
    /// armored ciphertext.
    fn encrypt(&self, plaintext: &[u8], recipients: &RecipientSet)
    -> Result<String, EncryptionError>;

    /// Wrap an opaque binary message in transport armor without changing
    /// what it decrypts to.
    fn reencode(&self, blob: &[u8]) -> Result<String, EncryptionError>;
}
