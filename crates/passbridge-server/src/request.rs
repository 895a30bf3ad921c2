//! Decoding of secret fetch request bodies.
//!
//! A client addresses a secret as `{"path": <group>, "username": <account>}`.
//! Browser extensions built against pass sometimes send a purely numeric
//! account name as a JSON number instead of a string, so `username` is
//! accepted in either form and numbers are rendered back to the text the
//! store would use as a file name.

use passbridge_core::SecretIdentity;
use serde::Deserialize;

use crate::error::ValidationError;

/// Body of a `POST /secret/` request.
///
/// Unknown fields are ignored. A missing or `null` `path` means the empty
/// group, which never matches a stored secret.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecretRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub username: Option<Username>,
}

/// The `username` field as it arrived on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Username {
    Text(String),
    Number(serde_json::Number),
    /// Any other JSON value: rejected.
    Other(serde_json::Value),
}

impl Username {
    /// Canonical text form used for lookups, or `None` if the value cannot
    /// name an account.
    ///
    /// Numbers are read as IEEE-754 doubles and printed with the shortest
    /// decimal expansion that round-trips, never in exponent form.
    pub fn to_account_name(&self) -> Option<String> {
        match self {
            Username::Text(text) => Some(text.clone()),
            Username::Number(number) => number.as_f64().map(format_number),
            Username::Other(_) => None,
        }
    }
}

impl SecretRequest {
    /// Parse a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(body).map_err(ValidationError::Malformed)
    }

    /// The identity this request addresses.
    pub fn identity(&self) -> Result<SecretIdentity, ValidationError> {
        let account = self
            .username
            .as_ref()
            .and_then(Username::to_account_name)
            .ok_or(ValidationError::BadUsername)?;
        Ok(SecretIdentity::new(
            self.path.clone().unwrap_or_default(),
            account,
        ))
    }
}

/// Render `value` as plain decimal: shortest round-trip digits, no exponent.
///
/// `7.0` renders as `7`, `1e21` as `1000000000000000000000` and `1e-7` as
/// `0.0000001`.
pub fn format_number(value: f64) -> String {
    // f64's Display already produces the shortest round-trip digits and
    // never switches to scientific notation.
    format!("{value}")
}
