//! Catalog rows and their canonical wire form.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::SnapshotError;
use crate::store::SecretIdentity;

/// One row of searchable catalog metadata.
///
/// Field names on the wire follow the client protocol: `domain` is the last
/// group segment, `path` the whole group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "domain")]
    pub leaf_segment: String,
    #[serde(rename = "path")]
    pub group: String,
    #[serde(rename = "username")]
    pub account_name: String,
    #[serde(rename = "username_normalized")]
    pub account_name_normalized: String,
}

impl CatalogEntry {
    pub fn from_identity(identity: &SecretIdentity) -> Self {
        Self {
            leaf_segment: identity.group_segments().last().unwrap_or_default().to_owned(),
            group: identity.group().to_owned(),
            account_name: identity.account().to_owned(),
            account_name_normalized: normalize_account_name(identity.account()),
        }
    }
}

/// ASCII-only search projection of an account name.
///
/// Applies Unicode compatibility decomposition (NFKD) and drops every code
/// point at or above 0x80, so `Jürgen` becomes `Jurgen` and `ｆｏｏ` becomes
/// `foo`. Characters with no ASCII decomposition disappear entirely; the
/// result may be empty. Clients use it for fuzzy matching only.
pub fn normalize_account_name(name: &str) -> String {
    name.nfkd().filter(char::is_ascii).collect()
}

/// Serialize entries to the canonical catalog form: a UTF-8 JSON array in
/// build order.
pub fn to_json(entries: &[CatalogEntry]) -> Result<Vec<u8>, SnapshotError> {
    serde_json::to_vec(entries).map_err(|source| SnapshotError::Serialize {
        what: "catalog",
        source,
    })
}
