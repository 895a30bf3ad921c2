//! Password-store layout and the catalog builder.
//!
//! A store is a directory with a `.gpg-id` recipient file at its root and any
//! number of `*.gpg` secret files at depth one or deeper. The root level holds
//! configuration only, so files placed directly in the root are never secrets.
//!
//! The store is attacker-writable from our point of view: names are taken as
//! they are found, symlinked directories are not descended into, and any read
//! failure aborts the build instead of producing a partial catalog.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::catalog::CatalogEntry;
use crate::error::{BuildError, ConfigurationError, SnapshotError};

/// Name of the recipient marker file at the store root.
pub const RECIPIENT_FILE: &str = ".gpg-id";

/// Suffix every secret file carries.
pub const SECRET_SUFFIX: &str = ".gpg";

/// Version-control metadata directory skipped during the walk.
pub const VCS_DIR: &str = ".git";

/// Unique key of a stored secret: its group path plus the leaf account name.
///
/// The group is kept in canonical form, segments joined with `/` and no
/// leading or trailing separator. Two identities are equal only if both parts
/// match exactly; normalized account names play no part in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretIdentity {
    #[serde(rename = "path")]
    group: String,
    #[serde(rename = "username")]
    account: String,
}

impl SecretIdentity {
    pub fn new(group: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            account: account.into(),
        }
    }

    /// Derive an identity from a secret file's path relative to the store root.
    ///
    /// Returns `None` for paths that are not secrets: wrong suffix, or no
    /// group directory above the file.
    pub fn from_relative_path(relative: &Path) -> Option<Self> {
        let mut segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let file_name = segments.pop()?;
        if segments.is_empty() {
            return None;
        }
        let account = file_name.strip_suffix(SECRET_SUFFIX)?;
        Some(Self::new(segments.join("/"), account))
    }

    /// The group path, segments joined with `/`.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Ordered group path segments.
    pub fn group_segments(&self) -> impl Iterator<Item = &str> {
        self.group.split('/').filter(|s| !s.is_empty())
    }

    /// The leaf account name exactly as stored.
    pub fn account(&self) -> &str {
        &self.account
    }
}

impl fmt::Display for SecretIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            f.write_str(&self.account)
        } else {
            write!(f, "{}/{}", self.group, self.account)
        }
    }
}

/// Ordered recipient identifiers every build encrypts for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecipientSet(Vec<String>);

impl RecipientSet {
    pub fn new(recipients: Vec<String>) -> Self {
        Self(recipients)
    }

    /// Parse the contents of a recipient file: one identifier per non-empty line.
    pub fn parse(contents: &str) -> Self {
        Self(
            contents
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// Read the recipient file at the root of `store_root`.
    pub fn read(store_root: &Path) -> Result<Self, ConfigurationError> {
        let path = store_root.join(RECIPIENT_FILE);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigurationError::RecipientFileMissing { path });
            }
            Err(source) => {
                return Err(ConfigurationError::RecipientFileUnreadable { path, source });
            }
        };

        let recipients = Self::parse(&contents);
        if recipients.is_empty() {
            return Err(ConfigurationError::NoRecipients { path });
        }
        Ok(recipients)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unencrypted-by-us bytes of one secret file.
///
/// The bytes are whatever is on disk, normally an OpenPGP message. They only
/// live for the duration of a build and are never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct RawSecret(Vec<u8>);

impl RawSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RawSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawSecret({} bytes)", self.0.len())
    }
}

/// A secret file found by [`scan`], not yet read.
#[derive(Debug, Clone)]
pub struct SecretFile {
    pub path: PathBuf,
    pub identity: SecretIdentity,
}

/// Output of one catalog build.
///
/// `entries` and `secrets` come from the same walk with the same filter, so
/// every entry has exactly one secret and vice versa.
#[derive(Debug)]
pub struct StoreCatalog {
    pub recipients: RecipientSet,
    pub entries: Vec<CatalogEntry>,
    pub secrets: HashMap<SecretIdentity, RawSecret>,
}

fn is_vcs_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == VCS_DIR
}

/// Walk the store and list every eligible secret file in walk order.
///
/// The walk is sorted by file name so repeated scans of an unchanged tree
/// yield the same order. Symlinked directories are not descended into.
#[instrument(level = "debug", skip_all, fields(store = %store_root.display()))]
pub fn scan(store_root: &Path) -> Result<Vec<SecretFile>, BuildError> {
    let mut files = Vec::with_capacity(256);

    let walker = WalkDir::new(store_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_vcs_dir(e));

    for entry in walker {
        let entry = entry?;
        // depth 1 is the store root's own files: configuration only
        if entry.file_type().is_dir() || entry.depth() < 2 {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(store_root) else {
            continue;
        };
        match SecretIdentity::from_relative_path(relative) {
            Some(identity) => files.push(SecretFile {
                path: entry.into_path(),
                identity,
            }),
            None => trace!(path = %entry.path().display(), "Skipping non-secret file"),
        }
    }

    Ok(files)
}

/// Build the catalog for the store at `store_root`.
///
/// Reads the recipient file, walks the tree and reads every secret. Any
/// failure aborts the whole build.
#[instrument(level = "info", name = "store::build_catalog", skip_all, fields(store = %store_root.display()))]
pub fn build_catalog(store_root: &Path) -> Result<StoreCatalog, SnapshotError> {
    let recipients = RecipientSet::read(store_root)?;
    debug!(recipients = ?recipients, "Read recipient file");

    let files = scan(store_root)?;

    let mut entries = Vec::with_capacity(files.len());
    let mut secrets = HashMap::with_capacity(files.len());
    for file in files {
        if secrets.contains_key(&file.identity) {
            // Only reachable through lossy conversion of non-UTF-8 names.
            warn!(identity = %file.identity, path = %file.path.display(), "Duplicate secret identity, keeping first");
            continue;
        }
        let bytes = fs::read(&file.path).map_err(|source| BuildError::Read {
            path: file.path.clone(),
            source,
        })?;

        entries.push(CatalogEntry::from_identity(&file.identity));
        secrets.insert(file.identity, RawSecret::new(bytes));
    }

    info!(secrets = secrets.len(), "Catalog built");
    Ok(StoreCatalog {
        recipients,
        entries,
        secrets,
    })
}
