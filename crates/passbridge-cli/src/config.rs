//! Layered configuration for the passbridge CLI.
//!
//! Settings come from three places, highest precedence first:
//!
//! 1. Command-line flags and their environment variables
//! 2. The config file (`--config <path>`, or `config.toml` in the config dir)
//! 3. Built-in defaults
//!
//! The config dir is `~/.config/passbridge` on Linux and
//! `~/Library/Application Support/passbridge` on macOS; it can be overridden
//! with `PASSBRIDGE_CONFIG_DIR`.
//!
//! # Example configuration
//!
//! ```toml
//! addr = "127.0.0.1:7277"
//! store = "/home/user/.password-store"
//! gpg = "/usr/bin/gpg2"
//! armor = "native"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use passbridge_core::ArmorMode;
use passbridge_server::DEFAULT_ADDR;
use serde::Deserialize;
use tracing::debug;

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "PASSBRIDGE_CONFIG_DIR";

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_GPG: &str = "gpg";
const DEFAULT_STORE_DIR: &str = ".password-store";

/// Contents of the config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub addr: Option<SocketAddr>,
    pub store: Option<PathBuf>,
    pub gpg: Option<String>,
    pub armor: Option<ArmorMode>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicitly named file must exist. The default file is optional and
    /// an empty config is returned when it is absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (config_path()?, false),
        };

        if !required && !path.exists() {
            debug!(path = %path.display(), "No config file");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub addr: Option<SocketAddr>,
    pub store: Option<PathBuf>,
    pub gpg: Option<String>,
    pub armor: Option<ArmorMode>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub addr: SocketAddr,
    pub store: PathBuf,
    pub gpg: String,
    pub armor: ArmorMode,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let store = match overrides.store.or(file.store) {
            Some(store) => store,
            None => default_store_dir()?,
        };
        Ok(Self {
            addr: overrides.addr.or(file.addr).unwrap_or(DEFAULT_ADDR),
            store,
            gpg: overrides
                .gpg
                .or(file.gpg)
                .unwrap_or_else(|| DEFAULT_GPG.to_string()),
            armor: overrides.armor.or(file.armor).unwrap_or_default(),
        })
    }
}

/// Get the path to the default configuration file.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Get the configuration directory.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(base_dirs.config_dir().join("passbridge"))
}

/// `~/.password-store`, where `pass` keeps its store by default.
fn default_store_dir() -> Result<PathBuf> {
    let base_dirs = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory; pass --store"))?;
    Ok(base_dirs.home_dir().join(DEFAULT_STORE_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = FileConfig::parse(
            r#"
            addr = "127.0.0.1:9000"
            store = "/srv/store"
            gpg = "gpg2"
            armor = "native"
            "#,
        )
        .unwrap();
        assert_eq!(config.addr, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(config.store, Some(PathBuf::from("/srv/store")));
        assert_eq!(config.gpg.as_deref(), Some("gpg2"));
        assert_eq!(config.armor, Some(ArmorMode::Native));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = FileConfig::parse("").unwrap();
        assert!(config.addr.is_none());
        assert!(config.store.is_none());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(FileConfig::parse("port = 80").is_err());
        assert!(FileConfig::parse(r#"armor = "base64""#).is_err());
    }

    #[test]
    fn test_overrides_beat_file_beat_defaults() {
        let file = FileConfig {
            addr: Some("127.0.0.1:9000".parse().unwrap()),
            store: Some(PathBuf::from("/from/file")),
            gpg: Some("gpg-from-file".to_string()),
            armor: None,
        };
        let overrides = Overrides {
            store: Some(PathBuf::from("/from/flag")),
            ..Overrides::default()
        };

        let settings = Settings::resolve(overrides, file).unwrap();
        assert_eq!(settings.store, PathBuf::from("/from/flag"));
        assert_eq!(settings.addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(settings.gpg, "gpg-from-file");
        assert_eq!(settings.armor, ArmorMode::Gpg);
    }

    #[test]
    fn test_defaults() {
        let overrides = Overrides {
            store: Some(PathBuf::from("/store")),
            ..Overrides::default()
        };
        let settings = Settings::resolve(overrides, FileConfig::default()).unwrap();
        assert_eq!(settings.addr, DEFAULT_ADDR);
        assert_eq!(settings.gpg, "gpg");
        assert_eq!(settings.armor, ArmorMode::Gpg);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = FileConfig::load(Some(Path::new("/nonexistent/passbridge.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config file"));
    }
}
