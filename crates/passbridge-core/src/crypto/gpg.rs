use std::env;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::CryptoEngine;
use super::armor;
use crate::error::{ConfigurationError, EncryptionError};
use crate::store::RecipientSet;

/// Label `gpg --enarmor` puts on its output.
const ENARMOR_LABEL: &str = "PGP ARMORED FILE";

/// How [`GpgEngine::reencode`] produces armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmorMode {
    /// Run `gpg --enarmor` once per secret.
    #[default]
    Gpg,
    /// Armor in-process; no subprocess per secret.
    Native,
}

impl ArmorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmorMode::Gpg => "gpg",
            ArmorMode::Native => "native",
        }
    }
}

impl fmt::Display for ArmorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArmorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpg" => Ok(ArmorMode::Gpg),
            "native" => Ok(ArmorMode::Native),
            _ => Err(format!("unknown armor mode: {s}")),
        }
    }
}

/// [`CryptoEngine`] backed by a `gpg` executable.
#[derive(Debug, Clone)]
pub struct GpgEngine {
    command: PathBuf,
    armor: ArmorMode,
}

impl GpgEngine {
    /// Use `command` as-is, without checking that it exists.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            armor: ArmorMode::default(),
        }
    }

    /// Resolve `command` the way a shell would and build an engine around it.
    ///
    /// Names containing a path separator are checked directly; bare names are
    /// searched for in `PATH`.
    pub fn locate(command: &str) -> Result<Self, ConfigurationError> {
        find_executable(command)
            .map(Self::new)
            .ok_or_else(|| ConfigurationError::CommandNotFound {
                command: command.to_owned(),
            })
    }

    #[must_use]
    pub fn with_armor(mut self, armor: ArmorMode) -> Self {
        self.armor = armor;
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    pub fn armor(&self) -> ArmorMode {
        self.armor
    }

    /// Run gpg with `args`, feeding `input` on stdin and returning stdout.
    fn run(&self, input: &[u8], args: &[&str]) -> Result<String, EncryptionError> {
        trace!(command = %self.command.display(), ?args, "Running crypto engine");

        let mut child = Command::new(&self.command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EncryptionError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| EncryptionError::Io {
            command: self.command.clone(),
            source: io::Error::other("stdin was not captured"),
        })?;

        // Feed stdin on its own thread so a full stdout pipe cannot deadlock us.
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let mut stdin = stdin;
                stdin.write_all(input)
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let io_error = |source: io::Error| EncryptionError::Io {
            command: self.command.clone(),
            source,
        };
        let output = output.map_err(io_error)?;
        match written {
            Ok(Ok(())) => {}
            // gpg quit before reading everything; its exit status says why
            Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(io_error(e)),
            Err(_) => return Err(io_error(io::Error::other("stdin writer panicked"))),
        }

        if !output.status.success() {
            return Err(EncryptionError::Failed {
                command: self.command.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| EncryptionError::InvalidOutput {
            command: self.command.clone(),
        })
    }
}

impl CryptoEngine for GpgEngine {
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &RecipientSet,
    ) -> Result<String, EncryptionError> {
        let mut args = vec!["--encrypt", "--armor"];
        for id in recipients.iter() {
            args.push("--recipient");
            args.push(id);
        }
        self.run(plaintext, &args)
    }

    fn reencode(&self, blob: &[u8]) -> Result<String, EncryptionError> {
        match self.armor {
            ArmorMode::Gpg => {
                let armored = self.run(blob, &["--enarmor"])?;
                Ok(armored.replace(ENARMOR_LABEL, armor::MESSAGE_LABEL))
            }
            ArmorMode::Native => Ok(armor::encode(blob, armor::MESSAGE_LABEL)),
        }
    }
}

fn find_executable(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(command))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
