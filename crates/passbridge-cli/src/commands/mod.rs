pub mod check;
pub mod list;
pub mod serve;

use anyhow::{Context, Result};
use passbridge_core::GpgEngine;

use crate::config::Settings;

/// Resolve the configured gpg command into an engine.
fn gpg_engine(settings: &Settings) -> Result<GpgEngine> {
    let engine = GpgEngine::locate(&settings.gpg)
        .with_context(|| format!("Cannot use gpg command '{}'", settings.gpg))?
        .with_armor(settings.armor);
    tracing::debug!(command = %engine.command().display(), armor = %engine.armor(), "Using gpg");
    Ok(engine)
}
