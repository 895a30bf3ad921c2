//! Check command - run a full snapshot build without serving it.
//!
//! Useful after editing `.gpg-id` or the gpg setup: the build encrypts the
//! catalog and re-armors every secret exactly as `serve` would at startup.
//!
//! # Examples
//!
//! ```bash
//! passbridge check
//! passbridge check --json
//! ```

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use tracing::instrument;

use passbridge_core::{RecipientSet, assemble};

use super::gpg_engine;
use crate::config::Settings;
use crate::output::{create_table, format_millis};

#[derive(ClapArgs, Clone, Debug, Default)]
pub struct Args {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output format for check command
#[derive(Serialize)]
struct CheckReport {
    store: String,
    gpg: String,
    armor: String,
    recipients: Vec<String>,
    secrets: usize,
    elapsed_ms: u128,
}

#[instrument(level = "info", name = "cmd::check", skip_all, fields(store = %settings.store.display()))]
pub fn execute(settings: &Settings, args: &Args) -> Result<()> {
    let engine = gpg_engine(settings)?;
    let recipients = RecipientSet::read(&settings.store)
        .with_context(|| format!("Invalid store: {}", settings.store.display()))?;

    let start = Instant::now();
    let snapshot = assemble(&settings.store, &engine).context("Snapshot build failed")?;
    let elapsed_ms = start.elapsed().as_millis();

    let report = CheckReport {
        store: settings.store.display().to_string(),
        gpg: engine.command().display().to_string(),
        armor: engine.armor().to_string(),
        recipients: recipients.iter().map(str::to_owned).collect(),
        secrets: snapshot.secret_count(),
        elapsed_ms,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mut table = create_table();
        table.set_header(vec!["Property", "Value"]);
        table.add_row(vec!["Store", &report.store]);
        table.add_row(vec!["Gpg", &report.gpg]);
        table.add_row(vec!["Armor", &report.armor]);
        table.add_row(vec!["Recipients", &report.recipients.join(", ")]);
        table.add_row(vec!["Secrets", &report.secrets.to_string()]);
        table.add_row(vec!["Build time", &format_millis(report.elapsed_ms)]);
        println!("{table}");
    }

    Ok(())
}
