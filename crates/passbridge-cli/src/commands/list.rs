//! List command - show the catalog a store would serve.
//!
//! Walks the store and prints every secret identity. Nothing is encrypted,
//! so gpg is not needed.
//!
//! # Examples
//!
//! ```bash
//! passbridge list
//! passbridge --store ~/work-store list --json | jq '.[].path'
//! ```

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use passbridge_core::store;

use crate::config::Settings;
use crate::output::create_table;

#[derive(ClapArgs, Clone, Debug, Default)]
pub struct Args {
    /// Output the catalog as JSON, exactly as it is encrypted for clients
    #[arg(long)]
    pub json: bool,
}

#[instrument(level = "info", name = "cmd::list", skip_all, fields(store = %settings.store.display()))]
pub fn execute(settings: &Settings, args: &Args) -> Result<()> {
    let catalog = store::build_catalog(&settings.store)
        .with_context(|| format!("Failed to read store: {}", settings.store.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog.entries)?);
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Path", "Username", "Normalized"]);
    for entry in &catalog.entries {
        table.add_row(vec![
            entry.group.as_str(),
            entry.account_name.as_str(),
            entry.account_name_normalized.as_str(),
        ]);
    }
    println!("{table}");
    println!(
        "{} secret(s), {} recipient(s)",
        catalog.entries.len(),
        catalog.recipients.len()
    );
    Ok(())
}
