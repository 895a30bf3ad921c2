#![deny(unsafe_code)]

mod commands;
mod config;
mod exit_code;
mod output;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use passbridge_core::{ArmorMode, BuildError, ConfigurationError, SnapshotError};

use crate::commands::{check, list, serve};
use crate::config::{FileConfig, Overrides, Settings};

/// Serve a pass password store to browser extensions over local HTTP
#[derive(Parser)]
#[command(name = "passbridge")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Serve ~/.password-store on 127.0.0.1:7277
    passbridge serve

    # Reload after changing the store
    kill -USR1 \"$(pidof passbridge)\"

    # Show what would be served
    passbridge --store ~/work-store list
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Password store directory [default: ~/.password-store]
    #[arg(long, env = "PASSWORD_STORE_DIR", value_name = "DIR", global = true)]
    store: Option<PathBuf>,

    /// gpg command, looked up on PATH [default: gpg]
    #[arg(long, env = "PASSBRIDGE_GPG", value_name = "COMMAND", global = true)]
    gpg: Option<String>,

    /// How secrets are armored: by gpg, or in-process [default: gpg]
    #[arg(long, env = "PASSBRIDGE_ARMOR", value_name = "MODE", global = true)]
    armor: Option<ArmorMode>,

    /// Config file [default: ~/.config/passbridge/config.toml]
    #[arg(long, env = "PASSBRIDGE_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the store over HTTP (default)
    Serve(serve::Args),

    /// List the secrets in the store
    List(list::Args),

    /// Build a full snapshot without serving it
    Check(check::Args),
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            let code = categorize_error(&e);

            // Only print error if not quiet mode (quiet is parsed separately for this)
            let is_quiet = std::env::args().any(|a| a == "-q" || a == "--quiet");
            if !is_quiet {
                eprintln!("Error: {e:#}");
            }

            ExitCode::from(code)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        setup_tracing(cli.verbose);
    }

    let command = cli
        .command
        .unwrap_or_else(|| Commands::Serve(serve::Args::default()));
    let addr = match &command {
        Commands::Serve(args) => args.addr,
        _ => None,
    };

    let file = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(
        Overrides {
            addr,
            store: cli.store,
            gpg: cli.gpg,
            armor: cli.armor,
        },
        file,
    )?;
    tracing::debug!(?settings, "Resolved settings");

    match command {
        Commands::Serve(_) => serve::execute(&settings, cli.quiet),
        Commands::List(args) => list::execute(&settings, &args),
        Commands::Check(args) => check::execute(&settings, &args),
    }
}

/// Set up tracing/logging based on verbosity level
fn setup_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Categorize an error into an exit code using typed error downcasting
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<ConfigurationError>().is_some()
            || cause.downcast_ref::<toml::de::Error>().is_some()
        {
            return exit_code::CONFIG_INVALID;
        }

        if let Some(snapshot_err) = cause.downcast_ref::<SnapshotError>() {
            match snapshot_err {
                SnapshotError::Configuration(_) => return exit_code::CONFIG_INVALID,
                SnapshotError::Build(build_err) => return categorize_build_error(build_err),
                SnapshotError::Encryption { .. } => return exit_code::ENCRYPTION_FAILED,
                SnapshotError::Serialize { .. } => return exit_code::GENERAL_ERROR,
            }
        }

        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::PermissionDenied => return exit_code::PERMISSION_DENIED,
                io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => {
                    return exit_code::SERVE_FAILED;
                }
                _ => {}
            }
        }
    }

    exit_code::GENERAL_ERROR
}

fn categorize_build_error(e: &BuildError) -> u8 {
    let permission_denied = match e {
        BuildError::Walk(walk_err) => walk_err
            .io_error()
            .is_some_and(|io_err| io_err.kind() == io::ErrorKind::PermissionDenied),
        BuildError::Read { source, .. } => source.kind() == io::ErrorKind::PermissionDenied,
    };
    if permission_denied {
        exit_code::PERMISSION_DENIED
    } else {
        exit_code::STORE_UNREADABLE
    }
}
