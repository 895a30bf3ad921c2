//! Serve command - build a snapshot and serve it over HTTP.
//!
//! The first build must succeed or the command fails: there is nothing safe
//! to serve yet. After that, `SIGUSR1` triggers a rebuild. A failed rebuild
//! is logged and the previous snapshot keeps serving. `SIGINT` or `SIGTERM`
//! stops the server.
//!
//! # Examples
//!
//! ```bash
//! passbridge serve --addr 127.0.0.1:7277
//! kill -USR1 <pid>    # reload after `pass insert`
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use passbridge_core::Reloader;
use passbridge_server::{HttpServer, SecretRouter, ServerConfig};

use super::gpg_engine;
use crate::config::Settings;

#[derive(ClapArgs, Clone, Debug, Default)]
pub struct Args {
    /// Address to listen on [default: 127.0.0.1:7277]
    #[arg(long, env = "PASSBRIDGE_ADDR", value_name = "ADDR")]
    pub addr: Option<SocketAddr>,
}

#[instrument(level = "info", name = "cmd::serve", skip_all, fields(store = %settings.store.display()))]
pub fn execute(settings: &Settings, quiet: bool) -> Result<()> {
    let engine = gpg_engine(settings)?;
    let reloader = Reloader::bootstrap(&settings.store, Arc::new(engine))
        .with_context(|| format!("Initial snapshot build failed for {}", settings.store.display()))?;
    let reloader = Arc::new(reloader);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        // Install handlers before announcing readiness so an early SIGUSR1
        // cannot hit the default disposition and kill the process.
        let signals = Signals::install()?;

        let router = SecretRouter::new(Arc::clone(reloader.registry()));
        let config = ServerConfig { addr: settings.addr };
        let server = HttpServer::start(router, config)
            .await
            .with_context(|| format!("Failed to listen on {}", settings.addr))?;

        if !quiet {
            println!(
                "Serving {} secret(s) from {} at {}",
                reloader.registry().current().secret_count(),
                settings.store.display(),
                server.url()
            );
        }

        signals.wait_for_shutdown(&reloader).await;
        server.stop().await;
        Ok(())
    })
}

#[cfg(unix)]
struct Signals {
    reload: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            reload: signal(SignalKind::user_defined1())
                .context("Failed to install SIGUSR1 handler")?,
            terminate: signal(SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?,
            interrupt: signal(SignalKind::interrupt())
                .context("Failed to install SIGINT handler")?,
        })
    }

    /// Service reload signals until a shutdown signal arrives.
    async fn wait_for_shutdown(mut self, reloader: &Arc<Reloader>) {
        loop {
            tokio::select! {
                _ = self.reload.recv() => spawn_reload(reloader),
                _ = self.terminate.recv() => {
                    info!("Received SIGTERM, shutting down");
                    return;
                }
                _ = self.interrupt.recv() => {
                    info!("Received SIGINT, shutting down");
                    return;
                }
            }
        }
    }
}

/// Start a rebuild on the blocking pool. The reloader logs the outcome.
#[cfg(unix)]
fn spawn_reload(reloader: &Arc<Reloader>) {
    info!("Reload requested");
    let reloader = Arc::clone(reloader);
    tokio::task::spawn_blocking(move || {
        let _ = reloader.reload();
    });
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> Result<Self> {
        tracing::warn!("Reload signals are not supported on this platform; restart to reload");
        Ok(Self)
    }

    async fn wait_for_shutdown(self, _reloader: &Arc<Reloader>) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Received Ctrl-C, shutting down");
    }
}
