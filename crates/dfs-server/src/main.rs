//! Main entry point for the DFS server.
//!
//! One binary runs any of the three roles: `dfs lock`, `dfs extent` or
//! `dfs frontend`.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use dfs_common::ShutdownSignal;
use dfs_server::{
    Cli, Command, Configuration,
    startup::{self, FrontendOptions},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let configuration = Configuration::new(&cli)?;

    let _logging_guard = startup::init_logging(&configuration.logging_config()?)?;

    dfs_server::metrics::init_metrics();

    let shutdown = ShutdownSignal::new();
    startup::install_signal_handlers(&shutdown);

    let address = configuration.server_address();
    let grace = configuration.shutdown_grace()?;

    info!(role = cli.command.role(), "Starting DFS server");

    let server = match &cli.command {
        Command::Lock { .. } => {
            let listener = startup::bind(&address, configuration.lock_port()?).await?;
            startup::start_lock_authority(
                listener,
                shutdown.clone(),
                configuration.callback_connect_timeout()?,
            )?
        }
        Command::Extent { .. } => {
            let listener = startup::bind(&address, configuration.extent_port()?).await?;
            let root = PathBuf::from(configuration.extent_root()?);
            startup::start_extent(listener, shutdown.clone(), &root).await?
        }
        Command::Frontend { .. } => {
            let listener = startup::bind(&address, configuration.frontend_port()?).await?;
            let options = FrontendOptions {
                extent_addr: configuration.frontend_extent_addr()?,
                lock_addr: configuration.frontend_lock_addr()?,
                advertise_host: configuration.frontend_advertise_host(),
            };
            startup::start_frontend(listener, shutdown.clone(), options)?
        }
    };

    server.wait(grace).await;

    info!("DFS server shutdown complete");
    Ok(())
}
