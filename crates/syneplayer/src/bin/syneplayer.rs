//! syneplayer - synchronized looping playback
//!
//! Subcommands:
//! - `syneplayer master` - Mint an epoch, serve it, and play locally
//! - `syneplayer slave` - Follow a master's epoch
//! - `syneplayer status [host]` - Ask a master what it is serving
//! - `syneplayer config` - Print the effective configuration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use syneconf::SyneConfig;
use syneplayer::{
    Clock, HeadlessFactory, MasterConfig, MasterServer, SlaveConfig, SlaveNode, SystemClock,
};
use syneproto::{ClientConfig, EpochClient};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "syneplayer")]
#[command(about = "Synchronized looping playback across machines")]
#[command(version)]
struct Cli {
    /// Config file (replaces ./syneplayer.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Network clock port
    #[arg(long, global = true)]
    clock_port: Option<u16>,

    /// Epoch RPC port
    #[arg(long, global = true)]
    rpc_port: Option<u16>,

    /// Master address (slave and status)
    #[arg(long, global = true)]
    master_ip: Option<String>,

    /// Media file to loop
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Interval between epoch polls in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Timeout per epoch RPC attempt in milliseconds
    #[arg(long, global = true)]
    rpc_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the master: serve the epoch and play locally
    Master,

    /// Run a slave: follow the master's epoch
    Slave,

    /// Query a master's epoch and uptime
    Status {
        /// Master address (defaults to the configured master)
        host: Option<String>,
    },

    /// Print the effective configuration as TOML
    Config,
}

impl Cli {
    /// Flags win over files and environment.
    fn apply_overrides(&self, config: &mut SyneConfig) {
        if let Some(port) = self.clock_port {
            config.network.clock_port = port;
        }
        if let Some(port) = self.rpc_port {
            config.network.rpc_port = port;
        }
        if let Some(host) = &self.master_ip {
            config.network.master_host = host.clone();
        }
        if let Some(file) = &self.file {
            config.media.file = Some(file.clone());
        }
        if let Some(ms) = self.poll_interval_ms {
            config.sync.poll_interval_ms = ms;
        }
        if let Some(ms) = self.rpc_timeout_ms {
            config.sync.rpc_timeout_ms = ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = SyneConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    syneplayer::telemetry::init(&config.telemetry.log_level)?;
    for file in &sources.files {
        debug!("config loaded from {}", file.display());
    }
    for var in &sources.env_overrides {
        debug!("config override from ${}", var);
    }

    match cli.command {
        Commands::Master => run_master(&config).await,
        Commands::Slave => run_slave(&config).await,
        Commands::Status { host } => status(&config, host).await,
        Commands::Config => {
            print!("{}", config.to_toml());
            Ok(())
        }
    }
}

async fn run_master(config: &SyneConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let factory = HeadlessFactory::new(Arc::clone(&clock));

    let master = MasterServer::start(MasterConfig::from_config(config), factory, clock.as_ref())
        .context("Failed to start master")?;

    shutdown_signal().await;

    let served = master.served();
    let position = master.session().engine().position();
    master.shutdown().await;
    info!(
        "master stopped at position {:?} after answering {} requests",
        position, served
    );
    Ok(())
}

async fn run_slave(config: &SyneConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let slave_config = SlaveConfig::from_config(config).context("Invalid slave settings")?;
    let slave = SlaveNode::start(slave_config, HeadlessFactory::new(clock));

    let mut state = slave.subscribe();
    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            changed = state.changed() => {
                if changed.is_err() {
                    warn!("poll loop ended unexpectedly");
                    break;
                }
                info!("sync state: {:?}", *state.borrow_and_update());
            }
        }
    }

    let report = slave.shutdown().await.context("Poll loop panicked")?;
    info!(
        "slave stopped: {} polls, {} failed, {} engines started, {} failed to start",
        report.fetches, report.failures, report.engines_started, report.start_failures
    );
    Ok(())
}

async fn status(config: &SyneConfig, host: Option<String>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.network.master_host.clone());
    let endpoint = format!("tcp://{}:{}", host, config.network.rpc_port);

    let client = EpochClient::new(
        ClientConfig::new("status", &endpoint)
            .with_timeout(config.sync.rpc_timeout())
            .with_retries(config.sync.rpc_retries),
    );
    let status = match client.fetch_status().await {
        Ok(status) => status,
        Err(e) if e.is_timeout() => {
            bail!(
                "No answer from master at {} ({}, timeout {:?})",
                endpoint,
                client.connection_state().as_str(),
                config.sync.rpc_timeout()
            );
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Bad answer from master at {}", endpoint));
        }
    };

    println!("master      {} ({})", endpoint, client.connection_state().as_str());
    println!("epoch       {}", status.epoch);
    println!("clock port  {}", status.clock_port);
    println!("started     {}", status.started_at.to_rfc3339());
    println!("uptime      {}s", status.uptime_secs);
    println!("version     {}", status.version);
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(unix)]
async fn sigterm() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
