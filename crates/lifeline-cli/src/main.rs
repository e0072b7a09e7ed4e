use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lifeline_core::{BtleTransport, LinkEvent, LinkManager, ManagerConfig};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "lifeline")]
#[command(author, version, about = "Central node for Lifeline man-overboard tags", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the link manager until interrupted
    Run {
        /// Maximum number of simultaneous tag links
        #[arg(long)]
        capacity: Option<usize>,

        /// Proximity threshold in dBm (advertisers below it are ignored)
        #[arg(long, allow_negative_numbers = true)]
        threshold: Option<i16>,

        /// Emit link events as JSON lines on stdout
        #[arg(long)]
        json: bool,
    },

    /// Check that a Bluetooth adapter is available and print the
    /// effective configuration
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = cli.config.clone().unwrap_or_else(Config::path);
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Run {
            capacity,
            threshold,
            json,
        } => {
            let manager_config = config.manager_config(capacity, threshold);
            run(manager_config, json || config.json_events).await
        }
        Commands::Check => check(config.manager_config(None, None)).await,
    }
}

async fn run(config: ManagerConfig, json_events: bool) -> Result<()> {
    let transport = Arc::new(
        BtleTransport::new()
            .await
            .context("could not open a Bluetooth adapter")?,
    );
    let manager = Arc::new(LinkManager::new(transport.clone(), config)?);

    let mut events = manager.subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if json_events {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "could not serialize event"),
                }
            } else {
                print_event(&event);
            }
        }
    });

    manager.start().await?;

    let cancel = CancellationToken::new();
    let pump = {
        let transport = Arc::clone(&transport);
        let manager = Arc::clone(&manager);
        let cancel = cancel.clone();
        tokio::spawn(async move { transport.run_event_pump(&manager, cancel).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");

    // Request the disconnects while the pump is still running, so their
    // completions release the slots before the process exits.
    manager.shutdown().await?;
    if !drain_links(&manager, Duration::from_secs(2)).await {
        tracing::warn!(
            occupancy = manager.occupancy().await,
            "links still open after drain timeout"
        );
    }

    cancel.cancel();
    pump.await
        .context("event pump task panicked")?
        .context("event pump failed")?;
    printer.abort();
    Ok(())
}

/// Wait until every slot is released, or give up at `deadline`.
async fn drain_links(manager: &LinkManager, deadline: Duration) -> bool {
    tokio::time::timeout(deadline, async {
        while manager.occupancy().await > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .is_ok()
}

async fn check(config: ManagerConfig) -> Result<()> {
    match BtleTransport::new().await {
        Ok(_) => println!("Bluetooth adapter: ok"),
        Err(e) => println!("Bluetooth adapter: unavailable ({e})"),
    }
    println!("capacity: {}", config.capacity);
    println!("proximity threshold: {} dBm", config.proximity_threshold_dbm);
    println!("alarm attribute: {}", config.alarm_attribute);
    println!("alarm command: {:#04x}", config.alarm_command);
    Ok(())
}

fn print_event(event: &LinkEvent) {
    match event {
        LinkEvent::Discovered { address, rssi } => {
            println!("discovered {address} at {rssi} dBm");
        }
        LinkEvent::ConnectStarted { address } => {
            println!("connecting to {address}");
        }
        LinkEvent::Connected {
            handle,
            address,
            occupancy,
        } => {
            println!("{handle} up: {address} ({occupancy} linked)");
        }
        LinkEvent::ConnectFailed { address, reason } => {
            println!("connect to {address} failed (reason {reason:#04x})");
        }
        LinkEvent::LinkLost {
            handle,
            address,
            reason,
            occupancy,
        } => {
            println!("ALARM: {handle} ({address}) lost, {reason}; {occupancy} still linked");
        }
        LinkEvent::LinkClosed { handle, address } => {
            println!("{handle} closed: {address}");
        }
        LinkEvent::AlarmBroadcast {
            lost,
            notified,
            failed,
        } => {
            println!("alarm broadcast for {lost}: {notified} notified, {failed} failed");
        }
        LinkEvent::ScanChanged { active } => {
            if *active {
                println!("scanning for tags");
            } else {
                println!("scanning paused");
            }
        }
        _ => {}
    }
}
