//! sMAP relay: entry point.
//!
//! Publishes JSON sMAP documents over the binary wire format, or listens for
//! requests and prints every received document as JSON.
//!
//! # Usage
//!
//! ```text
//! smap-relay [OPTIONS] <COMMAND>
//!
//! Commands:
//!   send    Publish a JSON document as one batch
//!   ping    Send a void request carrying only the credential
//!   listen  Receive requests and print each document as JSON
//!
//! Options:
//!   -c, --config <PATH>         Config file [default: smap-relay.toml]
//!       --transport <udp|tcp>   Override network.transport
//!       --credential <KEY>      Override relay.credential
//!       --log-level <FILTER>    Override relay.log_level
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                 | Overrides            |
//! |--------------------------|----------------------|
//! | `SMAP_RELAY_CONFIG`      | `--config`           |
//! | `SMAP_RELAY_TRANSPORT`   | `network.transport`  |
//! | `SMAP_RELAY_CREDENTIAL`  | `relay.credential`   |
//! | `SMAP_RELAY_LOG_LEVEL`   | `relay.log_level`    |
//!
//! `RUST_LOG`, when set, takes precedence over the configured log level.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use smap_relay::application::{IngestEvent, IngestFrames, PublishDocument};
use smap_relay::domain::{load_config, RelayConfig, TransportKind};
use smap_relay::infrastructure::json_document::{document_from_str, document_to_json};
use smap_relay::infrastructure::{open_sink, run_listener};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Relay for sMAP documents over the binary wire format.
#[derive(Debug, Parser)]
#[command(
    name = "smap-relay",
    about = "Publish and receive sMAP documents over the binary wire format",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.  A missing file means defaults.
    #[arg(short, long, default_value = "smap-relay.toml", env = "SMAP_RELAY_CONFIG")]
    config: PathBuf,

    /// Transport to use: `udp` or `tcp`.
    #[arg(long, env = "SMAP_RELAY_TRANSPORT")]
    transport: Option<String>,

    /// API key attached to outgoing requests.
    #[arg(long, env = "SMAP_RELAY_CREDENTIAL")]
    credential: Option<String>,

    /// `tracing` filter used when `RUST_LOG` is unset.
    #[arg(long, env = "SMAP_RELAY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish a JSON document as one batch.
    Send {
        /// JSON file mapping paths to records.
        file: PathBuf,

        /// Destination address, overriding `network.target`.
        #[arg(long)]
        target: Option<String>,

        /// Publish paths in sorted order.
        #[arg(long)]
        sort_paths: bool,
    },

    /// Send a void request carrying only the credential.
    Ping {
        /// Destination address, overriding `network.target`.
        #[arg(long)]
        target: Option<String>,
    },

    /// Receive requests and print each document as JSON on stdout.
    Listen {
        /// Address to bind, overriding `network.bind_address`.
        #[arg(long)]
        bind: Option<String>,
    },
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded, an override is invalid,
    /// or the merged config fails validation.
    fn resolve_config(&self) -> anyhow::Result<RelayConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("loading config from '{}'", self.config.display()))?;

        if let Some(transport) = &self.transport {
            config.network.transport = transport
                .parse::<TransportKind>()
                .context("invalid --transport")?;
        }
        if let Some(credential) = &self.credential {
            config.relay.credential = credential.clone();
        }
        if let Some(log_level) = &self.log_level {
            config.relay.log_level = log_level.clone();
        }
        match &self.command {
            Command::Send {
                target, sort_paths, ..
            } => {
                if let Some(target) = target {
                    config.network.target = target.clone();
                }
                config.relay.sort_paths |= *sort_paths;
            }
            Command::Ping { target } => {
                if let Some(target) = target {
                    config.network.target = target.clone();
                }
            }
            Command::Listen { bind } => {
                if let Some(bind) = bind {
                    config.network.bind_address = bind.clone();
                }
            }
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.relay.log_level)),
        )
        .init();

    match cli.command {
        Command::Send { file, .. } => send(config, file).await,
        Command::Ping { .. } => ping(config).await,
        Command::Listen { .. } => listen(config).await,
    }
}

/// Loads `file` and publishes it as one batch.
async fn send(config: RelayConfig, file: PathBuf) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("reading document '{}'", file.display()))?;
    let document = document_from_str(&text)
        .with_context(|| format!("parsing document '{}'", file.display()))?;

    let use_case = PublishDocument::new(config.relay.credential.clone(), config.keypath.clone())
        .with_sorted_paths(config.relay.sort_paths);
    let network = config.network.clone();

    let report = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut sink = open_sink(&network)?;
        Ok(use_case.execute(document, sink.as_mut())?)
    })
    .await
    .context("publish task panicked")?
    .with_context(|| format!("publishing '{}'", file.display()))?;

    info!(
        "sent {} records ({} bytes) to {}",
        report.records, report.bytes, config.network.target
    );
    Ok(())
}

/// Sends a void request.
async fn ping(config: RelayConfig) -> anyhow::Result<()> {
    let use_case = PublishDocument::new(config.relay.credential.clone(), config.keypath.clone());
    let network = config.network.clone();

    tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
        let mut sink = open_sink(&network)?;
        Ok(use_case.ping(sink.as_mut())?)
    })
    .await
    .context("ping task panicked")?
    .context("sending void request")?;

    info!("sent void request to {}", config.network.target);
    Ok(())
}

/// Runs the listener until Ctrl+C, printing each received document.
async fn listen(config: RelayConfig) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    let (tx, mut rx) = mpsc::channel(64);
    let ingest = IngestFrames::new(config.keypath.clone());
    let network = config.network.clone();
    let listener =
        tokio::task::spawn_blocking(move || run_listener(&network, ingest, tx, running));

    // The channel closes when the listener loop returns and drops its sender.
    while let Some(event) = rx.recv().await {
        print_event(&event)?;
    }

    listener
        .await
        .context("listener task panicked")?
        .with_context(|| format!("listening on {}", config.network.bind_address))?;
    info!("relay stopped");
    Ok(())
}

fn print_event(event: &IngestEvent) -> anyhow::Result<()> {
    match event {
        IngestEvent::Keepalive { source, .. } => info!("void request from {source}"),
        IngestEvent::Document {
            source, document, ..
        } => {
            info!("{} paths from {source}", document.len());
            let rendered = serde_json::to_string_pretty(&document_to_json(document))
                .context("rendering received document")?;
            println!("{rendered}");
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
