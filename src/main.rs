#![forbid(unsafe_code)]

//! `mumble-link-bridge` — Foundry VTT to Mumble Link bridge binary.
//!
//! Resolves the platform's link region, opens it through the update sink,
//! and serves WebSocket clients until Ctrl-C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use mumble_link_bridge::link::{platform, RecordEncoder};
use mumble_link_bridge::server::{self, ListenerState};
use mumble_link_bridge::sink::UpdateSink;
use mumble_link_bridge::{BridgeConfig, BridgeError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "mumble-link-bridge",
    about = "Mumble Link helper for Foundry VTT",
    version,
    long_about = None
)]
struct Cli {
    /// Host to bind to (overrides the config file; default `localhost`).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind to (overrides the config file; default 23456).
    #[arg(long)]
    port: Option<u16>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format, args.debug)?;

    let location = platform::resolve_current().map_err(|err| {
        error!(%err, os = platform::current_os_identifier(), "no Mumble Link region for this platform");
        err
    })?;

    let config = match args.config {
        Some(ref path) => BridgeConfig::load_from_path(path)?,
        None => BridgeConfig::default(),
    }
    .with_overrides(args.host.clone(), args.port)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| BridgeError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(config, location))
}

async fn run(config: BridgeConfig, location: platform::LinkLocation) -> Result<()> {
    info!(%location, "mumble-link-bridge starting");

    let sink = Arc::new(UpdateSink::open(
        location,
        RecordEncoder::new(config.link.encoder_defaults()),
        config.link.relink_interval(),
    ));

    let listener = server::bind(&config.server.host, config.server.port).await?;

    let ct = CancellationToken::new();
    let state = Arc::new(ListenerState::new(
        Arc::clone(&sink),
        config.server.max_message_bytes,
        ct.clone(),
    ));

    let server_handle = tokio::spawn(async move {
        if let Err(err) = server::serve(listener, state).await {
            error!(%err, "listener failed");
        }
    });

    shutdown_signal().await;
    info!("shutting down");
    ct.cancel();

    let _ = server_handle.await;
    sink.close();
    info!("mumble-link-bridge shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| BridgeError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| BridgeError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
