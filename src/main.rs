// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! mqflux CLI
//!
//! Forwards MQTT messages to InfluxDB as batched Line Protocol writes.
//!
//! # Usage
//!
//! ```bash
//! # Run against the default config file
//! mqflux
//!
//! # Explicit config and verbose logging
//! mqflux --config /etc/mqflux.toml --log-level debug
//! ```

use clap::Parser;
use mqflux::{Command, Config, Forwarder, ForwarderError, HttpWriter, MqttSource, SeriesEncoder};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// MQTT to InfluxDB forwarding bridge
#[derive(Parser, Debug)]
#[command(name = "mqflux")]
#[command(about = "MQTT to InfluxDB forwarding bridge")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "~/.mqflux.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    // The config debug flag only widens the filter; the core never touches
    // global logger state.
    let level = if config.general.debug {
        "debug"
    } else {
        args.log_level.as_str()
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::info!("mqflux v{}", env!("CARGO_PKG_VERSION"));

    // Construction fails fast if InfluxDB is unreachable; the forwarder
    // never reaches Started against a dead destination.
    let writer = Arc::new(HttpWriter::connect(&config.influxdb).await?);
    let encoder = SeriesEncoder::new(&config.influxdb);
    let tick = Duration::from_secs(config.influxdb.tick_or_default());
    let forwarder = Forwarder::new(encoder, writer, tick);

    let (msg_tx, msg_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

    let source = MqttSource::new(config.mqtt.clone());
    tokio::spawn(async move {
        if let Err(err) = source.run(msg_tx).await {
            tracing::error!("mqtt source failed: {}", err);
        }
    });

    let loop_handle = tokio::spawn(forwarder.run(msg_rx, cmd_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    let _ = cmd_tx.send(Command::Stop);

    // The loop observes the stop at its next tick and terminates; buffered
    // messages are discarded.
    match loop_handle.await? {
        Err(ForwarderError::Stopped) => tracing::info!("forwarder stopped"),
        Err(err) => tracing::error!("forwarder terminated: {}", err),
        Ok(()) => {}
    }

    Ok(())
}
