// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::process;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use netlog::{
    config::Config,
    constants::{DEFAULT_LOG_LEVEL, MESSAGE_QUEUE_SIZE},
    queue::{relay_queue, RelaySender},
    relay::Relay,
    transport::{SelectedTransport, SELECTED_PROTOCOL},
};

const STDIN_TAG: &str = "stdin";

#[tokio::main]
pub async fn main() {
    let config = Config::from_env();
    let log_level = config
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());

    let (sender, receiver) = relay_queue(MESSAGE_QUEUE_SIZE);
    init_logging(&log_level, &sender);
    debug!("Logging subsystem enabled");

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e}");
            process::exit(1);
        }
    };

    info!(
        "Starting network logger, {} collector at {}",
        SELECTED_PROTOCOL,
        collector_endpoint(&config)
    );
    let relay = match Relay::start::<SelectedTransport>(&config, sender, receiver).await {
        Ok(relay) => relay,
        Err(e) => {
            error!("Error starting network logger: {e}");
            process::exit(1);
        }
    };

    forward_stdin(&relay).await;

    let stats = relay.shutdown().await;
    info!(
        delivered = stats.delivered(),
        failed = stats.failed(),
        sentinels = stats.sentinels(),
        bytes_sent = stats.bytes_sent(),
        "Network logger stopped"
    );
}

/// Relays every stdin line as an INFO record until EOF or Ctrl-C.
async fn forward_stdin(relay: &Relay) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => {
                    // A full queue is already reported by the relay.
                    let _ = netlog::relay_info!(relay.intake(), STDIN_TAG, "{line}");
                }
                Ok(None) => {
                    debug!("stdin closed, shutting down");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    }
}

fn collector_endpoint(config: &Config) -> String {
    match SELECTED_PROTOCOL {
        netlog::transport::Protocol::WebSocket => config.transport.url.clone(),
        _ => config.transport.address(),
    }
}

/// Filter for local diagnostics, built from the configured level alone.
fn log_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn init_logging(log_level: &str, sender: &RelaySender) {
    let env_filter = log_filter(log_level);

    #[cfg(feature = "route-platform-logs")]
    let result = {
        use netlog::redirect::{RedirectHook, RelayLayer, StderrSink};

        tracing_subscriber::registry()
            .with(env_filter)
            .with(RelayLayer::new(RedirectHook::new(sender.clone(), StderrSink)))
            .try_init()
    };

    #[cfg(not(feature = "route-platform-logs"))]
    let result = {
        let _ = sender;
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_level(true)
                    .with_thread_names(false)
                    .with_target(true)
                    .without_time(),
            )
            .try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to install log subscriber: {e}");
    }
}
