//! PIN Chat Server - Entry Point
//!
//! Starts the TCP listener and RoomService actor, accepting connections
//! until Ctrl-C.

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pin_chat_server::{handle_connection, Config, RoomService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=pin_chat_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pin_chat_server=info")),
        )
        .init();

    let config = Config::parse();
    let host_name: Arc<str> = config.resolved_host_name().into();

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("PIN chat server listening on {}", config.addr);

    // Create RoomService actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let service = RoomService::new(cmd_rx, config.service_config());
    tokio::spawn(service.run());

    // Connection accept loop
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    let cmd_tx = cmd_tx.clone();
                    let host_name = host_name.clone();

                    // Spawn handler task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, cmd_tx, host_name).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
