//! Server configuration
//!
//! Parsed from the command line, with every option also readable from
//! the environment.

use std::time::Duration;

use clap::Parser;

use crate::server::ServiceConfig;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

#[derive(Parser, Debug, Clone)]
#[command(name = "pin_chat_server")]
#[command(about = "Ephemeral PIN-protected WebSocket chat rooms", long_about = None)]
pub struct Config {
    /// Address to bind the WebSocket listener to
    #[arg(default_value = DEFAULT_ADDR)]
    pub addr: String,

    /// Milliseconds an empty room survives before it is destroyed
    #[arg(long, env = "PINCHAT_GRACE_MS", default_value_t = 30_000)]
    pub grace_ms: u64,

    /// Host name reported to clients in `host_info`
    #[arg(long, env = "PINCHAT_HOST_NAME")]
    pub host_name: Option<String>,

    /// Buffer size of the RoomService command channel
    #[arg(long, env = "PINCHAT_COMMAND_BUFFER", default_value_t = 256)]
    pub command_buffer: usize,
}

impl Config {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            grace_period: self.grace_period(),
        }
    }

    /// Configured host name, else `$HOSTNAME`, else "localhost"
    pub fn resolved_host_name(&self) -> String {
        self.host_name
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}
