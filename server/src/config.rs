use clap::Parser;
use std::time::Duration;

/// Command line configuration for the game server.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    pub port: u16,
    /// Path clients must request to open a WebSocket
    #[clap(long, default_value = "/ws")]
    pub ws_path: String,
    /// Enemy AI tick period in milliseconds
    #[clap(long, default_value = "100")]
    pub ai_tick_ms: u64,
    /// Rage decay period in milliseconds
    #[clap(long, default_value = "2000")]
    pub regen_interval_ms: u64,
    /// Capacity of the outbound broadcast queue
    #[clap(long, default_value = "256")]
    pub broadcast_capacity: usize,
    /// Seconds to wait for background tasks on shutdown
    #[clap(long, default_value = "5")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ws_path: "/ws".to_string(),
            ai_tick_ms: 100,
            regen_interval_ms: 2000,
            broadcast_capacity: 256,
            shutdown_timeout_secs: 5,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ai_tick(&self) -> Duration {
        Duration::from_millis(self.ai_tick_ms.max(1))
    }

    pub fn regen_interval(&self) -> Duration {
        Duration::from_millis(self.regen_interval_ms.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
