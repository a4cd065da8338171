//! Runtime configuration for the learning session service

use std::time::Duration;

/// Configuration assembled at startup from CLI, environment, and config file
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface the transmitter listener binds to
    pub bind: String,
    /// Listener port (0 selects an ephemeral port)
    pub port: u16,
    /// Catalog database connection URL
    pub database_url: String,
    /// Disconnect the transmitter after this long without a frame (None = never)
    pub idle_timeout: Option<Duration>,
}
