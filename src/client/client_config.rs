use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::protocol::DEFAULT_BUFFER_SIZE;

const SECTION: &str = "Client";

/// Fixed pause between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// `host:port` used for the first connect and every reconnect.
    pub server_addr: String,
    pub username: String,
    pub reconnect_delay: Duration,
    /// Reassembly arena size; bounds the largest frame we can send or receive.
    pub buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:5000".to_owned(),
            username: "anonymous".to_owned(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ClientConfig {
    /// Read the `[Client]` section, keeping defaults for missing keys.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            server_addr: cfg
                .get_non_empty_or_default(SECTION, "server_addr", &d.server_addr)
                .to_owned(),
            username: cfg
                .get_non_empty_or_default(SECTION, "username", &d.username)
                .to_owned(),
            reconnect_delay: Duration::from_millis(cfg.get_parsed_or(
                SECTION,
                "reconnect_delay_ms",
                d.reconnect_delay.as_millis() as u64,
            )?),
            buffer_size: cfg.get_parsed_or(SECTION, "buffer_size", d.buffer_size)?,
        })
    }

    pub fn new(server_addr: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            server_addr: server_addr.into(),
            username: username.into(),
            ..Self::default()
        }
    }
}
