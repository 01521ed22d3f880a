use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::protocol::DEFAULT_BUFFER_SIZE;

const SECTION: &str = "Server";

/// Settings the multiplexer is built from.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// 0 asks the OS for any free port.
    pub port: u16,
    pub max_clients: usize,
    /// Per-connection reassembly arena, length prefix included.
    pub buffer_size: usize,
    /// Upper bound on one poll wait; also how quickly shutdown is noticed.
    pub poll_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_owned(),
            port: 0,
            max_clients: 10,
            buffer_size: DEFAULT_BUFFER_SIZE,
            poll_timeout: Duration::from_millis(100),
        }
    }
}

impl ServerConfig {
    /// Read the `[Server]` section, keeping defaults for missing keys.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            bind_addr: cfg
                .get_non_empty_or_default(SECTION, "bind_addr", &d.bind_addr)
                .to_owned(),
            port: cfg.get_parsed_or(SECTION, "port", d.port)?,
            max_clients: cfg.get_parsed_or(SECTION, "max_clients", d.max_clients)?,
            buffer_size: cfg.get_parsed_or(SECTION, "buffer_size", d.buffer_size)?,
            poll_timeout: Duration::from_millis(cfg.get_parsed_or(
                SECTION,
                "poll_timeout_ms",
                d.poll_timeout.as_millis() as u64,
            )?),
        })
    }

    /// Loopback on an OS-assigned port; handy for tests and embedding.
    pub fn loopback(max_clients: usize) -> Self {
        Self {
            bind_addr: "127.0.0.1".to_owned(),
            max_clients,
            ..Self::default()
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn defaults_when_section_missing() {
        let sc = ServerConfig::from_config(&Config::empty()).unwrap();
        assert_eq!(sc.listen_addr(), "0.0.0.0:0");
        assert_eq!(sc.max_clients, 10);
        assert_eq!(sc.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(sc.poll_timeout, Duration::from_millis(100));
    }

    #[test]
    fn section_overrides_defaults() {
        let cfg = Config::parse(
            "[Server]\nbind_addr = 127.0.0.1\nport = 6000\nmax_clients = 2\npoll_timeout_ms = 20\n",
        );
        let sc = ServerConfig::from_config(&cfg).unwrap();
        assert_eq!(sc.listen_addr(), "127.0.0.1:6000");
        assert_eq!(sc.max_clients, 2);
        assert_eq!(sc.poll_timeout, Duration::from_millis(20));
    }

    #[test]
    fn bad_port_is_an_error() {
        let cfg = Config::parse("[Server]\nport = 70000\n");
        assert!(ServerConfig::from_config(&cfg).is_err());
    }
}
