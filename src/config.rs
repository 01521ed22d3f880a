use std::collections::HashMap;
use std::str::FromStr;
use std::{fmt, fs, io};

/// Errors raised while loading or interpreting a config file.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: String, source: io::Error },
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "error reading file {path}: {source}"),
            Self::InvalidValue {
                section,
                key,
                value,
            } => write!(f, "invalid value {value:?} for [{section}] {key}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// INI-style settings: `[Section]` headers, `key = value` pairs, `#` comments.
/// Pairs before the first header are globals.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut cfg = Self::empty();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current_section = Some(name.trim().to_string());
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim().to_string();
                let value = value.trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        cfg.globals.insert(key, value);
                    }
                    Some(sec) => {
                        cfg.sections
                            .entry(sec.clone())
                            .or_default()
                            .insert(key, value);
                    }
                }
            }
        }
        cfg
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty_or_default<'a>(
        &'a self,
        section: &str,
        key: &str,
        default: &'a str,
    ) -> &'a str {
        self.get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()))
            .unwrap_or(default)
    }

    /// Parse `[section] key` (or the global `key`) as `T`, or fall back to `default`.
    pub fn get_parsed_or<T: FromStr>(
        &self,
        section: &str,
        key: &str,
        default: T,
    ) -> Result<T, ConfigError> {
        let raw = self
            .get_non_empty(section, key)
            .or_else(|| self.get_global(key).filter(|s| !s.is_empty()));
        match raw {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                section: section.to_owned(),
                key: key.to_owned(),
                value: v.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    const SAMPLE: &str = r#"
# shared
port = 7000

[Server]
max_clients = 4
bind_addr = "127.0.0.1"

[Client]
username =
"#;

    #[test]
    fn sections_and_globals() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get_global("port"), Some("7000"));
        assert_eq!(cfg.get("Server", "bind_addr"), Some("127.0.0.1"));
        assert_eq!(cfg.get("Client", "username"), Some(""));
        assert_eq!(cfg.get_non_empty("Client", "username"), None);
    }

    #[test]
    fn parsed_values_fall_back_to_globals_then_default() {
        let cfg = Config::parse(SAMPLE);
        assert_eq!(cfg.get_parsed_or("Server", "max_clients", 10usize).unwrap(), 4);
        assert_eq!(cfg.get_parsed_or("Server", "port", 0u16).unwrap(), 7000);
        assert_eq!(cfg.get_parsed_or("Server", "buffer_size", 4096usize).unwrap(), 4096);
    }

    #[test]
    fn malformed_number_is_reported() {
        let cfg = Config::parse("[Server]\nmax_clients = lots\n");
        match cfg.get_parsed_or("Server", "max_clients", 10usize) {
            Err(ConfigError::InvalidValue { key, value, .. }) => {
                assert_eq!(key, "max_clients");
                assert_eq!(value, "lots");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(
            Config::load("/definitely/not/here.conf"),
            Err(ConfigError::Read { .. })
        ));
    }
}
