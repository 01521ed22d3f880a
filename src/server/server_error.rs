use std::{fmt, io};

/// Startup failures. Once the loop runs, errors are per-connection and logged.
#[derive(Debug)]
pub enum ServerError {
    Bind { addr: String, source: io::Error },
    Setup(io::Error),
    InvalidConfig(&'static str),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "cannot listen on {addr}: {source}"),
            Self::Setup(e) => write!(f, "listener setup failed: {e}"),
            Self::InvalidConfig(why) => write!(f, "invalid server config: {why}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Setup(e) => Some(e),
            Self::InvalidConfig(_) => None,
        }
    }
}
