use std::fmt;

/// Defines the severity levels for log messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Per-frame chatter from the event loops.
    Trace,
    /// Connection bookkeeping useful while debugging a session.
    Debug,
    /// Lifecycle events: bind, accept, disconnect, reconnect.
    Info,
    /// Recoverable trouble isolated to one connection.
    Warn,
    /// Failures that tear a connection down or stop a component.
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
