use crate::clock::now_millis;
use crate::log::log_level::LogLevel;

/// A single `(message, level)` event as emitted by the core.
///
/// Carries the origin module and a millisecond timestamp so a sink can
/// order or filter events without re-reading the clock.
#[derive(Debug, Clone)]
pub struct LogMsg {
    /// The severity level of the event.
    pub level: LogLevel,
    /// Milliseconds since the Unix epoch at the time of the event.
    pub ts_ms: u128,
    /// Message text, already formatted by the caller.
    pub text: String,
    /// The static module path the event came from.
    pub target: &'static str,
}

impl LogMsg {
    /// Creates a new `LogMsg` with an explicit timestamp.
    pub fn new(
        level: LogLevel,
        text: impl Into<String>,
        target: &'static str,
        ts_ms: u128,
    ) -> Self {
        Self {
            level,
            ts_ms,
            text: text.into(),
            target,
        }
    }

    /// Creates a `LogMsg` stamped with the current wall clock.
    pub fn now(level: LogLevel, text: impl Into<String>, target: &'static str) -> Self {
        Self::new(level, text, target, now_millis())
    }
}
