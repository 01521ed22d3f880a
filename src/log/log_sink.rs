use std::sync::Arc;

use crate::log::log_level::LogLevel;

/// Destination for `(message, level)` events.
///
/// The core only ever calls `log`; formatting for humans belongs to the sink.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        (**self).log(level, msg, target);
    }
}
