use std::sync::mpsc;

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink};

/// Lightweight, cloneable handle to the process logger.
///
/// `LoggerHandle` enqueues `LogMsg` into a bounded `SyncSender`. Calls to
/// [`try_log`](Self::try_log) never block: if the queue is full the message
/// is dropped and an error is returned.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) tx: mpsc::SyncSender<LogMsg>,
}

impl LogSink for LoggerHandle {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let _ = self.try_log(level, msg, target);
    }
}

impl LoggerHandle {
    /// Attempts to enqueue a log message without blocking.
    ///
    /// # Errors
    /// - `TrySendError::Full` when the bounded queue is at capacity.
    /// - `TrySendError::Disconnected` when the logger worker has exited.
    pub fn try_log<S: Into<String>>(
        &self,
        level: LogLevel,
        text: S,
        target: &'static str,
    ) -> Result<(), mpsc::TrySendError<LogMsg>> {
        self.tx.try_send(LogMsg::now(level, text, target))
    }

    /// Forward an already-built event, keeping its original timestamp.
    pub fn try_forward(&self, msg: LogMsg) -> Result<(), mpsc::TrySendError<LogMsg>> {
        self.tx.try_send(msg)
    }
}
