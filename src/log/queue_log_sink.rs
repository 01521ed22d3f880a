use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink};

/// Mutex-guarded FIFO of log events.
///
/// The server loop pushes into it; an observer thread drains it at its own
/// pace. Data only flows loop → observer. Unbounded: a stalled observer
/// grows the queue rather than blocking the loop.
#[derive(Debug, Default)]
pub struct QueueLogSink {
    queue: Mutex<VecDeque<LogMsg>>,
}

impl QueueLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<LogMsg> {
        let mut q = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        q.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for QueueLogSink {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let mut q = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        q.push_back(LogMsg::now(level, msg, target));
    }
}
