use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::client::chat_event::ChatEvent;

/// FIFO between the receiver thread (producer) and the interactive thread
/// (consumer). One mutex; unbounded.
#[derive(Debug, Default)]
pub struct PendingQueue {
    inner: Mutex<VecDeque<ChatEvent>>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, ev: ChatEvent) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(ev);
    }

    /// Hand every queued event to the caller, in arrival order.
    pub fn drain(&self) -> Vec<ChatEvent> {
        let mut q = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        q.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
