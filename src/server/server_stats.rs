use std::sync::atomic::{AtomicU16, AtomicU64, AtomicUsize, Ordering};

/// Scalar counters the loop publishes for an observer thread.
///
/// Relaxed snapshots only; never used to coordinate with the loop.
#[derive(Debug, Default)]
pub struct ServerStats {
    connected: AtomicUsize,
    bound_port: AtomicU16,
    frames_relayed: AtomicU64,
}

impl ServerStats {
    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn bound_port(&self) -> u16 {
        self.bound_port.load(Ordering::Relaxed)
    }

    pub fn frames_relayed(&self) -> u64 {
        self.frames_relayed.load(Ordering::Relaxed)
    }

    pub(crate) fn set_connected(&self, n: usize) {
        self.connected.store(n, Ordering::Relaxed);
    }

    pub(crate) fn set_bound_port(&self, port: u16) {
        self.bound_port.store(port, Ordering::Relaxed);
    }

    pub(crate) fn add_relayed(&self, n: u64) {
        self.frames_relayed.fetch_add(n, Ordering::Relaxed);
    }
}
