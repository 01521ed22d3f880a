use std::io::{self, ErrorKind};
use std::iter;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::log::LogSink;
use crate::protocol::{ChatMessage, LEN_PREFIX_SIZE, Packet, SERVER_SENDER};
use crate::server::poll_set::PollSet;
use crate::server::server_config::ServerConfig;
use crate::server::server_error::ServerError;
use crate::server::server_stats::ServerStats;
use crate::server::slot::Slot;
use crate::transport::{ReadOutcome, broadcast, write_message_safe};
use crate::{sink_debug, sink_error, sink_info, sink_warn};

const LISTENER_INDEX: usize = 0;
const HANGUP: libc::c_short = libc::POLLHUP | libc::POLLERR | libc::POLLNVAL;
/// Frames taken from one client in one pass, so a flooding client cannot hog the loop.
const MAX_FRAMES_PER_PASS: usize = 64;

/// Single-threaded chat relay.
///
/// Owns the listener and every client socket. One `poll(2)` per pass covers
/// `[listener, clients...]`; readable clients are drained and each frame is
/// relayed, undecoded, to every other client.
pub struct Multiplexer {
    listener: TcpListener,
    slots: Vec<Slot>,
    poll: PollSet,
    max_clients: usize,
    buffer_size: usize,
    poll_timeout: Duration,
    stats: Arc<ServerStats>,
    log: Arc<dyn LogSink>,
}

impl Multiplexer {
    /// Bind a non-blocking listener (address reuse, backlog 128) and report the
    /// port actually bound, which matters when `port` is 0.
    pub fn bind(config: &ServerConfig, log: Arc<dyn LogSink>) -> Result<Self, ServerError> {
        if config.max_clients == 0 {
            return Err(ServerError::InvalidConfig("max_clients must be at least 1"));
        }
        if config.buffer_size <= LEN_PREFIX_SIZE {
            return Err(ServerError::InvalidConfig(
                "buffer_size must exceed the length prefix",
            ));
        }

        let addr = config.listen_addr();
        let listener = TcpListener::bind(&addr).map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true).map_err(ServerError::Setup)?;
        let local = listener.local_addr().map_err(ServerError::Setup)?;

        let stats = Arc::new(ServerStats::default());
        stats.set_bound_port(local.port());

        sink_info!(
            log,
            "listening on {} (max_clients={}, buffer={} bytes)",
            local,
            config.max_clients,
            config.buffer_size
        );

        let poll = PollSet::with_listener(listener.as_raw_fd(), config.max_clients);
        Ok(Self {
            listener,
            slots: Vec::with_capacity(config.max_clients),
            poll,
            max_clients: config.max_clients,
            buffer_size: config.buffer_size,
            poll_timeout: config.poll_timeout,
            stats,
            log,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn bound_port(&self) -> u16 {
        self.stats.bound_port()
    }

    /// Live clients; always `<= max_clients`.
    pub fn connected(&self) -> usize {
        self.slots.len()
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Shared counters for an observer thread.
    pub fn stats(&self) -> Arc<ServerStats> {
        self.stats.clone()
    }

    /// `(client_id, peer)` for every live slot, in slot order.
    pub fn clients(&self) -> Vec<(u32, SocketAddr)> {
        self.slots.iter().map(|s| (s.client_id(), s.peer())).collect()
    }

    /// Run passes until `shutdown` is set, then close every client.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        sink_info!(self.log, "event loop started on port {}", self.bound_port());
        while !shutdown.load(Ordering::Relaxed) {
            self.poll_once();
        }
        self.shutdown();
    }

    /// One poll + dispatch pass. Returns the number of frames relayed.
    pub fn poll_once(&mut self) -> usize {
        match self.poll.wait(self.poll_timeout) {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(e) => {
                sink_error!(self.log, "poll failed: {} (continuing)", e);
                return 0;
            }
        }

        if self.poll.revents(LISTENER_INDEX) != 0 {
            self.accept_pending();
        }

        // revents below are this pass's snapshot; a swap-removal carries the
        // moved slot's revents along with it.
        let mut relayed = 0;
        let mut doomed: Vec<RawFd> = Vec::new();
        let mut i = 0;
        while i < self.slots.len() {
            let revents = self.poll.revents(i + 1);
            if revents == 0 {
                i += 1;
                continue;
            }
            let (frames, remove) = self.service_client(i, revents, &mut doomed);
            relayed += frames;
            if remove {
                self.remove_slot(i);
            } else {
                i += 1;
            }
        }

        for fd in doomed {
            if let Some(idx) = self.index_of(fd) {
                self.remove_slot(idx);
            }
        }

        self.stats.add_relayed(relayed as u64);
        relayed
    }

    /// Close every client socket; the listener stays bound until drop.
    pub fn shutdown(&mut self) {
        sink_info!(
            self.log,
            "shutting down, closing {} client(s)",
            self.slots.len()
        );
        self.slots.clear();
        self.poll.clear_clients();
        self.stats.set_connected(0);
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.admit(stream, peer),
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    sink_warn!(self.log, "accept failed: {} (continuing)", e);
                    break;
                }
            }
        }
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = stream.set_nonblocking(true) {
            sink_warn!(self.log, "rejecting {}: cannot set non-blocking: {}", peer, e);
            return;
        }
        if self.slots.len() >= self.max_clients {
            sink_warn!(
                self.log,
                "rejecting {}: server full ({}/{})",
                peer,
                self.slots.len(),
                self.max_clients
            );
            return;
        }

        let slot = Slot::new(stream, peer, self.buffer_size);
        self.poll.push(slot.fd());
        self.slots.push(slot);
        self.stats.set_connected(self.slots.len());

        let idx = self.slots.len() - 1;
        let id = self.slots[idx].client_id();
        sink_info!(
            self.log,
            "client {} connected from {} ({}/{})",
            id,
            peer,
            self.slots.len(),
            self.max_clients
        );
        self.send_welcome(idx);
    }

    fn send_welcome(&self, idx: usize) {
        let slot = &self.slots[idx];
        let banner = ChatMessage::now(
            SERVER_SENDER,
            format!(
                "Welcome! You are client {}. {} user(s) online.",
                slot.client_id(),
                self.slots.len()
            ),
        );
        match Packet::Message(banner).serialize() {
            Ok(payload) => {
                let mut w = &slot.stream;
                write_message_safe(&mut w, &payload, &*self.log);
            }
            Err(e) => sink_error!(self.log, "cannot build welcome banner: {}", e),
        }
    }

    /// Drain slot `i` and relay its frames. Returns `(frames, remove_slot)`.
    fn service_client(
        &mut self,
        i: usize,
        revents: libc::c_short,
        doomed: &mut Vec<RawFd>,
    ) -> (usize, bool) {
        let (before, rest) = self.slots.split_at_mut(i);
        let Some((slot, after)) = rest.split_first_mut() else {
            return (0, false);
        };
        let (id, peer) = (slot.client_id(), slot.peer());
        let mut frames = 0;

        if revents & libc::POLLIN != 0 {
            loop {
                let outcome = if frames < MAX_FRAMES_PER_PASS {
                    let mut src = &slot.stream;
                    slot.reassembler.read_message(&mut src)
                } else {
                    // Budget spent: relay what is already buffered, leave the
                    // socket for the next pass.
                    match slot.reassembler.next_frame() {
                        Ok(Some(f)) => Ok(ReadOutcome::Frame(f)),
                        Ok(None) => Ok(ReadOutcome::NotReady),
                        Err(e) => Err(e),
                    }
                };
                match outcome {
                    Ok(ReadOutcome::Frame(payload)) => {
                        frames += 1;
                        sink_debug!(
                            self.log,
                            "client {} sent {} byte frame",
                            id,
                            payload.len()
                        );
                        let peers = before
                            .iter()
                            .map(|s| &s.stream)
                            .chain(iter::once(&slot.stream))
                            .chain(after.iter().map(|s| &s.stream))
                            .filter(|s| !doomed.contains(&s.as_raw_fd()));
                        let sender = Some(slot.stream.as_raw_fd());
                        let failed = broadcast(peers, payload, sender, &*self.log);
                        doomed.extend(failed);
                    }
                    Ok(ReadOutcome::NotReady) => break,
                    Ok(ReadOutcome::Closed) => {
                        sink_info!(
                            self.log,
                            "client {} ({}) disconnected",
                            id,
                            peer
                        );
                        return (frames, true);
                    }
                    Err(e) => {
                        sink_warn!(
                            self.log,
                            "dropping client {} ({}): {}",
                            id,
                            peer,
                            e
                        );
                        return (frames, true);
                    }
                }
            }
        }

        // A client cut short by the frame budget is revisited next pass.
        if revents & HANGUP != 0 && frames < MAX_FRAMES_PER_PASS {
            sink_info!(
                self.log,
                "client {} ({}) hung up",
                id,
                peer
            );
            return (frames, true);
        }
        (frames, false)
    }

    /// Close slot `idx`; the last live slot takes its place.
    fn remove_slot(&mut self, idx: usize) {
        if idx >= self.slots.len() {
            return;
        }
        let slot = self.slots.swap_remove(idx);
        self.poll.swap_remove(idx + 1);
        self.stats.set_connected(self.slots.len());
        sink_debug!(
            self.log,
            "released slot {} (client {}), {} connected",
            idx,
            slot.client_id(),
            self.slots.len()
        );
    }

    fn index_of(&self, fd: RawFd) -> Option<usize> {
        self.slots.iter().position(|s| s.fd() == fd)
    }

    #[cfg(test)]
    fn check_lockstep(&self) {
        assert_eq!(self.poll.len(), self.slots.len() + 1);
        assert_eq!(self.poll.fd(LISTENER_INDEX), self.listener.as_raw_fd());
        for (i, s) in self.slots.iter().enumerate() {
            assert_eq!(self.poll.fd(i + 1), s.fd(), "pollfd {} out of step", i + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::{NoopLogSink, QueueLogSink};
    use crate::transport::{Reassembler, write_message};
    use std::io::Read;
    use std::thread;
    use std::time::Instant;

    fn mux(max_clients: usize) -> Multiplexer {
        let mut cfg = ServerConfig::loopback(max_clients);
        cfg.poll_timeout = Duration::from_millis(20);
        Multiplexer::bind(&cfg, Arc::new(NoopLogSink)).unwrap()
    }

    /// Poll until `cond` holds or two seconds pass.
    fn pump_until(m: &mut Multiplexer, cond: impl Fn(&Multiplexer) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !cond(m) && Instant::now() < deadline {
            m.poll_once();
        }
        assert!(cond(m), "condition not reached in time");
    }

    fn connect(m: &Multiplexer) -> TcpStream {
        let s = TcpStream::connect(m.local_addr().unwrap()).unwrap();
        s.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        s
    }

    #[test]
    fn port_zero_reports_real_port() {
        let m = mux(2);
        assert_ne!(m.bound_port(), 0);
        assert_eq!(m.bound_port(), m.local_addr().unwrap().port());
        assert_eq!(m.stats().bound_port(), m.bound_port());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = ServerConfig::loopback(0);
        assert!(matches!(
            Multiplexer::bind(&cfg, Arc::new(NoopLogSink)),
            Err(ServerError::InvalidConfig(_))
        ));
        cfg.max_clients = 1;
        cfg.buffer_size = LEN_PREFIX_SIZE;
        assert!(matches!(
            Multiplexer::bind(&cfg, Arc::new(NoopLogSink)),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn accepted_client_gets_welcome_banner() {
        let mut m = mux(2);
        let mut c = connect(&m);
        pump_until(&mut m, |m| m.connected() == 1);

        let mut r = Reassembler::new(4096);
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            match r.read_message(&mut c).unwrap() {
                ReadOutcome::Frame(f) => {
                    match Packet::deserialize(f).unwrap() {
                        Packet::Message(msg) => {
                            assert_eq!(msg.sender, SERVER_SENDER);
                            assert!(msg.content.contains("1 user(s) online"));
                        }
                        other => panic!("expected banner, got {:?}", other),
                    }
                    break;
                }
                ReadOutcome::NotReady if Instant::now() < deadline => continue,
                other => panic!("no banner: {:?}", other),
            }
        }
    }

    #[test]
    fn capacity_bound_holds() {
        let mut m = mux(2);
        let _a = connect(&m);
        let _b = connect(&m);
        pump_until(&mut m, |m| m.connected() == 2);

        let mut c = connect(&m);
        // Give the loop a few passes to accept and reject the third client.
        for _ in 0..10 {
            m.poll_once();
        }
        assert_eq!(m.connected(), 2);
        assert_eq!(m.stats().connected(), 2);

        let mut buf = [0u8; 16];
        match c.read(&mut buf) {
            Ok(0) => {}
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
            other => panic!("rejected client should see EOF, got {:?}", other),
        }
        m.check_lockstep();
    }

    #[test]
    fn removals_keep_pollfds_in_lockstep() {
        let mut m = mux(5);
        let clients: Vec<TcpStream> = (0..5).map(|_| connect(&m)).collect();
        pump_until(&mut m, |m| m.connected() == 5);
        m.check_lockstep();

        let fds: Vec<RawFd> = m.slots.iter().map(Slot::fd).collect();
        m.remove_slot(0);
        m.check_lockstep();
        assert_eq!(m.slots[0].fd(), fds[4], "last slot fills the hole");

        m.remove_slot(1);
        m.check_lockstep();
        m.remove_slot(2); // now the last index
        m.check_lockstep();
        assert_eq!(m.connected(), 2);
        assert_eq!(m.stats().connected(), 2);

        let mut live: Vec<RawFd> = m.slots.iter().map(Slot::fd).collect();
        live.sort_unstable();
        live.dedup();
        assert_eq!(live.len(), 2, "no slot duplicated");
        drop(clients);
    }

    #[test]
    fn disconnect_is_reclaimed_and_logged() {
        let log = Arc::new(QueueLogSink::new());
        let mut cfg = ServerConfig::loopback(3);
        cfg.poll_timeout = Duration::from_millis(20);
        let mut m = Multiplexer::bind(&cfg, log.clone()).unwrap();

        let a = connect(&m);
        let _b = connect(&m);
        pump_until(&mut m, |m| m.connected() == 2);
        drop(a);
        pump_until(&mut m, |m| m.connected() == 1);
        m.check_lockstep();

        let lines: Vec<String> = log.drain().into_iter().map(|l| l.text).collect();
        assert!(lines.iter().any(|l| l.contains("disconnected") || l.contains("hung up")));
    }

    #[test]
    fn shutdown_closes_every_client() {
        let mut m = mux(3);
        let mut a = connect(&m);
        pump_until(&mut m, |m| m.connected() == 1);
        let shutdown = AtomicBool::new(true);
        m.run(&shutdown);
        assert_eq!(m.connected(), 0);
        assert_eq!(m.stats().connected(), 0);

        // Banner first, then EOF.
        let mut r = Reassembler::new(4096);
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut saw_close = false;
        while Instant::now() < deadline {
            match r.read_message(&mut a) {
                Ok(ReadOutcome::Closed) | Err(_) => {
                    saw_close = true;
                    break;
                }
                _ => {}
            }
        }
        assert!(saw_close);
    }

    #[test]
    fn stalled_reader_is_dropped_without_stalling_the_loop() {
        let mut m = mux(3);
        let a = connect(&m);
        let a_addr = a.local_addr().unwrap();
        let _stalled = connect(&m);
        pump_until(&mut m, |m| m.connected() == 2);

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let writer = thread::spawn(move || {
            let mut a = a;
            let payload = [7u8; 1000];
            for _ in 0..64_000 {
                if flag.load(Ordering::Relaxed) || write_message(&mut a, &payload).is_err() {
                    break;
                }
            }
            a
        });

        let deadline = Instant::now() + Duration::from_secs(20);
        let mut slowest = Duration::ZERO;
        while m.connected() > 1 && Instant::now() < deadline {
            let started = Instant::now();
            m.poll_once();
            slowest = slowest.max(started.elapsed());
        }
        stop.store(true, Ordering::Relaxed);
        // Keep reading so a writer blocked on a full socket can finish.
        while !writer.is_finished() {
            m.poll_once();
        }
        let _a = writer.join().unwrap();

        assert_eq!(m.connected(), 1, "client that never reads was not dropped");
        assert_eq!(m.clients()[0].1, a_addr, "the flooding sender survives");
        assert!(
            slowest < Duration::from_millis(500),
            "slowest pass took {:?}",
            slowest
        );
        m.check_lockstep();
    }
}
