use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::client::chat_event::ChatEvent;
use crate::client::client_config::ClientConfig;
use crate::client::client_error::ClientError;
use crate::client::conn_state::ConnState;
use crate::client::pending_queue::PendingQueue;
use crate::log::LogSink;
use crate::protocol::{ChatMessage, FrameError, LEN_PREFIX_SIZE, MAX_USERNAME_LEN, Packet};
use crate::transport::{ReadOutcome, Reassembler, write_message};
use crate::{sink_debug, sink_info, sink_warn};

/// Backoff sleeps are cut into slices this long so shutdown is seen promptly.
const BACKOFF_SLICE: Duration = Duration::from_millis(50);

/// State shared by the interactive side and the receiver thread.
struct Shared {
    addr: String,
    /// Write half of the live socket. Never held across a blocking read.
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
    running: AtomicBool,
    pending: PendingQueue,
    reconnect_delay: Duration,
    buffer_size: usize,
    log: Arc<dyn LogSink>,
}

impl Shared {
    fn stream(&self) -> MutexGuard<'_, Option<TcpStream>> {
        self.stream.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notice(&self, text: impl Into<String>) {
        self.pending.push(ChatEvent::System(text.into()));
    }

    /// Publish a freshly connected socket. Returns `false` (and closes it) if
    /// shutdown got there first.
    fn install(&self, stream: TcpStream) -> bool {
        let mut slot = self.stream();
        if !self.running.load(Ordering::SeqCst) {
            let _ = stream.shutdown(Shutdown::Both);
            return false;
        }
        *slot = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        true
    }

    fn drop_connection(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(s) = self.stream().take() {
            let _ = s.shutdown(Shutdown::Both);
        }
        sink_warn!(self.log, "connection to {} lost: {}", self.addr, reason);
        self.notice(format!(
            "connection lost ({reason}), retrying every {} ms",
            self.reconnect_delay.as_millis()
        ));
    }

    /// Sleep one backoff period. Returns `false` if shutdown was requested.
    fn backoff(&self) -> bool {
        let deadline = Instant::now() + self.reconnect_delay;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(BACKOFF_SLICE.min(deadline - now));
        }
    }
}

/// One chat participant.
///
/// A background thread owns every read on the socket and all reconnection;
/// decoded messages and session notices land in a pending queue the caller
/// drains at its own pace. Sending happens on the caller's thread against
/// whichever socket is currently installed.
///
/// The receiver loop is a two-state machine:
///
/// ```text
///  Connected --(EOF / read error / bad frame)--> Reconnecting
///  Reconnecting --(backoff, connect ok)--> Connected
///  Reconnecting --(backoff, connect fails)--> Reconnecting
/// ```
///
/// A failed send is reported to the caller and queued as a notice, but it
/// does not by itself move the session to `Reconnecting`; the receiver
/// notices a dead socket on its next read.
pub struct ClientSession {
    shared: Arc<Shared>,
    username: String,
    receiver: Option<JoinHandle<()>>,
}

impl ClientSession {
    /// Connect to `config.server_addr` and start the receiver.
    pub fn connect(config: &ClientConfig, log: Arc<dyn LogSink>) -> Result<Self, ClientError> {
        validate_username(&config.username)?;
        let stream = TcpStream::connect(&config.server_addr)?;
        Self::start(stream, config, log)
    }

    /// Start a session over an already connected socket. Reconnects go to
    /// `config.server_addr`.
    pub fn start(
        stream: TcpStream,
        config: &ClientConfig,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ClientError> {
        validate_username(&config.username)?;
        let reader = stream.try_clone()?;

        let shared = Arc::new(Shared {
            addr: config.server_addr.clone(),
            stream: Mutex::new(Some(stream)),
            connected: AtomicBool::new(true),
            running: AtomicBool::new(true),
            pending: PendingQueue::new(),
            reconnect_delay: config.reconnect_delay,
            buffer_size: config.buffer_size,
            log,
        });

        let rx_shared = Arc::clone(&shared);
        let receiver = thread::Builder::new()
            .name("chat-receiver".into())
            .spawn(move || receive_loop(rx_shared, reader))?;

        sink_info!(
            shared.log,
            "session for {} started against {}",
            config.username,
            config.server_addr
        );

        Ok(Self {
            shared,
            username: config.username.clone(),
            receiver: Some(receiver),
        })
    }

    /// Send `content` as a chat line from this session's user, stamped now.
    pub fn send(&self, content: &str) -> Result<(), ClientError> {
        self.send_message(ChatMessage::now(self.username.as_str(), content))
    }

    /// Send a fully built message as one frame on the installed socket.
    pub fn send_message(&self, msg: ChatMessage) -> Result<(), ClientError> {
        let payload = Packet::Message(msg).serialize()?;
        let max = self.shared.buffer_size.saturating_sub(LEN_PREFIX_SIZE);
        if payload.len() > max {
            return Err(FrameError::TooLarge {
                max,
                actual: payload.len(),
            }
            .into());
        }

        let guard = self.shared.stream();
        let Some(stream) = guard.as_ref() else {
            self.shared.notice("not connected, message not sent");
            return Err(ClientError::NotConnected);
        };
        let mut w = stream;
        if let Err(e) = write_message(&mut w, &payload) {
            sink_warn!(self.shared.log, "send to {} failed: {}", self.shared.addr, e);
            self.shared.notice(format!("send failed: {e}"));
            return Err(e.into());
        }
        sink_debug!(self.shared.log, "sent {} byte frame", payload.len());
        Ok(())
    }

    /// Take every pending event, oldest first.
    pub fn drain(&self) -> Vec<ChatEvent> {
        self.shared.pending.drain()
    }

    /// Feed every pending event to `render`, oldest first. Returns how many.
    pub fn drain_with<F: FnMut(ChatEvent)>(&self, mut render: F) -> usize {
        let events = self.shared.pending.drain();
        let n = events.len();
        for ev in events {
            render(ev);
        }
        n
    }

    /// `Reconnecting` whenever no socket is installed, including after shutdown.
    pub fn state(&self) -> ConnState {
        if self.is_connected() {
            ConnState::Connected
        } else {
            ConnState::Reconnecting
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn server_addr(&self) -> &str {
        &self.shared.addr
    }

    /// Stop the receiver and close the socket. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shared.running.swap(false, Ordering::SeqCst) {
            // Unblocks a receiver parked in read().
            if let Some(s) = self.shared.stream().take() {
                let _ = s.shutdown(Shutdown::Both);
            }
            self.shared.connected.store(false, Ordering::SeqCst);
        }
        if let Some(handle) = self.receiver.take() {
            if handle.join().is_err() {
                sink_warn!(self.shared.log, "receiver thread panicked");
            }
            sink_info!(self.shared.log, "session for {} closed", self.username);
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_username(name: &str) -> Result<(), ClientError> {
    if name.is_empty() || name.len() > MAX_USERNAME_LEN || name.chars().any(char::is_control) {
        return Err(ClientError::InvalidUsername(name.to_owned()));
    }
    Ok(())
}

fn receive_loop(shared: Arc<Shared>, reader: TcpStream) {
    let mut state = ConnState::Connected;
    let mut reader = Some(reader);
    let mut reassembler = Reassembler::new(shared.buffer_size);

    while shared.running.load(Ordering::SeqCst) {
        match state {
            ConnState::Connected => {
                let Some(sock) = reader.as_mut() else {
                    state = ConnState::Reconnecting;
                    continue;
                };
                if let Err(reason) = receive_one(&shared, &mut reassembler, sock) {
                    if !shared.running.load(Ordering::SeqCst) {
                        break;
                    }
                    shared.drop_connection(&reason);
                    reader = None;
                    reassembler.reset();
                    state = ConnState::Reconnecting;
                }
            }
            ConnState::Reconnecting => {
                if !shared.backoff() {
                    break;
                }
                match connect_halves(&shared.addr) {
                    Ok((read_half, write_half)) => {
                        if !shared.install(write_half) {
                            break;
                        }
                        reader = Some(read_half);
                        state = ConnState::Connected;
                        sink_info!(shared.log, "reconnected to {}", shared.addr);
                        shared.notice(format!("reconnected to {}", shared.addr));
                    }
                    Err(e) => {
                        sink_debug!(shared.log, "reconnect to {} failed: {}", shared.addr, e);
                        shared.notice(format!("reconnect to {} failed: {e}", shared.addr));
                    }
                }
            }
        }
    }
    sink_debug!(shared.log, "receiver for {} stopped", shared.addr);
}

/// Read until one frame is handled. `Err` carries why the connection is dead.
fn receive_one(
    shared: &Shared,
    reassembler: &mut Reassembler,
    sock: &mut TcpStream,
) -> Result<(), String> {
    match reassembler.read_message(sock) {
        Ok(ReadOutcome::Frame(payload)) => match Packet::deserialize(payload) {
            Ok(Packet::Message(msg)) => {
                shared.pending.push(ChatEvent::Message(msg));
                Ok(())
            }
            // Handshake and Config carry nothing the session acts on.
            Ok(_) => Ok(()),
            Err(e) => Err(format!("undecodable frame: {e}")),
        },
        Ok(ReadOutcome::NotReady) => Ok(()),
        Ok(ReadOutcome::Closed) => Err("server closed the connection".to_owned()),
        Err(e) => Err(e.to_string()),
    }
}

fn connect_halves(addr: &str) -> std::io::Result<(TcpStream, TcpStream)> {
    let stream = TcpStream::connect(addr)?;
    let reader = stream.try_clone()?;
    Ok((reader, stream))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use std::net::TcpListener;

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    fn setup(delay: Duration) -> (TcpListener, ClientSession, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = ClientConfig::new(listener.local_addr().unwrap().to_string(), "Alice");
        cfg.reconnect_delay = delay;
        let session = ClientSession::connect(&cfg, Arc::new(NoopLogSink)).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        (listener, session, server_side)
    }

    fn read_frame(stream: &mut TcpStream) -> Packet {
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let mut r = Reassembler::new(4096);
        loop {
            match r.read_message(stream).unwrap() {
                ReadOutcome::Frame(p) => return Packet::deserialize(p).unwrap(),
                ReadOutcome::NotReady => continue,
                ReadOutcome::Closed => panic!("closed before a frame arrived"),
            }
        }
    }

    fn has_notice(events: &[ChatEvent], needle: &str) -> bool {
        events
            .iter()
            .any(|e| matches!(e, ChatEvent::System(s) if s.contains(needle)))
    }

    #[test]
    fn incoming_message_is_queued() {
        let (_l, session, mut server_side) = setup(Duration::from_millis(100));
        let msg = ChatMessage::new("Bob", "hi Alice", 1_234_567_890);
        let payload = Packet::Message(msg.clone()).serialize().unwrap();
        write_message(&mut server_side, &payload).unwrap();

        let mut got = Vec::new();
        assert!(wait_until(Duration::from_secs(2), || {
            got.extend(session.drain());
            !got.is_empty()
        }));
        assert_eq!(got, vec![ChatEvent::Message(msg)]);
        assert_eq!(session.state(), ConnState::Connected);
    }

    #[test]
    fn send_writes_one_message_frame() {
        let (_l, session, mut server_side) = setup(Duration::from_millis(100));
        session.send("Hello, World!").unwrap();
        match read_frame(&mut server_side) {
            Packet::Message(m) => {
                assert_eq!(m.sender, "Alice");
                assert_eq!(m.content, "Hello, World!");
                assert!(m.timestamp > 0);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn lost_connection_reconnects_to_same_address() {
        let (listener, session, server_side) = setup(Duration::from_millis(100));
        drop(server_side);

        let mut events = Vec::new();
        assert!(wait_until(Duration::from_secs(2), || {
            events.extend(session.drain());
            has_notice(&events, "connection lost")
        }));

        // The listener is still up, so the next attempt succeeds.
        let (_again, _) = listener.accept().unwrap();
        assert!(wait_until(Duration::from_secs(2), || {
            events.extend(session.drain());
            session.is_connected() && has_notice(&events, "reconnected")
        }));
        assert_eq!(session.state(), ConnState::Connected);
    }

    #[test]
    fn send_while_reconnecting_fails_without_panicking() {
        let (listener, session, server_side) = setup(Duration::from_millis(100));
        drop(listener);
        drop(server_side);

        assert!(wait_until(Duration::from_secs(2), || !session.is_connected()));
        assert_eq!(session.state(), ConnState::Reconnecting);
        assert!(matches!(session.send("lost"), Err(ClientError::NotConnected)));

        let mut events = Vec::new();
        assert!(wait_until(Duration::from_secs(2), || {
            events.extend(session.drain());
            has_notice(&events, "not sent") && has_notice(&events, "reconnect to")
        }));
    }

    #[test]
    fn garbage_frame_is_connection_fatal() {
        let (_l, session, mut server_side) = setup(Duration::from_secs(10));
        write_message(&mut server_side, &[9, 9, 9]).unwrap();

        let mut events = Vec::new();
        assert!(wait_until(Duration::from_secs(2), || {
            events.extend(session.drain());
            has_notice(&events, "undecodable frame")
        }));
        assert!(!session.is_connected());
    }

    #[test]
    fn shutdown_interrupts_backoff() {
        let (listener, mut session, server_side) = setup(Duration::from_secs(30));
        drop(listener);
        drop(server_side);
        assert!(wait_until(Duration::from_secs(2), || !session.is_connected()));

        let started = Instant::now();
        session.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        session.shutdown();
    }

    #[test]
    fn shutdown_interrupts_blocking_read() {
        let (_l, mut session, _server_side) = setup(Duration::from_secs(30));
        let started = Instant::now();
        session.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!session.is_connected());
    }

    #[test]
    fn oversized_message_is_rejected_before_writing() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = ClientConfig::new(listener.local_addr().unwrap().to_string(), "Alice");
        cfg.buffer_size = 32;
        let session = ClientSession::connect(&cfg, Arc::new(NoopLogSink)).unwrap();
        assert!(matches!(
            session.send("this line is longer than the arena allows"),
            Err(ClientError::Frame(FrameError::TooLarge { max: 28, .. }))
        ));
    }

    #[test]
    fn bad_usernames_are_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        for name in ["", "line\nbreak", long.as_str()] {
            let cfg = ClientConfig::new(addr.clone(), name);
            assert!(matches!(
                ClientSession::connect(&cfg, Arc::new(NoopLogSink)),
                Err(ClientError::InvalidUsername(_))
            ));
        }
    }
}
