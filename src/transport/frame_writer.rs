use std::io::{self, ErrorKind, IoSlice, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, RawFd};

use crate::log::LogSink;
use crate::protocol::{LEN_PREFIX_SIZE, frame_prefix};
use crate::{sink_trace, sink_warn};

/// Write `[len u32 LE][payload]` as one vectored write.
///
/// Short writes are completed in place. The call never sleeps: if a
/// non-blocking sink reports `WouldBlock`, before or mid-frame, it fails with
/// `WouldBlock` and the sink should be treated as dead, since a partial frame
/// may already be on the wire.
pub fn write_message<W: Write + ?Sized>(w: &mut W, payload: &[u8]) -> io::Result<()> {
    let prefix = frame_prefix(payload.len())
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e.to_string()))?;
    let total = LEN_PREFIX_SIZE + payload.len();
    let mut written = 0;

    while written < total {
        let res = if written < LEN_PREFIX_SIZE {
            w.write_vectored(&[IoSlice::new(&prefix[written..]), IoSlice::new(payload)])
        } else {
            w.write(&payload[written - LEN_PREFIX_SIZE..])
        };
        match res {
            Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                let why = if written == 0 {
                    "peer send buffer full".to_owned()
                } else {
                    format!("peer send buffer full after {written} of {total} bytes")
                };
                return Err(io::Error::new(ErrorKind::WouldBlock, why));
            }
            Err(e) => return Err(e),
        }
    }
    w.flush()
}

/// Best-effort variant: logs the failure and reports it as `false`.
pub fn write_message_safe<W: Write + ?Sized>(
    w: &mut W,
    payload: &[u8],
    log: &dyn LogSink,
) -> bool {
    match write_message(w, payload) {
        Ok(()) => true,
        Err(e) => {
            sink_warn!(log, "best-effort write of {} bytes failed: {}", payload.len(), e);
            false
        }
    }
}

/// Send one frame to every socket except `exclude`.
///
/// A failing socket is logged and skipped; the rest of the batch still gets
/// the frame. Returns the fds that failed so their owner can reclaim them.
pub fn broadcast<'a, I>(
    sockets: I,
    payload: &[u8],
    exclude: Option<RawFd>,
    log: &dyn LogSink,
) -> Vec<RawFd>
where
    I: IntoIterator<Item = &'a TcpStream>,
{
    let mut failed = Vec::new();
    for sock in sockets {
        let fd = sock.as_raw_fd();
        if Some(fd) == exclude {
            continue;
        }
        let mut w = sock;
        if let Err(e) = write_message(&mut w, payload) {
            sink_warn!(log, "broadcast to fd {} failed: {}", fd, e);
            failed.push(fd);
        } else {
            sink_trace!(log, "relayed {} bytes to fd {}", payload.len(), fd);
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::{NoopLogSink, QueueLogSink};
    use crate::transport::{ReadOutcome, Reassembler};
    use std::net::{Shutdown, TcpListener};
    use std::time::Duration;

    /// Writer that accepts at most `step` bytes per call and ignores vectoring.
    struct Trickle {
        out: Vec<u8>,
        step: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.step);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts `room` bytes, then reports a full send buffer.
    struct Full {
        out: Vec<u8>,
        room: usize,
        calls: usize,
    }

    impl Write for Full {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.room == 0 {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            }
            let n = buf.len().min(self.room);
            self.room -= n;
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Dead;
    impl Write for Dead {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn pair() -> (TcpStream, TcpStream) {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let a = TcpStream::connect(l.local_addr().unwrap()).unwrap();
        let (b, _) = l.accept().unwrap();
        (a, b)
    }

    #[test]
    fn short_writes_still_produce_whole_frame() {
        let mut w = Trickle {
            out: Vec::new(),
            step: 3,
        };
        write_message(&mut w, b"partial writes").unwrap();
        assert_eq!(&w.out[..4], &[14, 0, 0, 0]);
        assert_eq!(&w.out[4..], b"partial writes");
    }

    #[test]
    fn full_sink_fails_at_once_instead_of_retrying() {
        let mut w = Full {
            out: Vec::new(),
            room: 0,
            calls: 0,
        };
        let err = write_message(&mut w, b"never sent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        assert_eq!(w.calls, 1);
        assert!(w.out.is_empty());
    }

    #[test]
    fn full_sink_mid_frame_reports_progress() {
        let mut w = Full {
            out: Vec::new(),
            room: 6,
            calls: 0,
        };
        let err = write_message(&mut w, b"0123456789").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WouldBlock);
        assert!(err.to_string().contains("6 of 14"), "{err}");
        assert_eq!(w.calls, 3);
    }

    #[test]
    fn safe_variant_logs_and_returns_false() {
        let log = QueueLogSink::new();
        assert!(!write_message_safe(&mut Dead, b"welcome", &log));
        assert_eq!(log.drain().len(), 1);

        let mut ok = Trickle {
            out: Vec::new(),
            step: 64,
        };
        assert!(write_message_safe(&mut ok, b"welcome", &NoopLogSink));
    }

    #[test]
    fn broadcast_skips_excluded_socket() {
        let (a_local, mut a_remote) = pair();
        let (b_local, mut b_remote) = pair();
        a_remote
            .set_read_timeout(Some(Duration::from_millis(100)))
            .unwrap();

        let failed = broadcast(
            [&a_local, &b_local],
            b"hi",
            Some(a_local.as_raw_fd()),
            &NoopLogSink,
        );
        assert!(failed.is_empty());

        let mut r = Reassembler::new(64);
        assert_eq!(
            r.read_message(&mut b_remote).unwrap(),
            ReadOutcome::Frame(b"hi")
        );
        let mut r = Reassembler::new(64);
        assert_eq!(r.read_message(&mut a_remote).unwrap(), ReadOutcome::NotReady);
    }

    #[test]
    fn broadcast_isolates_a_dead_peer() {
        let (dead_local, _dead_remote) = pair();
        dead_local.shutdown(Shutdown::Write).unwrap();
        let (live_local, mut live_remote) = pair();

        let log = QueueLogSink::new();
        let failed = broadcast([&dead_local, &live_local], b"still here", None, &log);
        assert_eq!(failed, vec![dead_local.as_raw_fd()]);

        let mut r = Reassembler::new(64);
        assert_eq!(
            r.read_message(&mut live_remote).unwrap(),
            ReadOutcome::Frame(b"still here")
        );
    }
}
