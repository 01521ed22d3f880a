use std::fmt;
use std::io::{self, ErrorKind, Read};
use std::ops::Range;

use crate::protocol::{LEN_PREFIX_SIZE, peek_len};

/// Result of one [`Reassembler::read_message`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome<'a> {
    /// A complete frame payload (prefix stripped). Borrowed until the next call.
    Frame(&'a [u8]),
    /// No complete frame yet; the source would block.
    NotReady,
    /// The peer closed the stream (read returned 0).
    Closed,
}

#[derive(Debug)]
pub enum ReassemblyError {
    /// A frame of `needed` bytes can never fit in an arena of `capacity`.
    BufferTooSmall { needed: usize, capacity: usize },
    /// Any read failure other than WouldBlock/Interrupted.
    Io(io::Error),
}

impl fmt::Display for ReassemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { needed, capacity } => {
                write!(f, "frame of {needed} bytes exceeds buffer of {capacity}")
            }
            Self::Io(e) => write!(f, "read error: {e}"),
        }
    }
}

impl std::error::Error for ReassemblyError {}

impl From<io::Error> for ReassemblyError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Per-connection arena that recovers frame boundaries from a byte stream.
///
/// Unconsumed bytes live in `buf[start..pos]`. Complete frames are handed out
/// as borrowed slices; the only data movement is compaction to offset 0, and
/// it never happens while a complete frame is waiting.
pub struct Reassembler {
    buf: Box<[u8]>,
    start: usize,
    pos: usize,
}

impl Reassembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes received but not yet handed out as frames.
    pub fn buffered(&self) -> usize {
        self.pos - self.start
    }

    /// Drop everything buffered, e.g. after the socket was replaced.
    pub fn reset(&mut self) {
        self.start = 0;
        self.pos = 0;
    }

    /// Make room for `n` contiguous bytes starting at `start`.
    pub fn ensure_space(&mut self, n: usize) -> Result<(), ReassemblyError> {
        if n > self.capacity() {
            return Err(ReassemblyError::BufferTooSmall {
                needed: n,
                capacity: self.capacity(),
            });
        }
        if self.capacity() - self.start < n {
            self.buf.copy_within(self.start..self.pos, 0);
            self.pos -= self.start;
            self.start = 0;
        }
        Ok(())
    }

    /// Copy `bytes` in at the tail; returns how many fitted.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        if self.capacity() - self.pos < bytes.len() && self.start > 0 {
            self.buf.copy_within(self.start..self.pos, 0);
            self.pos -= self.start;
            self.start = 0;
        }
        let n = bytes.len().min(self.capacity() - self.pos);
        self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        self.pos += n;
        n
    }

    /// Pop the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<&[u8]>, ReassemblyError> {
        Ok(self.take_frame()?.map(|r| &self.buf[r]))
    }

    /// Return a buffered frame if there is one; otherwise read from `src`
    /// until a frame completes, the source would block, or it closes.
    pub fn read_message<R: Read + ?Sized>(
        &mut self,
        src: &mut R,
    ) -> Result<ReadOutcome<'_>, ReassemblyError> {
        loop {
            if let Some(range) = self.take_frame()? {
                return Ok(ReadOutcome::Frame(&self.buf[range]));
            }

            // take_frame reserved tail room for the pending frame.
            match src.read(&mut self.buf[self.pos..]) {
                Ok(0) => return Ok(ReadOutcome::Closed),
                Ok(n) => self.pos += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadOutcome::NotReady),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReassemblyError::Io(e)),
            }
        }
    }

    /// Advance past the next complete frame and return its payload range.
    /// When incomplete, ensures space for it and returns `None`.
    fn take_frame(&mut self) -> Result<Option<Range<usize>>, ReassemblyError> {
        let Some(len) = peek_len(&self.buf[self.start..self.pos]) else {
            self.ensure_space(LEN_PREFIX_SIZE)?;
            return Ok(None);
        };
        let total = LEN_PREFIX_SIZE.saturating_add(len);
        if total > self.capacity() {
            return Err(ReassemblyError::BufferTooSmall {
                needed: total,
                capacity: self.capacity(),
            });
        }
        if self.buffered() < total {
            self.ensure_space(total)?;
            return Ok(None);
        }

        let payload = self.start + LEN_PREFIX_SIZE..self.start + total;
        self.start += total;
        if self.start == self.pos {
            // Cursors only; the payload bytes stay put until the next write.
            self.start = 0;
            self.pos = 0;
        }
        Ok(Some(payload))
    }
}
