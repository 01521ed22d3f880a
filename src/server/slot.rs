use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};

use crate::transport::Reassembler;

/// One accepted client, owned by the multiplexer.
///
/// Its index in the slot array changes when other slots are removed, so
/// lookups go through [`Slot::fd`], never a remembered index.
pub struct Slot {
    pub(crate) stream: TcpStream,
    peer: SocketAddr,
    /// Random tag used in logs and the welcome banner.
    client_id: u32,
    pub(crate) reassembler: Reassembler,
}

impl Slot {
    pub fn new(stream: TcpStream, peer: SocketAddr, buffer_size: usize) -> Self {
        Self {
            stream,
            peer,
            client_id: rand::random(),
            reassembler: Reassembler::new(buffer_size),
        }
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn client_id(&self) -> u32 {
        self.client_id
    }
}
