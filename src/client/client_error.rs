use std::{fmt, io};

use crate::protocol::{FrameError, PacketError};

/// Errors a [`ClientSession`](super::ClientSession) reports to its caller.
///
/// Receive-side failures never surface here; they become
/// [`ChatEvent::System`](super::ChatEvent::System) notices and drive reconnects.
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Packet(PacketError),
    Frame(FrameError),
    /// No socket is installed (the receiver is reconnecting).
    NotConnected,
    InvalidUsername(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Packet(e) => write!(f, "packet error: {e}"),
            Self::Frame(e) => write!(f, "frame error: {e}"),
            Self::NotConnected => write!(f, "not connected to the server"),
            Self::InvalidUsername(name) => write!(f, "invalid username {name:?}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<PacketError> for ClientError {
    fn from(e: PacketError) -> Self {
        Self::Packet(e)
    }
}

impl From<FrameError> for ClientError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}
