use std::fmt;

/// Framing errors (length prefix layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Payload cannot be described by the prefix or exceeds the configured cap.
    TooLarge { max: usize, actual: usize },
    /// Fewer than the declared bytes are present.
    Truncated { needed: usize, available: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { max, actual } => {
                write!(f, "frame payload of {actual} bytes exceeds limit of {max}")
            }
            Self::Truncated { needed, available } => {
                write!(f, "frame needs {needed} bytes, only {available} available")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Packet-level errors (tagged body parsing/building).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Tag byte outside the known set.
    InvalidPacketType(u8),
    /// Encode destination too small, or decode source cut inside a fixed-width field.
    BufferTooSmall { needed: usize, available: usize },
    /// Body contents are inconsistent (declared lengths, UTF-8, trailing bytes).
    InvalidData(&'static str),
    /// A field handed to the encoder is over its protocol maximum.
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPacketType(tag) => write!(f, "invalid packet type {tag}"),
            Self::BufferTooSmall { needed, available } => {
                write!(f, "buffer too small: need {needed} bytes, have {available}")
            }
            Self::InvalidData(why) => write!(f, "invalid packet data: {why}"),
            Self::FieldTooLong { field, max, actual } => {
                write!(f, "{field} is {actual} bytes, max is {max}")
            }
        }
    }
}

impl std::error::Error for PacketError {}
