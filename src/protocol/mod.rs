pub mod constants;
pub mod errors;
pub mod framing;
pub mod packet;
pub mod packet_type;

pub use constants::*;
pub use errors::{FrameError, PacketError};
pub use framing::{decode_frame, encode_frame, frame_prefix, peek_len};
pub use packet::{ChatMessage, Packet};
pub use packet_type::PacketType;
