/// Wire layout.
///
/// Frame:
///   [len: u32 LE][payload: len bytes]
/// Packet (inside a frame payload):
///   [tag: u8][tag-specific body]
///
/// Size of the little-endian length prefix in front of every frame.
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default per-connection reassembly arena, prefix included.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Longest sender name a chat message may carry (bytes).
pub const MAX_USERNAME_LEN: usize = 32;

/// Longest chat message body (bytes of UTF-8).
pub const MAX_MESSAGE_LEN: usize = 1024;

/// Handshake and Config carry a single reserved byte for now.
pub const PLACEHOLDER_BODY: u8 = 0;

/// Sender name used for frames originated by the server itself.
pub const SERVER_SENDER: &str = "server";
