//! RustyChat is a small multi-client TCP chat relay.
//!
//! It provides two binaries:
//! - `chat_server`: a single-threaded, `poll(2)`-driven relay that rebroadcasts
//!   every frame it receives to all other connected clients.
//! - `chat_client`: a terminal client with a background receiver thread and
//!   automatic reconnection.
//!
//! Everything on the wire is a length-prefixed frame (`[u32 LE][payload]`)
//! whose payload is a tagged [`protocol::Packet`].

pub mod clock;
/// Handles configuration loading and management.
pub mod config;
/// Logging utilities shared by both binaries.
pub mod log;
/// Wire format: frames, packet tags and the chat message body.
pub mod protocol;
/// Stream reassembly and frame writing over byte streams.
pub mod transport;
/// The connection multiplexer and its configuration.
pub mod server;
/// Client session with background receive and reconnect.
pub mod client;
