pub mod frame_writer;
pub mod reassembler;

pub use frame_writer::{broadcast, write_message, write_message_safe};
pub use reassembler::{ReadOutcome, Reassembler, ReassemblyError};
