pub mod multiplexer;
pub(crate) mod poll_set;
pub mod server_config;
pub mod server_error;
pub mod server_stats;
pub mod slot;

pub use multiplexer::Multiplexer;
pub use server_config::ServerConfig;
pub use server_error::ServerError;
pub use server_stats::ServerStats;
pub use slot::Slot;
