pub mod chat_event;
pub mod client_config;
pub mod client_error;
pub mod client_session;
pub mod conn_state;
pub mod pending_queue;

pub use chat_event::ChatEvent;
pub use client_config::ClientConfig;
pub use client_error::ClientError;
pub use client_session::ClientSession;
pub use conn_state::ConnState;
pub use pending_queue::PendingQueue;
