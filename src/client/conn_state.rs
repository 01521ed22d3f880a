/// Connection state of a [`ClientSession`](super::ClientSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// A socket is installed and the receiver is reading it.
    Connected,
    /// The socket was lost; the receiver is backing off between connect attempts.
    Reconnecting,
}
