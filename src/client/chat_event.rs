use std::fmt;

use crate::protocol::ChatMessage;

/// What the receiver hands to the interactive side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A decoded chat line from another participant (or the server banner).
    Message(ChatMessage),
    /// Local notice about the session itself: lost link, reconnects, send failures.
    System(String),
}

/// Renders the line the way the terminal client prints it.
impl fmt::Display for ChatEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(m) => write!(f, "{}: {}", m.sender, m.content),
            Self::System(notice) => write!(f, "[system] {notice}"),
        }
    }
}
