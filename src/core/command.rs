//! Command taxonomy shared by requests and responses.

use std::fmt;

/// Primary or secondary command identifier carried in every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Command(pub i16);

impl Command {
    /// Reserved sub-command marking an error response
    pub const INTERNAL_BAD: Command = Command(110);

    pub const fn new(v: i16) -> Self {
        Command(v)
    }

    pub const fn as_i16(self) -> i16 {
        self.0
    }

    /// Commands on the wire must be strictly positive
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl From<i16> for Command {
    fn from(v: i16) -> Self {
        Command(v)
    }
}

impl From<Command> for i16 {
    fn from(c: Command) -> Self {
        c.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport a session is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Raw TCP stream with u16 length-prefixed frames
    Socket,
    /// WebSocket binary messages carrying the same length prefix
    WebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Socket => f.write_str("socket"),
            TransportKind::WebSocket => f.write_str("websocket"),
        }
    }
}
