use crate::session::SessionId;

/// Result of looking up a session by identity. Replaces the
/// throw/catch "not found" / "found but disconnected" control flow
/// with a tagged result the dispatcher branches on directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Absent,
    Disconnected(SessionId),
    Connected(SessionId),
}
