//! Socket lifecycle states.

use std::fmt;

/// Lifecycle state of a [`UdpSocket`](crate::UdpSocket).
///
/// States only move forward: `Unbound` → `Bound` → `Closed`. Closing is
/// legal from any state and nothing reverses; a closed socket is
/// finished, and receiving again requires a fresh socket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SocketState {
    /// Constructed; the native handle exists but is not bound.
    #[default]
    Unbound,
    /// Bound to a local address; the receive loop is running.
    Bound,
    /// Closed; the native handle has been released. Terminal.
    Closed,
}

impl SocketState {
    pub fn is_unbound(&self) -> bool {
        matches!(self, SocketState::Unbound)
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, SocketState::Bound)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SocketState::Closed)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketState::Unbound => write!(f, "unbound"),
            SocketState::Bound => write!(f, "bound"),
            SocketState::Closed => write!(f, "closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(SocketState::default(), SocketState::Unbound);
        assert!(SocketState::default().is_unbound());
    }

    #[test]
    fn test_state_helpers() {
        assert!(SocketState::Bound.is_bound());
        assert!(!SocketState::Bound.is_closed());
        assert!(SocketState::Closed.is_closed());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SocketState::Unbound.to_string(), "unbound");
        assert_eq!(SocketState::Bound.to_string(), "bound");
        assert_eq!(SocketState::Closed.to_string(), "closed");
    }
}
