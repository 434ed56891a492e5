//! The event surface of a socket.

use gramsock_events::Signal;

use crate::driver::Datagram;
use crate::error::SocketError;

/// The signals a [`UdpSocket`](crate::UdpSocket) emits.
///
/// Held by the socket behind an `Arc` so the receive loop can emit
/// without touching the socket itself; clone the `Arc` to keep
/// connecting listeners after the socket moves elsewhere.
///
/// A bound socket emits every signal from its receive-loop task, so
/// listeners observe one order: `listening` precedes every
/// `message`/`error` from that bound period, and `closed` is the last
/// signal ever emitted.
pub struct SocketEvents {
    /// Emitted once per successful bind, before any message.
    pub listening: Signal<()>,
    /// Emitted for every datagram the receive loop delivers.
    pub message: Signal<Datagram>,
    /// Emitted for non-terminal failures, such as receive errors.
    pub error: Signal<SocketError>,
    /// Emitted exactly once, when the socket closes.
    pub closed: Signal<()>,
}

impl SocketEvents {
    pub(crate) fn new() -> Self {
        Self {
            listening: Signal::new(),
            message: Signal::new(),
            error: Signal::new(),
            closed: Signal::new(),
        }
    }
}
