//! Event-driven UDP sockets.
//!
//! [`UdpSocket`] is the public unit of this crate: it owns one native
//! handle, tracks its lifecycle state, and bridges inbound traffic into
//! the signals on [`SocketEvents`].

mod config;
mod events;
mod socket;
mod state;

pub use config::UdpSocketConfig;
pub use events::SocketEvents;
pub use socket::UdpSocket;
pub use state::SocketState;
