//! # gramsock
//!
//! Event-driven UDP datagram sockets with a pluggable native driver.
//!
//! A [`UdpSocket`] wraps one native datagram socket for its entire life
//! and walks a forward-only lifecycle: unbound → bound → closed. Binding
//! starts a receive loop that turns the driver's one-shot async receive
//! into a continuous stream of signals, so inbound traffic, failures, and
//! lifecycle changes all arrive the same way: through the signals on
//! [`SocketEvents`]. Broadcast, multicast membership, TTL, and buffer
//! sizing are exposed as typed option methods backed by a single
//! [option table](options).
//!
//! # Example
//!
//! ```
//! use gramsock::{UdpSocket, UdpSocketConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> gramsock::Result<()> {
//! let socket = UdpSocket::new(UdpSocketConfig::udp4())?;
//!
//! socket.events.message.connect(|datagram| {
//!     println!("{} bytes from {}", datagram.data.len(), datagram.source);
//! });
//!
//! socket.bind_to("127.0.0.1".parse()?, 0)?;
//! let local = socket.local_addr();
//! socket.send_to(b"ping", local.address, local.port)?;
//! socket.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Runtime
//!
//! Binding registers the socket with the tokio reactor and spawns its
//! receive loop, so [`UdpSocket::bind`] and everything after it must run
//! inside a tokio runtime. Construction, option changes on an unbound
//! socket, and closing do not require one.
//!
//! # Custom drivers
//!
//! The socket calls into native primitives only through the
//! [`DatagramDriver`] trait. [`SystemDriver`] is the operating-system
//! implementation; tests and embedders can supply their own with
//! [`UdpSocket::with_driver`].
//!
//! # Logging
//!
//! The crate logs through [`tracing`] under the targets
//! `gramsock::socket`, `gramsock::driver`, and `gramsock_events::signal`.

pub mod driver;
mod error;
pub mod options;
pub mod socket;

pub use driver::{
    AddressFamily, Datagram, DatagramDriver, Endpoint, MAX_DATAGRAM_SIZE, SocketHandle,
    SystemDriver,
};
pub use error::{Result, SocketError};
pub use gramsock_events::{ConnectionId, Signal};
pub use options::{OptionKey, OptionValue, SocketOption};
pub use socket::{SocketEvents, SocketState, UdpSocket, UdpSocketConfig};
