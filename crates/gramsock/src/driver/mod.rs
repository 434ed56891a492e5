//! The driver boundary: native datagram primitives behind a trait.
//!
//! A [`DatagramDriver`] owns raw sockets and exposes them to the rest of
//! the crate through opaque [`SocketHandle`]s. The bundled [`SystemDriver`]
//! implements the trait over the operating system's UDP sockets; tests and
//! embedders can inject their own implementation instead.

use std::fmt;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::options::{OptionKey, OptionValue};

mod system;

pub use system::SystemDriver;

/// Largest number of bytes a single UDP datagram can occupy.
///
/// Drivers size their receive buffers to this, so no datagram is ever
/// truncated.
pub const MAX_DATAGRAM_SIZE: usize = 65535;

/// Opaque identifier for a native socket owned by a driver.
///
/// Handles are minted by [`SocketHandle::next`] and never reused within a
/// process, so a stale handle can be detected rather than silently
/// aliasing a newer socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SocketHandle(u64);

impl SocketHandle {
    /// Mint the next process-unique handle.
    ///
    /// Drivers call this from [`DatagramDriver::create`].
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw handle value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sock-{}", self.0)
    }
}

/// The address family a socket is created for.
///
/// Fixed at construction; every address passed to the socket afterwards
/// must belong to this family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// The family's unspecified (wildcard) address: `0.0.0.0` or `::`.
    pub fn unspecified_address(&self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    /// Whether `address` belongs to this family.
    pub fn accepts(&self, address: &IpAddr) -> bool {
        matches!(
            (self, address),
            (AddressFamily::Ipv4, IpAddr::V4(_)) | (AddressFamily::Ipv6, IpAddr::V6(_))
        )
    }

    /// The family of an address.
    pub fn of(address: &IpAddr) -> AddressFamily {
        match address {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// A network endpoint: address, port, and the family they belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub family: AddressFamily,
    pub address: IpAddr,
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint; the family is derived from the address.
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            family: AddressFamily::of(&address),
            address,
            port,
        }
    }

    /// The zero endpoint for a family: unspecified address, port 0.
    pub fn unspecified(family: AddressFamily) -> Self {
        Self {
            family,
            address: family.unspecified_address(),
            port: 0,
        }
    }

    /// Convert to a [`SocketAddr`].
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// A received datagram: its payload and the endpoint it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Datagram {
    pub data: Vec<u8>,
    pub source: Endpoint,
}

impl Datagram {
    pub fn new(data: Vec<u8>, source: Endpoint) -> Self {
        Self { data, source }
    }
}

/// Native datagram socket primitives.
///
/// Implementations own the raw sockets; callers refer to them only through
/// [`SocketHandle`]s. All methods except [`receive_one`](Self::receive_one)
/// are synchronous and must not block.
///
/// Every fallible method returns [`SocketError::InvalidHandle`] when the
/// handle does not refer to a live socket of this driver.
///
/// [`SocketError::InvalidHandle`]: crate::SocketError::InvalidHandle
pub trait DatagramDriver: Send + Sync + 'static {
    /// Create an unbound socket for `family` and return its handle.
    fn create(&self, family: AddressFamily) -> Result<SocketHandle>;

    /// Bind the socket to `address:port`. Port 0 requests an ephemeral
    /// port. A socket can be bound at most once.
    fn bind(&self, handle: SocketHandle, address: IpAddr, port: u16) -> Result<()>;

    /// Send `data` as a single datagram to `address:port`.
    ///
    /// A full socket buffer is not an error: the datagram is dropped, as
    /// UDP permits.
    fn send(&self, handle: SocketHandle, address: IpAddr, port: u16, data: &[u8]) -> Result<()>;

    /// Wait for one datagram to arrive on the socket.
    ///
    /// At most one receive may be outstanding per handle; the caller
    /// upholds this. The future is cancel-safe: dropping it abandons the
    /// receive without consuming a datagram. An `Err` outcome does not
    /// invalidate the handle.
    fn receive_one(&self, handle: SocketHandle) -> impl Future<Output = Result<Datagram>> + Send;

    /// Release the socket. The handle is dead afterwards; a receive
    /// started before the close may still resolve, and callers that must
    /// not observe it drop or ignore the result.
    fn close(&self, handle: SocketHandle) -> Result<()>;

    /// Apply an option resolved from the [option table](crate::options).
    fn set_option(&self, handle: SocketHandle, key: OptionKey, value: OptionValue) -> Result<()>;

    /// Read back an integer-valued option.
    ///
    /// Drivers may support only a subset of the table here; the bundled
    /// system driver reads `SOL_SOCKET`-level options.
    fn get_option(&self, handle: SocketHandle, key: OptionKey) -> Result<i32>;

    /// The local endpoint the socket is bound to.
    fn local_name(&self, handle: SocketHandle) -> Result<Endpoint>;
}
