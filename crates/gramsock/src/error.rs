//! Error types for datagram socket operations.

use std::fmt;
use std::io;

/// Errors that can occur during datagram socket operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketError {
    /// The socket is already bound and cannot be bound again
    AlreadyBound,
    /// The handle does not refer to a live native socket
    InvalidHandle,
    /// Creating the native socket failed
    Create(String),
    /// Binding to the requested address failed
    Bind(String),
    /// Sending a datagram failed
    Send(String),
    /// Setting or reading a socket option failed
    Option(String),
    /// The local address could not be retrieved
    LocalAddress(String),
    /// Receiving a datagram failed
    Receive(String),
    /// An address is malformed or does not match the socket's family
    InvalidAddress(String),
}

impl fmt::Display for SocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketError::AlreadyBound => write!(f, "Socket is already bound"),
            SocketError::InvalidHandle => write!(f, "Invalid socket handle"),
            SocketError::Create(msg) => write!(f, "Create error: {}", msg),
            SocketError::Bind(msg) => write!(f, "Bind error: {}", msg),
            SocketError::Send(msg) => write!(f, "Send error: {}", msg),
            SocketError::Option(msg) => write!(f, "Option error: {}", msg),
            SocketError::LocalAddress(msg) => write!(f, "Local address error: {}", msg),
            SocketError::Receive(msg) => write!(f, "Receive error: {}", msg),
            SocketError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
        }
    }
}

impl std::error::Error for SocketError {}

impl From<std::net::AddrParseError> for SocketError {
    fn from(err: std::net::AddrParseError) -> Self {
        SocketError::InvalidAddress(err.to_string())
    }
}

/// Result type for socket operations.
pub type Result<T> = std::result::Result<T, SocketError>;

/// Format an I/O error with its POSIX-style name, e.g. `EADDRINUSE: ...`.
///
/// Errors without a recognized kind fall back to the plain message.
pub(crate) fn describe_io_error(err: &io::Error) -> String {
    let name = match err.kind() {
        io::ErrorKind::AddrInUse => "EADDRINUSE",
        io::ErrorKind::AddrNotAvailable => "EADDRNOTAVAIL",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::ConnectionReset => "ECONNRESET",
        io::ErrorKind::ConnectionAborted => "ECONNABORTED",
        io::ErrorKind::NotConnected => "ENOTCONN",
        io::ErrorKind::BrokenPipe => "EPIPE",
        io::ErrorKind::WouldBlock => "EWOULDBLOCK",
        io::ErrorKind::InvalidInput => "EINVAL",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        io::ErrorKind::Interrupted => "EINTR",
        io::ErrorKind::OutOfMemory => "ENOMEM",
        io::ErrorKind::NetworkUnreachable => "ENETUNREACH",
        io::ErrorKind::HostUnreachable => "EHOSTUNREACH",
        io::ErrorKind::NetworkDown => "ENETDOWN",
        _ => return err.to_string(),
    };
    format!("{}: {}", name, err)
}
