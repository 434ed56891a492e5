//! Socket configuration.

use crate::driver::AddressFamily;

/// Configuration for a [`UdpSocket`](crate::UdpSocket).
///
/// The address family and reuse flags are fixed at construction; the
/// reuse flags are applied to the native socket right before it binds.
///
/// # Example
///
/// ```
/// use gramsock::UdpSocketConfig;
///
/// let config = UdpSocketConfig::udp4().with_reuse_address(true);
/// assert!(config.reuse_address);
/// ```
#[derive(Clone, Debug)]
pub struct UdpSocketConfig {
    /// Address family the socket is created for.
    pub family: AddressFamily,
    /// Set `SO_REUSEADDR` before binding.
    pub reuse_address: bool,
    /// Set `SO_REUSEPORT` before binding. Unix only.
    pub reuse_port: bool,
}

impl Default for UdpSocketConfig {
    fn default() -> Self {
        Self::udp4()
    }
}

impl UdpSocketConfig {
    pub fn new(family: AddressFamily) -> Self {
        Self {
            family,
            reuse_address: false,
            reuse_port: false,
        }
    }

    /// Configuration for an IPv4 socket.
    pub fn udp4() -> Self {
        Self::new(AddressFamily::Ipv4)
    }

    /// Configuration for an IPv6 socket.
    pub fn udp6() -> Self {
        Self::new(AddressFamily::Ipv6)
    }

    /// Request `SO_REUSEADDR` at bind time.
    pub fn with_reuse_address(mut self, reuse: bool) -> Self {
        self.reuse_address = reuse;
        self
    }

    /// Request `SO_REUSEPORT` at bind time.
    pub fn with_reuse_port(mut self, reuse: bool) -> Self {
        self.reuse_port = reuse;
        self
    }
}
